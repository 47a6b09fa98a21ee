#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use sqlrag::{errors::LlmError, llm::LanguageModel, rag::Embedder};

#[path = "../../src/rag/testing.rs"]
mod testing;

pub use testing::KeywordEmbedder;

/// Replies with a fixed answer and remembers every prompt it was sent.
pub struct ScriptedModel {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
