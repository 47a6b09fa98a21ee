use async_trait::async_trait;

use crate::errors::LlmError;

pub mod fence;
pub mod gemini;
pub mod generator;
pub mod models;

pub use fence::strip_code_fences;
pub use gemini::{GeminiClient, GeminiConfig, GeminiEmbedder};
pub use generator::{GeneratedQuery, SqlGenerator};

/// A hosted text-generation model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends `prompt` and returns the raw text of the reply.
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
    fn model_name(&self) -> &str;
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use mockall::mock;

    mock! {
        pub LanguageModelMock {}

        #[async_trait]
        impl LanguageModel for LanguageModelMock {
            async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
            fn model_name(&self) -> &str;
        }
    }
}
