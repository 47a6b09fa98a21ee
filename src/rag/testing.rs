//! Deterministic embedder shared by the unit tests and the integration
//! tests under `tests/`.

#![allow(dead_code)]

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;

use super::Embedder;
use sqlrag_core::errors::EmbeddingError;

/// Bag-of-words embedder: each lowercase token bumps one hashed bucket.
/// Texts sharing words land close together, which is all retrieval tests
/// need.
pub struct KeywordEmbedder {
    name: String,
    calls: AtomicUsize,
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self::named("keyword-64")
    }
}

impl KeywordEmbedder {
    pub const DIMENSION: usize = 64;

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; Self::DIMENSION];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() % Self::DIMENSION as u64) as usize] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    fn dimension(&self) -> usize {
        Self::DIMENSION
    }
}
