use async_trait::async_trait;

use crate::errors::EmbeddingError;

/// Turns short text phrases into fixed-dimension vectors.
///
/// Descriptor and question vectors are only comparable when they come from
/// the same model, so every index records [`Embedder::model_name`].
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds `texts` in one call, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn model_name(&self) -> &str;

    fn dimension(&self) -> usize;
}

/// Checks a batch result against the request before it reaches an index.
pub fn validate_batch(
    embedder: &dyn Embedder,
    expected: usize,
    vectors: &[Vec<f32>],
) -> Result<(), EmbeddingError> {
    if vectors.len() != expected {
        return Err(EmbeddingError::CountMismatch {
            expected,
            got: vectors.len(),
        });
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != embedder.dimension()) {
        return Err(EmbeddingError::DimensionMismatch {
            expected: embedder.dimension(),
            got: bad.len(),
        });
    }
    Ok(())
}

#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use std::sync::Arc;

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use log::info;

    use super::Embedder;
    use crate::errors::EmbeddingError;

    const MODEL_NAME: &str = "all-MiniLM-L6-v2";
    const DIMENSION: usize = 384;

    /// Local sentence embeddings (all-MiniLM-L6-v2 over ONNX runtime). The
    /// model is downloaded on first use and cached.
    pub struct FastEmbedder {
        model: Arc<TextEmbedding>,
    }

    impl FastEmbedder {
        pub fn new() -> Result<Self, EmbeddingError> {
            info!("Loading local embedding model {MODEL_NAME}");
            let options =
                InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(false);
            let model = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::Config(format!("failed to load {MODEL_NAME}: {e}")))?;

            Ok(Self {
                model: Arc::new(model),
            })
        }
    }

    #[async_trait]
    impl Embedder for FastEmbedder {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }

            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            tokio::task::spawn_blocking(move || model.embed(texts, None))
                .await
                .map_err(|e| EmbeddingError::Request(e.to_string()))?
                .map_err(|e| EmbeddingError::Request(e.to_string()))
        }

        fn model_name(&self) -> &str {
            MODEL_NAME
        }

        fn dimension(&self) -> usize {
            DIMENSION
        }
    }
}
