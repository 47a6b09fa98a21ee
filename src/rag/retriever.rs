use log::debug;
use serde::Serialize;

use crate::{
    errors::{EmbeddingError, IndexError},
    models::descriptor::SchemaDescriptor,
};

use super::{embedder::validate_batch, store::SchemaIndex, Embedder};

pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct RetrievedDescriptor {
    pub descriptor: SchemaDescriptor,
    pub distance: f32,
}

/// Finds the schema descriptors closest to a question.
pub struct Retriever<'a> {
    index: &'a SchemaIndex,
    embedder: &'a dyn Embedder,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a SchemaIndex, embedder: &'a dyn Embedder) -> Self {
        Self { index, embedder }
    }

    /// Returns up to `top_k` descriptors, nearest first.
    pub async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
    ) -> Result<Vec<RetrievedDescriptor>, IndexError> {
        if self.index.embedding_model() != self.embedder.model_name() {
            return Err(EmbeddingError::ModelMismatch {
                index: self.index.embedding_model().to_string(),
                active: self.embedder.model_name().to_string(),
            }
            .into());
        }

        if self.index.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut vectors = self.embedder.embed(&[question.to_string()]).await?;
        validate_batch(self.embedder, 1, &vectors)?;
        let query = vectors.remove(0);

        let hits: Vec<RetrievedDescriptor> = self
            .index
            .search(&query, top_k)?
            .into_iter()
            .map(|(descriptor, neighbor)| RetrievedDescriptor {
                descriptor: descriptor.clone(),
                distance: neighbor.distance,
            })
            .collect();

        debug!(
            "Retrieved {} descriptors for question: {:?}",
            hits.len(),
            hits.iter().map(|h| h.descriptor.text.as_str()).collect::<Vec<_>>()
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::schema::Schema, rag::testing::KeywordEmbedder};

    fn school() -> Schema {
        Schema::from_columns([
            ("students", vec!["id", "name", "age"]),
            ("courses", vec!["id", "title", "credits"]),
            ("enrollments", vec!["student_id", "course_id", "grade"]),
        ])
    }

    #[tokio::test]
    async fn test_retrieve_returns_at_most_top_k() {
        let embedder = KeywordEmbedder::default();
        let index = SchemaIndex::build(&school(), &embedder).await.unwrap();
        let retriever = Retriever::new(&index, &embedder);

        let hits = retriever.retrieve("students older than 20", 5).await.unwrap();
        assert_eq!(hits.len(), 5);
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

        let all = retriever.retrieve("students", 50).await.unwrap();
        assert_eq!(all.len(), 9);
    }

    #[tokio::test]
    async fn test_retrieve_ranks_matching_table_first() {
        let embedder = KeywordEmbedder::default();
        let index = SchemaIndex::build(&school(), &embedder).await.unwrap();

        let hits = Retriever::new(&index, &embedder)
            .retrieve("courses title", 1)
            .await
            .unwrap();
        assert_eq!(hits[0].descriptor.text, "courses - title");
    }

    #[tokio::test]
    async fn test_empty_index_returns_nothing() {
        let embedder = KeywordEmbedder::default();
        let index = SchemaIndex::build(&Schema::default(), &embedder)
            .await
            .unwrap();

        let hits = Retriever::new(&index, &embedder)
            .retrieve("anything", 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert_eq!(embedder.calls(), 0);
    }

    #[tokio::test]
    async fn test_model_mismatch() {
        let builder = KeywordEmbedder::named("model-a");
        let index = SchemaIndex::build(&school(), &builder).await.unwrap();
        let other = KeywordEmbedder::named("model-b");

        let err = Retriever::new(&index, &other)
            .retrieve("students", 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            IndexError::Embedding(EmbeddingError::ModelMismatch { .. })
        ));
    }
}
