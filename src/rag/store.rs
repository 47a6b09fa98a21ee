use std::path::Path;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    errors::IndexError,
    models::{
        descriptor::{descriptors, SchemaDescriptor},
        schema::Schema,
    },
};

use super::{
    embedder::{validate_batch, Embedder},
    index::{FlatIndex, Metric, Neighbor},
};

/// Default location of the persisted artifact.
pub const DEFAULT_INDEX_PATH: &str = "vectorstore/schema_index.json";

/// Nearest-neighbour index over a schema's descriptors, plus the descriptor
/// list it was built from. Index position `i` is `descriptors[i]`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SchemaIndex {
    embedding_model: String,
    built_at: DateTime<Utc>,
    index: FlatIndex,
    descriptors: Vec<SchemaDescriptor>,
}

impl SchemaIndex {
    /// Embeds every descriptor of `schema` in a single batch.
    pub async fn build(schema: &Schema, embedder: &dyn Embedder) -> Result<Self, IndexError> {
        let descriptors = descriptors(schema);
        let mut index = FlatIndex::new(embedder.dimension(), Metric::L2);

        if !descriptors.is_empty() {
            let texts: Vec<String> = descriptors.iter().map(|d| d.text.clone()).collect();
            let vectors = embedder.embed(&texts).await?;
            validate_batch(embedder, texts.len(), &vectors)?;
            index.add(vectors)?;
        }

        info!(
            "Built schema index: {} descriptors, model {}",
            descriptors.len(),
            embedder.model_name()
        );

        Ok(Self {
            embedding_model: embedder.model_name().to_string(),
            built_at: Utc::now(),
            index,
            descriptors,
        })
    }

    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn descriptors(&self) -> &[SchemaDescriptor] {
        &self.descriptors
    }

    pub fn index(&self) -> &FlatIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Nearest descriptors to an already embedded query.
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(&SchemaDescriptor, Neighbor)>, IndexError> {
        self.index
            .search(query, k)?
            .into_iter()
            .map(|n| {
                self.descriptors
                    .get(n.position)
                    .map(|d| (d, n))
                    .ok_or_else(|| {
                        IndexError::Corrupt(format!("no descriptor at position {}", n.position))
                    })
            })
            .collect()
    }

    /// True when this index describes exactly `schema` as embedded by
    /// `embedding_model`.
    pub fn matches(&self, schema: &Schema, embedding_model: &str) -> bool {
        self.embedding_model == embedding_model && self.descriptors == descriptors(schema)
    }

    pub fn save(&self, path: &Path) -> Result<(), IndexError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec(self)?)?;
        std::fs::rename(&tmp, path)?;

        debug!("Saved schema index to {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, IndexError> {
        let bytes = std::fs::read(path)?;
        let loaded: Self = serde_json::from_slice(&bytes)?;

        if loaded.index.len() != loaded.descriptors.len() {
            return Err(IndexError::Corrupt(format!(
                "{} vectors for {} descriptors",
                loaded.index.len(),
                loaded.descriptors.len()
            )));
        }
        loaded.index.check_dimensions()?;

        Ok(loaded)
    }

    /// Reuses the artifact at `path` when it was built for this schema by the
    /// same embedding model; otherwise rebuilds and overwrites it.
    pub async fn build_or_load(
        schema: &Schema,
        embedder: &dyn Embedder,
        path: &Path,
    ) -> Result<Self, IndexError> {
        if path.exists() {
            match Self::load(path) {
                Ok(existing) if existing.matches(schema, embedder.model_name()) => {
                    info!("Reusing schema index at {}", path.display());
                    return Ok(existing);
                }
                Ok(_) => info!(
                    "Schema index at {} is stale, rebuilding",
                    path.display()
                ),
                Err(e) => warn!(
                    "Ignoring unreadable schema index at {}: {e}",
                    path.display()
                ),
            }
        }

        let built = Self::build(schema, embedder).await?;
        built.save(path)?;
        Ok(built)
    }
}
