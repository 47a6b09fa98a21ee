pub mod embedder;
pub mod index;
pub mod prompt;
pub mod retriever;
pub mod store;

pub use embedder::Embedder;
pub use retriever::{RetrievedDescriptor, Retriever, DEFAULT_TOP_K};
pub use store::SchemaIndex;

#[cfg(test)]
pub(crate) mod testing;
