pub use sqlrag_core::{errors, models};

pub mod client;
pub mod config;
pub mod db;
pub mod er;
pub mod executor;
pub mod llm;
pub mod pipeline;
pub mod rag;

pub use pipeline::{Answer, AppContext, GenerationMode, PipelineSettings, Session};
