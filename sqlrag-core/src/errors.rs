use thiserror::Error;

/// Errors raised while talking to a database.
#[derive(Error, Debug)]
pub enum DbError {
    /// Error that occurs during database interactions (e.g., SQL query failure).
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Import error: {0}")]
    Import(String),
    #[error("Export error: {0}")]
    Export(String),
    /// Configuration error (e.g., invalid database URL or missing parameters).
    #[error("Configuration error: {0}")]
    Config(String),
    /// Connection error (e.g., issues with network or database connection).
    #[error("Connection error: {0}")]
    Connection(String),
    /// Catalog rows that could not be read back into a schema.
    #[error("Catalog error: {0}")]
    Catalog(String),
}

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding configuration error: {0}")]
    Config(String),
    #[error("Embedding request failed: {0}")]
    Request(String),
    #[error("Invalid embedding response: {0}")]
    Response(String),
    #[error("Expected {expected} embeddings, got {got}")]
    CountMismatch { expected: usize, got: usize },
    #[error("Expected embedding dimension {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
    /// Query and descriptor vectors must come from the same model.
    #[error("Index was built with embedding model `{index}` but the active model is `{active}`")]
    ModelMismatch { index: String, active: String },
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Model configuration error: {0}")]
    Config(String),
    #[error("Model request failed: {0}")]
    Request(String),
    #[error("Model returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Model returned an empty response")]
    EmptyResponse,
    #[error("Could not parse model response: {0}")]
    Parse(String),
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Index serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Corrupt index artifact: {0}")]
    Corrupt(String),
    #[error("Vector dimension {got} does not match index dimension {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// Any failure of the question-to-results pipeline.
#[derive(Error, Debug)]
pub enum RagError {
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Question is empty")]
    EmptyQuestion,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rag_error_is_transparent() {
        let err: RagError = DbError::Connection("refused".to_string()).into();
        assert_eq!(err.to_string(), "Connection error: refused");

        let err: RagError = LlmError::Status {
            status: 403,
            message: "API key not valid".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Model returned HTTP 403: API key not valid");
    }

    #[test]
    fn test_index_error_wraps_embedding_error() {
        let err: IndexError = EmbeddingError::CountMismatch {
            expected: 3,
            got: 2,
        }
        .into();
        assert_eq!(err.to_string(), "Expected 3 embeddings, got 2");
    }
}
