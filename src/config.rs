use std::{path::PathBuf, str::FromStr, time::Duration};

use log::debug;
use thiserror::Error;

use crate::{
    errors::RagError,
    llm::{gemini, GeminiConfig},
    rag::{retriever::DEFAULT_TOP_K, store::DEFAULT_INDEX_PATH},
};

/// Environment variable names read by [`AppConfig::from_env`].
pub mod env {
    /// API key for the hosted model and hosted embeddings
    pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";

    pub const GEMINI_BASE_URL: &str = "SQLRAG_GEMINI_BASE_URL";

    /// Generation model, e.g. `gemini-2.5-flash`
    pub const MODEL: &str = "SQLRAG_MODEL";

    /// `gemini` or `local`
    pub const EMBEDDINGS: &str = "SQLRAG_EMBEDDINGS";

    pub const EMBEDDING_MODEL: &str = "SQLRAG_EMBEDDING_MODEL";

    /// Where the schema index artifact is written
    pub const INDEX_PATH: &str = "SQLRAG_INDEX_PATH";

    pub const TOP_K: &str = "SQLRAG_TOP_K";

    /// Output token cap per generation, thinking tokens included
    pub const MAX_OUTPUT_TOKENS: &str = "SQLRAG_MAX_OUTPUT_TOKENS";

    /// Hosted model request timeout, in seconds
    pub const TIMEOUT_SECS: &str = "SQLRAG_TIMEOUT_SECS";
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got `{value}`")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("local embeddings need the `local-embeddings` feature")]
    LocalEmbeddingsDisabled,
}

impl From<ConfigError> for RagError {
    fn from(e: ConfigError) -> Self {
        RagError::Config(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingBackend {
    #[default]
    Gemini,
    Local,
}

impl FromStr for EmbeddingBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(EmbeddingBackend::Gemini),
            "local" => Ok(EmbeddingBackend::Local),
            _ => Err(ConfigError::Invalid {
                var: env::EMBEDDINGS,
                value: s.to_string(),
                expected: "`gemini` or `local`",
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub model: String,
    pub embeddings: EmbeddingBackend,
    pub embedding_model: String,
    pub index_path: PathBuf,
    pub top_k: usize,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_base_url: gemini::DEFAULT_BASE_URL.to_string(),
            model: gemini::DEFAULT_MODEL.to_string(),
            embeddings: EmbeddingBackend::Gemini,
            embedding_model: gemini::DEFAULT_EMBEDDING_MODEL.to_string(),
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            top_k: DEFAULT_TOP_K,
            max_output_tokens: gemini::DEFAULT_MAX_OUTPUT_TOKENS,
            timeout: gemini::DEFAULT_TIMEOUT,
        }
    }
}

fn positive(var: &'static str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            expected: "a positive integer",
        }),
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds a config from any variable source. Unset and blank variables
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        config.gemini_api_key = get(env::GEMINI_API_KEY);
        if let Some(url) = get(env::GEMINI_BASE_URL) {
            config.gemini_base_url = url;
        }
        if let Some(model) = get(env::MODEL) {
            config.model = model;
        }
        if let Some(backend) = get(env::EMBEDDINGS) {
            config.embeddings = backend.parse()?;
        }
        if let Some(model) = get(env::EMBEDDING_MODEL) {
            config.embedding_model = model;
        }
        if let Some(path) = get(env::INDEX_PATH) {
            config.index_path = PathBuf::from(path);
        }
        if let Some(top_k) = get(env::TOP_K) {
            config.top_k = positive(env::TOP_K, &top_k)? as usize;
        }
        if let Some(tokens) = get(env::MAX_OUTPUT_TOKENS) {
            let tokens = positive(env::MAX_OUTPUT_TOKENS, &tokens)?;
            config.max_output_tokens =
                u32::try_from(tokens).map_err(|_| ConfigError::Invalid {
                    var: env::MAX_OUTPUT_TOKENS,
                    value: tokens.to_string(),
                    expected: "at most 4294967295",
                })?;
        }
        if let Some(secs) = get(env::TIMEOUT_SECS) {
            config.timeout = Duration::from_secs(positive(env::TIMEOUT_SECS, &secs)?);
        }

        debug!(
            "Loaded configuration: model {}, embeddings {:?} ({}), top_k {}",
            config.model, config.embeddings, config.embedding_model, config.top_k
        );
        Ok(config)
    }

    pub fn gemini_config(&self) -> Result<GeminiConfig, ConfigError> {
        let api_key = self
            .gemini_api_key
            .clone()
            .ok_or(ConfigError::Missing(env::GEMINI_API_KEY))?;

        Ok(GeminiConfig::new(api_key)
            .with_base_url(self.gemini_base_url.clone())
            .with_model(self.model.clone())
            .with_embedding_model(
                self.embedding_model.clone(),
                gemini::DEFAULT_EMBEDDING_DIMENSION,
            )
            .with_max_output_tokens(self.max_output_tokens)
            .with_timeout(self.timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.model, "gemini-2.5-flash");
        assert_eq!(config.embedding_model, "text-embedding-004");
        assert_eq!(config.top_k, 5);
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert_eq!(config.max_output_tokens, 8192);
        assert_eq!(config.index_path, PathBuf::from("vectorstore/schema_index.json"));
        assert_eq!(
            config.gemini_config().unwrap_err(),
            ConfigError::Missing("GEMINI_API_KEY")
        );
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "secret"),
            ("SQLRAG_MODEL", "gemini-1.5-pro"),
            ("SQLRAG_EMBEDDINGS", "Local"),
            ("SQLRAG_TOP_K", "8"),
            ("SQLRAG_TIMEOUT_SECS", "30"),
            ("SQLRAG_MAX_OUTPUT_TOKENS", "16384"),
            ("SQLRAG_INDEX_PATH", "   "),
        ]))
        .unwrap();

        assert_eq!(config.embeddings, EmbeddingBackend::Local);
        assert_eq!(config.top_k, 8);
        assert_eq!(config.index_path, PathBuf::from(DEFAULT_INDEX_PATH));

        let gemini = config.gemini_config().unwrap();
        assert_eq!(gemini.api_key, "secret");
        assert_eq!(gemini.model, "gemini-1.5-pro");
        assert_eq!(gemini.timeout, Duration::from_secs(30));
        assert_eq!(gemini.max_output_tokens, 16384);
    }

    #[test]
    fn test_invalid_numbers() {
        let err = AppConfig::from_lookup(lookup(&[("SQLRAG_TOP_K", "five")])).unwrap_err();
        assert_eq!(err.to_string(), "SQLRAG_TOP_K must be a positive integer, got `five`");

        assert!(AppConfig::from_lookup(lookup(&[("SQLRAG_TIMEOUT_SECS", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("SQLRAG_MAX_OUTPUT_TOKENS", "0")])).is_err());
        assert!(
            AppConfig::from_lookup(lookup(&[("SQLRAG_MAX_OUTPUT_TOKENS", "99999999999")])).is_err()
        );
        assert!(AppConfig::from_lookup(lookup(&[("SQLRAG_EMBEDDINGS", "openai")])).is_err());
    }
}
