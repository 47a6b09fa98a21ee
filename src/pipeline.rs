use std::{path::PathBuf, sync::Arc};

use log::info;
use serde::Serialize;

use crate::{
    config::{AppConfig, EmbeddingBackend},
    db::{extract::extract_schema, DbClient},
    errors::{DbError, RagError},
    executor::{execution_message, QueryExecutor},
    llm::{GeminiClient, GeminiEmbedder, LanguageModel, SqlGenerator},
    models::{results::QueryResult, schema::Schema},
    rag::{
        prompt::{compose_rag_prompt, compose_schema_only_prompt},
        Embedder, RetrievedDescriptor, Retriever, SchemaIndex, DEFAULT_TOP_K,
    },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationMode {
    /// Retrieved columns plus the full schema.
    #[default]
    Rag,
    /// Full schema only, no retrieval.
    SchemaOnly,
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub top_k: usize,
    /// Persist and reuse the schema index here; `None` keeps it in memory.
    pub index_path: Option<PathBuf>,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            index_path: None,
        }
    }
}

/// Long-lived dependencies shared by every session.
pub struct AppContext {
    pub embedder: Arc<dyn Embedder>,
    pub model: Arc<dyn LanguageModel>,
    pub settings: PipelineSettings,
}

impl AppContext {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            embedder,
            model,
            settings,
        }
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, RagError> {
        let gemini = config.gemini_config()?;
        let model: Arc<dyn LanguageModel> = Arc::new(GeminiClient::new(gemini.clone())?);

        let embedder: Arc<dyn Embedder> = match config.embeddings {
            EmbeddingBackend::Gemini => Arc::new(GeminiEmbedder::new(gemini)?),
            EmbeddingBackend::Local => local_embedder()?,
        };

        info!(
            "Using model {} with embeddings from {}",
            model.model_name(),
            embedder.model_name()
        );

        Ok(Self::new(
            embedder,
            model,
            PipelineSettings {
                top_k: config.top_k,
                index_path: Some(config.index_path.clone()),
            },
        ))
    }
}

#[cfg(feature = "local-embeddings")]
fn local_embedder() -> Result<Arc<dyn Embedder>, RagError> {
    Ok(Arc::new(crate::rag::embedder::FastEmbedder::new()?))
}

#[cfg(not(feature = "local-embeddings"))]
fn local_embedder() -> Result<Arc<dyn Embedder>, RagError> {
    Err(crate::config::ConfigError::LocalEmbeddingsDisabled.into())
}

/// Outcome of one question.
#[derive(Debug, Serialize)]
pub struct Answer {
    pub question: String,
    pub mode: GenerationMode,
    pub sql: String,
    pub retrieved: Vec<RetrievedDescriptor>,
    /// `None` when execution was not requested. Failures are already
    /// rendered as user-facing text.
    pub outcome: Option<Result<QueryResult, String>>,
}

/// One database plus its extracted schema and (lazily built) index.
pub struct Session {
    ctx: Arc<AppContext>,
    client: Arc<dyn DbClient>,
    schema: Schema,
    index: Option<SchemaIndex>,
}

impl Session {
    pub async fn open(ctx: Arc<AppContext>, client: Arc<dyn DbClient>) -> Result<Self, DbError> {
        let schema = extract_schema(client.as_ref()).await?;
        Ok(Self {
            ctx,
            client,
            schema,
            index: None,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn client(&self) -> &dyn DbClient {
        self.client.as_ref()
    }

    /// Re-reads the catalog and drops the index built for the old schema.
    pub async fn refresh(&mut self) -> Result<(), DbError> {
        self.schema = extract_schema(self.client.as_ref()).await?;
        self.index = None;
        Ok(())
    }

    pub async fn ensure_index(&mut self) -> Result<&SchemaIndex, RagError> {
        let index = match self.index.take() {
            Some(index) => index,
            None => {
                let embedder = self.ctx.embedder.as_ref();
                match &self.ctx.settings.index_path {
                    Some(path) => SchemaIndex::build_or_load(&self.schema, embedder, path).await?,
                    None => SchemaIndex::build(&self.schema, embedder).await?,
                }
            }
        };

        Ok(self.index.insert(index))
    }

    /// Composes the prompt for `question` and asks the model for SQL.
    pub async fn generate_sql(
        &mut self,
        question: &str,
        mode: GenerationMode,
    ) -> Result<Answer, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::EmptyQuestion);
        }

        let (prompt, retrieved) = match mode {
            GenerationMode::Rag => {
                let top_k = self.ctx.settings.top_k;
                let ctx = Arc::clone(&self.ctx);
                let index = self.ensure_index().await?;
                let retrieved = Retriever::new(index, ctx.embedder.as_ref())
                    .retrieve(question, top_k)
                    .await?;
                (
                    compose_rag_prompt(&self.schema, &retrieved, question),
                    retrieved,
                )
            }
            GenerationMode::SchemaOnly => {
                (compose_schema_only_prompt(&self.schema, question), Vec::new())
            }
        };

        let generated = SqlGenerator::new(self.ctx.model.as_ref())
            .generate(&prompt)
            .await?;

        Ok(Answer {
            question: question.to_string(),
            mode,
            sql: generated.sql,
            retrieved,
            outcome: None,
        })
    }

    pub async fn execute(&self, sql: &str) -> Result<QueryResult, DbError> {
        QueryExecutor::new(self.client.as_ref()).run(sql).await
    }

    /// Question to SQL, optionally executed. Only generation failures are
    /// errors; execution failures end up in [`Answer::outcome`].
    pub async fn ask(
        &mut self,
        question: &str,
        mode: GenerationMode,
        execute: bool,
    ) -> Result<Answer, RagError> {
        let mut answer = self.generate_sql(question, mode).await?;

        if execute {
            answer.outcome = Some(
                self.execute(&answer.sql)
                    .await
                    .map_err(|e| execution_message(&e)),
            );
        }

        Ok(answer)
    }
}
