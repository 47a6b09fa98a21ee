use log::debug;
use serde::Serialize;

use crate::errors::LlmError;

use super::{fence::strip_code_fences, LanguageModel};

/// Model output after fence cleaning. Never parsed or validated as SQL.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct GeneratedQuery {
    pub sql: String,
    pub raw: String,
    pub model: String,
}

pub struct SqlGenerator<'a> {
    model: &'a dyn LanguageModel,
}

impl<'a> SqlGenerator<'a> {
    pub fn new(model: &'a dyn LanguageModel) -> Self {
        Self { model }
    }

    pub async fn generate(&self, prompt: &str) -> Result<GeneratedQuery, LlmError> {
        let raw = self.model.generate(prompt).await?;
        let sql = strip_code_fences(&raw);
        debug!("Generated SQL: {sql}");

        Ok(GeneratedQuery {
            sql,
            raw,
            model: self.model.model_name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockLanguageModelMock;
    use mockall::predicate;

    #[tokio::test]
    async fn test_generate_strips_fences() {
        let mut model = MockLanguageModelMock::new();
        model
            .expect_generate()
            .with(predicate::eq("prompt"))
            .times(1)
            .returning(|_| Ok("```sql\nSELECT name FROM students;\n```".to_string()));
        model
            .expect_model_name()
            .return_const("gemini-test".to_string());

        let query = SqlGenerator::new(&model).generate("prompt").await.unwrap();
        assert_eq!(query.sql, "SELECT name FROM students;");
        assert!(query.raw.starts_with("```sql"));
        assert_eq!(query.model, "gemini-test");
    }

    #[tokio::test]
    async fn test_generate_propagates_model_errors() {
        let mut model = MockLanguageModelMock::new();
        model.expect_generate().returning(|_| {
            Err(LlmError::Status {
                status: 429,
                message: "Resource has been exhausted".to_string(),
            })
        });

        let err = SqlGenerator::new(&model).generate("prompt").await.unwrap_err();
        assert!(matches!(err, LlmError::Status { status: 429, .. }));
    }
}
