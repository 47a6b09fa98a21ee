//! Prompt templates sent to the language model.
//!
//! Both templates always carry the full schema, so every table name reaches
//! the model even when retrieval finds nothing.

use std::fmt::Write;

use crate::models::schema::Schema;

use super::retriever::RetrievedDescriptor;

/// One line per table: `Table: {t} - Columns: c1, c2`.
pub fn format_schema(schema: &Schema) -> String {
    if schema.is_empty() {
        return "(no tables)".to_string();
    }

    schema
        .tables
        .iter()
        .map(|t| format!("Table: {} - Columns: {}", t.table_name, t.column_names().join(", ")))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_hits(hits: &[RetrievedDescriptor]) -> String {
    if hits.is_empty() {
        return "(none)".to_string();
    }

    let mut out = String::new();
    for hit in hits {
        let _ = writeln!(
            out,
            "Table: {} | Column: {}",
            hit.descriptor.table, hit.descriptor.column
        );
    }
    out.trim_end().to_string()
}

pub fn compose_rag_prompt(schema: &Schema, hits: &[RetrievedDescriptor], question: &str) -> String {
    format!(
        "You are a SQL expert.\n\
         \n\
         Use only the following schema and column names when generating SQL.\n\
         \n\
         ### DATABASE SCHEMA\n\
         {schema}\n\
         \n\
         ### RELEVANT COLUMNS\n\
         {context}\n\
         \n\
         ### USER QUESTION\n\
         {question}\n\
         \n\
         Generate valid SQL using only the exact schema and column names provided.\n\
         Do not hallucinate table or column names.\n",
        schema = format_schema(schema),
        context = format_hits(hits),
        question = question.trim(),
    )
}

pub fn compose_schema_only_prompt(schema: &Schema, question: &str) -> String {
    format!(
        "You are a SQL expert.\n\
         \n\
         Below is the full schema of the database:\n\
         \n\
         {schema}\n\
         \n\
         User question:\n\
         {question}\n\
         \n\
         Write a valid SQL query using only the tables and columns from the schema above.\n\
         Do not hallucinate table or column names.\n",
        schema = format_schema(schema),
        question = question.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::descriptor::SchemaDescriptor;

    fn schema() -> Schema {
        Schema::from_columns([
            ("students", vec!["id", "name", "age"]),
            ("courses", vec!["id", "title"]),
        ])
    }

    #[test]
    fn test_format_schema() {
        assert_eq!(
            format_schema(&schema()),
            "Table: students - Columns: id, name, age\nTable: courses - Columns: id, title"
        );
        assert_eq!(format_schema(&Schema::default()), "(no tables)");
    }

    #[test]
    fn test_rag_prompt_sections() {
        let hits = vec![RetrievedDescriptor {
            descriptor: SchemaDescriptor::new("students", "age"),
            distance: 0.25,
        }];

        let prompt = compose_rag_prompt(&schema(), &hits, "  list students older than 20 ");
        let schema_at = prompt.find("### DATABASE SCHEMA").unwrap();
        let context_at = prompt.find("### RELEVANT COLUMNS").unwrap();
        let question_at = prompt.find("### USER QUESTION").unwrap();
        assert!(schema_at < context_at && context_at < question_at);
        assert!(prompt.contains("Table: students | Column: age\n"));
        assert!(prompt.contains("### USER QUESTION\nlist students older than 20\n"));
    }

    #[test]
    fn test_every_table_present_without_hits() {
        let prompt = compose_rag_prompt(&schema(), &[], "how many courses are there?");
        assert!(prompt.contains("### RELEVANT COLUMNS\n(none)\n"));
        for table in schema().table_names() {
            assert!(prompt.contains(table));
        }

        let prompt = compose_schema_only_prompt(&schema(), "how many courses are there?");
        assert!(prompt.contains("students") && prompt.contains("courses"));
        assert!(!prompt.contains("RELEVANT COLUMNS"));
    }

    #[test]
    fn test_empty_schema_prompt_is_not_empty() {
        let prompt = compose_rag_prompt(&Schema::default(), &[], "");
        assert!(prompt.contains("(no tables)"));
        assert!(prompt.contains("(none)"));
    }
}
