mod common;

use std::sync::Arc;

use common::{KeywordEmbedder, ScriptedModel};
use serde_json::json;
use sqlrag::{
    db::{self, sqlite::SqliteClient, DbClient},
    models::connections::ConnectionConfig,
    AppContext, GenerationMode, PipelineSettings, Session,
};

const STUDENTS: &str = r#"
    CREATE TABLE students (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER);
    INSERT INTO students (id, name, age) VALUES
        (1, 'Alice', 22),
        (2, 'Bob', 19),
        (3, 'Cara', 31),
        (4, 'Dan', 20);
"#;

const SQL_KEYWORDS: &[&str] = &["select", "from", "where", "order", "by", "and", "as"];

fn context(model: Arc<ScriptedModel>) -> Arc<AppContext> {
    Arc::new(AppContext::new(
        Arc::new(KeywordEmbedder::default()),
        model,
        PipelineSettings::default(),
    ))
}

async fn students_db() -> Arc<dyn DbClient> {
    let client = SqliteClient::in_memory().await.unwrap();
    client.run_script(STUDENTS).await.unwrap();
    Arc::new(client)
}

#[tokio::test]
async fn test_students_older_than_20() {
    let model = Arc::new(ScriptedModel::new(
        "```sql\nSELECT id, name, age FROM students WHERE age > 20 ORDER BY id;\n```",
    ));
    let mut session = Session::open(context(Arc::clone(&model)), students_db().await)
        .await
        .unwrap();
    assert_eq!(
        session.schema().columns("students"),
        Some(vec!["id", "name", "age"])
    );

    let answer = session
        .ask("list students older than 20", GenerationMode::Rag, true)
        .await
        .unwrap();

    let schema = session.schema();
    let allowed = schema.columns("students").unwrap();
    for word in answer
        .sql
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|w| !w.is_empty() && !w.chars().all(|c| c.is_ascii_digit()))
    {
        let lower = word.to_lowercase();
        assert!(
            SQL_KEYWORDS.contains(&lower.as_str())
                || lower == "students"
                || allowed.contains(&lower.as_str()),
            "unexpected identifier {word}"
        );
    }

    let result = answer.outcome.unwrap().unwrap();
    let ages = result.column_values("age").unwrap();
    assert_eq!(ages, vec![&json!(22), &json!(31)]);
    assert!(ages.iter().all(|age| age.as_i64().unwrap() > 20));

    let prompts = model.prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("Table: students - Columns: id, name, age"));
    assert!(prompts[0].contains("### USER QUESTION\nlist students older than 20"));
    assert_eq!(answer.retrieved.len(), 3);
}

#[tokio::test]
async fn test_no_execute_leaves_database_untouched() {
    let model = Arc::new(ScriptedModel::new("DELETE FROM students"));
    let client = students_db().await;
    let mut session = Session::open(context(model), Arc::clone(&client))
        .await
        .unwrap();

    let answer = session
        .ask("remove everyone", GenerationMode::SchemaOnly, false)
        .await
        .unwrap();
    assert_eq!(answer.sql, "DELETE FROM students");
    assert!(answer.outcome.is_none());

    let count = client
        .execute("SELECT COUNT(*) AS n FROM students")
        .await
        .unwrap();
    assert_eq!(count.rows, vec![vec![json!(4)]]);
}

#[tokio::test]
async fn test_sql_script_source() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("school.sql");
    std::fs::write(&script, STUDENTS).unwrap();

    let config = ConnectionConfig::parse(script.to_str().unwrap()).unwrap();
    let client = db::connect(&config).await.unwrap();

    let model = Arc::new(ScriptedModel::new("SELECT name FROM students WHERE age = 19"));
    let mut session = Session::open(context(model), client).await.unwrap();
    let answer = session
        .ask("who is 19?", GenerationMode::Rag, true)
        .await
        .unwrap();

    assert_eq!(
        answer.outcome.unwrap().unwrap().rows,
        vec![vec![json!("Bob")]]
    );
}

#[tokio::test]
async fn test_bad_sql_is_reported_not_raised() {
    let model = Arc::new(ScriptedModel::new("SELECT gpa FROM students"));
    let mut session = Session::open(context(model), students_db().await)
        .await
        .unwrap();

    let answer = session
        .ask("average gpa", GenerationMode::Rag, true)
        .await
        .unwrap();
    let message = answer.outcome.unwrap().unwrap_err();
    assert!(message.starts_with("Query failed:"), "{message}");
}
