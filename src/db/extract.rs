use log::info;

use crate::{errors::DbError, models::schema::Schema};

use super::DbClient;

/// Reads the full schema: catalog table list, then each table's columns.
pub async fn extract_schema(client: &dyn DbClient) -> Result<Schema, DbError> {
    let tables = client.list_tables().await?;

    let mut schema = Schema::default();
    for table in &tables {
        schema.tables.push(client.describe_table(table).await?);
    }

    info!(
        "Extracted {} schema: {} tables, {} columns",
        client.engine(),
        schema.tables.len(),
        schema.total_columns()
    );
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{mock::MockDbClientMock, sqlite::SqliteClient};
    use crate::models::connections::DbType;

    #[tokio::test]
    async fn test_extract_from_sqlite() {
        let client = SqliteClient::in_memory().await.unwrap();
        client
            .run_script(
                "CREATE TABLE artists (artist_id INTEGER PRIMARY KEY, name TEXT);
                 CREATE TABLE albums (album_id INTEGER PRIMARY KEY, title TEXT,
                     artist_id INTEGER REFERENCES artists(artist_id));",
            )
            .await
            .unwrap();

        let schema = extract_schema(&client).await.unwrap();
        assert_eq!(schema.columns("artists"), Some(vec!["artist_id", "name"]));
        assert_eq!(
            schema.columns("albums"),
            Some(vec!["album_id", "title", "artist_id"])
        );
        assert_eq!(schema.table("albums").unwrap().foreign_keys.len(), 1);
    }

    #[tokio::test]
    async fn test_describe_failure_aborts_extraction() {
        let mut mock_db = MockDbClientMock::new();
        mock_db.expect_engine().return_const(DbType::Postgres);
        mock_db
            .expect_list_tables()
            .returning(|| Ok(vec!["users".to_string()]));
        mock_db
            .expect_describe_table()
            .returning(|_| Err(DbError::Connection("connection reset".to_string())));

        let err = extract_schema(&mock_db).await.unwrap_err();
        assert!(matches!(err, DbError::Connection(_)));
    }
}
