use std::{path::Path, str::FromStr};

use async_trait::async_trait;
use log::{debug, info};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Executor, Row, SqlitePool,
};

use crate::{
    errors::DbError,
    models::{
        connections::DbType,
        results::QueryResult,
        schema::{ColumnSchema, ForeignKeySchema, TableSchema},
    },
};

use super::{collect_rows, decoded, statement_columns, try_decode, unsupported, DbClient};

pub struct SqliteClient {
    pub pool: SqlitePool,
}

impl SqliteClient {
    /// Opens an existing SQLite database file. A missing file is a connection
    /// error rather than a fresh empty database.
    pub async fn connect(path: &str) -> Result<Self, DbError> {
        if !Path::new(path).is_file() {
            return Err(DbError::Connection(format!(
                "SQLite database file `{path}` does not exist"
            )));
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(false)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// A private in-memory database. The pool holds exactly one connection
    /// that never expires, otherwise the data would vanish with it.
    pub async fn in_memory() -> Result<Self, DbError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| DbError::Config(e.to_string()))?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    /// In-memory database populated from a `.sql` script.
    pub async fn from_script(script_path: &str) -> Result<Self, DbError> {
        let script = tokio::fs::read_to_string(script_path)
            .await
            .map_err(|e| DbError::Import(format!("{script_path}: {e}")))?;

        let client = Self::in_memory().await?;
        client.run_script(&script).await?;
        info!("Loaded SQL script {script_path} into an in-memory database");

        Ok(client)
    }

    /// Executes every statement of `script` in order.
    pub async fn run_script(&self, script: &str) -> Result<(), DbError> {
        sqlx::raw_sql(script)
            .execute(&self.pool)
            .await
            .map_err(|e| DbError::Import(e.to_string()))?;
        Ok(())
    }

    async fn foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKeySchema>, DbError> {
        let rows = sqlx::query(
            r#"SELECT "from", "table", "to" FROM pragma_foreign_key_list(?1) ORDER BY id, seq"#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Sqlx)?;

        rows.iter()
            .map(|row| {
                Ok(ForeignKeySchema {
                    column: row.try_get("from").map_err(catalog_error)?,
                    references_table: row.try_get("table").map_err(catalog_error)?,
                    // NULL when the reference targets the parent's primary key implicitly.
                    references_column: row
                        .try_get::<Option<String>, _>("to")
                        .map_err(catalog_error)?
                        .unwrap_or_default(),
                })
            })
            .collect()
    }
}

/// Writes `script_path` into the SQLite file `db_path`, creating it if needed.
pub async fn import_sql_script(script_path: &str, db_path: &str) -> Result<(), DbError> {
    let script = tokio::fs::read_to_string(script_path)
        .await
        .map_err(|e| DbError::Import(format!("{script_path}: {e}")))?;

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|e| DbError::Connection(e.to_string()))?;

    let client = SqliteClient { pool };
    client.run_script(&script).await?;
    client.pool.close().await;

    info!("Imported {script_path} into {db_path}");
    Ok(())
}

fn catalog_error(e: sqlx::Error) -> DbError {
    DbError::Catalog(e.to_string())
}

fn decode_value(row: &SqliteRow, index: usize) -> Value {
    decoded(try_decode::<_, i64>(row, index), Value::from)
        .or_else(|| decoded(try_decode::<_, f64>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, String>(row, index), Value::from))
        .or_else(|| {
            decoded(try_decode::<_, Vec<u8>>(row, index), |bytes| {
                Value::String(format!("<BLOB {} bytes>", bytes.len()))
            })
        })
        .unwrap_or_else(|| unsupported(row, index))
}

#[async_trait]
impl DbClient for SqliteClient {
    fn engine(&self) -> DbType {
        DbType::Sqlite
    }

    async fn execute(&self, query: &str) -> Result<QueryResult, DbError> {
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;

        let mut result = collect_rows(&rows, decode_value);
        if rows.is_empty() {
            result.columns = statement_columns(self.pool.prepare(query).await);
        }
        Ok(result)
    }

    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let query = r#"
            SELECT name
            FROM sqlite_master
            WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
        "#;
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("name").map_err(catalog_error))
            .collect()
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableSchema, DbError> {
        let rows = sqlx::query(
            r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid"#,
        )
        .bind(table_name)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::Sqlx)?;

        let columns = rows
            .iter()
            .map(|row| {
                Ok(ColumnSchema {
                    name: row.try_get("name").map_err(catalog_error)?,
                    data_type: row.try_get("type").map_err(catalog_error)?,
                    is_nullable: row.try_get::<i64, _>("notnull").map_err(catalog_error)? == 0,
                    default: row
                        .try_get::<Option<String>, _>("dflt_value")
                        .ok()
                        .flatten(),
                    is_primary_key: row.try_get::<i64, _>("pk").map_err(catalog_error)? > 0,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let foreign_keys = self.foreign_keys(table_name).await?;
        debug!(
            "Described SQLite table {table_name}: {} columns, {} foreign keys",
            columns.len(),
            foreign_keys.len()
        );

        Ok(TableSchema {
            table_name: table_name.to_string(),
            columns,
            foreign_keys,
        })
    }
}
