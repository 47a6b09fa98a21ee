use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info};
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use sqlx::{ColumnIndex, Decode, Row, Statement, Type};

use crate::{
    errors::DbError,
    models::{
        connections::{ConnectionConfig, DbType, SqliteSource},
        results::QueryResult,
        schema::TableSchema,
    },
};

pub mod extract;
pub mod mysql;
pub mod postgres;
pub mod sqlite;

use mysql::MySqlClient;
use postgres::PostgresClient;
use sqlite::SqliteClient;

/// A live database connection. One implementation per engine.
#[async_trait]
pub trait DbClient: Send + Sync {
    fn engine(&self) -> DbType;
    /// Runs `query` verbatim and returns whatever rows it produces. Statements
    /// without a result set yield an empty [`QueryResult`].
    async fn execute(&self, query: &str) -> Result<QueryResult, DbError>;
    async fn list_tables(&self) -> Result<Vec<String>, DbError>;
    async fn describe_table(&self, table_name: &str) -> Result<TableSchema, DbError>;
}

pub async fn connect(config: &ConnectionConfig) -> Result<Arc<dyn DbClient>, DbError> {
    info!(
        "Connecting to {} database at {}",
        config.db_type,
        config.redacted_url()
    );

    let client: Arc<dyn DbClient> = match config.db_type {
        DbType::Postgres => Arc::new(PostgresClient::connect(&config.database_url).await?),
        DbType::MySql => Arc::new(MySqlClient::connect(&config.database_url).await?),
        DbType::Sqlite => match config.sqlite_source() {
            SqliteSource::File(path) => Arc::new(SqliteClient::connect(&path).await?),
            SqliteSource::Script(path) => Arc::new(SqliteClient::from_script(&path).await?),
            SqliteSource::Memory => Arc::new(SqliteClient::in_memory().await?),
        },
    };

    Ok(client)
}

/// Decodes column `index` as `T`, or `None` when the column's type is not
/// compatible with `T`. SQL NULL decodes as `Some(None)` for any `T`.
pub(crate) fn try_decode<'r, R, T>(row: &'r R, index: usize) -> Option<Option<T>>
where
    R: Row,
    T: Decode<'r, R::Database> + Type<R::Database>,
    usize: ColumnIndex<R>,
{
    row.try_get::<Option<T>, usize>(index).ok()
}

pub(crate) fn decoded<T, F>(value: Option<Option<T>>, to_json: F) -> Option<Value>
where
    F: FnOnce(T) -> Value,
{
    value.map(|v| v.map(to_json).unwrap_or(Value::Null))
}

/// NUMERIC/DECIMAL as a JSON number parsed from its exact text, or the text
/// itself when it has no JSON form.
pub(crate) fn decimal_value(value: Decimal) -> Value {
    let text = value.to_string();
    match text.parse::<Number>() {
        Ok(number) => Value::Number(number),
        Err(_) => Value::String(text),
    }
}

/// Placeholder for values whose SQL type has no JSON mapping.
pub(crate) fn unsupported<R: Row>(row: &R, index: usize) -> Value {
    use sqlx::{Column, TypeInfo};

    let type_name = row
        .columns()
        .get(index)
        .map(|c| c.type_info().name().to_string())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    Value::String(format!("<{type_name}>"))
}

pub(crate) fn collect_rows<R, F>(rows: &[R], decode: F) -> QueryResult
where
    R: Row,
    F: Fn(&R, usize) -> Value,
{
    use sqlx::Column;

    let columns = rows
        .first()
        .map(|row| {
            row.columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect()
        })
        .unwrap_or_default();

    let rows = rows
        .iter()
        .map(|row| (0..row.len()).map(|i| decode(row, i)).collect())
        .collect();

    QueryResult { columns, rows }
}

/// Column names of a prepared statement, for result sets that came back
/// without rows. A statement that cannot be described yields no columns.
pub(crate) fn statement_columns<'q, S>(statement: Result<S, sqlx::Error>) -> Vec<String>
where
    S: Statement<'q>,
{
    use sqlx::Column;

    match statement {
        Ok(statement) => statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect(),
        Err(e) => {
            debug!("Could not describe result columns: {e}");
            Vec::new()
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decimal_value_keeps_the_number() {
        assert_eq!(decimal_value(Decimal::new(199, 2)), json!(1.99));
        assert_eq!(decimal_value(Decimal::new(41, 0)), json!(41));
        assert_eq!(decimal_value(Decimal::new(-2050, 2)), json!(-20.5));
    }
}
