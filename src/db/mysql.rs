use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{
    mysql::{MySqlPoolOptions, MySqlRow},
    Executor, MySqlPool, Row,
};

use crate::{
    errors::DbError,
    models::{
        connections::DbType,
        results::QueryResult,
        schema::{ColumnSchema, ForeignKeySchema, TableSchema},
    },
};

use super::{
    collect_rows, decimal_value, decoded, statement_columns, try_decode, unsupported, DbClient,
};

pub struct MySqlClient {
    pub pool: MySqlPool,
}

impl MySqlClient {
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKeySchema>, DbError> {
        let query = r#"
            SELECT COLUMN_NAME, REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = DATABASE()
              AND TABLE_NAME = ?
              AND REFERENCED_TABLE_NAME IS NOT NULL
            ORDER BY ORDINAL_POSITION
        "#;
        let rows = sqlx::query(query)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;

        rows.iter()
            .map(|row| {
                Ok(ForeignKeySchema {
                    column: text(row, "COLUMN_NAME")?.unwrap_or_default(),
                    references_table: text(row, "REFERENCED_TABLE_NAME")?.unwrap_or_default(),
                    references_column: text(row, "REFERENCED_COLUMN_NAME")?.unwrap_or_default(),
                })
            })
            .collect()
    }
}

/// Reads a catalog text column. Depending on server version and collation,
/// `information_schema` reports some of these as binary strings.
fn text(row: &MySqlRow, column: &str) -> Result<Option<String>, DbError> {
    match row.try_get::<Option<String>, _>(column) {
        Ok(value) => Ok(value),
        Err(_) => row
            .try_get::<Option<Vec<u8>>, _>(column)
            .map(|bytes| bytes.map(|b| String::from_utf8_lossy(&b).into_owned()))
            .map_err(|e| DbError::Catalog(e.to_string())),
    }
}

fn required_text(row: &MySqlRow, column: &str) -> Result<String, DbError> {
    text(row, column)?.ok_or_else(|| DbError::Catalog(format!("{column} is NULL")))
}

fn decode_value(row: &MySqlRow, index: usize) -> Value {
    decoded(try_decode::<_, i64>(row, index), Value::from)
        .or_else(|| decoded(try_decode::<_, i32>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, i16>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, i8>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, u64>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, f64>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, f32>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, Decimal>(row, index), decimal_value))
        .or_else(|| decoded(try_decode::<_, String>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, DateTime<Utc>>(row, index), |v| v.to_rfc3339().into()))
        .or_else(|| decoded(try_decode::<_, NaiveDateTime>(row, index), |v| v.to_string().into()))
        .or_else(|| decoded(try_decode::<_, NaiveDate>(row, index), |v| v.to_string().into()))
        .or_else(|| decoded(try_decode::<_, NaiveTime>(row, index), |v| v.to_string().into()))
        .or_else(|| {
            decoded(try_decode::<_, Vec<u8>>(row, index), |bytes| {
                String::from_utf8_lossy(&bytes).into_owned().into()
            })
        })
        .unwrap_or_else(|| unsupported(row, index))
}

#[async_trait]
impl DbClient for MySqlClient {
    fn engine(&self) -> DbType {
        DbType::MySql
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
            SELECT TABLE_NAME
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
        "#;
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;

        rows.iter()
            .map(|row| required_text(row, "TABLE_NAME"))
            .collect()
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableSchema, DbError> {
        let query = r#"
            SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, COLUMN_DEFAULT, COLUMN_KEY
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
            ORDER BY ORDINAL_POSITION
        "#;
        let rows = sqlx::query(query)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;

        let columns = rows
            .iter()
            .map(|row| {
                Ok(ColumnSchema {
                    name: required_text(row, "COLUMN_NAME")?,
                    data_type: required_text(row, "COLUMN_TYPE")?,
                    is_nullable: required_text(row, "IS_NULLABLE")? == "YES",
                    default: text(row, "COLUMN_DEFAULT")?,
                    is_primary_key: text(row, "COLUMN_KEY")?.as_deref() == Some("PRI"),
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let foreign_keys = self.foreign_keys(table_name).await?;
        debug!(
            "Described MySQL table {table_name}: {} columns, {} foreign keys",
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

