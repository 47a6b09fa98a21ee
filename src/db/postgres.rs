use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::debug;
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Executor, PgPool, Row,
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

pub struct PostgresClient {
    pub pool: PgPool,
}

impl PostgresClient {
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn primary_keys(&self, table_name: &str) -> Result<Vec<String>, DbError> {
        let query = r#"
            SELECT kcu.column_name::text AS column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
             AND tc.table_schema = kcu.table_schema
            WHERE tc.constraint_type = 'PRIMARY KEY'
              AND tc.table_schema = 'public'
              AND tc.table_name = $1
        "#;
        let rows = sqlx::query(query)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("column_name").map_err(catalog_error))
            .collect()
    }

    async fn foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKeySchema>, DbError> {
        let query = r#"
            SELECT kcu.column_name::text AS column_name,
                   ccu.table_name::text AS foreign_table,
                   ccu.column_name::text AS foreign_column
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
              ON tc.constraint_name = kcu.constraint_name
             AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
              ON ccu.constraint_name = tc.constraint_name
             AND ccu.table_schema = tc.table_schema
            WHERE tc.constraint_type = 'FOREIGN KEY'
              AND tc.table_schema = 'public'
              AND tc.table_name = $1
        "#;
        let rows = sqlx::query(query)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;

        rows.iter()
            .map(|row| {
                Ok(ForeignKeySchema {
                    column: row.try_get("column_name").map_err(catalog_error)?,
                    references_table: row.try_get("foreign_table").map_err(catalog_error)?,
                    references_column: row.try_get("foreign_column").map_err(catalog_error)?,
                })
            })
            .collect()
    }
}

fn catalog_error(e: sqlx::Error) -> DbError {
    DbError::Catalog(e.to_string())
}

fn decode_value(row: &PgRow, index: usize) -> Value {
    decoded(try_decode::<_, i64>(row, index), Value::from)
        .or_else(|| decoded(try_decode::<_, i32>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, i16>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, f64>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, f32>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, Decimal>(row, index), decimal_value))
        .or_else(|| decoded(try_decode::<_, bool>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, String>(row, index), Value::from))
        .or_else(|| decoded(try_decode::<_, Value>(row, index), |v| v))
        .or_else(|| decoded(try_decode::<_, DateTime<Utc>>(row, index), |v| v.to_rfc3339().into()))
        .or_else(|| decoded(try_decode::<_, NaiveDateTime>(row, index), |v| v.to_string().into()))
        .or_else(|| decoded(try_decode::<_, NaiveDate>(row, index), |v| v.to_string().into()))
        .or_else(|| decoded(try_decode::<_, NaiveTime>(row, index), |v| v.to_string().into()))
        .unwrap_or_else(|| unsupported(row, index))
}

#[async_trait]
impl DbClient for PostgresClient {
    fn engine(&self) -> DbType {
        DbType::Postgres
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
            SELECT table_name::text AS table_name
            FROM information_schema.tables
            WHERE table_schema = 'public' AND table_type = 'BASE TABLE'
            ORDER BY table_name
        "#;
        let rows = sqlx::query(query)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("table_name").map_err(catalog_error))
            .collect()
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableSchema, DbError> {
        let query = r#"
            SELECT column_name::text AS column_name,
                   data_type::text AS data_type,
                   is_nullable::text AS is_nullable,
                   column_default::text AS column_default
            FROM information_schema.columns
            WHERE table_schema = 'public' AND table_name = $1
            ORDER BY ordinal_position
        "#;
        let rows = sqlx::query(query)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::Sqlx)?;

        let primary_keys = self.primary_keys(table_name).await?;

        let columns = rows
            .iter()
            .map(|row| {
                let name: String = row.try_get("column_name").map_err(catalog_error)?;
                Ok(ColumnSchema {
                    data_type: row.try_get("data_type").map_err(catalog_error)?,
                    is_nullable: row
                        .try_get::<String, _>("is_nullable")
                        .map_err(catalog_error)?
                        == "YES",
                    default: row.try_get("column_default").map_err(catalog_error)?,
                    is_primary_key: primary_keys.contains(&name),
                    name,
                })
            })
            .collect::<Result<Vec<_>, DbError>>()?;

        let foreign_keys = self.foreign_keys(table_name).await?;
        debug!(
            "Described PostgreSQL table {table_name}: {} columns, {} foreign keys",
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
