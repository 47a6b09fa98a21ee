use std::{fs::File, io::Write, path::Path};

use log::{info, warn};
use serde_json::Value;

use crate::{db::DbClient, errors::DbError, models::results::QueryResult};

/// Runs generated SQL verbatim against the session's database.
pub struct QueryExecutor<'a> {
    client: &'a dyn DbClient,
}

impl<'a> QueryExecutor<'a> {
    pub fn new(client: &'a dyn DbClient) -> Self {
        Self { client }
    }

    pub async fn run(&self, sql: &str) -> Result<QueryResult, DbError> {
        match self.client.execute(sql).await {
            Ok(result) => {
                info!("Query returned {} rows", result.row_count());
                Ok(result)
            }
            Err(e) => {
                warn!("Query failed: {e}");
                Err(e)
            }
        }
    }
}

pub fn execution_message(err: &dyn std::fmt::Display) -> String {
    format!("Query failed: {err}")
}

fn csv_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Writes a header row followed by one record per result row. NULL becomes
/// an empty field.
pub fn write_csv<W: Write>(result: &QueryResult, writer: W) -> Result<(), DbError> {
    let mut wtr = csv::Writer::from_writer(writer);

    wtr.write_record(&result.columns)
        .map_err(|e| DbError::Export(e.to_string()))?;
    for row in &result.rows {
        wtr.write_record(row.iter().map(csv_cell))
            .map_err(|e| DbError::Export(e.to_string()))?;
    }

    wtr.flush().map_err(|e| DbError::Export(e.to_string()))?;
    Ok(())
}

pub fn export_csv(result: &QueryResult, path: &Path) -> Result<(), DbError> {
    let file = File::create(path).map_err(|e| DbError::Export(e.to_string()))?;
    write_csv(result, file)?;
    info!("Exported {} rows to {}", result.row_count(), path.display());
    Ok(())
}
