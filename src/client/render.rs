use comfy_table::{presets, Cell, Color, ContentArrangement, Table};
use serde_json::Value;

use crate::{
    models::{results::QueryResult, schema::Schema},
    rag::RetrievedDescriptor,
};

fn table_with_header<I, S>(header: I) -> Table
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(
        header
            .into_iter()
            .map(|h| Cell::new(h.into()).fg(Color::White))
            .collect::<Vec<_>>(),
    );
    table
}

pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn result_table(result: &QueryResult) -> Table {
    let mut table = table_with_header(result.columns.iter().map(String::as_str));
    for row in &result.rows {
        table.add_row(row.iter().map(value_text).collect::<Vec<_>>());
    }
    table
}

pub fn schema_table(schema: &Schema) -> Table {
    let mut table = table_with_header(["Table", "Column", "Type", "Nullable", "Key"]);
    for t in &schema.tables {
        for c in &t.columns {
            let key = if c.is_primary_key {
                "PK".to_string()
            } else {
                t.foreign_keys
                    .iter()
                    .find(|fk| fk.column == c.name)
                    .map(|fk| format!("FK -> {}.{}", fk.references_table, fk.references_column))
                    .unwrap_or_default()
            };
            table.add_row(vec![
                t.table_name.clone(),
                c.name.clone(),
                c.data_type.clone(),
                if c.is_nullable { "yes" } else { "no" }.to_string(),
                key,
            ]);
        }
    }
    table
}

pub fn retrieved_table(hits: &[RetrievedDescriptor]) -> Table {
    let mut table = table_with_header(["Table", "Column", "Distance"]);
    for hit in hits {
        table.add_row(vec![
            hit.descriptor.table.clone(),
            hit.descriptor.column.clone(),
            format!("{:.4}", hit.distance),
        ]);
    }
    table
}
