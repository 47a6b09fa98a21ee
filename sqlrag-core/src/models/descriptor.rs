use serde::{Deserialize, Serialize};

use super::schema::Schema;

/// One `(table, column)` pair and the phrase that gets embedded for it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    pub table: String,
    pub column: String,
    pub text: String,
}

impl SchemaDescriptor {
    pub fn new<T: Into<String>, C: Into<String>>(table: T, column: C) -> Self {
        let table = table.into();
        let column = column.into();
        let text = format!("{table} - {column}");
        Self {
            table,
            column,
            text,
        }
    }
}

/// Renders one descriptor per column, in schema order.
pub fn descriptors(schema: &Schema) -> Vec<SchemaDescriptor> {
    schema
        .tables
        .iter()
        .flat_map(|table| {
            table
                .columns
                .iter()
                .map(move |column| SchemaDescriptor::new(&table.table_name, &column.name))
        })
        .collect()
}
