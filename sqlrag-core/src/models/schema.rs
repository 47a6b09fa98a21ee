use serde::{Deserialize, Serialize};

/// Database schema as read from the catalog: tables in catalog order, each
/// with its columns in ordinal order.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Schema {
    pub tables: Vec<TableSchema>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeySchema>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub default: Option<String>,
    #[serde(default)]
    pub is_primary_key: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ForeignKeySchema {
    pub column: String,
    pub references_table: String,
    pub references_column: String,
}

impl Schema {
    pub fn new(tables: Vec<TableSchema>) -> Self {
        Self { tables }
    }

    /// Builds a schema from bare `table -> columns` pairs, with no type or key
    /// information.
    pub fn from_columns<I, T, C, S>(tables: I) -> Self
    where
        I: IntoIterator<Item = (T, C)>,
        T: Into<String>,
        C: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tables = tables
            .into_iter()
            .map(|(table, columns)| TableSchema {
                table_name: table.into(),
                columns: columns.into_iter().map(ColumnSchema::named).collect(),
                foreign_keys: Vec::new(),
            })
            .collect();

        Self { tables }
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.table_name.as_str())
    }

    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.iter().find(|t| t.table_name == name)
    }

    /// Ordered column names of `table`, if it exists.
    pub fn columns(&self, table: &str) -> Option<Vec<&str>> {
        self.table(table).map(TableSchema::column_names)
    }

    pub fn total_columns(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }
}

impl TableSchema {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn primary_keys(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.iter().filter(|c| c.is_primary_key)
    }
}

impl ColumnSchema {
    /// Column known only by name.
    pub fn named<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            data_type: String::new(),
            is_nullable: true,
            default: None,
            is_primary_key: false,
        }
    }
}
