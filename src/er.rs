use std::fmt::Write;

use crate::models::schema::Schema;

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Escapes characters that are structural inside a `record` label.
fn escape_record(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '{' | '}' | '|' | '<' | '>' | '"' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Graphviz DOT rendering of `schema`: one record node per table, one edge per
/// foreign key.
pub fn render_er_diagram(schema: &Schema) -> String {
    let mut dot = String::from("digraph schema {\n");
    dot.push_str("    rankdir=LR;\n");
    dot.push_str("    node [shape=record, fontname=\"Helvetica\"];\n");

    for table in &schema.tables {
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| {
                let pk = if c.is_primary_key { " (PK)" } else { "" };
                escape_record(&format!("{} : {}{}", c.name, c.data_type, pk))
            })
            .collect();

        let _ = writeln!(
            dot,
            "    \"{}\" [label=\"{{{}|{}}}\"];",
            escape(&table.table_name),
            escape_record(&table.table_name),
            columns.join("\\l") + "\\l"
        );
    }

    for table in &schema.tables {
        for fk in &table.foreign_keys {
            let _ = writeln!(
                dot,
                "    \"{}\" -> \"{}\" [label=\"{}\"];",
                escape(&table.table_name),
                escape(&fk.references_table),
                escape(&format!("{} -> {}", fk.column, fk.references_column))
            );
        }
    }

    dot.push_str("}\n");
    dot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schema::{ColumnSchema, ForeignKeySchema, TableSchema};

    fn column(name: &str, data_type: &str, pk: bool) -> ColumnSchema {
        ColumnSchema {
            name: name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: !pk,
            default: None,
            is_primary_key: pk,
        }
    }

    #[test]
    fn test_tables_and_foreign_keys() {
        let schema = Schema::new(vec![
            TableSchema {
                table_name: "students".to_string(),
                columns: vec![column("id", "INTEGER", true), column("name", "TEXT", false)],
                foreign_keys: Vec::new(),
            },
            TableSchema {
                table_name: "enrollments".to_string(),
                columns: vec![column("student_id", "INTEGER", false)],
                foreign_keys: vec![ForeignKeySchema {
                    column: "student_id".to_string(),
                    references_table: "students".to_string(),
                    references_column: "id".to_string(),
                }],
            },
        ]);

        let dot = render_er_diagram(&schema);
        assert!(dot.starts_with("digraph schema {\n"));
        assert!(dot.ends_with("}\n"));
        assert!(dot.contains(
            "\"students\" [label=\"{students|id : INTEGER (PK)\\lname : TEXT\\l}\"];"
        ));
        assert!(dot.contains("\"enrollments\" -> \"students\" [label=\"student_id -> id\"];"));
    }

    #[test]
    fn test_identifiers_are_escaped() {
        let schema = Schema::new(vec![TableSchema {
            table_name: "odd\"table".to_string(),
            columns: vec![column("a|b", "map<text>", false)],
            foreign_keys: Vec::new(),
        }]);

        let dot = render_er_diagram(&schema);
        assert!(dot.contains("\"odd\\\"table\""));
        assert!(dot.contains("a\\|b : map\\<text\\>"));
    }
}
