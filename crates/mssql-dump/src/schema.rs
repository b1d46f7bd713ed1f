//! CREATE SCHEMA / CREATE TABLE statement assembly.

use crate::catalog::{ColumnDef, TableMapping};
use crate::error::{DumpError, Result};
use crate::naming::{format_object_name, TableName};

/// Indentation for column lines.
const TAB_SPACE: &str = "    ";

/// Schemas that exist in every database and never need a creation guard.
const BUILTIN_SCHEMAS: &[&str] = &["dbo", "sys", "INFORMATION_SCHEMA"];

/// Render the schema section: creation guards plus CREATE TABLE statements
/// in the given dependency order.
pub fn assemble_schema_section(
    sorted_tables: &[TableName],
    mapping: &TableMapping,
) -> Result<String> {
    let mut out = String::new();
    let mut created: Vec<String> = BUILTIN_SCHEMAS.iter().map(|s| s.to_string()).collect();

    for table in sorted_tables {
        let (schema, _) = table.parts();
        if !created.contains(&schema) {
            out.push_str(&create_schema_guard(&schema));
            created.push(schema);
        }

        let columns = mapping.get(table).ok_or_else(|| {
            DumpError::SchemaDump(format!("no column metadata for table {}", table))
        })?;
        out.push_str(&assemble_create_table(table, columns));
    }

    Ok(out)
}

/// Conditional CREATE SCHEMA guard, safe to replay.
pub fn create_schema_guard(schema: &str) -> String {
    format!(
        "IF NOT EXISTS (SELECT 1 FROM sys.schemas WHERE name = '{}')\n{}EXEC('CREATE SCHEMA {}');\n\n",
        schema.replace('\'', "''"),
        TAB_SPACE,
        format_object_name(&[schema]),
    )
}

/// One CREATE TABLE statement with one column per line.
pub fn assemble_create_table(table: &TableName, columns: &[ColumnDef]) -> String {
    let mut out = format!("CREATE TABLE {} (\n", table);
    for (i, col) in columns.iter().enumerate() {
        out.push_str(TAB_SPACE);
        out.push_str(&build_column_definition(col));
        if i < columns.len() - 1 {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(");\n\n");
    out
}

/// `[name] type[(len)][ NOT NULL][ IDENTITY(1,1)]`.
pub fn build_column_definition(col: &ColumnDef) -> String {
    let mut def = format!("{} {}", format_object_name(&[&col.name]), format_column_type(col));
    if !col.is_nullable {
        def.push_str(" NOT NULL");
    }
    if col.is_identity {
        def.push_str(" IDENTITY(1,1)");
    }
    def
}

/// Type name with its length/precision suffix.
///
/// Character types carry an explicit length or `(max)`; decimal/numeric
/// carry `(precision,scale)`; everything else is the bare type name.
pub fn format_column_type(col: &ColumnDef) -> String {
    let dt = col.data_type.to_lowercase();
    match dt.as_str() {
        "char" | "varchar" | "nchar" | "nvarchar" => {
            if col.max_length > 0 {
                format!("{}({})", col.data_type, col.max_length)
            } else {
                format!("{}(max)", col.data_type)
            }
        }
        "decimal" | "numeric" => format!("{}({},{})", col.data_type, col.precision, col.scale),
        _ => col.data_type.clone(),
    }
}
