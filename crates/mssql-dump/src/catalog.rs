//! Column metadata model and the catalog queries that populate it.
//!
//! All metadata is materialized once per dump run and is immutable
//! afterwards; the data dump engine and the assemblers share it by
//! reference.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::naming::TableName;

/// One row of column metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Owning schema name.
    pub schema: String,

    /// Owning table name.
    pub table: String,

    /// Column name.
    pub name: String,

    /// Ordinal position (1-based).
    pub ordinal: i32,

    /// Raw data type name (e.g. "int", "varchar", "datetime2").
    pub data_type: String,

    /// Maximum length in storage units (-1 for MAX).
    pub max_length: i32,

    /// Numeric precision.
    pub precision: i32,

    /// Numeric scale.
    pub scale: i32,

    /// Whether the column allows NULL.
    pub is_nullable: bool,

    /// Whether the column is an identity column.
    pub is_identity: bool,

    /// Whether the column is computed.
    pub is_computed: bool,
}

impl ColumnDef {
    /// The owning table's canonical name.
    pub fn table_name(&self) -> TableName {
        TableName::new(&self.schema, &self.table)
    }
}

/// Mapping from table to its columns, ordered by ordinal position.
///
/// `BTreeMap` keys give reproducible iteration order across runs.
pub type TableMapping = BTreeMap<TableName, Vec<ColumnDef>>;

/// Group a flat column result set into a [`TableMapping`].
///
/// Columns are sorted by ordinal within each table; the input order does not
/// matter.
pub fn build_table_mapping(columns: Vec<ColumnDef>) -> TableMapping {
    let mut mapping = TableMapping::new();
    for col in columns {
        mapping.entry(col.table_name()).or_default().push(col);
    }
    for cols in mapping.values_mut() {
        cols.sort_by_key(|c| c.ordinal);
    }
    mapping
}

/// All base tables with schema and name.
pub const QUERY_TABLE_LIST: &str = r#"
SELECT t.TABLE_SCHEMA, t.TABLE_NAME
FROM INFORMATION_SCHEMA.TABLES t
WHERE t.TABLE_TYPE = 'BASE TABLE'
ORDER BY t.TABLE_SCHEMA, t.TABLE_NAME
"#;

/// One row per column: schema, table, column, ordinal, type, max length,
/// precision, scale, nullable, identity, computed.
pub const QUERY_TABLE_MAPPINGS: &str = r#"
SELECT
    s.name AS [schema],
    t.name AS [table],
    c.name AS [column],
    c.column_id AS [ordinal],
    tp.name AS [data_type],
    CAST(c.max_length AS INT) AS [max_length],
    CAST(c.precision AS INT) AS [precision],
    CAST(c.scale AS INT) AS [scale],
    c.is_nullable,
    c.is_identity,
    c.is_computed
FROM sys.tables t
JOIN sys.schemas s ON t.schema_id = s.schema_id
JOIN sys.columns c ON t.object_id = c.object_id
JOIN sys.types tp ON c.user_type_id = tp.user_type_id
WHERE t.type = 'U'
ORDER BY s.name, t.name, c.column_id
"#;

/// One row per foreign-key relationship: child schema/table, parent
/// schema/table. The child side can be NULL when constraint metadata is
/// unmatched; callers treat that as an empty string, not an error.
pub const QUERY_DEPENDENCIES: &str = r#"
SELECT
    fk.TABLE_SCHEMA AS ChildSchema,
    fk.TABLE_NAME AS ChildTable,
    pk.TABLE_SCHEMA AS ParentSchema,
    pk.TABLE_NAME AS ParentTable
FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc
INNER JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS fk ON rc.CONSTRAINT_NAME = fk.CONSTRAINT_NAME
INNER JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS pk ON rc.UNIQUE_CONSTRAINT_NAME = pk.CONSTRAINT_NAME
"#;

/// One row per primary-key column, ordered so the constraint assembler can
/// group by run-length over (schema, table, constraint, ordinal).
pub const QUERY_PRIMARY_KEYS: &str = r#"
SELECT
    tc.TABLE_SCHEMA,
    tc.TABLE_NAME,
    tc.CONSTRAINT_NAME,
    kcu.COLUMN_NAME,
    kcu.ORDINAL_POSITION
FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS AS tc
JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE AS kcu
    ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME
WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
ORDER BY tc.TABLE_SCHEMA, tc.TABLE_NAME, tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION
"#;

/// One row per foreign-key column pair. Joining child and parent key usage on
/// matching ordinal position keeps the column lists positionally aligned.
pub const QUERY_FOREIGN_KEYS: &str = r#"
SELECT
    fk.TABLE_SCHEMA AS ChildSchema,
    fk.TABLE_NAME AS ChildTable,
    fk.CONSTRAINT_NAME AS ForeignKey,
    pk.TABLE_SCHEMA AS ParentSchema,
    pk.TABLE_NAME AS ParentTable,
    fkc.COLUMN_NAME AS ChildColumn,
    pkc.COLUMN_NAME AS ParentColumn,
    rc.UPDATE_RULE,
    rc.DELETE_RULE,
    fkc.ORDINAL_POSITION
FROM INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS rc
JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS fk ON rc.CONSTRAINT_NAME = fk.CONSTRAINT_NAME
JOIN INFORMATION_SCHEMA.TABLE_CONSTRAINTS pk ON rc.UNIQUE_CONSTRAINT_NAME = pk.CONSTRAINT_NAME
JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE fkc ON fk.CONSTRAINT_NAME = fkc.CONSTRAINT_NAME
JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE pkc ON pk.CONSTRAINT_NAME = pkc.CONSTRAINT_NAME
    AND fkc.ORDINAL_POSITION = pkc.ORDINAL_POSITION
ORDER BY fk.TABLE_SCHEMA, fk.TABLE_NAME, fk.CONSTRAINT_NAME, fkc.ORDINAL_POSITION
"#;
