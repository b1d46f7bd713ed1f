//! Canonical object naming.
//!
//! Every table in a dump run is keyed by its bracketed `[schema].[table]`
//! form, so equality and set membership are always by the canonical string
//! regardless of where the name was read from.

use std::fmt;

/// Default schema substituted when the catalog reports an empty one.
pub const DEFAULT_SCHEMA: &str = "dbo";

/// A canonical `[schema].[table]` identifier.
///
/// Ordering, equality and hashing all use the canonical string, which makes
/// `TableName` usable as an ordered map key with reproducible iteration.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableName(String);

impl TableName {
    /// Build a canonical name from raw schema and table parts.
    ///
    /// An empty schema falls back to `dbo`.
    pub fn new(schema: &str, table: &str) -> Self {
        let schema = if schema.is_empty() { DEFAULT_SCHEMA } else { schema };
        TableName(format_object_name(&[schema, table]))
    }

    /// Parse the canonical form back into `(schema, table)`.
    ///
    /// Returns empty strings when the stored form does not match `[x].[y]`.
    pub fn parts(&self) -> (String, String) {
        let mut parts = self.0.splitn(2, "].[");
        match (parts.next(), parts.next()) {
            (Some(schema), Some(table)) if schema.starts_with('[') && table.ends_with(']') => {
                let schema = unescape_part(&schema[1..]);
                let table = unescape_part(&table[..table.len() - 1]);
                (schema, table)
            }
            _ => (String::new(), String::new()),
        }
    }

    /// True when the table part is blank after trimming.
    pub fn is_empty(&self) -> bool {
        let (_, table) = self.parts();
        table.trim().is_empty()
    }

    /// The canonical string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Wrap every part in brackets and join with `.`.
///
/// Used uniformly for tables, columns and constraint names so quoting is
/// consistent across the whole script. Closing brackets inside a part are
/// escaped by doubling, matching SQL Server's QUOTENAME.
pub fn format_object_name<S: AsRef<str>>(parts: &[S]) -> String {
    parts
        .iter()
        .map(|p| format!("[{}]", p.as_ref().replace(']', "]]")))
        .collect::<Vec<_>>()
        .join(".")
}

fn unescape_part(part: &str) -> String {
    part.replace("]]", "]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form() {
        let name = TableName::new("sales", "Orders");
        assert_eq!(name.as_str(), "[sales].[Orders]");
    }

    #[test]
    fn empty_schema_defaults_to_dbo() {
        let name = TableName::new("", "Orders");
        assert_eq!(name.as_str(), "[dbo].[Orders]");
    }

    #[test]
    fn parts_round_trip() {
        let name = TableName::new("sales", "Orders");
        assert_eq!(name.parts(), ("sales".to_string(), "Orders".to_string()));
    }

    #[test]
    fn parts_of_malformed_name_are_empty() {
        let name = TableName("not-bracketed".to_string());
        assert_eq!(name.parts(), (String::new(), String::new()));
    }

    #[test]
    fn empty_table_is_detectable() {
        assert!(TableName::new("dbo", "").is_empty());
        assert!(TableName::new("dbo", "   ").is_empty());
        assert!(!TableName::new("dbo", "Orders").is_empty());
    }

    #[test]
    fn equality_is_by_canonical_string() {
        assert_eq!(TableName::new("", "T"), TableName::new("dbo", "T"));
    }

    #[test]
    fn format_object_name_joins_with_dots() {
        assert_eq!(format_object_name(&["dbo", "Orders"]), "[dbo].[Orders]");
        assert_eq!(format_object_name(&["OrderId"]), "[OrderId]");
    }

    #[test]
    fn format_object_name_escapes_closing_bracket() {
        assert_eq!(format_object_name(&["odd]name"]), "[odd]]name]");
    }
}
