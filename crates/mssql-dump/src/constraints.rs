//! Primary- and foreign-key constraint assembly.
//!
//! The catalog returns one row per key column; composite constraints are
//! reassembled by run-length grouping over rows pre-ordered by
//! (schema, table, constraint, ordinal). Grouping never goes through a hash
//! map, so the rendered statement order matches the query order on every
//! run.

use crate::naming::format_object_name;

/// One primary-key column row.
#[derive(Debug, Clone)]
pub struct PrimaryKeyRow {
    pub schema: String,
    pub table: String,
    pub constraint_name: String,
    pub column: String,
    pub ordinal: i32,
}

/// One foreign-key column-pair row.
#[derive(Debug, Clone)]
pub struct ForeignKeyRow {
    pub child_schema: String,
    pub child_table: String,
    pub constraint_name: String,
    pub parent_schema: String,
    pub parent_table: String,
    pub child_column: String,
    pub parent_column: String,
    pub update_rule: String,
    pub delete_rule: String,
    pub ordinal: i32,
}

/// A grouped primary key, possibly composite.
#[derive(Debug, Clone)]
pub struct PrimaryKeyInfo {
    pub schema: String,
    pub table: String,
    pub constraint_name: String,
    pub columns: Vec<String>,
}

/// A grouped foreign key with positionally aligned column lists.
#[derive(Debug, Clone)]
pub struct ForeignKeyInfo {
    pub child_schema: String,
    pub child_table: String,
    pub constraint_name: String,
    pub parent_schema: String,
    pub parent_table: String,
    pub child_columns: Vec<String>,
    pub parent_columns: Vec<String>,
    pub update_rule: String,
    pub delete_rule: String,
}

/// Group primary-key rows into composite constraints, preserving row order.
pub fn group_primary_keys(rows: &[PrimaryKeyRow]) -> Vec<PrimaryKeyInfo> {
    let mut grouped: Vec<PrimaryKeyInfo> = Vec::new();
    for row in rows {
        let same_group = grouped.last().is_some_and(|pk| {
            pk.schema == row.schema
                && pk.table == row.table
                && pk.constraint_name == row.constraint_name
        });
        if same_group {
            grouped.last_mut().unwrap().columns.push(row.column.clone());
        } else {
            grouped.push(PrimaryKeyInfo {
                schema: row.schema.clone(),
                table: row.table.clone(),
                constraint_name: row.constraint_name.clone(),
                columns: vec![row.column.clone()],
            });
        }
    }
    grouped
}

/// Group foreign-key rows into composite constraints.
///
/// Column *i* of the child list corresponds to column *i* of the parent
/// list; the update/delete rules are constant per constraint and taken from
/// the first row.
pub fn group_foreign_keys(rows: &[ForeignKeyRow]) -> Vec<ForeignKeyInfo> {
    let mut grouped: Vec<ForeignKeyInfo> = Vec::new();
    for row in rows {
        let same_group = grouped.last().is_some_and(|fk| {
            fk.child_schema == row.child_schema
                && fk.child_table == row.child_table
                && fk.constraint_name == row.constraint_name
        });
        if same_group {
            let fk = grouped.last_mut().unwrap();
            fk.child_columns.push(row.child_column.clone());
            fk.parent_columns.push(row.parent_column.clone());
        } else {
            grouped.push(ForeignKeyInfo {
                child_schema: row.child_schema.clone(),
                child_table: row.child_table.clone(),
                constraint_name: row.constraint_name.clone(),
                parent_schema: row.parent_schema.clone(),
                parent_table: row.parent_table.clone(),
                child_columns: vec![row.child_column.clone()],
                parent_columns: vec![row.parent_column.clone()],
                update_rule: row.update_rule.clone(),
                delete_rule: row.delete_rule.clone(),
            });
        }
    }
    grouped
}

/// `ALTER TABLE ... ADD CONSTRAINT ... PRIMARY KEY (...);`
pub fn render_primary_key(pk: &PrimaryKeyInfo) -> String {
    let table = format_object_name(&[&pk.schema, &pk.table]);
    let name = format_object_name(&[&pk.constraint_name]);
    let cols = bracket_list(&pk.columns);
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({});\n",
        table, name, cols
    )
}

/// `ALTER TABLE ... ADD CONSTRAINT ... FOREIGN KEY (...) REFERENCES ... ;`
pub fn render_foreign_key(fk: &ForeignKeyInfo) -> String {
    let child = format_object_name(&[&fk.child_schema, &fk.child_table]);
    let parent = format_object_name(&[&fk.parent_schema, &fk.parent_table]);
    let name = format_object_name(&[&fk.constraint_name]);
    format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON UPDATE {} ON DELETE {};\n",
        child,
        name,
        bracket_list(&fk.child_columns),
        parent,
        bracket_list(&fk.parent_columns),
        fk.update_rule,
        fk.delete_rule,
    )
}

/// Render the whole constraints section: PKs first, then FKs.
pub fn assemble_constraints_section(
    pk_rows: &[PrimaryKeyRow],
    fk_rows: &[ForeignKeyRow],
) -> String {
    let mut out = String::from("-- Constraints Dump\n\n");
    for pk in group_primary_keys(pk_rows) {
        out.push_str(&render_primary_key(&pk));
    }
    out.push('\n');
    for fk in group_foreign_keys(fk_rows) {
        out.push_str(&render_foreign_key(&fk));
    }
    out
}

fn bracket_list(columns: &[String]) -> String {
    columns
        .iter()
        .map(|c| format_object_name(&[c]))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pk_row(table: &str, constraint: &str, column: &str, ordinal: i32) -> PrimaryKeyRow {
        PrimaryKeyRow {
            schema: "dbo".to_string(),
            table: table.to_string(),
            constraint_name: constraint.to_string(),
            column: column.to_string(),
            ordinal,
        }
    }

    fn fk_row(
        child: &str,
        constraint: &str,
        parent: &str,
        child_col: &str,
        parent_col: &str,
        ordinal: i32,
    ) -> ForeignKeyRow {
        ForeignKeyRow {
            child_schema: "dbo".to_string(),
            child_table: child.to_string(),
            constraint_name: constraint.to_string(),
            parent_schema: "dbo".to_string(),
            parent_table: parent.to_string(),
            child_column: child_col.to_string(),
            parent_column: parent_col.to_string(),
            update_rule: "NO ACTION".to_string(),
            delete_rule: "CASCADE".to_string(),
            ordinal,
        }
    }

    #[test]
    fn composite_pk_becomes_one_statement() {
        let rows = vec![
            pk_row("T", "PK_T", "c1", 1),
            pk_row("T", "PK_T", "c2", 2),
            pk_row("T", "PK_T", "c3", 3),
        ];
        let grouped = group_primary_keys(&rows);

        assert_eq!(grouped.len(), 1);
        let stmt = render_primary_key(&grouped[0]);
        assert_eq!(
            stmt,
            "ALTER TABLE [dbo].[T] ADD CONSTRAINT [PK_T] PRIMARY KEY ([c1], [c2], [c3]);\n"
        );
    }

    #[test]
    fn distinct_constraints_stay_separate() {
        let rows = vec![
            pk_row("A", "PK_A", "id", 1),
            pk_row("B", "PK_B", "id", 1),
        ];
        assert_eq!(group_primary_keys(&rows).len(), 2);
    }

    #[test]
    fn fk_columns_stay_positionally_aligned() {
        let rows = vec![
            fk_row("Child", "FK_C", "Parent", "pa", "a", 1),
            fk_row("Child", "FK_C", "Parent", "pb", "b", 2),
        ];
        let grouped = group_foreign_keys(&rows);

        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[0].child_columns, vec!["pa", "pb"]);
        assert_eq!(grouped[0].parent_columns, vec!["a", "b"]);

        let stmt = render_foreign_key(&grouped[0]);
        assert_eq!(
            stmt,
            "ALTER TABLE [dbo].[Child] ADD CONSTRAINT [FK_C] FOREIGN KEY ([pa], [pb]) \
             REFERENCES [dbo].[Parent] ([a], [b]) ON UPDATE NO ACTION ON DELETE CASCADE;\n"
        );
    }

    #[test]
    fn section_renders_pks_before_fks() {
        let pk = vec![pk_row("T", "PK_T", "id", 1)];
        let fk = vec![fk_row("T", "FK_T", "P", "pid", "id", 1)];
        let out = assemble_constraints_section(&pk, &fk);

        assert!(out.starts_with("-- Constraints Dump\n"));
        assert!(out.find("PRIMARY KEY").unwrap() < out.find("FOREIGN KEY").unwrap());
    }

    #[test]
    fn grouping_is_stable_across_runs() {
        let rows = vec![
            pk_row("A", "PK_A", "id", 1),
            pk_row("B", "PK_B", "x", 1),
            pk_row("B", "PK_B", "y", 2),
        ];
        let first = assemble_constraints_section(&rows, &[]);
        let second = assemble_constraints_section(&rows, &[]);
        assert_eq!(first, second);
    }
}
