//! Foreign-key dependency analysis and topological table ordering.
//!
//! The dependency tree maps each table to the tables it references. Every
//! table in the database must appear as a key, even with no dependencies,
//! or the sorter cannot account for it.

use std::collections::BTreeMap;

use crate::error::{DumpError, Result};
use crate::naming::TableName;

/// Child table -> tables it depends on (its referenced parents).
pub type DependencyTree = BTreeMap<TableName, Vec<TableName>>;

/// One foreign-key relationship row from the referential-constraint catalog.
///
/// The child side may be absent when constraint metadata is unmatched; that
/// is data, not an error.
#[derive(Debug, Clone)]
pub struct DependencyRow {
    pub child_schema: Option<String>,
    pub child_table: Option<String>,
    pub parent_schema: String,
    pub parent_table: String,
}

/// Build the dependency tree from FK relationship rows plus the full table
/// list.
///
/// Parents are always registered as keys so leaf-of-dependency tables are
/// visible to the sorter; the second pass inserts tables with no foreign
/// keys at all.
pub fn build_dependency_tree(rows: &[DependencyRow], all_tables: &[TableName]) -> DependencyTree {
    let mut deps = DependencyTree::new();

    for row in rows {
        let child = TableName::new(
            row.child_schema.as_deref().unwrap_or(""),
            row.child_table.as_deref().unwrap_or(""),
        );
        let parent = TableName::new(&row.parent_schema, &row.parent_table);

        if !child.is_empty() {
            deps.entry(child).or_default().push(parent.clone());
        }
        deps.entry(parent).or_default();
    }

    for table in all_tables {
        deps.entry(table.clone()).or_default();
    }

    deps
}

/// Order tables so that every referenced parent precedes its dependents.
///
/// Kahn's algorithm over the dependency tree. In-degree is the number of
/// parents a table depends on. Candidate order is deterministic because the
/// tree iterates in lexicographic key order.
///
/// # Errors
///
/// Returns [`DumpError::DependencyCycle`] when the sorted output does not
/// cover every table - a cycle or an inconsistent graph. No partial output
/// is produced.
pub fn sort_tables_by_dependencies(deps: &DependencyTree) -> Result<Vec<TableName>> {
    let mut degree: BTreeMap<&TableName, usize> =
        deps.iter().map(|(t, parents)| (t, parents.len())).collect();

    let mut queue: Vec<&TableName> = degree
        .iter()
        .filter(|(_, deg)| **deg == 0)
        .map(|(t, _)| *t)
        .collect();

    let mut sorted = Vec::with_capacity(deps.len());
    let mut head = 0;
    while head < queue.len() {
        let table = queue[head];
        head += 1;
        sorted.push(table.clone());

        for (child, parents) in deps {
            if degree[child] == 0 {
                continue;
            }
            let removed = parents.iter().filter(|p| *p == table).count();
            if removed > 0 {
                let deg = degree.get_mut(child).unwrap();
                *deg -= removed.min(*deg);
                if *deg == 0 {
                    queue.push(child);
                }
            }
        }
    }

    if sorted.len() != deps.len() {
        return Err(DumpError::DependencyCycle);
    }

    Ok(sorted)
}

/// Refuse a skip list that names a table some other table references.
///
/// Skipping a referenced parent would leave dependents without their
/// CREATE TABLE target.
pub fn validate_skip_list(deps: &DependencyTree, skip: &[String]) -> Result<()> {
    for (table, parents) in deps {
        for parent in parents {
            let (_, bare) = parent.parts();
            if skip.iter().any(|s| s == parent.as_str() || *s == bare) {
                return Err(DumpError::InvalidInput(format!(
                    "cannot skip table {} because it is referenced by table {}",
                    parent, table
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(name: &str) -> TableName {
        TableName::new("dbo", name)
    }

    fn edge(child: &str, parent: &str) -> DependencyRow {
        DependencyRow {
            child_schema: Some("dbo".to_string()),
            child_table: Some(child.to_string()),
            parent_schema: "dbo".to_string(),
            parent_table: parent.to_string(),
        }
    }

    fn position(sorted: &[TableName], name: &TableName) -> usize {
        sorted.iter().position(|x| x == name).unwrap()
    }

    #[test]
    fn parents_precede_children() {
        let rows = vec![edge("OrderLines", "Orders"), edge("Orders", "Customers")];
        let deps = build_dependency_tree(&rows, &[]);
        let sorted = sort_tables_by_dependencies(&deps).unwrap();

        assert_eq!(sorted.len(), 3);
        assert!(position(&sorted, &t("Customers")) < position(&sorted, &t("Orders")));
        assert!(position(&sorted, &t("Orders")) < position(&sorted, &t("OrderLines")));
    }

    #[test]
    fn every_table_appears_exactly_once() {
        let rows = vec![
            edge("B", "A"),
            edge("C", "A"),
            edge("D", "B"),
            edge("D", "C"),
        ];
        let deps = build_dependency_tree(&rows, &[]);
        let sorted = sort_tables_by_dependencies(&deps).unwrap();

        assert_eq!(sorted.len(), 4);
        for name in ["A", "B", "C", "D"] {
            assert_eq!(sorted.iter().filter(|x| **x == t(name)).count(), 1);
        }
    }

    #[test]
    fn cycle_is_a_hard_error() {
        let rows = vec![edge("A", "B"), edge("B", "A")];
        let deps = build_dependency_tree(&rows, &[]);
        assert!(matches!(
            sort_tables_by_dependencies(&deps),
            Err(DumpError::DependencyCycle)
        ));
    }

    #[test]
    fn isolated_table_participates() {
        let rows = vec![edge("B", "A")];
        let deps = build_dependency_tree(&rows, &[t("Lonely")]);
        let sorted = sort_tables_by_dependencies(&deps).unwrap();

        assert_eq!(sorted.len(), 3);
        assert_eq!(sorted.iter().filter(|x| **x == t("Lonely")).count(), 1);
    }

    #[test]
    fn null_child_side_registers_only_the_parent() {
        let rows = vec![DependencyRow {
            child_schema: None,
            child_table: None,
            parent_schema: "dbo".to_string(),
            parent_table: "Orphaned".to_string(),
        }];
        let deps = build_dependency_tree(&rows, &[]);

        assert_eq!(deps.len(), 1);
        assert!(deps[&t("Orphaned")].is_empty());
    }

    #[test]
    fn duplicate_edges_do_not_wedge_the_sort() {
        let rows = vec![edge("B", "A"), edge("B", "A")];
        let deps = build_dependency_tree(&rows, &[]);
        let sorted = sort_tables_by_dependencies(&deps).unwrap();
        assert_eq!(sorted.len(), 2);
        assert!(position(&sorted, &t("A")) < position(&sorted, &t("B")));
    }

    #[test]
    fn sort_is_deterministic() {
        let rows = vec![edge("C", "A"), edge("B", "A")];
        let deps = build_dependency_tree(&rows, &[t("Z"), t("M")]);
        let first = sort_tables_by_dependencies(&deps).unwrap();
        let second = sort_tables_by_dependencies(&deps).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn skip_list_rejects_referenced_parent() {
        let rows = vec![edge("Orders", "Customers")];
        let deps = build_dependency_tree(&rows, &[]);

        assert!(validate_skip_list(&deps, &["Customers".to_string()]).is_err());
        assert!(validate_skip_list(&deps, &["Orders".to_string()]).is_ok());
    }
}
