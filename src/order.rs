//! Dependency ordering of change entries
//!
//! Kahn's algorithm over the dependency edges between entries. The ready set
//! is ordered by target, then change kind, then object kind, so independent
//! entries come out in lexical order and the result is deterministic.

use crate::change::{ChangeEntry, SchemaObject};
use crate::traits::{ChangeKind, ObjectKind};
use std::collections::BTreeSet;

/// Order entries so every entry follows the entries it depends on
pub fn dependency_order(entries: Vec<ChangeEntry>) -> Vec<ChangeEntry> {
    let n = entries.len();
    let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); n];
    for (i, a) in entries.iter().enumerate() {
        for (j, b) in entries.iter().enumerate() {
            if i != j && must_precede(a, b) {
                successors[i].insert(j);
            }
        }
    }

    let mut in_degree = vec![0usize; n];
    for succ in &successors {
        for &j in succ {
            in_degree[j] += 1;
        }
    }

    let key = |i: usize| {
        let (target, change, kind) = entries[i].sort_key();
        (target, change, kind, i)
    };

    let mut ready: BTreeSet<_> = (0..n).filter(|&i| in_degree[i] == 0).map(key).collect();
    let mut order = Vec::with_capacity(n);

    while order.len() < n {
        let Some(next) = ready.pop_first() else {
            // Cycle: emit whatever is left in key order
            let mut rest: Vec<_> = (0..n)
                .filter(|i| in_degree[*i] > 0)
                .map(key)
                .collect();
            rest.sort();
            tracing::warn!(entries = rest.len(), "dependency cycle between changes");
            order.extend(rest.into_iter().map(|(.., i)| i));
            break;
        };
        let i = next.3;
        order.push(i);
        for &j in &successors[i] {
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.insert(key(j));
            }
        }
    }

    let mut slots: Vec<Option<ChangeEntry>> = entries.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}

/// Whether `a` has to run before `b`
fn must_precede(a: &ChangeEntry, b: &ChangeEntry) -> bool {
    frees_name(a, b) || (a.table() == b.table() && depends_on(a, b))
}

/// Dependencies between two entries on the same table
fn depends_on(a: &ChangeEntry, b: &ChangeEntry) -> bool {
    match (a.change, a.kind, b.change, b.kind) {
        // A table exists before anything is added to it
        (ChangeKind::Create, ObjectKind::Table, ChangeKind::Create | ChangeKind::Alter, kind) => {
            kind != ObjectKind::Table
        }
        // Columns exist, with their final type, before the members using them
        (
            ChangeKind::Create | ChangeKind::Alter,
            ObjectKind::Column,
            ChangeKind::Create | ChangeKind::Alter,
            kind,
        ) if kind != ObjectKind::Table || b.change == ChangeKind::Alter => {
            uses_column(b.after.as_ref(), a.target.leaf())
        }
        // Members go before their table
        (ChangeKind::Drop, kind, ChangeKind::Drop, ObjectKind::Table) => kind != ObjectKind::Table,
        // Members still using a column go before the column
        (ChangeKind::Drop | ChangeKind::Alter, _, ChangeKind::Drop, ObjectKind::Column) => {
            uses_column(a.before.as_ref(), b.target.leaf())
        }
        _ => false,
    }
}

/// Whether a state depends on `column`: members by reference, tables by primary key
fn uses_column(state: Option<&SchemaObject>, column: &str) -> bool {
    match state {
        Some(SchemaObject::Table(table)) => table
            .primary_key
            .as_ref()
            .is_some_and(|pk| pk.columns.iter().any(|c| c == column)),
        Some(object) => object.references_column(column),
        None => false,
    }
}

/// A dropped index or constraint, explicit or removed with its table or
/// column, frees its name for a create in the same schema
fn frees_name(a: &ChangeEntry, b: &ChangeEntry) -> bool {
    if a.change != ChangeKind::Drop
        || b.change != ChangeKind::Create
        || !b.kind.is_relation()
        || a.target.schema() != b.target.schema()
    {
        return false;
    }
    let reused = b.target.leaf();
    a.freed_relations()
        .any(|name| name == reused && a.table().child(name) != b.target)
}
