//! Schema diff engine
//!
//! Compares two snapshots table by table and member by member. The result is
//! an unordered [`ChangeSet`]; ordering, filtering and orphan handling are the
//! classifier's job.

use crate::change::{Ambiguity, ChangeEntry, ChangeSet, SchemaObject};
use crate::collection::{Collection, EntityDiff, diff_collections};
use crate::config::Config;
use crate::snapshot::{self, Column, DEFAULT_SCHEMA, SchemaSnapshot, TableDefinition};
use crate::traits::{ChangeKind, Entity, ObjectKind, QualifiedName};
use std::collections::BTreeSet;

/// Liquibase's own bookkeeping tables, never diffed
pub const TRACKING_TABLES: &[&str] = &["databasechangelog", "databasechangeloglock"];

// =============================================================================
// Scope
// =============================================================================

/// Which tables take part in a diff
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffScope {
    schemas: Vec<String>,
    exclude: Vec<String>,
}

impl Default for DiffScope {
    fn default() -> Self {
        Self {
            schemas: vec![DEFAULT_SCHEMA.to_string()],
            exclude: Vec::new(),
        }
    }
}

impl DiffScope {
    pub fn new<S, E>(schemas: S, exclude: E) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        E: IntoIterator,
        E::Item: Into<String>,
    {
        Self {
            schemas: schemas.into_iter().map(Into::into).collect(),
            exclude: exclude.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.schemas.iter().cloned(), config.exclude_tables.iter().cloned())
    }

    /// Whether a table is diffed. Exclusions match `table` or `schema.table`.
    pub fn includes(&self, table: &QualifiedName) -> bool {
        let name = table.table_str();
        if TRACKING_TABLES.iter().any(|t| t.eq_ignore_ascii_case(name)) {
            return false;
        }
        if !self.schemas.iter().any(|s| s == table.schema()) {
            return false;
        }
        let qualified = format!("{}.{}", table.schema(), name);
        !self.exclude.iter().any(|e| *e == name || *e == qualified)
    }

    fn tables(&self, snapshot: &SchemaSnapshot) -> Collection<TableDefinition> {
        let mut tables = Collection::new();
        for table in snapshot.tables() {
            if self.includes(&table.qualified_name()) {
                tables.push(table.clone());
            } else {
                tracing::trace!(table = %table.qualified_name(), "out of scope");
            }
        }
        tables
    }
}

// =============================================================================
// Diff
// =============================================================================

/// Compare two snapshots
pub fn diff_snapshots(old: &SchemaSnapshot, new: &SchemaSnapshot, scope: &DiffScope) -> ChangeSet {
    let left = scope.tables(old);
    let right = scope.tables(new);

    let mut entries = Vec::new();
    let mut ambiguities = Vec::new();

    for diff in diff_collections(&left, &right) {
        match (diff.change, diff.left, diff.right) {
            (ChangeKind::Create, _, Some(table)) => create_table(&mut entries, table),
            (ChangeKind::Drop, Some(table), _) => {
                entries.push(ChangeEntry::drop(diff.key, table));
            }
            (ChangeKind::Alter, Some(before), Some(after)) => {
                alter_table(&mut entries, &mut ambiguities, before, after);
            }
            _ => {}
        }
    }

    detect_table_renames(&left, &right, &mut ambiguities);

    for ambiguity in &ambiguities {
        tracing::warn!("{ambiguity}");
    }
    tracing::debug!(
        entries = entries.len(),
        ambiguities = ambiguities.len(),
        "diffed snapshots"
    );

    ChangeSet::from_parts(entries, ambiguities)
}

fn create_table(entries: &mut Vec<ChangeEntry>, table: TableDefinition) {
    let name = table.qualified_name();
    for index in snapshot::members(&table.indexes).iter_sorted() {
        entries.push(ChangeEntry::create(name.child(&index.name), index.clone()));
    }
    for unique in snapshot::members(&table.uniques).iter_sorted() {
        entries.push(ChangeEntry::create(name.child(&unique.name), unique.clone()));
    }
    for policy in snapshot::members(&table.policies).iter_sorted() {
        entries.push(ChangeEntry::create(name.child(&policy.name), policy.clone()));
    }
    entries.push(ChangeEntry::create(name, table));
}

fn alter_table(
    entries: &mut Vec<ChangeEntry>,
    ambiguities: &mut Vec<Ambiguity>,
    before: TableDefinition,
    after: TableDefinition,
) {
    let name = before.qualified_name();

    let columns = diff_collections(
        &snapshot::members(&before.columns),
        &snapshot::members(&after.columns),
    );
    let dropped: BTreeSet<&str> = columns
        .iter()
        .filter(|d| d.change == ChangeKind::Drop)
        .map(|d| d.key.as_str())
        .collect();

    detect_column_changes(&name, &columns, ambiguities);

    let mut members = Vec::new();
    push_member_diffs(&name, &columns, &dropped, &mut members);
    push_member_diffs(
        &name,
        &diff_collections(&snapshot::members(&before.indexes), &snapshot::members(&after.indexes)),
        &dropped,
        &mut members,
    );
    push_member_diffs(
        &name,
        &diff_collections(&snapshot::members(&before.uniques), &snapshot::members(&after.uniques)),
        &dropped,
        &mut members,
    );
    push_member_diffs(
        &name,
        &diff_collections(
            &snapshot::members(&before.policies),
            &snapshot::members(&after.policies),
        ),
        &dropped,
        &mut members,
    );

    if !before.same_shell(&after) {
        entries.push(ChangeEntry::alter(name, before, after));
    }
    entries.extend(members);
}

/// Turn member diffs into entries, skipping removed members that reference a
/// dropped column (they go away with the column)
fn push_member_diffs<E>(
    table: &QualifiedName,
    diffs: &[EntityDiff<E>],
    dropped_columns: &BTreeSet<&str>,
    out: &mut Vec<ChangeEntry>,
) where
    E: Entity<Key = String> + Into<SchemaObject>,
{
    for diff in diffs {
        let target = table.child(&diff.key);
        let entry = match (diff.change, &diff.left, &diff.right) {
            (ChangeKind::Create, _, Some(after)) => ChangeEntry::create(target, after.clone()),
            (ChangeKind::Drop, Some(before), _) => {
                let before: SchemaObject = before.clone().into();
                if let Some(column) = dropped_columns
                    .iter()
                    .find(|c| before.references_column(c))
                {
                    tracing::debug!(%target, column, "removed with dropped column");
                    continue;
                }
                ChangeEntry::drop(target, before)
            }
            (ChangeKind::Alter, Some(before), Some(after)) => {
                ChangeEntry::alter(target, before.clone(), after.clone())
            }
            _ => continue,
        };
        out.push(entry);
    }
}

// =============================================================================
// Ambiguities
// =============================================================================

fn detect_column_changes(
    table: &QualifiedName,
    columns: &[EntityDiff<Column>],
    out: &mut Vec<Ambiguity>,
) {
    let dropped: Vec<&Column> = columns
        .iter()
        .filter(|d| d.change == ChangeKind::Drop)
        .filter_map(|d| d.left.as_ref())
        .collect();
    let created: Vec<&Column> = columns
        .iter()
        .filter(|d| d.change == ChangeKind::Create)
        .filter_map(|d| d.right.as_ref())
        .collect();

    for from in &dropped {
        for to in created.iter().filter(|to| from.same_shape(to)) {
            out.push(Ambiguity::PossibleRename {
                kind: ObjectKind::Column,
                from: table.child(&from.name),
                to: table.child(&to.name),
            });
        }
    }

    for diff in columns.iter().filter(|d| d.change == ChangeKind::Alter) {
        if let (Some(from), Some(to)) = (&diff.left, &diff.right)
            && from.sql_type != to.sql_type
        {
            out.push(Ambiguity::TypeChange {
                column: table.child(&diff.key),
                from: from.sql_type.clone(),
                to: to.sql_type.clone(),
            });
        }
    }
}

fn detect_table_renames(
    left: &Collection<TableDefinition>,
    right: &Collection<TableDefinition>,
    out: &mut Vec<Ambiguity>,
) {
    for from in left.iter_sorted().filter(|t| !right.contains(&t.key())) {
        for to in right
            .iter_sorted()
            .filter(|t| !left.contains(&t.key()) && t.schema == from.schema)
        {
            if from.same_columns(to) {
                out.push(Ambiguity::PossibleRename {
                    kind: ObjectKind::Table,
                    from: from.qualified_name(),
                    to: to.qualified_name(),
                });
            }
        }
    }
}
