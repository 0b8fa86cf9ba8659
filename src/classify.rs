//! Change classifier
//!
//! Applies the `[diff]` policy flags to a raw change set, synthesizes drops for
//! orphaned dependents, and puts the result in dependency order.

use crate::change::{ChangeEntry, ChangeSet, Classification, SchemaObject};
use crate::config::DiffOptions;
use crate::order::dependency_order;
use crate::snapshot::{SchemaSnapshot, TableDefinition};
use crate::traits::{ChangeKind, ObjectKind, QualifiedName};
use std::collections::BTreeSet;

/// Filter, complete and order a change set
pub fn classify(changes: ChangeSet, old: &SchemaSnapshot, options: &DiffOptions) -> ChangeSet {
    let (entries, ambiguities) = changes.into_parts();
    let mut entries = apply_policy_flags(entries, options);

    let orphans = orphans(&mut entries, old, options);
    entries.extend(orphans);

    let mut entries = dependency_order(entries);
    settle_implicit(&mut entries);
    tracing::debug!(entries = entries.len(), "classified changes");
    ChangeSet::from_parts(entries, ambiguities)
}

/// Risk of a single entry
pub fn classification(entry: &ChangeEntry) -> Classification {
    match entry.change {
        ChangeKind::Create => Classification::Additive,
        ChangeKind::Drop => Classification::Destructive,
        ChangeKind::Alter => match (&entry.before, &entry.after) {
            (Some(SchemaObject::Column(from)), Some(SchemaObject::Column(to)))
                if from.sql_type != to.sql_type || (!from.not_null && to.not_null) =>
            {
                Classification::Ambiguous
            }
            _ if entry.kind.is_table_dependent() => Classification::Ambiguous,
            _ => Classification::Additive,
        },
    }
}

// =============================================================================
// Policy Flags
// =============================================================================

fn apply_policy_flags(entries: Vec<ChangeEntry>, options: &DiffOptions) -> Vec<ChangeEntry> {
    entries
        .into_iter()
        .filter_map(|entry| {
            if entry.kind == ObjectKind::Policy {
                if !options.include_policies {
                    tracing::debug!(%entry, "policies excluded");
                    return None;
                }
                if !options.modify_policies && entry.change == ChangeKind::Alter {
                    tracing::debug!(%entry, "policy modification suppressed");
                    return None;
                }
                return Some(entry);
            }
            if !options.include_policies && entry.is(ChangeKind::Alter, ObjectKind::Table) {
                return without_rls_change(entry);
            }
            if !options.include_policies && entry.is(ChangeKind::Create, ObjectKind::Table) {
                return Some(without_rls(entry));
            }
            Some(entry)
        })
        .collect()
}

/// Drop a table alter's RLS difference; `None` when nothing else changed
fn without_rls_change(mut entry: ChangeEntry) -> Option<ChangeEntry> {
    if let (Some(SchemaObject::Table(before)), Some(SchemaObject::Table(after))) =
        (&entry.before, &mut entry.after)
    {
        after.rls_enabled = before.rls_enabled;
        if before.same_shell(after) {
            tracing::debug!(table = %entry.target, "row level security change excluded");
            return None;
        }
    }
    Some(entry)
}

/// Create a table without row level security
fn without_rls(mut entry: ChangeEntry) -> ChangeEntry {
    if let Some(SchemaObject::Table(table)) = &mut entry.after
        && table.rls_enabled
    {
        tracing::debug!(table = %entry.target, "row level security excluded");
        table.rls_enabled = false;
    }
    entry
}

// =============================================================================
// Orphans
// =============================================================================

/// Dependents left without an entry by a table or column drop.
///
/// Returns the synthesized drops for kinds whose `dropOrphan*` flag is set.
/// The rest are recorded on every drop that removes them; see
/// [`settle_implicit`].
fn orphans(
    entries: &mut [ChangeEntry],
    old: &SchemaSnapshot,
    options: &DiffOptions,
) -> Vec<ChangeEntry> {
    let explicit: BTreeSet<(QualifiedName, ObjectKind)> =
        entries.iter().map(|e| (e.target.clone(), e.kind)).collect();

    let mut seen = BTreeSet::new();
    let mut out = Vec::new();

    for entry in entries.iter_mut().filter(|e| e.change == ChangeKind::Drop) {
        let Some(table) = old.table(&entry.table()) else {
            continue;
        };
        let members: Vec<SchemaObject> = match entry.kind {
            ObjectKind::Table => dependents(table).collect(),
            ObjectKind::Column => {
                let column = entry.target.leaf();
                dependents(table)
                    .filter(|m| m.references_column(column))
                    .collect()
            }
            _ => continue,
        };

        for member in members {
            let target = table.qualified_name().child(member.name());
            let kind = member.kind();
            if explicit.contains(&(target.clone(), kind)) {
                continue;
            }
            if kind == ObjectKind::Policy && !options.include_policies {
                continue;
            }
            if options.drops_orphans(kind) {
                if seen.insert((target.clone(), kind)) {
                    tracing::debug!(%target, cause = %entry.target, "dropping orphaned {}", kind.label());
                    out.push(ChangeEntry::drop(target, member).orphan());
                }
            } else {
                entry.implicit.push(member);
            }
        }
    }

    out
}

/// Keep each implicit dependent only on the first drop that removes it, so
/// rollbacks (which run in reverse) recreate it once, after all of its
/// columns are back
fn settle_implicit(entries: &mut [ChangeEntry]) {
    let mut seen = BTreeSet::new();
    for entry in entries.iter_mut() {
        let table = entry.table();
        let cause = entry.target.clone();
        entry.implicit.retain(|member| {
            let target = table.child(member.name());
            if !seen.insert((target.clone(), member.kind())) {
                return false;
            }
            tracing::warn!(
                "{} '{}' is left to be removed implicitly with '{}'",
                member.kind().label(),
                target,
                cause
            );
            true
        });
    }
}

fn dependents(table: &TableDefinition) -> impl Iterator<Item = SchemaObject> + '_ {
    let indexes = table.indexes.iter().cloned().map(SchemaObject::from);
    let uniques = table.uniques.iter().cloned().map(SchemaObject::from);
    let policies = table.policies.iter().cloned().map(SchemaObject::from);
    indexes.chain(uniques).chain(policies)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::Origin;
    use crate::diff::{DiffScope, diff_snapshots};
    use crate::snapshot::{Column, Index, Policy, PrimaryKey, UniqueConstraint};

    fn users() -> TableDefinition {
        TableDefinition::new("public", "users")
            .column(Column::new("id", "serial").not_null())
            .column(Column::new("email", "text"))
            .primary_key(PrimaryKey::new("users_pkey", ["id"]))
            .index(Index::new("users_email_idx", ["email"]))
            .index(Index::new("users_id_email_idx", ["id", "email"]))
    }

    fn run(old: TableDefinition, new: Option<TableDefinition>, options: DiffOptions) -> ChangeSet {
        let old = SchemaSnapshot::from_tables([old]).unwrap();
        let new = SchemaSnapshot::from_tables(new).unwrap();
        let raw = diff_snapshots(&old, &new, &DiffScope::default());
        classify(raw, &old, &options)
    }

    fn rendered(set: &ChangeSet) -> Vec<String> {
        set.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_orphan_indexes_dropped_before_table() {
        let options = DiffOptions {
            drop_orphan_indexes: true,
            ..Default::default()
        };
        let set = run(users(), None, options);
        assert_eq!(
            rendered(&set),
            [
                "drop index public.users.users_email_idx (orphan)",
                "drop index public.users.users_id_email_idx (orphan)",
                "drop table public.users",
            ]
        );
        assert!(set.iter().take(2).all(|e| e.origin == Origin::Orphan));
    }

    #[test]
    fn test_orphans_implicit_by_default() {
        let set = run(users(), None, DiffOptions::default());
        assert_eq!(rendered(&set), ["drop table public.users"]);
    }

    #[test]
    fn test_orphans_of_dropped_column() {
        let before = users()
            .column(Column::new("owner_id", "int"))
            .unique(UniqueConstraint::new("users_owner_key", ["owner_id"]))
            .policy(Policy::new("own").using("owner_id = auth.uid()"));
        let options = DiffOptions {
            drop_orphan_uniques: true,
            drop_orphan_policies: true,
            ..Default::default()
        };
        let set = run(before, Some(users()), options);
        assert_eq!(
            rendered(&set),
            [
                "drop policy public.users.own (orphan)",
                "drop unique constraint public.users.users_owner_key (orphan)",
                "drop column public.users.owner_id",
            ]
        );
    }

    #[test]
    fn test_policy_orphans_need_policies() {
        let before = users().policy(Policy::new("own").using("id = 1"));
        let options = DiffOptions {
            include_policies: false,
            drop_orphan_policies: true,
            ..Default::default()
        };
        let set = run(before, None, options);
        assert_eq!(rendered(&set), ["drop table public.users"]);
    }

    #[test]
    fn test_policy_only_changes_suppressed() {
        let before = users().policy(Policy::new("own").using("id = 1"));
        let after = users()
            .enable_rls()
            .policy(Policy::new("own").using("id = 2"))
            .policy(Policy::new("admin").using("true"));
        let options = DiffOptions {
            include_policies: false,
            ..Default::default()
        };
        assert!(run(before, Some(after), options).is_empty());
    }

    #[test]
    fn test_rls_stripped_from_mixed_alter() {
        let mut after = users().enable_rls();
        after.primary_key = Some(PrimaryKey::new("users_pkey", ["id", "email"]));
        let options = DiffOptions {
            include_policies: false,
            ..Default::default()
        };
        let set = run(users(), Some(after), options);
        assert_eq!(set.len(), 1);
        let Some(SchemaObject::Table(table)) = &set.entries()[0].after else {
            panic!("expected table state");
        };
        assert!(!table.rls_enabled);
    }

    #[test]
    fn test_rls_stripped_from_created_table() {
        let old = SchemaSnapshot::empty();
        let new = SchemaSnapshot::from_tables([users().enable_rls()]).unwrap();
        let options = DiffOptions {
            include_policies: false,
            ..Default::default()
        };
        let set = classify(diff_snapshots(&old, &new, &DiffScope::default()), &old, &options);
        let created = set
            .iter()
            .find(|e| e.is(ChangeKind::Create, ObjectKind::Table))
            .unwrap();
        let Some(SchemaObject::Table(table)) = &created.after else {
            panic!("expected table state");
        };
        assert!(!table.rls_enabled);

        let kept = classify(
            diff_snapshots(&old, &new, &DiffScope::default()),
            &old,
            &DiffOptions::default(),
        );
        let created = kept
            .iter()
            .find(|e| e.is(ChangeKind::Create, ObjectKind::Table))
            .unwrap();
        assert!(matches!(&created.after, Some(SchemaObject::Table(t)) if t.rls_enabled));
    }

    #[test]
    fn test_implicit_dependents_recorded_on_drop() {
        let set = run(users(), None, DiffOptions::default());
        let names: Vec<&str> = set.entries()[0].implicit.iter().map(SchemaObject::name).collect();
        assert_eq!(names, ["users_email_idx", "users_id_email_idx"]);

        let options = DiffOptions {
            drop_orphan_indexes: true,
            ..Default::default()
        };
        let set = run(users(), None, options);
        assert!(set.iter().all(|e| e.implicit.is_empty()));
    }

    #[test]
    fn test_shared_implicit_dependent_kept_once() {
        let before = users()
            .column(Column::new("a", "int"))
            .column(Column::new("b", "int"))
            .index(Index::new("users_a_b_idx", ["a", "b"]));
        let set = run(before, Some(users()), DiffOptions::default());
        assert_eq!(
            rendered(&set),
            ["drop column public.users.a", "drop column public.users.b"]
        );
        assert_eq!(set.entries()[0].implicit.len(), 1);
        assert!(set.entries()[1].implicit.is_empty());
    }

    #[test]
    fn test_modify_policies_false_keeps_create_and_drop() {
        let before = users()
            .policy(Policy::new("changed").using("id = 1"))
            .policy(Policy::new("removed").using("true"));
        let after = users()
            .policy(Policy::new("changed").using("id = 2"))
            .policy(Policy::new("added").using("true"));
        let options = DiffOptions {
            modify_policies: false,
            ..Default::default()
        };
        let set = run(before, Some(after), options);
        assert_eq!(
            rendered(&set),
            [
                "create policy public.users.added",
                "drop policy public.users.removed",
            ]
        );
    }

    #[test]
    fn test_classification() {
        let target = QualifiedName::member("public", "users", "age");
        let create = ChangeEntry::create(target.clone(), Column::new("age", "int"));
        let drop = ChangeEntry::drop(target.clone(), Column::new("age", "int"));
        let retype = ChangeEntry::alter(
            target.clone(),
            Column::new("age", "text"),
            Column::new("age", "int"),
        );
        let set_not_null = ChangeEntry::alter(
            target.clone(),
            Column::new("age", "int"),
            Column::new("age", "int").not_null(),
        );
        let add_default = ChangeEntry::alter(
            target.clone(),
            Column::new("age", "int"),
            Column::new("age", "int").default_value("0"),
        );
        let drop_not_null = ChangeEntry::alter(
            target,
            Column::new("age", "int").not_null(),
            Column::new("age", "int"),
        );
        let index = ChangeEntry::alter(
            QualifiedName::member("public", "users", "idx"),
            Index::new("idx", ["a"]),
            Index::new("idx", ["a", "b"]),
        );

        assert_eq!(create.classification(), Classification::Additive);
        assert_eq!(drop.classification(), Classification::Destructive);
        assert_eq!(retype.classification(), Classification::Ambiguous);
        assert_eq!(set_not_null.classification(), Classification::Ambiguous);
        assert_eq!(add_default.classification(), Classification::Additive);
        assert_eq!(drop_not_null.classification(), Classification::Additive);
        assert_eq!(index.classification(), Classification::Ambiguous);
    }
}
