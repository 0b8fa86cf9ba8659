//! Change entries and change sets
//!
//! A [`ChangeEntry`] is one atomic schema change with its before and after
//! state. A [`ChangeSet`] is the ordered sequence of entries produced by the
//! diff engine and refined by the classifier, together with the ambiguities
//! found along the way.

use crate::snapshot::{Column, Index, Policy, TableDefinition, UniqueConstraint};
use crate::traits::{ChangeKind, ObjectKind, QualifiedName};
use std::fmt;

// =============================================================================
// Schema Objects
// =============================================================================

/// Before or after state of a change
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SchemaObject {
    Table(TableDefinition),
    Column(Column),
    Index(Index),
    Unique(UniqueConstraint),
    Policy(Policy),
}

impl SchemaObject {
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Table(_) => ObjectKind::Table,
            Self::Column(_) => ObjectKind::Column,
            Self::Index(_) => ObjectKind::Index,
            Self::Unique(_) => ObjectKind::Unique,
            Self::Policy(_) => ObjectKind::Policy,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Table(t) => &t.name,
            Self::Column(c) => &c.name,
            Self::Index(i) => &i.name,
            Self::Unique(u) => &u.name,
            Self::Policy(p) => &p.name,
        }
    }

    /// Whether a member references `column` (always false for tables and columns)
    pub fn references_column(&self, column: &str) -> bool {
        match self {
            Self::Index(i) => i.references_column(column),
            Self::Unique(u) => u.references_column(column),
            Self::Policy(p) => p.references_column(column),
            Self::Table(_) | Self::Column(_) => false,
        }
    }
}

macro_rules! schema_object_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for SchemaObject {
                fn from(value: $ty) -> Self {
                    Self::$variant(value)
                }
            }
        )*
    };
}

schema_object_from! {
    TableDefinition => Table,
    Column => Column,
    Index => Index,
    UniqueConstraint => Unique,
    Policy => Policy,
}

// =============================================================================
// Classification
// =============================================================================

/// Risk classification of a change
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Classification {
    /// Safe to apply, no data loss
    Additive,
    /// Loses data or structure
    Destructive,
    /// May fail or change behavior depending on existing data
    Ambiguous,
}

impl Classification {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Additive => "additive",
            Self::Destructive => "destructive",
            Self::Ambiguous => "ambiguous",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an entry came from
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Origin {
    /// Found by comparing the two snapshots
    #[default]
    Diff,
    /// Synthesized by the classifier for a dependent object left behind
    Orphan,
}

// =============================================================================
// Change Entry
// =============================================================================

/// One atomic schema change
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChangeEntry {
    pub change: ChangeKind,
    pub kind: ObjectKind,
    pub target: QualifiedName,
    /// Absent on create
    pub before: Option<SchemaObject>,
    /// Absent on drop
    pub after: Option<SchemaObject>,
    pub origin: Origin,
    /// Indexes, uniques and policies removed along with a table or column
    /// drop that have no entry of their own
    pub implicit: Vec<SchemaObject>,
}

impl ChangeEntry {
    pub fn create(target: QualifiedName, after: impl Into<SchemaObject>) -> Self {
        let after = after.into();
        Self {
            change: ChangeKind::Create,
            kind: after.kind(),
            target,
            before: None,
            after: Some(after),
            origin: Origin::Diff,
            implicit: Vec::new(),
        }
    }

    pub fn drop(target: QualifiedName, before: impl Into<SchemaObject>) -> Self {
        let before = before.into();
        Self {
            change: ChangeKind::Drop,
            kind: before.kind(),
            target,
            before: Some(before),
            after: None,
            origin: Origin::Diff,
            implicit: Vec::new(),
        }
    }

    pub fn alter(
        target: QualifiedName,
        before: impl Into<SchemaObject>,
        after: impl Into<SchemaObject>,
    ) -> Self {
        let before = before.into();
        Self {
            change: ChangeKind::Alter,
            kind: before.kind(),
            target,
            before: Some(before),
            after: Some(after.into()),
            origin: Origin::Diff,
            implicit: Vec::new(),
        }
    }

    pub fn orphan(mut self) -> Self {
        self.origin = Origin::Orphan;
        self
    }

    pub fn classification(&self) -> Classification {
        crate::classify::classification(self)
    }

    /// Names of the relations (indexes and unique constraints) this drop frees
    pub fn freed_relations(&self) -> impl Iterator<Item = &str> {
        let own = (self.change == ChangeKind::Drop && self.kind.is_relation())
            .then(|| self.target.leaf());
        own.into_iter().chain(
            self.implicit
                .iter()
                .filter(|m| m.kind().is_relation())
                .map(SchemaObject::name),
        )
    }

    /// Owning table of the target
    pub fn table(&self) -> QualifiedName {
        self.target.table_name()
    }

    /// Tie-break key: target, then change kind, then object kind
    pub fn sort_key(&self) -> (&QualifiedName, ChangeKind, ObjectKind) {
        (&self.target, self.change, self.kind)
    }

    /// Whether this entry is the given kind of change on the given kind of object
    pub fn is(&self, change: ChangeKind, kind: ObjectKind) -> bool {
        self.change == change && self.kind == kind
    }
}

impl fmt::Display for ChangeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.change, self.kind.label(), self.target)?;
        if self.origin == Origin::Orphan {
            f.write_str(" (orphan)")?;
        }
        Ok(())
    }
}

// =============================================================================
// Ambiguities
// =============================================================================

/// A difference the engine cannot resolve on its own
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ambiguity {
    /// A drop and a create of same-shaped objects, which may be a rename
    PossibleRename {
        kind: ObjectKind,
        from: QualifiedName,
        to: QualifiedName,
    },
    /// A column whose type changed, which may need a data conversion
    TypeChange {
        column: QualifiedName,
        from: String,
        to: String,
    },
}

impl fmt::Display for Ambiguity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PossibleRename { kind, from, to } => write!(
                f,
                "{} '{}' dropped and '{}' created with the same definition; possible rename",
                kind.label(),
                from,
                to
            ),
            Self::TypeChange { column, from, to } => {
                write!(f, "column '{column}' changes type from {from} to {to}")
            }
        }
    }
}

// =============================================================================
// Change Set
// =============================================================================

/// Ordered sequence of change entries
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeSet {
    entries: Vec<ChangeEntry>,
    ambiguities: Vec<Ambiguity>,
}

impl ChangeSet {
    pub fn new(entries: Vec<ChangeEntry>) -> Self {
        Self {
            entries,
            ambiguities: Vec::new(),
        }
    }

    pub fn from_parts(entries: Vec<ChangeEntry>, ambiguities: Vec<Ambiguity>) -> Self {
        Self {
            entries,
            ambiguities,
        }
    }

    pub fn into_parts(self) -> (Vec<ChangeEntry>, Vec<Ambiguity>) {
        (self.entries, self.ambiguities)
    }

    pub fn entries(&self) -> &[ChangeEntry] {
        &self.entries
    }

    pub fn ambiguities(&self) -> &[Ambiguity] {
        &self.ambiguities
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ChangeEntry> {
        self.entries.iter()
    }

    /// Get created objects
    pub fn created(&self) -> Vec<&ChangeEntry> {
        self.with_change(ChangeKind::Create)
    }

    /// Get dropped objects
    pub fn dropped(&self) -> Vec<&ChangeEntry> {
        self.with_change(ChangeKind::Drop)
    }

    /// Get altered objects
    pub fn altered(&self) -> Vec<&ChangeEntry> {
        self.with_change(ChangeKind::Alter)
    }

    /// Get entries filtered by object kind
    pub fn by_kind(&self, kind: ObjectKind) -> Vec<&ChangeEntry> {
        self.entries.iter().filter(|e| e.kind == kind).collect()
    }

    pub fn count(&self, classification: Classification) -> usize {
        self.entries
            .iter()
            .filter(|e| e.classification() == classification)
            .count()
    }

    fn with_change(&self, change: ChangeKind) -> Vec<&ChangeEntry> {
        self.entries.iter().filter(|e| e.change == change).collect()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a ChangeEntry;
    type IntoIter = std::slice::Iter<'a, ChangeEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> QualifiedName {
        QualifiedName::table("public", "users")
    }

    #[test]
    fn test_entry_constructors_set_kind() {
        let create = ChangeEntry::create(users().child("email"), Column::new("email", "text"));
        assert_eq!(create.kind, ObjectKind::Column);
        assert!(create.before.is_none());
        assert!(create.is(ChangeKind::Create, ObjectKind::Column));

        let drop = ChangeEntry::drop(users(), TableDefinition::new("public", "users"));
        assert_eq!(drop.kind, ObjectKind::Table);
        assert!(drop.after.is_none());
        assert_eq!(drop.origin, Origin::Diff);
        assert_eq!(drop.orphan().origin, Origin::Orphan);
    }

    #[test]
    fn test_entry_display() {
        let entry = ChangeEntry::drop(
            users().child("users_email_idx"),
            Index::new("users_email_idx", ["email"]),
        )
        .orphan();
        assert_eq!(
            entry.to_string(),
            "drop index public.users.users_email_idx (orphan)"
        );
    }

    #[test]
    fn test_schema_object_references() {
        let policy: SchemaObject = Policy::new("own").using("owner_id = 1").into();
        assert_eq!(policy.kind(), ObjectKind::Policy);
        assert_eq!(policy.name(), "own");
        assert!(policy.references_column("owner_id"));

        let column: SchemaObject = Column::new("owner_id", "int").into();
        assert!(!column.references_column("owner_id"));
    }

    #[test]
    fn test_change_set_filters() {
        let set = ChangeSet::new(vec![
            ChangeEntry::create(users(), TableDefinition::new("public", "users")),
            ChangeEntry::drop(users().child("old"), Column::new("old", "int")),
        ]);
        assert_eq!(set.len(), 2);
        assert_eq!(set.created().len(), 1);
        assert_eq!(set.dropped().len(), 1);
        assert!(set.altered().is_empty());
        assert_eq!(set.by_kind(ObjectKind::Column).len(), 1);
        assert_eq!(set.count(Classification::Destructive), 1);
    }

    #[test]
    fn test_ambiguity_display() {
        let rename = Ambiguity::PossibleRename {
            kind: ObjectKind::Column,
            from: users().child("name"),
            to: users().child("full_name"),
        };
        assert!(rename.to_string().contains("possible rename"));

        let change = Ambiguity::TypeChange {
            column: users().child("age"),
            from: "text".into(),
            to: "integer".into(),
        };
        assert_eq!(
            change.to_string(),
            "column 'public.users.age' changes type from text to integer"
        );
    }
}
