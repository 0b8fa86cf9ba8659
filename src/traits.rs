//! Core traits for schema objects
//!
//! - `ObjectKind` - discriminator for the kinds of object a change can target
//! - `QualifiedName` - `schema.table[.member]` identifier, ordered component-wise
//! - `Entity` - trait for schema objects with a const KIND and a registry key
//! - `ChangeKind` - create / alter / drop

use std::cmp::Ordering;
use std::fmt;

// =============================================================================
// Object Kinds
// =============================================================================

/// Schema object kind discriminator.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ObjectKind {
    Table = 0,
    Column = 1,
    Index = 2,
    Unique = 3,
    Policy = 4,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 5] = [
        Self::Table,
        Self::Column,
        Self::Index,
        Self::Unique,
        Self::Policy,
    ];

    /// Plural name, matching the snapshot JSON collection keys
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Table => "tables",
            Self::Column => "columns",
            Self::Index => "indexes",
            Self::Unique => "uniques",
            Self::Policy => "policies",
        }
    }

    /// Singular name used in changelog comments and log lines
    pub const fn label(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Column => "column",
            Self::Index => "index",
            Self::Unique => "unique constraint",
            Self::Policy => "policy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "tables" => Some(Self::Table),
            "columns" => Some(Self::Column),
            "indexes" => Some(Self::Index),
            "uniques" => Some(Self::Unique),
            "policies" => Some(Self::Policy),
            _ => None,
        }
    }

    /// Objects that live on a table and die with it
    pub const fn is_table_dependent(self) -> bool {
        matches!(self, Self::Index | Self::Unique | Self::Policy)
    }

    /// Objects backed by a schema-wide relation name
    pub const fn is_relation(self) -> bool {
        matches!(self, Self::Index | Self::Unique)
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(())
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Qualified Names
// =============================================================================

/// Fully qualified identifier of a table or of a member of a table.
///
/// Ordering compares schema, then table, then member (a bare table sorts
/// before any of its members), which keeps generated changelogs stable.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QualifiedName {
    schema: String,
    table: String,
    member: Option<String>,
}

impl QualifiedName {
    pub fn table(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            member: None,
        }
    }

    pub fn member(
        schema: impl Into<String>,
        table: impl Into<String>,
        member: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
            member: Some(member.into()),
        }
    }

    /// Qualify a member name under this table
    pub fn child(&self, member: impl Into<String>) -> Self {
        Self::member(self.schema.clone(), self.table.clone(), member)
    }

    /// The owning table (itself, for a table name)
    pub fn table_name(&self) -> Self {
        Self::table(self.schema.clone(), self.table.clone())
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table_str(&self) -> &str {
        &self.table
    }

    pub fn member_str(&self) -> Option<&str> {
        self.member.as_deref()
    }

    /// Last component: the member name, or the table name for a table
    pub fn leaf(&self) -> &str {
        self.member.as_deref().unwrap_or(&self.table)
    }

    pub fn is_table(&self) -> bool {
        self.member.is_none()
    }
}

impl Ord for QualifiedName {
    fn cmp(&self, other: &Self) -> Ordering {
        self.schema
            .cmp(&other.schema)
            .then_with(|| self.table.cmp(&other.table))
            .then_with(|| self.member.cmp(&other.member))
    }
}

impl PartialOrd for QualifiedName {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.member {
            Some(member) => write!(f, "{}.{}.{}", self.schema, self.table, member),
            None => write!(f, "{}.{}", self.schema, self.table),
        }
    }
}

// =============================================================================
// Entity Trait
// =============================================================================

/// Trait for schema objects stored in a [`Collection`](crate::collection::Collection).
///
/// Tables are keyed by their qualified name; members of a table (columns,
/// indexes, uniques, policies) are keyed by their name within the table.
pub trait Entity: Clone + PartialEq {
    /// The object kind (discriminator)
    const KIND: ObjectKind;

    /// Registry key type
    type Key: Ord + Clone + fmt::Debug + fmt::Display;

    /// Get the unique key for this entity
    fn key(&self) -> Self::Key;
}

// =============================================================================
// Change Kinds
// =============================================================================

/// Change operation type.
///
/// The derived ordering (drop, alter, create) is the tie-break used when two
/// entries target the same identifier.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChangeKind {
    Drop,
    Alter,
    Create,
}

impl ChangeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Alter => "alter",
            Self::Create => "create",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
