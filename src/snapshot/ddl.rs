//! Schema object types held by a snapshot
//!
//! Each table carries its own members. Members reference columns by name;
//! index entries and policy expressions may be arbitrary SQL, so column
//! references inside them are found by identifier scanning.

use crate::traits::{Entity, ObjectKind, QualifiedName};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

pub const DEFAULT_SCHEMA: &str = "public";

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

/// Quoted identifiers (`"a""b"`) or bare identifiers
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""((?:[^"]|"")+)"|([A-Za-z_][A-Za-z0-9_$]*)"#).expect("valid identifier pattern")
});

/// Whether a SQL fragment mentions `ident` as an identifier.
///
/// Bare identifiers compare case-insensitively (Postgres folds them), quoted
/// ones compare exactly. String literals are not skipped.
pub fn mentions_identifier(sql: &str, ident: &str) -> bool {
    IDENTIFIER.captures_iter(sql).any(|caps| {
        if let Some(quoted) = caps.get(1) {
            quoted.as_str().replace("\"\"", "\"") == ident
        } else if let Some(bare) = caps.get(2) {
            bare.as_str().eq_ignore_ascii_case(ident)
        } else {
            false
        }
    })
}

// =============================================================================
// Members
// =============================================================================

/// Column entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Column {
    pub name: String,
    #[serde(rename = "type")]
    pub sql_type: String,
    #[serde(default)]
    pub not_null: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Same definition apart from the name
    pub fn same_shape(&self, other: &Column) -> bool {
        self.sql_type == other.sql_type
            && self.not_null == other.not_null
            && self.default == other.default
    }
}

/// Primary key constraint
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PrimaryKey {
    pub name: String,
    pub columns: Vec<String>,
}

impl PrimaryKey {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

/// Index entity. Entries in `columns` are column names or SQL expressions.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Index {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r#where: Option<String>,
}

impl Index {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            unique: false,
            method: None,
            r#where: None,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn references_column(&self, column: &str) -> bool {
        self.columns
            .iter()
            .chain(self.r#where.iter())
            .any(|expr| mentions_identifier(expr, column))
    }
}

/// Unique constraint entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UniqueConstraint {
    pub name: String,
    pub columns: Vec<String>,
    #[serde(default)]
    pub nulls_not_distinct: bool,
}

impl UniqueConstraint {
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            nulls_not_distinct: false,
        }
    }

    pub fn references_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

/// Row-level security policy entity
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Policy {
    pub name: String,
    /// `permissive` or `restrictive`
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub as_clause: Option<String>,
    /// `all`, `select`, `insert`, `update` or `delete`
    #[serde(rename = "for", default, skip_serializing_if = "Option::is_none")]
    pub for_clause: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub using: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_check: Option<String>,
}

impl Policy {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            as_clause: None,
            for_clause: None,
            to: Vec::new(),
            using: None,
            with_check: None,
        }
    }

    pub fn for_clause(mut self, command: impl Into<String>) -> Self {
        self.for_clause = Some(command.into());
        self
    }

    pub fn to_role(mut self, role: impl Into<String>) -> Self {
        self.to.push(role.into());
        self
    }

    pub fn using(mut self, expr: impl Into<String>) -> Self {
        self.using = Some(expr.into());
        self
    }

    pub fn with_check(mut self, expr: impl Into<String>) -> Self {
        self.with_check = Some(expr.into());
        self
    }

    pub fn references_column(&self, column: &str) -> bool {
        self.using
            .iter()
            .chain(self.with_check.iter())
            .any(|expr| mentions_identifier(expr, column))
    }
}

// =============================================================================
// Tables
// =============================================================================

/// Table entity with all of its members
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TableDefinition {
    #[serde(default = "default_schema")]
    pub schema: String,
    pub name: String,
    #[serde(default)]
    pub rls_enabled: bool,
    #[serde(default)]
    pub columns: Vec<Column>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<PrimaryKey>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(default)]
    pub uniques: Vec<UniqueConstraint>,
    #[serde(default)]
    pub policies: Vec<Policy>,
}

impl TableDefinition {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            rls_enabled: false,
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            uniques: Vec::new(),
            policies: Vec::new(),
        }
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn primary_key(mut self, pk: PrimaryKey) -> Self {
        self.primary_key = Some(pk);
        self
    }

    pub fn index(mut self, index: Index) -> Self {
        self.indexes.push(index);
        self
    }

    pub fn unique(mut self, unique: UniqueConstraint) -> Self {
        self.uniques.push(unique);
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policies.push(policy);
        self
    }

    pub fn enable_rls(mut self) -> Self {
        self.rls_enabled = true;
        self
    }

    pub fn qualified_name(&self) -> QualifiedName {
        QualifiedName::table(&self.schema, &self.name)
    }

    pub fn find_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Table-level attributes (primary key, RLS) are equal
    pub fn same_shell(&self, other: &TableDefinition) -> bool {
        self.primary_key == other.primary_key && self.rls_enabled == other.rls_enabled
    }

    /// Column definitions equal pairwise, ignoring the table name
    pub fn same_columns(&self, other: &TableDefinition) -> bool {
        self.columns.len() == other.columns.len()
            && self.columns.iter().zip(&other.columns).all(|(a, b)| a == b)
    }
}

// =============================================================================
// Entity Trait Implementations
// =============================================================================

impl Entity for TableDefinition {
    const KIND: ObjectKind = ObjectKind::Table;
    type Key = QualifiedName;

    fn key(&self) -> QualifiedName {
        self.qualified_name()
    }
}

macro_rules! member_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: ObjectKind = $kind;
            type Key = String;

            fn key(&self) -> String {
                self.name.clone()
            }
        }
    };
}

member_entity!(Column, ObjectKind::Column);
member_entity!(Index, ObjectKind::Index);
member_entity!(UniqueConstraint, ObjectKind::Unique);
member_entity!(Policy, ObjectKind::Policy);
