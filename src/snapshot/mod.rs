//! Schema snapshots
//!
//! A [`SchemaSnapshot`] is the immutable, point-in-time structure of a schema.
//! Two of them (previous and current) feed the diff engine. Snapshots are
//! produced by an external introspection step and exchanged as JSON:
//!
//! ```json
//! {
//!   "version": "1",
//!   "tables": [
//!     {
//!       "schema": "public",
//!       "name": "users",
//!       "columns": [{ "name": "id", "type": "serial", "notNull": true }],
//!       "primaryKey": { "name": "users_pkey", "columns": ["id"] }
//!     }
//!   ]
//! }
//! ```

pub mod ddl;
pub mod error;
pub mod loader;

pub use ddl::{
    Column, DEFAULT_SCHEMA, Index, Policy, PrimaryKey, TableDefinition, UniqueConstraint,
};
pub use error::SnapshotError;
pub use loader::{JsonSnapshotLoader, SnapshotLoader};

use crate::collection::Collection;
use crate::traits::{Entity, QualifiedName};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current snapshot format version
pub const SNAPSHOT_VERSION: &str = "1";

fn default_version() -> String {
    SNAPSHOT_VERSION.to_string()
}

/// Serialized form of a snapshot
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct RawSnapshot {
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    tables: Vec<TableDefinition>,
}

/// Immutable schema snapshot: tables registered by qualified name.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(try_from = "RawSnapshot", into = "RawSnapshot")]
pub struct SchemaSnapshot {
    tables: Collection<TableDefinition>,
}

impl SchemaSnapshot {
    /// A snapshot with no tables (the state before the first migration)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a snapshot, rejecting duplicate or empty identifiers
    pub fn from_tables(
        tables: impl IntoIterator<Item = TableDefinition>,
    ) -> Result<Self, SnapshotError> {
        let tables: Vec<TableDefinition> = tables.into_iter().collect();
        for table in &tables {
            validate_table(table)?;
        }
        let tables =
            Collection::try_from_entities(tables).map_err(SnapshotError::DuplicateTable)?;
        Ok(Self { tables })
    }

    /// Tables in the order the loader produced them
    pub fn tables(&self) -> impl Iterator<Item = &TableDefinition> {
        self.tables.iter()
    }

    pub fn table(&self, name: &QualifiedName) -> Option<&TableDefinition> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &QualifiedName) -> bool {
        self.tables.contains(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        let raw: RawSnapshot = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&RawSnapshot::from(self.clone()))
    }

    /// Load a snapshot file
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SnapshotError::Io(path.to_path_buf(), e))?;
        let raw: RawSnapshot = serde_json::from_str(&contents)
            .map_err(|e| SnapshotError::Parse(path.to_path_buf(), e))?;
        Self::try_from(raw)
    }
}

impl TryFrom<RawSnapshot> for SchemaSnapshot {
    type Error = SnapshotError;

    fn try_from(raw: RawSnapshot) -> Result<Self, Self::Error> {
        if raw.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(raw.version));
        }
        Self::from_tables(raw.tables)
    }
}

impl From<SchemaSnapshot> for RawSnapshot {
    fn from(snapshot: SchemaSnapshot) -> Self {
        Self {
            version: default_version(),
            tables: snapshot.tables.into_vec(),
        }
    }
}

fn validate_table(table: &TableDefinition) -> Result<(), SnapshotError> {
    if table.schema.is_empty() || table.name.is_empty() {
        return Err(SnapshotError::EmptyIdentifier(format!(
            "table '{}.{}'",
            table.schema, table.name
        )));
    }

    let name = table.qualified_name();
    unique_members(&name, &table.columns)?;
    unique_members(&name, &table.indexes)?;
    unique_members(&name, &table.uniques)?;
    unique_members(&name, &table.policies)?;
    Ok(())
}

fn unique_members<E>(table: &QualifiedName, members: &[E]) -> Result<(), SnapshotError>
where
    E: Entity<Key = String>,
{
    if members.iter().any(|m| m.key().is_empty()) {
        return Err(SnapshotError::EmptyIdentifier(format!(
            "{} on table '{}'",
            E::KIND.label(),
            table
        )));
    }
    Collection::try_from_entities(members.iter().cloned())
        .map(|_| ())
        .map_err(|name| SnapshotError::DuplicateMember {
            table: table.clone(),
            kind: E::KIND,
            name,
        })
}

/// A table's members as a registry
pub(crate) fn members<E: Entity>(items: &[E]) -> Collection<E> {
    let mut collection = Collection::new();
    for item in items {
        collection.push(item.clone());
    }
    collection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::ObjectKind;

    fn users() -> TableDefinition {
        TableDefinition::new("public", "users")
            .column(Column::new("id", "serial").not_null())
            .column(Column::new("email", "text"))
            .primary_key(PrimaryKey::new("users_pkey", ["id"]))
    }

    #[test]
    fn test_empty_snapshot() {
        let snapshot = SchemaSnapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.len(), 0);
    }

    #[test]
    fn test_lookup_by_qualified_name() {
        let snapshot = SchemaSnapshot::from_tables([users()]).unwrap();
        let table = snapshot.table(&QualifiedName::table("public", "users")).unwrap();
        assert_eq!(table.columns.len(), 2);
        assert!(snapshot.table(&QualifiedName::table("auth", "users")).is_none());
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let err = SchemaSnapshot::from_tables([users(), users()]).unwrap_err();
        assert!(matches!(err, SnapshotError::DuplicateTable(name) if name.to_string() == "public.users"));
    }

    #[test]
    fn test_same_name_in_other_schema_allowed() {
        let mut other = users();
        other.schema = "auth".into();
        let snapshot = SchemaSnapshot::from_tables([users(), other]).unwrap();
        assert_eq!(snapshot.len(), 2);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let table = users().column(Column::new("email", "varchar"));
        let err = SchemaSnapshot::from_tables([table]).unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::DuplicateMember { kind: ObjectKind::Column, ref name, .. } if name == "email"
        ));
    }

    #[test]
    fn test_json_round_trip_preserves_structure() {
        let snapshot = SchemaSnapshot::from_tables([users()]).unwrap();
        let json = snapshot.to_json().unwrap();
        assert!(json.contains("\"version\": \"1\""));
        assert_eq!(SchemaSnapshot::from_json(&json).unwrap(), snapshot);
    }

    #[test]
    fn test_unsupported_version() {
        let err = SchemaSnapshot::from_json(r#"{ "version": "7", "tables": [] }"#).unwrap_err();
        assert!(matches!(err, SnapshotError::UnsupportedVersion(v) if v == "7"));
    }

    #[test]
    fn test_serde_deserialize_validates() {
        let json = r#"{ "tables": [{ "name": "a" }, { "name": "a" }] }"#;
        let result: Result<SchemaSnapshot, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
