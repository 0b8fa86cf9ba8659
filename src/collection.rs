//! Generic entity registry
//!
//! `Collection<E>` stores entities in insertion order with an index keyed by
//! `Entity::key`. Snapshots keep their tables in one, and the diff engine
//! builds short-lived collections of table members to compare them.

use crate::traits::{ChangeKind, Entity, ObjectKind};
use std::collections::BTreeMap;

// =============================================================================
// Generic Entity Collection
// =============================================================================

/// Registry for one kind of schema object.
#[derive(Debug, Clone)]
pub struct Collection<E: Entity> {
    entities: Vec<E>,
    index: BTreeMap<E::Key, usize>,
}

impl<E: Entity> Default for Collection<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Entity> PartialEq for Collection<E> {
    fn eq(&self, other: &Self) -> bool {
        self.entities == other.entities
    }
}

impl<E: Entity> Collection<E> {
    /// Create an empty collection
    pub fn new() -> Self {
        Self {
            entities: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    /// Build a collection, returning the first duplicate key on conflict
    pub fn try_from_entities(entities: impl IntoIterator<Item = E>) -> Result<Self, E::Key> {
        let mut collection = Self::new();
        for entity in entities {
            let key = entity.key();
            if !collection.push(entity) {
                return Err(key);
            }
        }
        Ok(collection)
    }

    /// Push an entity, returns true if inserted, false if duplicate key
    pub fn push(&mut self, entity: E) -> bool {
        let key = entity.key();
        if self.index.contains_key(&key) {
            return false;
        }
        self.index.insert(key, self.entities.len());
        self.entities.push(entity);
        true
    }

    /// Get an entity by its key
    pub fn get(&self, key: &E::Key) -> Option<&E> {
        self.index.get(key).map(|&idx| &self.entities[idx])
    }

    /// Check if an entity with the given key exists
    pub fn contains(&self, key: &E::Key) -> bool {
        self.index.contains_key(key)
    }

    /// List all entities in insertion order
    pub fn list(&self) -> &[E] {
        &self.entities
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entities.iter()
    }

    /// Iterate in key order
    pub fn iter_sorted(&self) -> impl Iterator<Item = &E> {
        self.index.values().map(|&idx| &self.entities[idx])
    }

    pub fn into_vec(self) -> Vec<E> {
        self.entities
    }
}

// =============================================================================
// Entity Diff
// =============================================================================

/// A diff entry for any entity type
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDiff<E: Entity> {
    pub change: ChangeKind,
    pub key: E::Key,
    /// Original entity (for Drop/Alter)
    pub left: Option<E>,
    /// New entity (for Create/Alter)
    pub right: Option<E>,
}

impl<E: Entity> EntityDiff<E> {
    pub fn kind(&self) -> ObjectKind {
        E::KIND
    }
}

/// Compute the diff between two collections of the same entity type.
///
/// Results come in key order: drops, then creates, then alters.
pub fn diff_collections<E: Entity>(
    left: &Collection<E>,
    right: &Collection<E>,
) -> Vec<EntityDiff<E>> {
    let mut diffs = Vec::new();

    for entity in left.iter_sorted() {
        let key = entity.key();
        if !right.contains(&key) {
            diffs.push(EntityDiff {
                change: ChangeKind::Drop,
                key,
                left: Some(entity.clone()),
                right: None,
            });
        }
    }

    for entity in right.iter_sorted() {
        let key = entity.key();
        if !left.contains(&key) {
            diffs.push(EntityDiff {
                change: ChangeKind::Create,
                key,
                left: None,
                right: Some(entity.clone()),
            });
        }
    }

    for left_entity in left.iter_sorted() {
        let key = left_entity.key();
        if let Some(right_entity) = right.get(&key)
            && left_entity != right_entity
        {
            diffs.push(EntityDiff {
                change: ChangeKind::Alter,
                key,
                left: Some(left_entity.clone()),
                right: Some(right_entity.clone()),
            });
        }
    }

    diffs
}
