//! The schema accumulator
//!
//! `SchemaTree` is shared by every worker during ingestion. `Schema` is the
//! plain value it freezes into once ingestion has drained, and the type used
//! for nested record fields, which are always published fully built.

use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use std::collections::btree_map::{self, BTreeMap};

use crate::types::FieldSchema;

/// A set of fields keyed by name, iterated in name order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: BTreeMap<String, FieldSchema>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.get(name)
    }

    /// Look a field up by its path from the root, descending through records
    pub fn get_path(&self, path: &[&str]) -> Option<&FieldSchema> {
        let (first, rest) = path.split_first()?;
        let field = self.fields.get(*first)?;
        if rest.is_empty() {
            return Some(field);
        }
        field.children.as_ref()?.get_path(rest)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> btree_map::Values<'_, String, FieldSchema> {
        self.fields.values()
    }

    /// Insert `field` unless a field of that name exists. Returns whether it was inserted.
    pub fn insert_if_absent(&mut self, field: FieldSchema) -> bool {
        match self.fields.entry(field.name.clone()) {
            btree_map::Entry::Vacant(slot) => {
                slot.insert(field);
                true
            }
            btree_map::Entry::Occupied(_) => false,
        }
    }
}

impl<'a> IntoIterator for &'a Schema {
    type Item = &'a FieldSchema;
    type IntoIter = btree_map::Values<'a, String, FieldSchema>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for Schema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.fields.values())
    }
}

/// Concurrent, first-wins schema accumulator
#[derive(Debug, Default)]
pub struct SchemaTree {
    inner: RwLock<Schema>,
}

impl SchemaTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a field exists. The answer may be stale by the time the
    /// caller acts on it; `insert_if_absent` is what decides.
    pub fn exists(&self, name: &str) -> bool {
        self.inner.read().contains(name)
    }

    /// Insert `field` unless a field of that name already exists.
    ///
    /// The existence check and the insert happen under one write lock, so of
    /// any number of concurrent callers with the same name exactly one wins.
    pub fn insert_if_absent(&self, field: FieldSchema) -> bool {
        self.inner.write().insert_if_absent(field)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Copy of the current contents
    pub fn snapshot(&self) -> Schema {
        self.inner.read().clone()
    }

    pub fn into_schema(self) -> Schema {
        self.inner.into_inner()
    }
}
