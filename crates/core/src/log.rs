//! Write-once, append-only sequence.
//!
//! `AppendLog` backs the audit trail and the inspection notes of a batch.
//! Entries are addressed by position and can only be added at the end; the
//! type exposes no way to replace, remove, or reorder an entry once appended.

use std::ops::Index;

use serde::{Deserialize, Serialize};

/// An ordered log of immutable entries.
///
/// Serializes as a plain JSON array. An empty log encodes as `[]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppendLog<T> {
    entries: Vec<T>,
}

impl<T> AppendLog<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry and return its position.
    pub fn append(&mut self, entry: T) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn get(&self, position: usize) -> Option<&T> {
        self.entries.get(position)
    }

    pub fn last(&self) -> Option<&T> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.entries.iter()
    }
}

impl<T: PartialEq> AppendLog<T> {
    /// True when `earlier` is a prefix of this log, i.e. this log could have
    /// been produced from `earlier` by appends alone.
    pub fn extends(&self, earlier: &AppendLog<T>) -> bool {
        earlier.len() <= self.len() && self.entries[..earlier.len()] == earlier.entries[..]
    }
}

impl<T> Default for AppendLog<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Index<usize> for AppendLog<T> {
    type Output = T;

    fn index(&self, position: usize) -> &T {
        &self.entries[position]
    }
}

impl<'a, T> IntoIterator for &'a AppendLog<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<T> FromIterator<T> for AppendLog<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
