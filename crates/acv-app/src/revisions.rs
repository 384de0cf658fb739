// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::model::ConfigEntry;

/// Revisions of one key, newest first. Built once per fetch and never edited.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevisionSet {
    entries: Vec<ConfigEntry>,
}

impl RevisionSet {
    /// Sorts by `last_modified` descending. The sort is stable, so revisions
    /// with equal timestamps keep the order the store delivered them in.
    pub fn new(mut entries: Vec<ConfigEntry>) -> Self {
        entries.sort_by(|left, right| right.last_modified.cmp(&left.last_modified));
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ConfigEntry> {
        self.entries.get(index)
    }

    pub fn newest(&self) -> Option<&ConfigEntry> {
        self.entries.first()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ConfigEntry> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[ConfigEntry] {
        &self.entries
    }
}

impl<'a> IntoIterator for &'a RevisionSet {
    type Item = &'a ConfigEntry;
    type IntoIter = std::slice::Iter<'a, ConfigEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A key's revision history plus the revision currently picked from it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RevisionCursor {
    key_name: String,
    revisions: RevisionSet,
    selected: Option<usize>,
}

impl RevisionCursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_revisions(&mut self, key_name: impl Into<String>, revisions: Vec<ConfigEntry>) {
        self.key_name = key_name.into();
        self.revisions = RevisionSet::new(revisions);
        self.selected = if self.revisions.is_empty() {
            None
        } else {
            Some(0)
        };
    }

    /// Panics when `index` is outside the held set: pickers are built 1:1 from
    /// the set, so an out-of-range index is a caller bug.
    pub fn select(&mut self, index: usize) {
        assert!(
            index < self.revisions.len(),
            "revision index {index} out of range for {} revisions of {:?}",
            self.revisions.len(),
            self.key_name
        );
        self.selected = Some(index);
    }

    /// Moves the selection by `delta`, clamped to the set. Returns whether the
    /// selection changed.
    pub fn step(&mut self, delta: isize) -> bool {
        let Some(current) = self.selected else {
            return false;
        };
        let last = self.revisions.len().saturating_sub(1) as isize;
        let next = (current as isize + delta).clamp(0, last) as usize;
        if next == current {
            return false;
        }
        self.selected = Some(next);
        true
    }

    pub fn current_value(&self) -> String {
        self.selected()
            .map(|entry| entry.value.clone())
            .unwrap_or_default()
    }

    pub fn selected(&self) -> Option<&ConfigEntry> {
        self.selected.and_then(|index| self.revisions.get(index))
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selected
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    pub fn revisions(&self) -> &RevisionSet {
        &self.revisions
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }

    pub fn clear(&mut self) {
        self.key_name.clear();
        self.revisions = RevisionSet::default();
        self.selected = None;
    }
}
