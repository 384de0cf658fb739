// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::HashSet;
use std::ops::Range;

/// Keys of `full_keys` containing `substring`, in their original order.
/// Matching is case-sensitive; an empty substring keeps every key.
pub fn apply(full_keys: &[String], substring: &str) -> Vec<String> {
    full_keys
        .iter()
        .filter(|key| key.contains(substring))
        .cloned()
        .collect()
}

/// The fetched key list plus the view of it narrowed by the committed search.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyList {
    all: Vec<String>,
    visible: Vec<String>,
    query: String,
}

impl KeyList {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        let mut list = Self::default();
        list.replace(keys);
        list
    }

    /// Installs a freshly fetched list. Keys repeated across labels collapse to
    /// their first occurrence, and any committed search is dropped.
    pub fn replace(&mut self, keys: impl IntoIterator<Item = String>) {
        let mut seen = HashSet::new();
        self.all = keys
            .into_iter()
            .filter(|key| seen.insert(key.clone()))
            .collect();
        self.query.clear();
        self.visible = self.all.clone();
    }

    pub fn commit(&mut self, query: &str) {
        self.query = query.to_owned();
        self.visible = apply(&self.all, query);
    }

    pub fn clear(&mut self) {
        self.commit("");
    }

    pub fn all(&self) -> &[String] {
        &self.all
    }

    pub fn visible(&self) -> &[String] {
        &self.visible
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_filtered(&self) -> bool {
        !self.query.is_empty()
    }
}

/// Byte ranges of every non-overlapping occurrence of `query` in `text`.
pub fn find_matches(text: &str, query: &str) -> Vec<Range<usize>> {
    if query.is_empty() {
        return Vec::new();
    }
    text.match_indices(query)
        .map(|(start, found)| start..start + found.len())
        .collect()
}
