// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use acv_app::ConfigEntry;
use anyhow::{Result, bail};
use std::collections::BTreeMap;

use crate::{ConfigSource, key_filter_matches};

/// In-process store used by demo mode and tests. Keys are listed in name order.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    keys: BTreeMap<String, Vec<ConfigEntry>>,
    unavailable: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(entries: impl IntoIterator<Item = ConfigEntry>) -> Self {
        let mut store = Self::new();
        for entry in entries {
            store.insert(entry);
        }
        store
    }

    pub fn insert(&mut self, entry: ConfigEntry) {
        self.keys.entry(entry.key.clone()).or_default().push(entry);
    }

    /// Makes every fetch fail with `message`, as an unreachable server would.
    pub fn set_unavailable(&mut self, message: impl Into<String>) {
        self.unavailable = Some(message.into());
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    fn check_available(&self) -> Result<()> {
        if let Some(message) = &self.unavailable {
            bail!("{message}");
        }
        Ok(())
    }
}

impl ConfigSource for MemoryStore {
    fn fetch_keys(&self, filter: &str) -> Result<Vec<ConfigEntry>> {
        self.check_available()?;
        Ok(self
            .keys
            .iter()
            .filter(|(key, _)| key_filter_matches(filter, key))
            .filter_map(|(_, revisions)| {
                revisions
                    .iter()
                    .max_by_key(|entry| entry.last_modified)
                    .cloned()
            })
            .collect())
    }

    fn fetch_revisions(&self, key: &str) -> Result<Vec<ConfigEntry>> {
        self.check_available()?;
        Ok(self.keys.get(key).cloned().unwrap_or_default())
    }
}
