// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use acv_app::ConfigEntry;
use anyhow::{Context, Result};
use serde_json::{Map, Value, json};
use std::collections::BTreeSet;
use std::path::PathBuf;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const SERVICES: [&str; 10] = [
    "billing", "catalog", "checkout", "gateway", "identity", "inventory", "mailer", "search",
    "shipping", "web",
];

const SECTIONS: [&str; 6] = ["db", "cache", "features", "http", "queue", "logging"];

const SETTINGS: [&str; 12] = [
    "timeout",
    "pool_size",
    "endpoint",
    "retries",
    "enabled",
    "ttl",
    "region",
    "level",
    "batch_size",
    "max_connections",
    "rollout",
    "owner",
];

const LABELS: [&str; 4] = ["", "dev", "staging", "prod"];

const REGIONS: [&str; 6] = [
    "eastus",
    "westus2",
    "northeurope",
    "westeurope",
    "japaneast",
    "australiaeast",
];

const OWNERS: [&str; 8] = [
    "platform", "payments", "growth", "search", "infra", "mobile", "data", "security",
];

const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

const SERVERS: [&str; 3] = [
    "https://demo-dev.azconfig.io",
    "https://demo-staging.azconfig.io",
    "https://demo-prod.azconfig.io",
];

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// A key and every revision the fake store holds for it, oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeKey {
    pub key: String,
    pub revisions: Vec<ConfigEntry>,
}

/// Seeded generator for configuration keys and their revision histories.
#[derive(Debug, Clone)]
pub struct ConfigFaker {
    rng: DeterministicRng,
    seed: u64,
    next_revision: u64,
}

impl ConfigFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            seed: normalized,
            next_revision: 0,
        }
    }

    pub fn int_n(&mut self, n: usize) -> usize {
        self.rng.int_n(n)
    }

    /// Colon-separated key such as `checkout:db:timeout`.
    pub fn key_name(&mut self) -> String {
        format!(
            "{}:{}:{}",
            self.pick(&SERVICES),
            self.pick(&SECTIONS),
            self.pick(&SETTINGS)
        )
    }

    /// JSON keys get object values, everything else a plain scalar.
    pub fn value(&mut self, json_value: bool) -> String {
        if json_value {
            self.json_object().to_string()
        } else {
            stored_text(&self.scalar())
        }
    }

    /// Between one and `max_revisions` revisions, oldest first, each an hour
    /// or more after the previous one. JSON histories change one field at a
    /// time so consecutive revisions make readable diffs.
    pub fn revisions(&mut self, key: &str, max_revisions: usize) -> Vec<ConfigEntry> {
        let count = 1 + self.rng.int_n(max_revisions.max(1));
        let json_value = self.rng.bool();
        let label = self.pick(&LABELS).to_owned();
        let mut at =
            reference_time() - Duration::days(30) + Duration::minutes(self.int_n(600) as i64);

        let mut current = if json_value {
            self.json_object()
        } else {
            self.scalar()
        };
        let mut revisions = Vec::with_capacity(count);
        for _ in 0..count {
            let revision_id = self.revision_id();
            let mut entry =
                ConfigEntry::new(key, stored_text(&current), at, revision_id.as_str());
            if !label.is_empty() {
                entry = entry.with_label(label.clone());
            }
            if json_value {
                entry = entry.with_content_type("application/json");
            }
            revisions.push(entry);

            at += Duration::hours(1 + self.int_n(72) as i64);
            current = match current {
                Value::Object(fields) => Value::Object(self.mutate(fields)),
                _ => self.scalar(),
            };
        }
        revisions
    }

    /// `key_count` distinct keys, sorted by name, each with its history.
    pub fn catalog(&mut self, key_count: usize, max_revisions: usize) -> Vec<FakeKey> {
        let mut names = BTreeSet::new();
        let mut attempts = 0;
        while names.len() < key_count && attempts < key_count * 20 {
            names.insert(self.key_name());
            attempts += 1;
        }
        names
            .into_iter()
            .map(|key| {
                let revisions = self.revisions(&key, max_revisions);
                FakeKey { key, revisions }
            })
            .collect()
    }

    fn revision_id(&mut self) -> String {
        self.next_revision += 1;
        format!("{:08x}-{:04}", self.seed, self.next_revision)
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn scalar(&mut self) -> Value {
        match self.rng.int_n(4) {
            0 => json!(self.rng.bool()),
            1 => json!(1 + self.rng.int_n(500)),
            2 => Value::String(self.pick(&REGIONS).to_owned()),
            _ => Value::String(format!("{}ms", 50 * (1 + self.rng.int_n(40)))),
        }
    }

    fn json_object(&mut self) -> Value {
        let mut fields = Map::new();
        fields.insert("enabled".to_owned(), json!(self.rng.bool()));
        fields.insert("region".to_owned(), json!(self.pick(&REGIONS)));
        fields.insert("owner".to_owned(), json!(self.pick(&OWNERS)));
        fields.insert(
            "limits".to_owned(),
            json!({
                "max": 10 * (1 + self.rng.int_n(50)),
                "burst": 1 + self.rng.int_n(20),
            }),
        );
        fields.insert("log_level".to_owned(), json!(self.pick(&LOG_LEVELS)));
        Value::Object(fields)
    }

    fn mutate(&mut self, mut fields: Map<String, Value>) -> Map<String, Value> {
        match self.rng.int_n(4) {
            0 => {
                let enabled = fields
                    .get("enabled")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                fields.insert("enabled".to_owned(), json!(!enabled));
            }
            1 => {
                fields.insert("region".to_owned(), json!(self.pick(&REGIONS)));
            }
            2 => {
                fields.insert(
                    "limits".to_owned(),
                    json!({
                        "max": 10 * (1 + self.rng.int_n(50)),
                        "burst": 1 + self.rng.int_n(20),
                    }),
                );
            }
            _ => {
                fields.insert("log_level".to_owned(), json!(self.pick(&LOG_LEVELS)));
            }
        }
        fields
    }
}

/// Entry stamped `minutes` after [`fixture_time`], with a derived revision id.
pub fn entry(key: &str, value: &str, minutes: i64) -> ConfigEntry {
    ConfigEntry::new(
        key,
        value,
        fixture_time() + Duration::minutes(minutes),
        format!("{key}@{minutes}").as_str(),
    )
}

pub fn fixture_datetime() -> &'static str {
    "2026-02-19T12:34:56Z"
}

pub fn fixture_time() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

pub fn demo_servers() -> &'static [&'static str] {
    &SERVERS
}

pub fn temp_config_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("config.toml");
    Ok((dir, path))
}

/// Strings are stored bare; everything else as its JSON text.
fn stored_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn reference_time() -> OffsetDateTime {
    datetime!(2026-01-01 00:00 UTC)
}
