// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use acv_app::{ConfigEntry, RevisionRequest};
use acv_store::{Client, ConfigSource, MemoryStore};
use acv_testkit::ConfigFaker;
use acv_tui::InternalEvent;
use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const ALL_KEYS: &str = "*";
const DEMO_KEY_COUNT: usize = 40;
const DEMO_MAX_REVISIONS: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub label_filter: String,
    pub api_version: String,
    pub timeout: Duration,
    pub access_token: Option<String>,
}

/// How an endpoint string becomes a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connector {
    Http(HttpSettings),
    /// Seeded in-memory catalog; each endpoint gets its own data.
    Demo,
}

impl Connector {
    pub fn build(&self, endpoint: &str) -> Result<Arc<dyn ConfigSource>> {
        match self {
            Self::Http(settings) => {
                let client = Client::new(endpoint, settings.timeout)?
                    .with_label_filter(&settings.label_filter)
                    .with_api_version(&settings.api_version)
                    .with_access_token(settings.access_token.clone());
                Ok(Arc::new(client))
            }
            Self::Demo => Ok(Arc::new(demo_store(endpoint))),
        }
    }
}

pub fn demo_store(endpoint: &str) -> MemoryStore {
    let mut faker = ConfigFaker::new(demo_seed(endpoint));
    MemoryStore::with_entries(
        faker
            .catalog(DEMO_KEY_COUNT, DEMO_MAX_REVISIONS)
            .into_iter()
            .flat_map(|fake| fake.revisions),
    )
}

/// FNV-1a over the endpoint so reconnecting shows the same demo data.
fn demo_seed(endpoint: &str) -> u64 {
    endpoint
        .trim_end_matches('/')
        .bytes()
        .fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(0x0000_0100_0000_01b3)
        })
}

pub struct StoreRuntime {
    connector: Connector,
    source: Option<Arc<dyn ConfigSource>>,
    key_filter: String,
}

impl StoreRuntime {
    pub fn new(connector: Connector) -> Self {
        Self {
            connector,
            source: None,
            key_filter: ALL_KEYS.to_owned(),
        }
    }

    fn source(&self) -> Result<&Arc<dyn ConfigSource>> {
        self.source
            .as_ref()
            .ok_or_else(|| anyhow!("no server connected; press s to pick one"))
    }
}

impl acv_tui::AppRuntime for StoreRuntime {
    fn connect(&mut self, endpoint: &str) -> Result<()> {
        self.source = None;
        let source = self.connector.build(endpoint)?;
        info!(endpoint, "connected");
        self.source = Some(source);
        Ok(())
    }

    fn fetch_keys(&mut self) -> Result<Vec<ConfigEntry>> {
        self.source()?.fetch_keys(&self.key_filter)
    }

    fn fetch_revisions(&mut self, key: &str) -> Result<Vec<ConfigEntry>> {
        self.source()?.fetch_revisions(key)
    }

    fn spawn_revision_fetch(
        &mut self,
        request: RevisionRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let source = Arc::clone(self.source()?);
        debug!(key = %request.key, token = request.token.get(), "revision fetch started");
        thread::Builder::new()
            .name("acv-fetch".to_owned())
            .spawn(move || {
                let event = match source.fetch_revisions(&request.key) {
                    Ok(entries) => InternalEvent::RevisionsLoaded { request, entries },
                    Err(error) => {
                        let error = format!("{error:#}");
                        warn!(key = %request.key, %error, "revision fetch failed");
                        InternalEvent::RevisionsFailed { request, error }
                    }
                };
                // The UI may have quit while the fetch was in flight.
                let _ = tx.send(event);
            })
            .context("spawn revision fetch thread")?;
        Ok(())
    }
}
