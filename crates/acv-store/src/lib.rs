// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod memory;

pub use memory::MemoryStore;

use acv_app::ConfigEntry;
use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_LABEL_FILTER: &str = "*";
pub const DEFAULT_API_VERSION: &str = "1.0";
pub const ACCESS_TOKEN_ENV: &str = "ACV_ACCESS_TOKEN";

const MAX_PAGES: usize = 1000;

/// Where keys and their revision histories come from.
pub trait ConfigSource: Send + Sync {
    /// Current value of every key matching `filter`, one entry per key and label.
    fn fetch_keys(&self, filter: &str) -> Result<Vec<ConfigEntry>>;

    /// Every stored revision of `key`, in whatever order the store returns them.
    fn fetch_revisions(&self, key: &str) -> Result<Vec<ConfigEntry>>;
}

/// Key filter semantics of the store: `*` matches everything, a trailing `*`
/// is a prefix match, anything else must match exactly.
pub fn key_filter_matches(filter: &str, key: &str) -> bool {
    if filter.is_empty() || filter == "*" {
        return true;
    }
    match filter.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == filter,
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    endpoint: Url,
    label_filter: String,
    api_version: String,
    access_token: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let trimmed = endpoint.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            bail!("store endpoint must not be empty");
        }
        let mut endpoint = Url::parse(trimmed)
            .with_context(|| format!("store endpoint {trimmed:?} is not a valid URL"))?;
        // Collection paths are joined relative to the endpoint.
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }
        if !matches!(endpoint.scheme(), "http" | "https") {
            bail!(
                "store endpoint {trimmed:?} must use http or https, got {}",
                endpoint.scheme()
            );
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            endpoint,
            label_filter: DEFAULT_LABEL_FILTER.to_owned(),
            api_version: DEFAULT_API_VERSION.to_owned(),
            access_token: None,
            timeout,
            http,
        })
    }

    pub fn with_label_filter(mut self, label_filter: &str) -> Self {
        self.label_filter = label_filter.to_owned();
        self
    }

    pub fn with_api_version(mut self, api_version: &str) -> Self {
        self.api_version = api_version.to_owned();
        self
    }

    /// Blank tokens are ignored so an empty env var behaves like an unset one.
    pub fn with_access_token(mut self, token: Option<String>) -> Self {
        self.access_token = token.filter(|token| !token.trim().is_empty());
        self
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str().trim_end_matches('/')
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn collection_url(&self, collection: &str, key: &str) -> Result<Url> {
        let mut url = self
            .endpoint
            .join(collection)
            .with_context(|| format!("build {collection} URL"))?;
        url.query_pairs_mut()
            .append_pair("key", key)
            .append_pair("label", &self.label_filter)
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    fn fetch_all(&self, first: Url) -> Result<Vec<ConfigEntry>> {
        let mut entries = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;

        while let Some(url) = next.take() {
            pages += 1;
            if pages > MAX_PAGES {
                bail!("store returned more than {MAX_PAGES} pages; giving up");
            }
            debug!(%url, page = pages, "store request");

            let mut request = self.http.get(url.clone());
            if let Some(token) = &self.access_token {
                request = request.bearer_auth(token);
            }
            let response = request
                .send()
                .map_err(|error| connection_error(self.endpoint(), error))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                return Err(clean_error_response(status, &body));
            }

            let page: ItemsPage = response.json().context("decode store response")?;
            for item in page.items {
                entries.push(item.into_entry()?);
            }

            if let Some(link) = page.next_link.filter(|link| !link.is_empty()) {
                next = Some(
                    self.endpoint
                        .join(&link)
                        .with_context(|| format!("resolve next page link {link:?}"))?,
                );
            }
        }

        Ok(entries)
    }
}

impl ConfigSource for Client {
    fn fetch_keys(&self, filter: &str) -> Result<Vec<ConfigEntry>> {
        let url = self.collection_url("kv", filter)?;
        let entries = self
            .fetch_all(url)
            .with_context(|| format!("list keys from {}", self.endpoint()))?;
        debug!(count = entries.len(), "keys fetched");
        Ok(entries)
    }

    fn fetch_revisions(&self, key: &str) -> Result<Vec<ConfigEntry>> {
        let url = self.collection_url("revisions", key)?;
        let entries = self
            .fetch_all(url)
            .with_context(|| format!("list revisions of {key}"))?;
        debug!(key, count = entries.len(), "revisions fetched");
        Ok(entries)
    }
}

fn connection_error(endpoint: &str, error: reqwest::Error) -> anyhow::Error {
    warn!(endpoint, %error, "store unreachable");
    if error.is_timeout() {
        return anyhow!("{endpoint} timed out -- raise [store].timeout or check the network");
    }
    anyhow!("cannot reach {endpoint} -- check the server address ({error})")
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return anyhow!(
            "server error ({}): access denied -- export a valid token in {ACCESS_TOKEN_ENV}",
            status.as_u16()
        );
    }

    if let Ok(problem) = serde_json::from_str::<ProblemDetails>(body)
        && let Some(message) = problem.message()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}

#[derive(Debug, Deserialize)]
struct ItemsPage {
    #[serde(default)]
    items: Vec<StoreItem>,
    #[serde(rename = "@nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StoreItem {
    key: String,
    label: Option<String>,
    value: Option<String>,
    content_type: Option<String>,
    #[serde(default)]
    etag: String,
    last_modified: String,
}

impl StoreItem {
    fn into_entry(self) -> Result<ConfigEntry> {
        let last_modified = OffsetDateTime::parse(&self.last_modified, &Rfc3339)
            .with_context(|| {
                format!(
                    "parse last_modified {:?} of key {}",
                    self.last_modified, self.key
                )
            })?;
        let mut entry = ConfigEntry::new(
            self.key,
            self.value.unwrap_or_default(),
            last_modified,
            self.etag.as_str(),
        );
        if let Some(label) = self.label {
            entry = entry.with_label(label);
        }
        if let Some(content_type) = self.content_type.filter(|value| !value.is_empty()) {
            entry = entry.with_content_type(content_type);
        }
        Ok(entry)
    }
}

#[derive(Debug, Deserialize)]
struct ProblemDetails {
    detail: Option<String>,
    title: Option<String>,
    message: Option<String>,
}

impl ProblemDetails {
    fn message(self) -> Option<String> {
        [self.detail, self.message, self.title]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
    }
}
