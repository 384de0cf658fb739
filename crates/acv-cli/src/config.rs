// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use acv_app::{DEFAULT_JSON_INDENT, MAX_JSON_INDENT, RenderFormat};
use acv_store::{DEFAULT_API_VERSION, DEFAULT_LABEL_FILTER};
use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::logging::LogLevel;

pub const APP_NAME: &str = "acv";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "10s";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub servers: Vec<String>,
    #[serde(default)]
    pub store: Store,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            servers: Vec::new(),
            store: Store::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Store {
    pub label_filter: Option<String>,
    pub api_version: Option<String>,
    pub timeout: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Ui {
    pub json: Option<bool>,
    pub json_indent: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("ACV_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set ACV_CONFIG_PATH to the config file")
        })?;

        let app_dir = config_root.join(APP_NAME);
        fs::create_dir_all(&app_dir)
            .with_context(|| format!("create config directory {}", app_dir.display()))?;
        Ok(app_dir.join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and list endpoints under `servers`",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1. Regenerate it with `acv --print-example-config`",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        for server in &self.servers {
            let trimmed = server.trim();
            if !(trimmed.starts_with("https://") || trimmed.starts_with("http://")) {
                bail!(
                    "servers entry {server:?} in {} must be an http:// or https:// URL",
                    path.display()
                );
            }
        }

        if let Some(timeout) = &self.store.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "store.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(indent) = self.ui.json_indent
            && !(1..=MAX_JSON_INDENT as i64).contains(&indent)
        {
            bail!(
                "ui.json_indent in {} must be between 1 and {MAX_JSON_INDENT}, got {indent}",
                path.display()
            );
        }

        if let Some(level) = &self.log.level {
            LogLevel::parse(level)
                .with_context(|| format!("invalid log.level in {}", path.display()))?;
        }

        Ok(())
    }

    /// The positional server (if any) first, then configured servers, without
    /// duplicates.
    pub fn server_list(&self, positional: Option<&str>) -> Vec<String> {
        let mut servers: Vec<String> = Vec::new();
        for server in positional.into_iter().chain(self.servers.iter().map(String::as_str)) {
            let server = server.trim().trim_end_matches('/');
            if !server.is_empty() && !servers.iter().any(|known| known == server) {
                servers.push(server.to_owned());
            }
        }
        servers
    }

    pub fn label_filter(&self) -> &str {
        self.store
            .label_filter
            .as_deref()
            .unwrap_or(DEFAULT_LABEL_FILTER)
    }

    pub fn api_version(&self) -> &str {
        self.store
            .api_version
            .as_deref()
            .unwrap_or(DEFAULT_API_VERSION)
    }

    pub fn store_timeout(&self) -> Result<Duration> {
        parse_duration(self.store.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn render_format(&self) -> RenderFormat {
        if self.ui.json.unwrap_or(false) {
            RenderFormat::Json
        } else {
            RenderFormat::Plain
        }
    }

    pub fn json_indent(&self) -> usize {
        self.ui
            .json_indent
            .and_then(|indent| usize::try_from(indent).ok())
            .unwrap_or(DEFAULT_JSON_INDENT)
    }

    pub fn log_level(&self) -> Result<LogLevel> {
        match &self.log.level {
            Some(level) => LogLevel::parse(level),
            None => Ok(LogLevel::default()),
        }
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let data_root = dirs::data_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].file in the config")
        })?;
        Ok(data_root.join(APP_NAME).join("acv.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# acv config\n# Place this file at: {}\n\nversion = 1\n\n# Endpoints offered in the server picker; the first one opens at startup.\nservers = [\"https://example.azconfig.io\"]\n\n[store]\nlabel_filter = \"{}\"\napi_version = \"{}\"\ntimeout = \"{}\"\n\n[ui]\njson = false\njson_indent = {}\n\n[log]\nlevel = \"info\"\n# Optional. Default is the platform data dir (for example ~/.local/share/acv/acv.log)\n# file = \"/absolute/path/to/acv.log\"\n",
            path.display(),
            DEFAULT_LABEL_FILTER,
            DEFAULT_API_VERSION,
            DEFAULT_TIMEOUT,
            DEFAULT_JSON_INDENT,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use crate::logging::LogLevel;
    use acv_app::RenderFormat;
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let (temp, path) = acv_testkit::temp_config_path()?;
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert!(config.servers.is_empty());
        assert_eq!(config.label_filter(), "*");
        assert_eq!(config.api_version(), "1.0");
        assert_eq!(config.store_timeout()?, Duration::from_secs(10));
        assert_eq!(config.render_format(), RenderFormat::Plain);
        assert_eq!(config.json_indent(), 2);
        assert_eq!(config.log_level()?, LogLevel::Info);
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("servers = [\"https://a.example\"]\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("servers"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\nservers = [\"https://a.example\", \"https://b.example/\"]\n[store]\nlabel_filter = \"prod\"\napi_version = \"2023-10-01\"\ntimeout = \"2s\"\n[ui]\njson = true\njson_indent = 4\n[log]\nlevel = \"debug\"\nfile = \"/tmp/acv-test.log\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.servers.len(), 2);
        assert_eq!(config.label_filter(), "prod");
        assert_eq!(config.api_version(), "2023-10-01");
        assert_eq!(config.store_timeout()?, Duration::from_secs(2));
        assert_eq!(config.render_format(), RenderFormat::Json);
        assert_eq!(config.json_indent(), 4);
        assert_eq!(config.log_level()?, LogLevel::Debug);
        assert_eq!(config.log_file()?, PathBuf::from("/tmp/acv-test.log"));
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn non_http_server_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\nservers = [\"ftp://a.example\"]\n")?;
        let error = Config::load(&path).expect_err("ftp server should fail");
        assert!(error.to_string().contains("http:// or https://"));
        Ok(())
    }

    #[test]
    fn json_indent_out_of_range_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ui]\njson_indent = 0\n")?;
        let error = Config::load(&path).expect_err("zero indent should fail");
        assert!(error.to_string().contains("between 1 and 8"));
        Ok(())
    }

    #[test]
    fn unknown_log_level_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"loud\"\n")?;
        let error = Config::load(&path).expect_err("unknown level should fail");
        assert!(format!("{error:#}").contains("loud"));
        Ok(())
    }

    #[test]
    fn server_list_puts_positional_first_and_dedupes() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\nservers = [\"https://a.example\", \"https://b.example/\", \"https://a.example\"]\n",
        )?;
        let config = Config::load(&path)?;
        assert_eq!(
            config.server_list(Some("https://b.example")),
            vec!["https://b.example", "https://a.example"]
        );
        assert_eq!(
            config.server_list(None),
            vec!["https://a.example", "https://b.example"]
        );
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("ACV_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("ACV_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn default_path_uses_config_toml_suffix_when_no_env_override() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("ACV_CONFIG_PATH");
        }
        let path = Config::default_path()?;
        assert!(path.ends_with("config.toml"));
        Ok(())
    }

    #[test]
    fn log_file_defaults_to_acv_log() -> Result<()> {
        let config = Config::default();
        let path = config.log_file()?;
        assert!(path.ends_with("acv/acv.log"), "got {}", path.display());
        Ok(())
    }

    #[test]
    fn timeout_parses_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn timeout_rejects_invalid_duration() {
        let error = parse_duration("oops").expect_err("invalid duration should fail");
        assert!(error.to_string().contains("invalid duration"));
    }

    #[test]
    fn timeout_rejects_non_positive_values_in_config() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[store]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn example_config_round_trips() -> Result<()> {
        let (temp, path) = write_config("")?;
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[store]"));
        assert!(example.contains("[ui]"));
        assert!(example.contains("[log]"));

        let example_path = temp.path().join("example.toml");
        std::fs::write(&example_path, example)?;
        let config = Config::load(&example_path)?;
        assert_eq!(config.servers, vec!["https://example.azconfig.io"]);
        Ok(())
    }
}
