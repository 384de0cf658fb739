// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::OnceLock;
use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Full filter directive that replaces the level-derived default.
pub const LOG_FILTER_ENV: &str = "ACV_LOG";

const DEPENDENCY_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Accepts anything `LevelFilter` parses except `off` and the empty string.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let level = match trimmed.parse::<LevelFilter>() {
            Ok(filter) if !trimmed.is_empty() => filter.into_level(),
            _ => None,
        };
        match level {
            Some(Level::ERROR) => Ok(Self::Error),
            Some(Level::WARN) => Ok(Self::Warn),
            Some(Level::INFO) => Ok(Self::Info),
            Some(Level::DEBUG) => Ok(Self::Debug),
            Some(Level::TRACE) => Ok(Self::Trace),
            _ => bail!("unknown log level {raw:?}; use one of error, warn, info, debug, trace"),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    pub fn to_filter(self) -> LevelFilter {
        match self {
            Self::Error => LevelFilter::ERROR,
            Self::Warn => LevelFilter::WARN,
            Self::Info => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
            Self::Trace => LevelFilter::TRACE,
        }
    }
}

static INIT: OnceLock<()> = OnceLock::new();
static GUARD: OnceLock<Option<WorkerGuard>> = OnceLock::new();

/// Installs the global subscriber writing to `file`. The terminal belongs to
/// the UI, so nothing is ever logged to stdout or stderr. Later calls are
/// no-ops.
pub fn init(level: LogLevel, file: &Path) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    if let Some(parent) = file.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let handle = OpenOptions::new()
        .create(true)
        .append(true)
        .open(file)
        .with_context(|| format!("open log file {}", file.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(handle);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(level))
        .with_level(true)
        .with_target(level >= LogLevel::Debug)
        .with_thread_names(level >= LogLevel::Trace)
        .with_ansi(false)
        .with_writer(writer)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|error| anyhow!("configure logger: {error}"))?;

    let _ = GUARD.set(Some(guard));
    INIT.set(()).ok();
    Ok(())
}

fn build_env_filter(level: LogLevel) -> EnvFilter {
    match std::env::var(LOG_FILTER_ENV) {
        Ok(filter) if !filter.trim().is_empty() => EnvFilter::new(filter),
        _ => EnvFilter::builder()
            .with_default_directive(level.to_filter().into())
            .parse_lossy(default_filter(level)),
    }
}

/// Our crates log at `level`. HTTP dependencies stay at info or quieter
/// unless `ACV_LOG` says otherwise.
fn default_filter(level: LogLevel) -> String {
    let own = level.as_str();
    let mut filter = format!("{own},acv={own},acv_app={own},acv_store={own},acv_tui={own}");
    if level >= LogLevel::Debug {
        for target in DEPENDENCY_TARGETS {
            filter.push(',');
            filter.push_str(target);
            filter.push_str("=info");
        }
    }
    filter
}
