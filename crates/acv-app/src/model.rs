// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;

use crate::ids::RevisionId;

/// One historical value of a configuration key, as delivered by a store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
    pub label: Option<String>,
    pub content_type: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_modified: OffsetDateTime,
    pub revision_id: RevisionId,
}

impl ConfigEntry {
    pub fn new(
        key: impl Into<String>,
        value: impl Into<String>,
        last_modified: OffsetDateTime,
        revision_id: impl Into<RevisionId>,
    ) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            label: None,
            content_type: None,
            last_modified,
            revision_id: revision_id.into(),
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Short RFC 822 style timestamp used in revision pickers.
    pub fn revision_label(&self) -> String {
        let stamp = self
            .last_modified
            .to_offset(time::UtcOffset::UTC)
            .format(format_description!(
                "[day] [month repr:short] [year repr:last_two] [hour]:[minute] UTC"
            ))
            .unwrap_or_else(|_| self.last_modified.unix_timestamp().to_string());
        match self.label.as_deref() {
            Some(label) if !label.is_empty() => format!("{stamp} [{label}]"),
            _ => stamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    #[default]
    Standard,
    Diff,
}

impl DisplayMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Diff => "diff",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RenderFormat {
    #[default]
    Plain,
    Json,
}

impl RenderFormat {
    pub const fn toggled(self) -> Self {
        match self {
            Self::Plain => Self::Json,
            Self::Json => Self::Plain,
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::Plain => "Formatting: Plain",
            Self::Json => "Formatting: JSON",
        }
    }
}

/// Which of the two revision cursors an operation addresses. The left side is
/// the primary cursor, shown alone in standard mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiffSide {
    Left,
    Right,
}

impl DiffSide {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Pane {
    Server,
    #[default]
    Keys,
    PrimaryRevisions,
    DiffRevisions,
    Value,
    KeySearch,
    ValueSearch,
}

impl Pane {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Server => "server",
            Self::Keys => "keys",
            Self::PrimaryRevisions => "revisions",
            Self::DiffRevisions => "diff revisions",
            Self::Value => "value",
            Self::KeySearch => "key search",
            Self::ValueSearch => "value search",
        }
    }

    pub const fn is_search(self) -> bool {
        matches!(self, Self::KeySearch | Self::ValueSearch)
    }
}
