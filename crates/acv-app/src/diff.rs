// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use similar::{ChangeTag, TextDiff};

pub const REMOVED_MARKER: char = '-';
pub const ADDED_MARKER: char = '+';
pub const UNCHANGED_MARKER: char = ' ';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffTag {
    Added,
    Removed,
    Unchanged,
}

impl DiffTag {
    /// Inline color tokens wrapping a tagged line in the text form.
    const fn markup(self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Added => Some(("[green]", "[white]")),
            Self::Removed => Some(("[red]", "[white]")),
            Self::Unchanged => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffLine {
    /// Line text including its leading diff marker.
    pub text: String,
    pub tag: DiffTag,
}

impl DiffLine {
    pub fn tagged(text: impl Into<String>) -> Self {
        let text = text.into();
        let tag = if text.starts_with(REMOVED_MARKER) {
            DiffTag::Removed
        } else if text.starts_with(ADDED_MARKER) {
            DiffTag::Added
        } else {
            DiffTag::Unchanged
        };
        Self { text, tag }
    }

    pub fn markup(&self) -> String {
        match self.tag.markup() {
            Some((open, close)) => format!("{open}{}{close}", self.text),
            None => self.text.clone(),
        }
    }
}

/// Line-level diff of two texts: one output line per input line, prefixed
/// with `-`, `+` or a space.
pub fn line_diff(left: &str, right: &str) -> Vec<String> {
    TextDiff::from_lines(left, right)
        .iter_all_changes()
        .map(|change| {
            let marker = match change.tag() {
                ChangeTag::Delete => REMOVED_MARKER,
                ChangeTag::Insert => ADDED_MARKER,
                ChangeTag::Equal => UNCHANGED_MARKER,
            };
            let line = change.value().trim_end_matches(['\n', '\r']);
            format!("{marker}{line}")
        })
        .collect()
}

/// Both inputs must already be formatted for display; the diff is computed on
/// exactly the text the user would see.
pub fn diff_lines(left_formatted: &str, right_formatted: &str) -> Vec<DiffLine> {
    line_diff(left_formatted, right_formatted)
        .into_iter()
        .map(DiffLine::tagged)
        .collect()
}

pub fn diff(left_formatted: &str, right_formatted: &str) -> String {
    render_markup(&diff_lines(left_formatted, right_formatted))
}

pub fn render_markup(lines: &[DiffLine]) -> String {
    lines
        .iter()
        .map(DiffLine::markup)
        .collect::<Vec<String>>()
        .join("\n")
}
