// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{debug, warn};

use crate::diff::{DiffLine, diff_lines, render_markup};
use crate::model::{ConfigEntry, DiffSide, DisplayMode, RenderFormat};
use crate::render::{DEFAULT_JSON_INDENT, format_value_with_indent};
use crate::revisions::RevisionCursor;

/// What the value pane shows, before it is flattened to text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Display {
    Value(String),
    Diff(Vec<DiffLine>),
}

impl Display {
    pub fn to_text(&self) -> String {
        match self {
            Self::Value(text) => text.clone(),
            Self::Diff(lines) => render_markup(lines),
        }
    }
}

/// Display mode, render format and the two revision cursors. Every read goes
/// through [`ViewState::current_display`], which is recomputed from scratch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewState {
    mode: DisplayMode,
    format: RenderFormat,
    json_indent: usize,
    primary: RevisionCursor,
    diff_right: RevisionCursor,
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(RenderFormat::Plain, DEFAULT_JSON_INDENT)
    }
}

impl ViewState {
    pub fn new(format: RenderFormat, json_indent: usize) -> Self {
        Self {
            mode: DisplayMode::Standard,
            format,
            json_indent,
            primary: RevisionCursor::new(),
            diff_right: RevisionCursor::new(),
        }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    pub fn format(&self) -> RenderFormat {
        self.format
    }

    pub fn primary(&self) -> &RevisionCursor {
        &self.primary
    }

    pub fn diff_right(&self) -> &RevisionCursor {
        &self.diff_right
    }

    pub fn cursor(&self, side: DiffSide) -> &RevisionCursor {
        match side {
            DiffSide::Left => &self.primary,
            DiffSide::Right => &self.diff_right,
        }
    }

    fn cursor_mut(&mut self, side: DiffSide) -> &mut RevisionCursor {
        match side {
            DiffSide::Left => &mut self.primary,
            DiffSide::Right => &mut self.diff_right,
        }
    }

    /// Which side a newly opened key lands on in the current mode.
    pub fn target_side(&self) -> DiffSide {
        match self.mode {
            DisplayMode::Standard => DiffSide::Left,
            DisplayMode::Diff => DiffSide::Right,
        }
    }

    /// Sides that are meaningful in the current mode.
    pub fn active_sides(&self) -> &'static [DiffSide] {
        match self.mode {
            DisplayMode::Standard => &[DiffSide::Left],
            DisplayMode::Diff => &[DiffSide::Left, DiffSide::Right],
        }
    }

    pub fn select_primary_key(&mut self, key_name: impl Into<String>, revisions: Vec<ConfigEntry>) {
        let key_name = key_name.into();
        debug!(key = %key_name, count = revisions.len(), "primary revisions set");
        self.primary.set_revisions(key_name, revisions);
    }

    /// Refused outside diff mode; the UI never routes a right-side key there.
    pub fn select_diff_right_key(
        &mut self,
        key_name: impl Into<String>,
        revisions: Vec<ConfigEntry>,
    ) -> bool {
        let key_name = key_name.into();
        if self.mode != DisplayMode::Diff {
            warn!(key = %key_name, "diff-right revisions ignored in standard mode");
            return false;
        }
        debug!(key = %key_name, count = revisions.len(), "diff-right revisions set");
        self.diff_right.set_revisions(key_name, revisions);
        true
    }

    pub fn set_revisions(
        &mut self,
        side: DiffSide,
        key_name: impl Into<String>,
        revisions: Vec<ConfigEntry>,
    ) -> bool {
        match side {
            DiffSide::Left => {
                self.select_primary_key(key_name, revisions);
                true
            }
            DiffSide::Right => self.select_diff_right_key(key_name, revisions),
        }
    }

    /// Returns false, leaving the state untouched, when there is no primary
    /// revision to compare against.
    pub fn enter_diff(&mut self) -> bool {
        if self.primary.is_empty() {
            debug!("diff refused: no primary revisions");
            return false;
        }
        self.mode = DisplayMode::Diff;
        true
    }

    pub fn exit_diff(&mut self) {
        self.diff_right.clear();
        self.mode = DisplayMode::Standard;
    }

    pub fn toggle_format(&mut self) -> RenderFormat {
        self.format = self.format.toggled();
        self.format
    }

    pub fn select_revision(&mut self, side: DiffSide, index: usize) {
        self.cursor_mut(side).select(index);
    }

    pub fn step_revision(&mut self, side: DiffSide, delta: isize) -> bool {
        self.cursor_mut(side).step(delta)
    }

    /// Drops the primary selection; used by reload in standard mode.
    pub fn reset_primary(&mut self) {
        self.primary.set_revisions(String::new(), Vec::new());
    }

    fn formatted(&self, side: DiffSide) -> String {
        format_value_with_indent(
            &self.cursor(side).current_value(),
            self.format,
            self.json_indent,
        )
    }

    pub fn current_display(&self) -> Display {
        match self.mode {
            DisplayMode::Standard => Display::Value(self.formatted(DiffSide::Left)),
            DisplayMode::Diff => Display::Diff(diff_lines(
                &self.formatted(DiffSide::Left),
                &self.formatted(DiffSide::Right),
            )),
        }
    }

    pub fn current_display_text(&self) -> String {
        self.current_display().to_text()
    }
}
