// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use tracing::{debug, warn};

use crate::ids::RequestToken;
use crate::model::{ConfigEntry, DiffSide, DisplayMode, Pane, RenderFormat};
use crate::search::KeyList;
use crate::view::ViewState;

/// A revision fetch handed to the runtime. The result is only applied if no
/// newer request for the same side was issued in the meantime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRequest {
    pub token: RequestToken,
    pub side: DiffSide,
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RequestTracker {
    last_issued: RequestToken,
    left: Option<RequestToken>,
    right: Option<RequestToken>,
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self {
            last_issued: RequestToken::new(0),
            left: None,
            right: None,
        }
    }
}

impl RequestTracker {
    fn slot(&mut self, side: DiffSide) -> &mut Option<RequestToken> {
        match side {
            DiffSide::Left => &mut self.left,
            DiffSide::Right => &mut self.right,
        }
    }

    fn issue(&mut self, side: DiffSide, key: &str) -> RevisionRequest {
        self.last_issued = self.last_issued.next();
        *self.slot(side) = Some(self.last_issued);
        RevisionRequest {
            token: self.last_issued,
            side,
            key: key.to_owned(),
        }
    }

    fn is_current(&self, request: &RevisionRequest) -> bool {
        let latest = match request.side {
            DiffSide::Left => self.left,
            DiffSide::Right => self.right,
        };
        latest == Some(request.token)
    }

    fn settle(&mut self, request: &RevisionRequest) {
        *self.slot(request.side) = None;
    }

    fn invalidate(&mut self, side: DiffSide) {
        *self.slot(side) = None;
    }

    fn pending(&self, side: DiffSide) -> bool {
        match side {
            DiffSide::Left => self.left.is_some(),
            DiffSide::Right => self.right.is_some(),
        }
    }
}

/// Everything the browser knows, owned by the UI loop and mutated only through
/// [`AppState::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub servers: Vec<String>,
    pub active_server: Option<usize>,
    pub server_cursor: usize,
    pub keys: KeyList,
    pub key_cursor: usize,
    pub view: ViewState,
    pub focus: Pane,
    pub search_input: String,
    pub value_query: String,
    pub status_line: Option<String>,
    requests: RequestTracker,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(Vec::new(), ViewState::default())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    SelectServer(usize),
    MoveServer(isize),
    ConnectSelectedServer,
    Reload,
    KeysLoaded(Vec<ConfigEntry>),
    KeysFailed(String),
    MoveKey(isize),
    OpenSelectedKey,
    RevisionsLoaded {
        request: RevisionRequest,
        entries: Vec<ConfigEntry>,
    },
    RevisionsFailed {
        request: RevisionRequest,
        error: String,
    },
    SelectRevision {
        side: DiffSide,
        index: usize,
    },
    StepRevision {
        side: DiffSide,
        delta: isize,
    },
    ToggleFormat,
    ToggleDiff,
    Escape,
    FocusNext,
    Focus(Pane),
    BeginSearch,
    SearchInput(char),
    SearchBackspace,
    CommitSearch,
    CancelSearch,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    /// The runtime must switch its store connection to this endpoint.
    ServerSelected(String),
    /// The runtime must fetch the key list and answer with `KeysLoaded` or `KeysFailed`.
    FetchKeys,
    /// The runtime must fetch revisions and answer with `RevisionsLoaded` or `RevisionsFailed`.
    FetchRevisions(RevisionRequest),
    KeysChanged,
    DisplayChanged,
    ModeChanged(DisplayMode),
    FormatChanged(RenderFormat),
    DiffRefused,
    FocusChanged(Pane),
    StaleRevisionsDiscarded(RevisionRequest),
    SearchChanged,
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn new(servers: Vec<String>, view: ViewState) -> Self {
        Self {
            servers,
            active_server: None,
            server_cursor: 0,
            keys: KeyList::default(),
            key_cursor: 0,
            view,
            focus: Pane::Keys,
            search_input: String::new(),
            value_query: String::new(),
            status_line: None,
            requests: RequestTracker::default(),
        }
    }

    pub fn active_server_url(&self) -> Option<&str> {
        self.active_server
            .and_then(|index| self.servers.get(index))
            .map(String::as_str)
    }

    pub fn selected_key(&self) -> Option<&str> {
        self.keys.visible().get(self.key_cursor).map(String::as_str)
    }

    pub fn display_text(&self) -> String {
        self.view.current_display_text()
    }

    pub fn is_loading(&self, side: DiffSide) -> bool {
        self.requests.pending(side)
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        debug!(?command, focus = self.focus.label(), "dispatch");
        match command {
            AppCommand::SelectServer(index) => self.select_server(index),
            AppCommand::MoveServer(delta) => {
                self.server_cursor = step_index(self.server_cursor, delta, self.servers.len());
                Vec::new()
            }
            AppCommand::ConnectSelectedServer => self.select_server(self.server_cursor),
            AppCommand::Reload => self.reload(),
            AppCommand::KeysLoaded(entries) => {
                self.keys.replace(entries.into_iter().map(|entry| entry.key));
                self.key_cursor = 0;
                let count = self.keys.all().len();
                vec![
                    AppEvent::KeysChanged,
                    self.set_status(&format!("{count} keys")),
                ]
            }
            AppCommand::KeysFailed(error) => {
                warn!(%error, "key fetch failed");
                self.keys.replace(Vec::new());
                self.key_cursor = 0;
                vec![
                    AppEvent::KeysChanged,
                    self.set_status(&format!("load keys failed: {error}")),
                ]
            }
            AppCommand::MoveKey(delta) => {
                self.key_cursor = step_index(self.key_cursor, delta, self.keys.visible().len());
                Vec::new()
            }
            AppCommand::OpenSelectedKey => self.open_selected_key(),
            AppCommand::RevisionsLoaded { request, entries } => {
                self.apply_revisions(request, entries, None)
            }
            AppCommand::RevisionsFailed { request, error } => {
                self.apply_revisions(request, Vec::new(), Some(error))
            }
            AppCommand::SelectRevision { side, index } => {
                if !self.view.active_sides().contains(&side) {
                    return Vec::new();
                }
                self.view.select_revision(side, index);
                vec![AppEvent::DisplayChanged]
            }
            AppCommand::StepRevision { side, delta } => {
                if self.view.active_sides().contains(&side) && self.view.step_revision(side, delta)
                {
                    vec![AppEvent::DisplayChanged]
                } else {
                    Vec::new()
                }
            }
            AppCommand::ToggleFormat => {
                let format = self.view.toggle_format();
                let mut events = vec![AppEvent::FormatChanged(format), AppEvent::DisplayChanged];
                events.extend(self.focus_to(Pane::Value));
                events
            }
            AppCommand::ToggleDiff => self.toggle_diff(),
            AppCommand::Escape => self.escape(),
            AppCommand::FocusNext => {
                let order = self.focus_order();
                let next = order
                    .iter()
                    .position(|pane| *pane == self.focus)
                    .map(|index| order[(index + 1) % order.len()])
                    .unwrap_or(Pane::Keys);
                self.focus_to(next).into_iter().collect()
            }
            AppCommand::Focus(pane) => {
                let reachable = pane == Pane::Server || self.focus_order().contains(&pane);
                if pane.is_search() || !reachable {
                    return Vec::new();
                }
                self.focus_to(pane).into_iter().collect()
            }
            AppCommand::BeginSearch => self.begin_search(),
            AppCommand::SearchInput(ch) => {
                if !self.focus.is_search() {
                    return Vec::new();
                }
                self.search_input.push(ch);
                Vec::new()
            }
            AppCommand::SearchBackspace => {
                if !self.focus.is_search() {
                    return Vec::new();
                }
                self.search_input.pop();
                Vec::new()
            }
            AppCommand::CommitSearch => {
                let query = self.search_input.clone();
                self.finish_search(&query)
            }
            AppCommand::CancelSearch => {
                self.search_input.clear();
                self.finish_search("")
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn select_server(&mut self, index: usize) -> Vec<AppEvent> {
        let Some(url) = self.servers.get(index).cloned() else {
            return Vec::new();
        };
        self.active_server = Some(index);
        self.server_cursor = index;
        self.view.exit_diff();
        self.view.reset_primary();
        self.requests.invalidate(DiffSide::Left);
        self.requests.invalidate(DiffSide::Right);
        self.keys.replace(Vec::new());
        self.key_cursor = 0;
        self.search_input.clear();
        self.value_query.clear();

        let mut events = vec![
            AppEvent::ServerSelected(url.clone()),
            AppEvent::ModeChanged(DisplayMode::Standard),
            AppEvent::DisplayChanged,
            AppEvent::KeysChanged,
            AppEvent::FetchKeys,
        ];
        events.extend(self.focus_to(Pane::Keys));
        events.push(self.set_status(&format!("using {url}")));
        events
    }

    fn reload(&mut self) -> Vec<AppEvent> {
        let mut events = Vec::new();
        // Diff mode keeps both sides so the comparison survives a key refresh.
        if self.view.mode() != DisplayMode::Diff {
            self.view.reset_primary();
            self.requests.invalidate(DiffSide::Left);
            events.push(AppEvent::DisplayChanged);
        }
        self.keys.clear();
        self.search_input.clear();
        events.push(AppEvent::SearchChanged);
        events.push(AppEvent::FetchKeys);
        events.extend(self.focus_to(Pane::Keys));
        events
    }

    fn open_selected_key(&mut self) -> Vec<AppEvent> {
        let Some(key) = self.selected_key().map(str::to_owned) else {
            return Vec::new();
        };
        let request = self.requests.issue(self.view.target_side(), &key);
        debug!(key = %request.key, side = request.side.as_str(), token = request.token.get(), "revision fetch issued");
        vec![
            AppEvent::FetchRevisions(request),
            self.set_status(&format!("loading {key}")),
        ]
    }

    fn apply_revisions(
        &mut self,
        request: RevisionRequest,
        entries: Vec<ConfigEntry>,
        error: Option<String>,
    ) -> Vec<AppEvent> {
        if !self.requests.is_current(&request) {
            debug!(key = %request.key, token = request.token.get(), "stale revisions discarded");
            return vec![AppEvent::StaleRevisionsDiscarded(request)];
        }
        self.requests.settle(&request);

        if !self
            .view
            .set_revisions(request.side, request.key.clone(), entries)
        {
            return vec![AppEvent::StaleRevisionsDiscarded(request)];
        }

        let mut events = vec![AppEvent::DisplayChanged];
        events.extend(self.focus_to(Pane::Value));
        let status = match error {
            Some(error) => {
                warn!(key = %request.key, %error, "revision fetch failed");
                format!("load revisions for {} failed: {error}", request.key)
            }
            None => {
                let count = self.view.cursor(request.side).revisions().len();
                format!("{}: {count} revisions", request.key)
            }
        };
        events.push(self.set_status(&status));
        events
    }

    fn toggle_diff(&mut self) -> Vec<AppEvent> {
        match self.view.mode() {
            DisplayMode::Standard => {
                if !self.view.enter_diff() {
                    return vec![
                        AppEvent::DiffRefused,
                        self.set_status("select a key before diffing"),
                    ];
                }
                let mut events = vec![
                    AppEvent::ModeChanged(DisplayMode::Diff),
                    AppEvent::DisplayChanged,
                ];
                events.extend(self.focus_to(Pane::Keys));
                events.push(self.set_status("select a key to diff against"));
                events
            }
            DisplayMode::Diff => {
                self.view.exit_diff();
                self.requests.invalidate(DiffSide::Right);
                let mut events = vec![
                    AppEvent::ModeChanged(DisplayMode::Standard),
                    AppEvent::DisplayChanged,
                ];
                if self.focus == Pane::DiffRevisions {
                    events.extend(self.focus_to(Pane::PrimaryRevisions));
                }
                events
            }
        }
    }

    fn escape(&mut self) -> Vec<AppEvent> {
        let next = match self.focus {
            Pane::KeySearch | Pane::ValueSearch => {
                return self.dispatch(AppCommand::CancelSearch);
            }
            Pane::Keys => return Vec::new(),
            Pane::Server | Pane::PrimaryRevisions => Pane::Keys,
            Pane::DiffRevisions => Pane::PrimaryRevisions,
            Pane::Value => match self.view.mode() {
                DisplayMode::Standard => Pane::PrimaryRevisions,
                DisplayMode::Diff => Pane::DiffRevisions,
            },
        };
        self.focus_to(next).into_iter().collect()
    }

    fn begin_search(&mut self) -> Vec<AppEvent> {
        let (pane, seed) = match self.focus {
            Pane::Keys => (Pane::KeySearch, self.keys.query().to_owned()),
            Pane::Value => (Pane::ValueSearch, self.value_query.clone()),
            _ => return Vec::new(),
        };
        self.search_input = seed;
        self.focus_to(pane).into_iter().collect()
    }

    fn finish_search(&mut self, query: &str) -> Vec<AppEvent> {
        match self.focus {
            Pane::KeySearch => {
                self.keys.commit(query);
                self.key_cursor = 0;
                let mut events = vec![AppEvent::KeysChanged, AppEvent::SearchChanged];
                events.extend(self.focus_to(Pane::Keys));
                events
            }
            Pane::ValueSearch => {
                self.value_query = query.to_owned();
                let mut events = vec![AppEvent::SearchChanged];
                events.extend(self.focus_to(Pane::Value));
                events
            }
            _ => Vec::new(),
        }
    }

    fn focus_order(&self) -> &'static [Pane] {
        match self.view.mode() {
            DisplayMode::Standard => &[Pane::Keys, Pane::PrimaryRevisions, Pane::Value],
            DisplayMode::Diff => &[
                Pane::Keys,
                Pane::PrimaryRevisions,
                Pane::DiffRevisions,
                Pane::Value,
            ],
        }
    }

    fn focus_to(&mut self, pane: Pane) -> Option<AppEvent> {
        if self.focus == pane {
            return None;
        }
        self.focus = pane;
        Some(AppEvent::FocusChanged(pane))
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

fn step_index(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (current as isize + delta).clamp(0, len as isize - 1) as usize
}
