// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use acv_app::{
    AppCommand, AppEvent, AppState, ConfigEntry, DiffSide, DiffTag, Display, DisplayMode, Pane,
    RevisionCursor, RevisionRequest, find_matches,
};
use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use std::collections::VecDeque;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

const PAGE_ROWS: isize = 10;
const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);

/// Everything the UI needs from the outside world.
pub trait AppRuntime {
    /// Point subsequent fetches at `endpoint`.
    fn connect(&mut self, endpoint: &str) -> Result<()>;
    fn fetch_keys(&mut self) -> Result<Vec<ConfigEntry>>;
    fn fetch_revisions(&mut self, key: &str) -> Result<Vec<ConfigEntry>>;

    /// Runs the fetch and reports back over `tx`. Runtimes backed by a slow
    /// store override this to fetch on a worker thread.
    fn spawn_revision_fetch(
        &mut self,
        request: RevisionRequest,
        tx: Sender<InternalEvent>,
    ) -> Result<()> {
        let event = match self.fetch_revisions(&request.key) {
            Ok(entries) => InternalEvent::RevisionsLoaded { request, entries },
            Err(error) => InternalEvent::RevisionsFailed {
                request,
                error: format!("{error:#}"),
            },
        };
        tx.send(event)
            .map_err(|_| anyhow!("revision event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    RevisionsLoaded {
        request: RevisionRequest,
        entries: Vec<ConfigEntry>,
    },
    RevisionsFailed {
        request: RevisionRequest,
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct ViewData {
    help_visible: bool,
    value_scroll: u16,
    status_token: u64,
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::default();
    let (internal_tx, internal_rx) = mpsc::channel();

    open_initial_server(state, runtime, &mut view_data, &internal_tx);

    let mut result = Ok(());
    loop {
        process_internal_events(state, runtime, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(Duration::from_millis(120)).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn open_initial_server<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if state.active_server.is_none() && !state.servers.is_empty() {
        dispatch_and_apply(
            state,
            runtime,
            view_data,
            internal_tx,
            AppCommand::SelectServer(0),
        );
    }
}

fn process_internal_events<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        let command = match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                AppCommand::ClearStatus
            }
            InternalEvent::ClearStatus { .. } => continue,
            InternalEvent::RevisionsLoaded { request, entries } => {
                AppCommand::RevisionsLoaded { request, entries }
            }
            InternalEvent::RevisionsFailed { request, error } => {
                AppCommand::RevisionsFailed { request, error }
            }
        };
        dispatch_and_apply(state, runtime, view_data, tx, command);
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

/// Dispatches `command` and carries out whatever the resulting events ask of
/// the runtime. Results of synchronous calls are fed back as follow-up commands.
fn dispatch_and_apply<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    let mut queue = VecDeque::from([command]);
    while let Some(command) = queue.pop_front() {
        let mut connect_failed = false;
        for event in state.dispatch(command) {
            match event {
                AppEvent::ServerSelected(endpoint) => {
                    if let Err(error) = runtime.connect(&endpoint) {
                        warn!(%endpoint, error = %format!("{error:#}"), "connect failed");
                        connect_failed = true;
                        queue.push_back(AppCommand::KeysFailed(format!(
                            "connect to {endpoint} failed: {error:#}"
                        )));
                    }
                }
                AppEvent::FetchKeys if connect_failed => {}
                AppEvent::FetchKeys => match runtime.fetch_keys() {
                    Ok(entries) => queue.push_back(AppCommand::KeysLoaded(entries)),
                    Err(error) => queue.push_back(AppCommand::KeysFailed(format!("{error:#}"))),
                },
                AppEvent::FetchRevisions(request) => {
                    let key = request.key.clone();
                    if let Err(error) = runtime.spawn_revision_fetch(request, internal_tx.clone())
                    {
                        queue.push_back(AppCommand::SetStatus(format!(
                            "load revisions for {key} failed: {error:#}"
                        )));
                    }
                }
                AppEvent::DisplayChanged | AppEvent::FormatChanged(_) => {
                    view_data.value_scroll = 0;
                }
                AppEvent::StaleRevisionsDiscarded(request) => {
                    debug!(key = %request.key, token = request.token.get(), "late revisions dropped");
                }
                AppEvent::StatusUpdated(_) => {
                    view_data.status_token = view_data.status_token.saturating_add(1);
                    schedule_status_clear(internal_tx, view_data.status_token);
                }
                _ => {}
            }
        }
    }
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
        }
        return false;
    }

    if state.focus.is_search() {
        let command = match key.code {
            KeyCode::Enter => AppCommand::CommitSearch,
            KeyCode::Esc => AppCommand::CancelSearch,
            KeyCode::Backspace => AppCommand::SearchBackspace,
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                AppCommand::SearchInput(ch)
            }
            _ => return false,
        };
        dispatch_and_apply(state, runtime, view_data, internal_tx, command);
        return false;
    }

    let command = match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('?') => {
            view_data.help_visible = true;
            return false;
        }
        KeyCode::Char('s') => AppCommand::Focus(Pane::Server),
        KeyCode::Char('r') => AppCommand::Reload,
        KeyCode::Char('j') => AppCommand::ToggleFormat,
        KeyCode::Char('d') => AppCommand::ToggleDiff,
        KeyCode::Char('/') => AppCommand::BeginSearch,
        KeyCode::Tab => AppCommand::FocusNext,
        KeyCode::Esc => AppCommand::Escape,
        code => match navigation_command(state, view_data, code) {
            Some(command) => command,
            None => return false,
        },
    };
    dispatch_and_apply(state, runtime, view_data, internal_tx, command);
    false
}

/// Movement keys mean different things per pane. Value scrolling is purely
/// presentational and never reaches the state.
fn navigation_command(
    state: &AppState,
    view_data: &mut ViewData,
    code: KeyCode,
) -> Option<AppCommand> {
    let delta = match code {
        KeyCode::Up => -1,
        KeyCode::Down => 1,
        KeyCode::PageUp => -PAGE_ROWS,
        KeyCode::PageDown => PAGE_ROWS,
        KeyCode::Home => isize::MIN / 2,
        KeyCode::End => isize::MAX / 2,
        KeyCode::Enter => 0,
        _ => return None,
    };

    match state.focus {
        Pane::Server if code == KeyCode::Enter => Some(AppCommand::ConnectSelectedServer),
        Pane::Server => Some(AppCommand::MoveServer(delta)),
        Pane::Keys if code == KeyCode::Enter => Some(AppCommand::OpenSelectedKey),
        Pane::Keys => Some(AppCommand::MoveKey(delta)),
        Pane::PrimaryRevisions if delta != 0 => Some(AppCommand::StepRevision {
            side: DiffSide::Left,
            delta,
        }),
        Pane::DiffRevisions if delta != 0 => Some(AppCommand::StepRevision {
            side: DiffSide::Right,
            delta,
        }),
        Pane::Value => {
            let next = (view_data.value_scroll as isize + delta).clamp(0, u16::MAX as isize);
            view_data.value_scroll = next as u16;
            None
        }
        _ => None,
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(header_text(state))
        .block(Block::default().title("acv").borders(Borders::ALL))
        .style(Style::default().fg(Color::White));
    frame.render_widget(header, layout[0]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
        .split(layout[1]);
    render_keys(frame, columns[0], state);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(1)])
        .split(columns[1]);
    render_revision_pickers(frame, right[0], state);

    let value = Paragraph::new(value_lines(state))
        .scroll((view_data.value_scroll, 0))
        .block(pane_block(value_title(state), state.focus == Pane::Value));
    frame.render_widget(value, right[1]);

    let status = Paragraph::new(status_text(state))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[2]);

    if state.focus == Pane::Server {
        let area = centered_rect(60, 40, frame.area());
        frame.render_widget(Clear, area);
        let items = state
            .servers
            .iter()
            .enumerate()
            .map(|(index, server)| {
                let marker = if state.active_server == Some(index) {
                    "* "
                } else {
                    "  "
                };
                ListItem::new(format!("{marker}{server}"))
            })
            .collect::<Vec<ListItem<'_>>>();
        let list = List::new(items)
            .block(pane_block("servers".to_owned(), true))
            .highlight_style(selected_style());
        let mut list_state = ListState::default().with_selected(Some(state.server_cursor));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    if view_data.help_visible {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_keys(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState) {
    let items = state
        .keys
        .visible()
        .iter()
        .map(|key| ListItem::new(key.clone()))
        .collect::<Vec<ListItem<'_>>>();
    let focused = matches!(state.focus, Pane::Keys | Pane::KeySearch);
    let list = List::new(items)
        .block(pane_block(keys_title(state), focused))
        .highlight_style(selected_style());
    let selected = (!state.keys.visible().is_empty()).then_some(state.key_cursor);
    let mut list_state = ListState::default().with_selected(selected);
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn render_revision_pickers(frame: &mut ratatui::Frame<'_>, area: Rect, state: &AppState) {
    let sides = state.view.active_sides();
    let constraints = sides
        .iter()
        .map(|_| Constraint::Ratio(1, sides.len() as u32))
        .collect::<Vec<Constraint>>();
    let areas = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (side, area) in sides.iter().zip(areas.iter()) {
        let cursor = state.view.cursor(*side);
        let pane = match side {
            DiffSide::Left => Pane::PrimaryRevisions,
            DiffSide::Right => Pane::DiffRevisions,
        };
        let items = revision_labels(cursor)
            .into_iter()
            .map(ListItem::new)
            .collect::<Vec<ListItem<'_>>>();
        let list = List::new(items)
            .block(pane_block(
                revisions_title(state, *side),
                state.focus == pane,
            ))
            .highlight_style(selected_style());
        let mut list_state = ListState::default().with_selected(cursor.selected_index());
        frame.render_stateful_widget(list, *area, &mut list_state);
    }
}

fn pane_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border)
}

fn selected_style() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

fn highlight_style() -> Style {
    Style::default().fg(Color::Black).bg(Color::Yellow)
}

fn header_text(state: &AppState) -> String {
    let server = state.active_server_url().unwrap_or("no server selected");
    let mode = match state.view.mode() {
        DisplayMode::Standard => "view".to_owned(),
        DisplayMode::Diff => {
            let right = state.view.diff_right().key_name();
            let right = if right.is_empty() { "?" } else { right };
            format!("diff {} vs {right}", state.view.primary().key_name())
        }
    };
    format!("{server} | {mode} | {}", state.view.format().title())
}

fn keys_title(state: &AppState) -> String {
    let visible = state.keys.visible().len();
    let total = state.keys.all().len();
    if state.keys.is_filtered() {
        format!("keys /{}/ ({visible}/{total})", state.keys.query())
    } else {
        format!("keys ({total})")
    }
}

fn revisions_title(state: &AppState, side: DiffSide) -> String {
    let cursor = state.view.cursor(side);
    let prefix = match (state.view.mode(), side) {
        (DisplayMode::Standard, _) => "revisions",
        (DisplayMode::Diff, DiffSide::Left) => "left",
        (DisplayMode::Diff, DiffSide::Right) => "right",
    };
    let key = if cursor.key_name().is_empty() {
        "-"
    } else {
        cursor.key_name()
    };
    let loading = if state.is_loading(side) {
        " (loading)"
    } else {
        ""
    };
    format!("{prefix}: {key}{loading}")
}

fn value_title(state: &AppState) -> String {
    let format = state.view.format().title();
    if state.value_query.is_empty() {
        format.to_owned()
    } else {
        let count = value_match_count(state);
        format!("{format} | /{}/ {count} matches", state.value_query)
    }
}

/// Matches over the lines the value pane paints, without diff markup.
fn value_match_count(state: &AppState) -> usize {
    let query = state.value_query.as_str();
    match state.view.current_display() {
        Display::Value(text) => text
            .lines()
            .map(|line| find_matches(line, query).len())
            .sum(),
        Display::Diff(lines) => lines
            .iter()
            .map(|line| find_matches(&line.text, query).len())
            .sum(),
    }
}

fn revision_labels(cursor: &RevisionCursor) -> Vec<String> {
    cursor
        .revisions()
        .iter()
        .map(|entry| entry.revision_label())
        .collect()
}

fn value_lines(state: &AppState) -> Vec<Line<'static>> {
    let query = state.value_query.as_str();
    match state.view.current_display() {
        Display::Value(text) => text
            .lines()
            .map(|line| Line::from(highlight_spans(line, query, Style::default())))
            .collect(),
        Display::Diff(lines) => lines
            .iter()
            .map(|line| {
                let style = match line.tag {
                    DiffTag::Added => Style::default().fg(Color::Green),
                    DiffTag::Removed => Style::default().fg(Color::Red),
                    DiffTag::Unchanged => Style::default(),
                };
                Line::from(highlight_spans(&line.text, query, style))
            })
            .collect(),
    }
}

/// Splits `text` into spans, giving every occurrence of `query` the search
/// highlight and the rest `base`.
fn highlight_spans(text: &str, query: &str, base: Style) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut last = 0;
    for range in find_matches(text, query) {
        if range.start > last {
            spans.push(Span::styled(text[last..range.start].to_owned(), base));
        }
        spans.push(Span::styled(
            text[range.clone()].to_owned(),
            highlight_style(),
        ));
        last = range.end;
    }
    if last < text.len() || spans.is_empty() {
        spans.push(Span::styled(text[last..].to_owned(), base));
    }
    spans
}

fn status_text(state: &AppState) -> String {
    match state.focus {
        Pane::KeySearch => {
            return format!("search keys: {}_ | enter apply | esc clear", state.search_input);
        }
        Pane::ValueSearch => {
            return format!("search value: {}_ | enter apply | esc clear", state.search_input);
        }
        _ => {}
    }

    let mode = match state.view.mode() {
        DisplayMode::Standard => "VIEW",
        DisplayMode::Diff => "DIFF",
    };
    let default =
        "enter open | tab pane | / search | j json | d diff | r reload | s server | ? help | q quit";
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {default}"),
        None => format!("{mode} | {} | {default}", state.focus.label()),
    }
}

fn help_overlay_text() -> &'static str {
    "global: q quit | ctrl+c quit | ? help | tab next pane | esc back\n\
keys: up/down pgup/pgdn home/end move | enter load revisions | / filter keys\n\
revisions: up/down pick revision | home/end newest/oldest\n\
value: up/down pgup/pgdn scroll | / highlight text\n\
view: j toggle JSON formatting | d toggle diff (second key fills the right side)\n\
store: r reload keys | s pick server, enter to connect\n\
search: type to edit | enter apply | esc clear"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, InternalEvent, ViewData, handle_key_event, header_text, help_overlay_text,
        highlight_spans, highlight_style, keys_title, open_initial_server,
        process_internal_events, render, revision_labels, status_text, value_lines, value_title,
    };
    use acv_app::{AppState, ConfigEntry, DisplayMode, Pane, RevisionRequest, ViewState};
    use acv_testkit::entry;
    use anyhow::{Result, bail};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::style::Style;
    use std::collections::BTreeMap;
    use std::sync::mpsc::{self, Receiver, Sender};

    #[derive(Debug, Default)]
    struct TestRuntime {
        keys: Vec<ConfigEntry>,
        revisions: BTreeMap<String, Vec<ConfigEntry>>,
        connected: Vec<String>,
        connect_error: Option<String>,
        keys_error: Option<String>,
        defer_revisions: bool,
        deferred: Vec<RevisionRequest>,
    }

    impl TestRuntime {
        fn sample() -> Self {
            let mut revisions = BTreeMap::new();
            revisions.insert(
                "app:db".to_owned(),
                vec![
                    entry("app:db", "{\"host\":\"a\",\"port\":1}", 1),
                    entry("app:db", "{\"host\":\"b\",\"port\":1}", 2),
                ],
            );
            revisions.insert(
                "app:cache".to_owned(),
                vec![entry("app:cache", "{\"host\":\"c\",\"port\":1}", 1)],
            );
            revisions.insert("web:port".to_owned(), vec![entry("web:port", "8080", 1)]);
            Self {
                keys: vec![
                    entry("app:db", "", 2),
                    entry("app:cache", "", 1),
                    entry("web:port", "", 1),
                ],
                revisions,
                ..Self::default()
            }
        }
    }

    impl AppRuntime for TestRuntime {
        fn connect(&mut self, endpoint: &str) -> Result<()> {
            if let Some(error) = &self.connect_error {
                bail!("{error}");
            }
            self.connected.push(endpoint.to_owned());
            Ok(())
        }

        fn fetch_keys(&mut self) -> Result<Vec<ConfigEntry>> {
            if let Some(error) = &self.keys_error {
                bail!("{error}");
            }
            Ok(self.keys.clone())
        }

        fn fetch_revisions(&mut self, key: &str) -> Result<Vec<ConfigEntry>> {
            Ok(self.revisions.get(key).cloned().unwrap_or_default())
        }

        fn spawn_revision_fetch(
            &mut self,
            request: RevisionRequest,
            tx: Sender<InternalEvent>,
        ) -> Result<()> {
            if self.defer_revisions {
                self.deferred.push(request);
                return Ok(());
            }
            let entries = self.fetch_revisions(&request.key)?;
            tx.send(InternalEvent::RevisionsLoaded { request, entries })?;
            Ok(())
        }
    }

    struct Harness {
        state: AppState,
        runtime: TestRuntime,
        view_data: ViewData,
        tx: Sender<InternalEvent>,
        rx: Receiver<InternalEvent>,
    }

    impl Harness {
        fn new(runtime: TestRuntime) -> Self {
            let (tx, rx) = mpsc::channel();
            let mut harness = Self {
                state: AppState::new(
                    vec![
                        "https://one.example".to_owned(),
                        "https://two.example".to_owned(),
                    ],
                    ViewState::default(),
                ),
                runtime,
                view_data: ViewData::default(),
                tx,
                rx,
            };
            open_initial_server(
                &mut harness.state,
                &mut harness.runtime,
                &mut harness.view_data,
                &harness.tx,
            );
            harness
        }

        fn press(&mut self, code: KeyCode) -> bool {
            self.press_with(code, KeyModifiers::NONE)
        }

        fn press_with(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
            let quit = handle_key_event(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                KeyEvent::new(code, modifiers),
            );
            self.pump();
            quit
        }

        fn pump(&mut self) {
            process_internal_events(
                &mut self.state,
                &mut self.runtime,
                &mut self.view_data,
                &self.tx,
                &self.rx,
            );
        }

        fn type_text(&mut self, text: &str) {
            for ch in text.chars() {
                self.press(KeyCode::Char(ch));
            }
        }

        fn deliver(&mut self, request: RevisionRequest) {
            let entries = self
                .runtime
                .revisions
                .get(&request.key)
                .cloned()
                .unwrap_or_default();
            self.tx
                .send(InternalEvent::RevisionsLoaded { request, entries })
                .expect("channel open");
            self.pump();
        }
    }

    #[test]
    fn startup_connects_first_server_and_lists_keys() {
        let harness = Harness::new(TestRuntime::sample());
        assert_eq!(harness.runtime.connected, vec!["https://one.example"]);
        assert_eq!(harness.state.keys.all(), ["app:db", "app:cache", "web:port"]);
        assert_eq!(harness.state.status_line.as_deref(), Some("3 keys"));
    }

    #[test]
    fn enter_loads_newest_revision_and_focuses_value() {
        let mut harness = Harness::new(TestRuntime::sample());
        harness.press(KeyCode::Enter);

        assert_eq!(harness.state.focus, Pane::Value);
        assert_eq!(harness.state.display_text(), "{\"host\":\"b\",\"port\":1}");
        assert_eq!(harness.state.view.primary().key_name(), "app:db");
    }

    #[test]
    fn q_and_ctrl_c_quit_but_q_types_in_search() {
        let mut harness = Harness::new(TestRuntime::sample());
        assert!(harness.press_with(KeyCode::Char('c'), KeyModifiers::CONTROL));

        harness.press(KeyCode::Char('/'));
        assert!(!harness.press(KeyCode::Char('q')));
        assert_eq!(harness.state.search_input, "q");

        harness.press(KeyCode::Esc);
        assert!(harness.press(KeyCode::Char('q')));
    }

    #[test]
    fn diff_without_key_reports_refusal() {
        let mut harness = Harness::new(TestRuntime::sample());
        harness.press(KeyCode::Char('d'));
        assert_eq!(harness.state.view.mode(), DisplayMode::Standard);
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("select a key before diffing")
        );
    }

    #[test]
    fn diff_flow_through_keyboard() {
        let mut harness = Harness::new(TestRuntime::sample());
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('d'));
        assert_eq!(harness.state.focus, Pane::Keys);

        harness.press(KeyCode::Down);
        harness.press(KeyCode::Enter);
        assert_eq!(harness.state.view.diff_right().key_name(), "app:cache");
        assert_eq!(
            harness.state.display_text(),
            "[red]-{\"host\":\"b\",\"port\":1}[white]\n[green]+{\"host\":\"c\",\"port\":1}[white]"
        );

        harness.press(KeyCode::Char('j'));
        assert_eq!(
            harness.state.display_text(),
            " {\n[red]-  \"host\": \"b\",[white]\n[green]+  \"host\": \"c\",[white]\n   \"port\": 1\n }"
        );
        assert!(header_text(&harness.state).contains("diff app:db vs app:cache"));
    }

    #[test]
    fn revision_picker_moves_selection() {
        let mut harness = Harness::new(TestRuntime::sample());
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Esc);
        assert_eq!(harness.state.focus, Pane::PrimaryRevisions);

        harness.press(KeyCode::Down);
        assert_eq!(harness.state.display_text(), "{\"host\":\"a\",\"port\":1}");
        harness.press(KeyCode::Home);
        assert_eq!(harness.state.display_text(), "{\"host\":\"b\",\"port\":1}");
        assert_eq!(revision_labels(harness.state.view.primary()).len(), 2);
    }

    #[test]
    fn key_search_filters_on_enter_and_clears_on_escape() {
        let mut harness = Harness::new(TestRuntime::sample());
        harness.press(KeyCode::Char('/'));
        assert_eq!(harness.state.focus, Pane::KeySearch);
        harness.type_text("app");
        assert!(status_text(&harness.state).starts_with("search keys: app_"));
        harness.press(KeyCode::Enter);

        assert_eq!(harness.state.keys.visible(), ["app:db", "app:cache"]);
        assert_eq!(keys_title(&harness.state), "keys /app/ (2/3)");

        harness.press(KeyCode::Char('/'));
        harness.press(KeyCode::Esc);
        assert_eq!(harness.state.keys.visible().len(), 3);
    }

    #[test]
    fn value_search_highlights_matches() {
        let mut harness = Harness::new(TestRuntime::sample());
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('/'));
        harness.type_text("host");
        harness.press(KeyCode::Enter);
        assert_eq!(harness.state.value_query, "host");

        let lines = value_lines(&harness.state);
        let highlighted: Vec<String> = lines
            .iter()
            .flat_map(|line| line.spans.iter())
            .filter(|span| span.style == highlight_style())
            .map(|span| span.content.to_string())
            .collect();
        assert_eq!(highlighted, vec!["host"]);
    }

    #[test]
    fn value_search_count_in_diff_mode_matches_highlights() {
        let mut harness = Harness::new(TestRuntime::sample());
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('d'));
        harness.press(KeyCode::Down);
        harness.press(KeyCode::Enter);
        assert_eq!(harness.state.view.mode(), DisplayMode::Diff);

        harness.press(KeyCode::Char('/'));
        harness.type_text("white");
        harness.press(KeyCode::Enter);
        assert!(value_title(&harness.state).ends_with("/white/ 0 matches"));

        harness.press(KeyCode::Char('/'));
        for _ in 0.."white".len() {
            harness.press(KeyCode::Backspace);
        }
        harness.type_text("host");
        harness.press(KeyCode::Enter);
        let highlighted = value_lines(&harness.state)
            .iter()
            .flat_map(|line| line.spans.iter())
            .filter(|span| span.style == highlight_style())
            .count();
        assert_eq!(highlighted, 2);
        assert!(value_title(&harness.state).ends_with("/host/ 2 matches"));
    }

    #[test]
    fn highlight_spans_split_around_matches() {
        let spans = highlight_spans("a-b-a", "a", Style::default());
        let texts: Vec<&str> = spans.iter().map(|span| span.content.as_ref()).collect();
        assert_eq!(texts, vec!["a", "-b-", "a"]);

        let plain = highlight_spans("", "", Style::default());
        assert_eq!(plain.len(), 1);
    }

    #[test]
    fn server_picker_switches_endpoint() {
        let mut harness = Harness::new(TestRuntime::sample());
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('s'));
        assert_eq!(harness.state.focus, Pane::Server);

        harness.press(KeyCode::Down);
        harness.press(KeyCode::Enter);
        assert_eq!(
            harness.runtime.connected,
            vec!["https://one.example", "https://two.example"]
        );
        assert_eq!(harness.state.focus, Pane::Keys);
        assert!(harness.state.view.primary().is_empty());
        assert_eq!(harness.state.keys.all().len(), 3);
    }

    #[test]
    fn connect_failure_is_reported_without_fetching_keys() {
        let runtime = TestRuntime {
            connect_error: Some("bad endpoint".to_owned()),
            ..TestRuntime::sample()
        };
        let harness = Harness::new(runtime);
        assert!(harness.state.keys.all().is_empty());
        let status = harness.state.status_line.clone().unwrap_or_default();
        assert!(status.contains("connect to https://one.example failed: bad endpoint"), "{status}");
    }

    #[test]
    fn key_fetch_failure_shows_in_status() {
        let runtime = TestRuntime {
            keys_error: Some("server error (500)".to_owned()),
            ..TestRuntime::sample()
        };
        let harness = Harness::new(runtime);
        assert_eq!(
            harness.state.status_line.as_deref(),
            Some("load keys failed: server error (500)")
        );
    }

    #[test]
    fn late_revisions_for_superseded_key_are_dropped() {
        let runtime = TestRuntime {
            defer_revisions: true,
            ..TestRuntime::sample()
        };
        let mut harness = Harness::new(runtime);
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Down);
        harness.press(KeyCode::Enter);
        assert_eq!(harness.runtime.deferred.len(), 2);
        assert_eq!(harness.state.focus, Pane::Keys);

        let first = harness.runtime.deferred[0].clone();
        let second = harness.runtime.deferred[1].clone();
        harness.deliver(second);
        harness.deliver(first);
        assert_eq!(harness.state.view.primary().key_name(), "app:cache");
        assert_eq!(harness.state.display_text(), "{\"host\":\"c\",\"port\":1}");
    }

    #[test]
    fn reload_refetches_keys_and_resets_primary() {
        let mut harness = Harness::new(TestRuntime::sample());
        harness.press(KeyCode::Enter);
        harness.runtime.keys.push(entry("new:key", "", 3));
        harness.press(KeyCode::Char('r'));

        assert_eq!(harness.state.keys.all().len(), 4);
        assert!(harness.state.view.primary().is_empty());
        assert_eq!(harness.state.focus, Pane::Keys);
    }

    #[test]
    fn value_pane_scrolls_without_touching_state() {
        let mut harness = Harness::new(TestRuntime::sample());
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::PageDown);
        assert_eq!(harness.view_data.value_scroll, 10);
        harness.press(KeyCode::Up);
        assert_eq!(harness.view_data.value_scroll, 9);
        harness.press(KeyCode::Home);
        assert_eq!(harness.view_data.value_scroll, 0);

        harness.press(KeyCode::PageDown);
        harness.press(KeyCode::Char('j'));
        assert_eq!(harness.view_data.value_scroll, 0);
    }

    #[test]
    fn help_overlay_absorbs_keys() {
        let mut harness = Harness::new(TestRuntime::sample());
        harness.press(KeyCode::Char('?'));
        assert!(harness.view_data.help_visible);
        assert!(!harness.press(KeyCode::Char('q')));
        harness.press(KeyCode::Char('?'));
        assert!(!harness.view_data.help_visible);
        assert!(help_overlay_text().contains("toggle diff"));
    }

    #[test]
    fn status_text_shows_mode_and_message() {
        let mut harness = Harness::new(TestRuntime::sample());
        assert!(status_text(&harness.state).starts_with("VIEW | 3 keys |"));
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('d'));
        assert!(status_text(&harness.state).starts_with("DIFF | select a key to diff against"));
    }

    #[test]
    fn render_draws_every_pane() -> Result<()> {
        let mut harness = Harness::new(TestRuntime::sample());
        harness.press(KeyCode::Enter);
        harness.press(KeyCode::Char('d'));
        harness.press(KeyCode::Char('s'));

        let mut terminal = Terminal::new(TestBackend::new(120, 40))?;
        terminal.draw(|frame| render(frame, &harness.state, &harness.view_data))?;
        let buffer = terminal.backend().buffer();
        let text: String = buffer
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect();
        assert!(text.contains("servers"));
        assert!(text.contains("left: app:db"));
        assert!(text.contains("right: -"));
        Ok(())
    }
}
