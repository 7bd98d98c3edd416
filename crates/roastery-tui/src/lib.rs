// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use roastery_app::binding::{
    CONFIRM_MODAL, EDITING, FIELD_ERROR, MODAL, SAVING, SEARCH_EMPTY, TOOLTIP, TOOLTIP_POPUP,
};
use roastery_app::{
    Document, Key, Millis, NodeId, Page, PageCommand, PageEvent, Rect as PageRect, RequestId,
    SaveOutcome, SaveRequest, SaveTransport, Severity, SortDirection, SortableTable,
};
use std::collections::BTreeMap;
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

const MAX_POLL: Duration = Duration::from_millis(120);
const SORT_MARK_ASC: &str = "▲";
const SORT_MARK_DESC: &str = "▼";
const EDIT_CURSOR: &str = "▏";
const NEWLINE_MARK: &str = "⏎";
const MIN_COLUMN_WIDTH: usize = 4;
const MAX_COLUMN_WIDTH: usize = 32;
const KEY_HINTS: &str = "tab/shift-tab move · enter activate · esc cancel · q quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    SaveFinished {
        request: RequestId,
        outcome: SaveOutcome,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct StatusLine {
    message: String,
    severity: Severity,
    expires_at: Millis,
}

#[derive(Debug, Default)]
struct ViewData {
    status: Option<StatusLine>,
    in_flight: usize,
    hitboxes: BTreeMap<NodeId, PageRect>,
    viewport: PageRect,
}

impl ViewData {
    fn notify(&mut self, message: impl Into<String>, severity: Severity, now: Millis, duration: Millis) {
        self.status = Some(StatusLine {
            message: message.into(),
            severity,
            expires_at: now.saturating_add(duration),
        });
    }

    fn expire(&mut self, now: Millis) {
        if self
            .status
            .as_ref()
            .is_some_and(|status| status.expires_at <= now)
        {
            self.status = None;
        }
    }

    fn status_deadline(&self) -> Option<Millis> {
        self.status.as_ref().map(|status| status.expires_at)
    }
}

/// Runs saves off the UI thread and reports back over the internal channel.
#[derive(Clone)]
struct SaveWorkers {
    transport: Arc<dyn SaveTransport>,
    tx: Sender<InternalEvent>,
}

impl SaveWorkers {
    fn spawn(&self, request: SaveRequest) {
        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let outcome = SaveOutcome::from_result(transport.send(&request));
            if tx
                .send(InternalEvent::SaveFinished {
                    request: request.id,
                    outcome,
                })
                .is_err()
            {
                tracing::debug!(request = %request.id, "ui gone before save finished");
            }
        });
    }
}

pub fn run_app(page: &mut Page, transport: Arc<dyn SaveTransport>) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let (tx, rx) = mpsc::channel();
    let workers = SaveWorkers { transport, tx };
    let mut view_data = ViewData::default();
    let clock = Instant::now();

    page.wire();
    settle_focus(page, &[]);

    let result = event_loop(&mut terminal, page, &mut view_data, &workers, &rx, clock);

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    page: &mut Page,
    view_data: &mut ViewData,
    workers: &SaveWorkers,
    rx: &Receiver<InternalEvent>,
    clock: Instant,
) -> Result<()> {
    loop {
        let now = elapsed_millis(clock);
        while let Ok(event) = rx.try_recv() {
            handle_internal_event(page, view_data, workers, event, now);
        }
        let events = page.dispatch(PageCommand::Tick(now));
        apply_events(page, view_data, workers, events, now);
        view_data.expire(now);

        terminal
            .draw(|frame| render(frame, page, view_data))
            .context("draw frame")?;

        let timeout = poll_timeout(now, &[page.next_deadline(), view_data.status_deadline()]);
        if !event::poll(timeout).context("poll event")? {
            continue;
        }
        match event::read().context("read event")? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                let now = elapsed_millis(clock);
                if handle_key_event(page, view_data, workers, key, now) {
                    return Ok(());
                }
            }
            _ => {}
        }
    }
}

fn elapsed_millis(clock: Instant) -> Millis {
    Millis::try_from(clock.elapsed().as_millis()).unwrap_or(Millis::MAX)
}

/// Sleeps no longer than the nearest pending deadline.
fn poll_timeout(now: Millis, deadlines: &[Option<Millis>]) -> Duration {
    deadlines
        .iter()
        .flatten()
        .map(|deadline| Duration::from_millis(deadline.saturating_sub(now)))
        .min()
        .map_or(MAX_POLL, |wait| wait.min(MAX_POLL))
}

fn handle_internal_event(
    page: &mut Page,
    view_data: &mut ViewData,
    workers: &SaveWorkers,
    event: InternalEvent,
    now: Millis,
) {
    match event {
        InternalEvent::SaveFinished { request, outcome } => {
            view_data.in_flight = view_data.in_flight.saturating_sub(1);
            let previous = focus_chain(page.document(), page.document().focused());
            let events = page.dispatch(PageCommand::SaveFinished { request, outcome });
            apply_events(page, view_data, workers, events, now);
            settle_focus(page, &previous);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Entry {
    None,
    Line,
    Multiline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TextEdit {
    Insert(char),
    Backspace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HostAction {
    Quit,
    FocusNext,
    FocusPrev,
    Page(Key),
    Edit(TextEdit),
    Ignore,
}

fn entry_kind(doc: &Document, node: Option<NodeId>) -> Entry {
    let Some(node) = node else {
        return Entry::None;
    };
    match doc.tag(node) {
        "textarea" => Entry::Multiline,
        "input"
            if !matches!(
                doc.attr(node, "type"),
                Some("submit" | "button" | "checkbox" | "radio" | "hidden")
            ) =>
        {
            Entry::Line
        }
        _ => Entry::None,
    }
}

fn action_for_key(key: KeyEvent, entry: Entry) -> HostAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let typing = entry != Entry::None;
    match key.code {
        KeyCode::Char('c') if ctrl => HostAction::Quit,
        KeyCode::Tab | KeyCode::Down => HostAction::FocusNext,
        KeyCode::BackTab | KeyCode::Up => HostAction::FocusPrev,
        KeyCode::Right if !typing => HostAction::FocusNext,
        KeyCode::Left if !typing => HostAction::FocusPrev,
        KeyCode::Esc => HostAction::Page(Key::Escape),
        KeyCode::Enter if ctrl => HostAction::Page(Key::CtrlEnter),
        KeyCode::Enter if entry == Entry::Multiline => HostAction::Edit(TextEdit::Insert('\n')),
        KeyCode::Enter => HostAction::Page(Key::Enter),
        KeyCode::Backspace if typing => HostAction::Edit(TextEdit::Backspace),
        KeyCode::Char(ch) if typing && !ctrl => HostAction::Edit(TextEdit::Insert(ch)),
        KeyCode::Char(' ') => HostAction::Page(Key::Space),
        KeyCode::Char('q') => HostAction::Quit,
        _ => HostAction::Ignore,
    }
}

/// Applies one keystroke to a text field. A field whose whole value is
/// selected gets replaced by the first keystroke.
fn edited_value(doc: &Document, node: NodeId, edit: TextEdit) -> String {
    let mut value = if doc.attr(node, "data-selection") == Some("all") {
        String::new()
    } else {
        doc.value(node).to_owned()
    };
    match edit {
        TextEdit::Insert(ch) => value.push(ch),
        TextEdit::Backspace => {
            value.pop();
        }
    }
    value
}

/// Returns true when the app should exit.
fn handle_key_event(
    page: &mut Page,
    view_data: &mut ViewData,
    workers: &SaveWorkers,
    key: KeyEvent,
    now: Millis,
) -> bool {
    // Timers started by this key must count from the moment it arrived.
    let due = page.dispatch(PageCommand::Tick(now));
    apply_events(page, view_data, workers, due, now);

    let focused = page.document().focused();
    let entry = entry_kind(page.document(), focused);
    let events = match action_for_key(key, entry) {
        HostAction::Quit => return true,
        HostAction::Ignore => return false,
        HostAction::FocusNext => move_focus(page, 1),
        HostAction::FocusPrev => move_focus(page, -1),
        HostAction::Page(key) => {
            let previous = focus_chain(page.document(), focused);
            let events = page.dispatch(PageCommand::Key { node: focused, key });
            settle_focus(page, &previous);
            events
        }
        HostAction::Edit(edit) => match focused {
            Some(node) => {
                let value = edited_value(page.document(), node, edit);
                page.dispatch(PageCommand::Input { node, value })
            }
            None => Vec::new(),
        },
    };
    apply_events(page, view_data, workers, events, now);
    sync_tooltip(page, view_data);
    false
}

/// Focusable nodes in document order, confined to whichever overlay is open.
fn focus_ring(page: &Page) -> Vec<NodeId> {
    let doc = page.document();
    let scope = page
        .confirm_modal()
        .or_else(|| page.open_modal())
        .unwrap_or_else(|| doc.root());
    doc.descendants(scope)
        .into_iter()
        .filter(|node| doc.is_focusable(*node))
        .collect()
}

fn next_in_ring(ring: &[NodeId], current: Option<NodeId>, delta: isize) -> Option<NodeId> {
    if ring.is_empty() {
        return None;
    }
    let len = isize::try_from(ring.len()).unwrap_or(isize::MAX);
    let index = match current.and_then(|current| ring.iter().position(|node| *node == current)) {
        Some(position) => (isize::try_from(position).unwrap_or(0) + delta).rem_euclid(len),
        None if delta >= 0 => 0,
        None => len - 1,
    };
    usize::try_from(index)
        .ok()
        .and_then(|index| ring.get(index).copied())
}

fn move_focus(page: &mut Page, delta: isize) -> Vec<PageEvent> {
    let ring = focus_ring(page);
    let current = page.document().focused();
    let Some(next) = next_in_ring(&ring, current, delta) else {
        return Vec::new();
    };
    let fallback = focus_chain(page.document(), Some(next));

    let mut events = Vec::new();
    if let Some(current) = current.filter(|current| *current != next && page.is_edit_input(*current)) {
        events = page.dispatch(PageCommand::Blur {
            node: current,
            related: Some(next),
        });
    }
    page.document_mut().focus(next);
    settle_focus(page, &fallback);
    events
}

/// `node` followed by its ancestors.
fn focus_chain(doc: &Document, node: Option<NodeId>) -> Vec<NodeId> {
    let mut chain = Vec::new();
    let mut cursor = node;
    while let Some(current) = cursor {
        chain.push(current);
        cursor = doc.parent(current);
    }
    chain
}

/// Puts focus back somewhere sensible when the focused node went away,
/// preferring the closest surviving entry of `previous`.
fn settle_focus(page: &mut Page, previous: &[NodeId]) {
    let doc = page.document();
    if doc
        .focused()
        .is_some_and(|node| doc.is_attached(node) && !doc.is_hidden(node))
    {
        return;
    }
    let ring = focus_ring(page);
    let target = previous
        .iter()
        .copied()
        .find(|node| ring.contains(node))
        .or_else(|| ring.first().copied());
    if let Some(target) = target {
        page.document_mut().focus(target);
    }
}

/// Keeps the tooltip attached to the focused node, the terminal's stand-in
/// for pointer hover.
fn sync_tooltip(page: &mut Page, view_data: &ViewData) {
    let wanted = page
        .document()
        .focused()
        .filter(|node| page.has_tooltip(*node));
    let shown = page.tooltip().map(|active| active.anchor);
    if wanted == shown {
        return;
    }
    if let Some(anchor) = shown {
        page.dispatch(PageCommand::PointerLeave(anchor));
    }
    if let Some(node) = wanted {
        let anchor = view_data
            .hitboxes
            .get(&node)
            .copied()
            .unwrap_or(PageRect::new(0, 0, 1, 1));
        page.dispatch(PageCommand::PointerEnter {
            node,
            anchor,
            viewport: view_data.viewport,
        });
    }
}

fn apply_events(
    page: &mut Page,
    view_data: &mut ViewData,
    workers: &SaveWorkers,
    events: Vec<PageEvent>,
    now: Millis,
) {
    let duration = page.defaults().toast_duration;
    for event in events {
        match event {
            PageEvent::SaveRequested(request) => {
                tracing::debug!(request = %request.id, endpoint = %request.endpoint, "dispatching save");
                view_data.in_flight += 1;
                workers.spawn(request);
            }
            PageEvent::Toast(toast) => {
                view_data.notify(toast.message, toast.severity, now, toast.duration);
            }
            PageEvent::Navigate(href) => {
                view_data.notify(format!("→ {href}"), Severity::Info, now, duration);
            }
            PageEvent::SubmitForm(form) => {
                let target = page
                    .document()
                    .attr(form, "action")
                    .unwrap_or("form")
                    .to_owned();
                view_data.notify(format!("submitted {target}"), Severity::Success, now, duration);
            }
            PageEvent::InvokeAction { name, .. } => {
                view_data.notify(format!("action: {name}"), Severity::Info, now, duration);
            }
            PageEvent::SortChanged(change) => {
                let label = page
                    .tables()
                    .iter()
                    .find(|table| table.table() == change.table)
                    .and_then(|table| {
                        table
                            .headers()
                            .iter()
                            .find(|header| header.column == change.column)
                    })
                    .map(|header| page.document().text_content(header.node).trim().to_owned())
                    .unwrap_or_else(|| format!("column {}", change.column + 1));
                view_data.notify(
                    format!("sorted by {label} ({})", change.direction.as_str()),
                    Severity::Info,
                    now,
                    duration,
                );
            }
            PageEvent::FilterApplied(result) => {
                let message = if result.query.is_empty() {
                    format!("showing all {}", result.total)
                } else {
                    format!("{} of {} match {:?}", result.visible, result.total, result.query)
                };
                view_data.notify(message, Severity::Info, now, duration);
            }
            PageEvent::ValidationFailed { errors, .. } => {
                let Some(first) = errors.first() else {
                    continue;
                };
                let doc = page.document();
                let field = doc.attr(first.field, "name").unwrap_or("field").to_owned();
                view_data.notify(
                    format!("{} field(s) need attention; {field}: {}", errors.len(), first.error),
                    Severity::Error,
                    now,
                    duration,
                );
                page.document_mut().focus(first.field);
            }
            PageEvent::DraftSaved(_) => {
                view_data.notify("draft saved", Severity::Success, now, duration);
            }
            PageEvent::DefaultAction(node) => {
                if let Some(href) = page.document().attr(node, "href") {
                    view_data.notify(format!("→ {href}"), Severity::Info, now, duration);
                }
            }
            other => tracing::trace!(event = ?other, "page event"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Plain,
    Heading,
    Control,
    Focused,
    Muted,
    Error,
    Warning,
}

impl Tone {
    fn style(self) -> Style {
        match self {
            Self::Plain => Style::default(),
            Self::Heading => Style::default().add_modifier(Modifier::BOLD),
            Self::Control => Style::default().fg(Color::Cyan),
            Self::Focused => Style::default()
                .fg(Color::Black)
                .bg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
            Self::Muted => Style::default().fg(Color::DarkGray),
            Self::Error => Style::default().fg(Color::Red),
            Self::Warning => Style::default().fg(Color::Yellow),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    text: String,
    tone: Tone,
    node: Option<NodeId>,
}

impl Segment {
    fn new(text: impl Into<String>, tone: Tone, node: Option<NodeId>) -> Self {
        Self {
            text: text.into(),
            tone,
            node,
        }
    }

    fn width(&self) -> usize {
        self.text.chars().count()
    }
}

type ViewLine = Vec<Segment>;

#[derive(Debug, Clone, PartialEq, Eq)]
struct CellView {
    node: NodeId,
    text: String,
    tone: Tone,
    targets: Vec<NodeId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct TableView {
    headers: Vec<CellView>,
    rows: Vec<Vec<CellView>>,
    placeholder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum BlockView {
    Panel(Vec<ViewLine>),
    Table(TableView),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PageView {
    title: String,
    blocks: Vec<BlockView>,
    overlay: Option<(String, Vec<ViewLine>)>,
    tooltip: Option<(PageRect, String)>,
}

fn project(page: &Page) -> PageView {
    let doc = page.document();
    let focused = doc.focused();
    let mut title = None;
    let mut blocks = Vec::new();

    for child in doc.children(doc.root()) {
        if doc.is_hidden(child) || is_overlay(doc, child) {
            continue;
        }
        match doc.tag(child) {
            "h1" if title.is_none() => title = Some(doc.text_content(child).trim().to_owned()),
            "table" => blocks.push(BlockView::Table(table_view(doc, child, focused))),
            _ => {
                let lines = panel_lines(doc, child, focused);
                if !lines.is_empty() {
                    blocks.push(BlockView::Panel(lines));
                }
            }
        }
    }

    let overlay = page
        .confirm_modal()
        .or_else(|| page.open_modal())
        .map(|scope| {
            let mut lines = panel_lines(doc, scope, focused);
            let heading = match lines.first().and_then(|line| line.first()) {
                Some(segment) if segment.tone == Tone::Heading => segment.text.clone(),
                _ => String::new(),
            };
            if !heading.is_empty() {
                lines.remove(0);
            }
            (heading, lines)
        });
    let tooltip = page.tooltip().map(|active| {
        (
            active.rect,
            doc.text_content(active.popup).trim().to_owned(),
        )
    });

    PageView {
        title: title.unwrap_or_default(),
        blocks,
        overlay,
        tooltip,
    }
}

fn is_overlay(doc: &Document, node: NodeId) -> bool {
    [MODAL, CONFIRM_MODAL, TOOLTIP_POPUP]
        .iter()
        .any(|attribute| doc.has_attr(node, attribute))
}

fn panel_lines(doc: &Document, scope: NodeId, focused: Option<NodeId>) -> Vec<ViewLine> {
    let mut lines = Vec::new();
    let mut controls: ViewLine = Vec::new();
    let flush = |lines: &mut Vec<ViewLine>, controls: &mut ViewLine| {
        if !controls.is_empty() {
            lines.push(std::mem::take(controls));
        }
    };

    for node in std::iter::once(scope).chain(doc.descendants(scope)) {
        if doc.is_hidden(node) {
            continue;
        }
        match doc.tag(node) {
            "h1" | "h2" | "h3" => {
                flush(&mut lines, &mut controls);
                let text = doc.text_content(node).trim().to_owned();
                lines.push(vec![Segment::new(text, Tone::Heading, None)]);
            }
            "p" | "label" => {
                flush(&mut lines, &mut controls);
                let text = doc.text_content(node).trim().to_owned();
                lines.push(vec![Segment::new(text, Tone::Plain, None)]);
            }
            "input" | "textarea" | "select" => {
                flush(&mut lines, &mut controls);
                lines.push(field_line(doc, node, focused));
            }
            "span" if doc.has_attr(node, FIELD_ERROR) => {
                flush(&mut lines, &mut controls);
                let text = format!("  ↳ {}", doc.text_content(node).trim());
                lines.push(vec![Segment::new(text, Tone::Error, None)]);
            }
            "button" | "a" => {
                if !controls.is_empty() {
                    controls.push(Segment::new(" ", Tone::Plain, None));
                }
                controls.push(control_segment(doc, node, focused));
            }
            _ if node != scope && doc.is_focusable(node) => {
                if !controls.is_empty() {
                    controls.push(Segment::new(" ", Tone::Plain, None));
                }
                controls.push(control_segment(doc, node, focused));
            }
            _ => {}
        }
    }
    flush(&mut lines, &mut controls);
    lines
}

fn field_line(doc: &Document, node: NodeId, focused: Option<NodeId>) -> ViewLine {
    let label = doc
        .attr(node, "aria-label")
        .or_else(|| doc.attr(node, "name"))
        .unwrap_or_else(|| doc.tag(node));
    let is_focused = focused == Some(node);
    let value = doc.value(node).replace('\n', NEWLINE_MARK);

    let field = if is_focused {
        Segment::new(format!("{value}{EDIT_CURSOR}"), Tone::Focused, Some(node))
    } else if value.is_empty() {
        let placeholder = doc.attr(node, "placeholder").unwrap_or("…");
        Segment::new(placeholder, Tone::Muted, Some(node))
    } else if doc.attr(node, "aria-invalid") == Some("true") {
        Segment::new(value, Tone::Error, Some(node))
    } else {
        Segment::new(value, Tone::Control, Some(node))
    };
    vec![Segment::new(format!("{label}: "), Tone::Plain, None), field]
}

fn control_segment(doc: &Document, node: NodeId, focused: Option<NodeId>) -> Segment {
    let text = doc.text_content(node).trim().to_owned();
    let label = if text.is_empty() {
        doc.attr(node, "title").unwrap_or("•").to_owned()
    } else {
        text
    };
    let tone = if focused == Some(node) {
        Tone::Focused
    } else if doc.has_attr(node, TOOLTIP) {
        Tone::Warning
    } else {
        Tone::Control
    };
    Segment::new(format!("[{label}]"), tone, Some(node))
}

fn table_view(doc: &Document, table: NodeId, focused: Option<NodeId>) -> TableView {
    let mut headers = Vec::new();
    let mut rows = Vec::new();
    let mut placeholder = None;

    for row in doc.descendants(table) {
        if doc.tag(row) != "tr" || doc.is_hidden(row) {
            continue;
        }
        let cells = doc.children(row);
        if doc.closest_tag(row, "thead").is_some()
            || cells.iter().any(|cell| doc.tag(*cell) == "th")
        {
            if headers.is_empty() {
                headers = cells
                    .into_iter()
                    .map(|cell| header_view(doc, cell, focused))
                    .collect();
            }
            continue;
        }
        if doc.has_attr(row, SEARCH_EMPTY) {
            placeholder = Some(doc.text_content(row).trim().to_owned());
            continue;
        }
        rows.push(
            cells
                .into_iter()
                .filter(|cell| doc.tag(*cell) == "td")
                .map(|cell| cell_view(doc, cell, focused))
                .collect(),
        );
    }

    TableView {
        headers,
        rows,
        placeholder,
    }
}

fn header_view(doc: &Document, header: NodeId, focused: Option<NodeId>) -> CellView {
    let mut text = doc.text_content(header).trim().to_owned();
    match SortableTable::direction(doc, header) {
        SortDirection::Asc => {
            text.push(' ');
            text.push_str(SORT_MARK_ASC);
        }
        SortDirection::Desc => {
            text.push(' ');
            text.push_str(SORT_MARK_DESC);
        }
        SortDirection::None => {}
    }
    let tone = if focused == Some(header) {
        Tone::Focused
    } else {
        Tone::Heading
    };
    CellView {
        node: header,
        text,
        tone,
        targets: vec![header],
    }
}

fn cell_view(doc: &Document, cell: NodeId, focused: Option<NodeId>) -> CellView {
    let descendants = doc.descendants(cell);
    let targets: Vec<NodeId> = std::iter::once(cell)
        .chain(descendants.iter().copied())
        .filter(|node| doc.is_focusable(*node))
        .collect();

    let text = if doc.has_attr(cell, EDITING) {
        descendants
            .iter()
            .filter_map(|node| match doc.tag(*node) {
                "input" | "textarea" => {
                    let value = doc.value(*node).replace('\n', NEWLINE_MARK);
                    Some(if focused == Some(*node) {
                        format!("{value}{EDIT_CURSOR}")
                    } else {
                        value
                    })
                }
                "button" => Some(doc.text_content(*node).trim().to_owned()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" ")
    } else {
        doc.text_content(cell).trim().to_owned()
    };

    let has_focus = focused.is_some_and(|node| node == cell || doc.is_ancestor(cell, node));
    let tone = if has_focus {
        Tone::Focused
    } else if doc.has_attr(cell, SAVING) {
        Tone::Muted
    } else if descendants.iter().any(|node| doc.has_attr(*node, TOOLTIP)) {
        Tone::Warning
    } else {
        Tone::Plain
    };
    CellView {
        node: cell,
        text,
        tone,
        targets,
    }
}

fn column_widths(view: &TableView) -> Vec<usize> {
    let columns = view
        .rows
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(view.headers.len()))
        .max()
        .unwrap_or(0);
    (0..columns)
        .map(|column| {
            view.rows
                .iter()
                .filter_map(|row| row.get(column))
                .chain(view.headers.get(column))
                .map(|cell| cell.text.chars().count())
                .max()
                .unwrap_or(0)
                .clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

fn page_rect(area: Rect) -> PageRect {
    PageRect::new(
        i32::from(area.x),
        i32::from(area.y),
        i32::from(area.width),
        i32::from(area.height),
    )
}

/// Clamps a page rectangle onto the terminal.
fn terminal_rect(rect: PageRect, bounds: Rect) -> Rect {
    let clamp = |value: i32, low: u16, high: u16| {
        u16::try_from(value.max(i32::from(low))).map_or(high, |value| value.min(high))
    };
    let x = clamp(rect.x, bounds.x, bounds.right());
    let y = clamp(rect.y, bounds.y, bounds.bottom());
    let right = clamp(rect.right(), x, bounds.right());
    let bottom = clamp(rect.bottom(), y, bounds.bottom());
    Rect::new(x, y, right - x, bottom - y)
}

fn render(frame: &mut ratatui::Frame<'_>, page: &Page, view_data: &mut ViewData) {
    let view = project(page);
    view_data.hitboxes.clear();
    view_data.viewport = page_rect(frame.area());

    let mut constraints = vec![Constraint::Length(3)];
    for block in &view.blocks {
        constraints.push(match block {
            BlockView::Table(_) => Constraint::Min(5),
            BlockView::Panel(lines) => {
                Constraint::Length(u16::try_from(lines.len() + 2).unwrap_or(u16::MAX))
            }
        });
    }
    constraints.push(Constraint::Length(3));
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(frame.area());

    let title = Paragraph::new(view.title.clone())
        .style(Style::default().add_modifier(Modifier::BOLD))
        .block(Block::default().title("roastery").borders(Borders::ALL));
    frame.render_widget(title, layout[0]);

    for (block, area) in view.blocks.iter().zip(layout.iter().skip(1)) {
        match block {
            BlockView::Table(table) => render_table(frame, *area, table, view_data),
            BlockView::Panel(lines) => render_lines(frame, *area, None, lines, view_data),
        }
    }

    let status_area = layout[layout.len() - 1];
    let status = Paragraph::new(status_text(view_data))
        .style(status_style(view_data))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, status_area);

    if let Some((heading, lines)) = &view.overlay {
        let area = centered_rect(60, 50, frame.area());
        frame.render_widget(Clear, area);
        render_lines(frame, area, Some(heading.as_str()), lines, view_data);
    }

    if let Some((rect, text)) = &view.tooltip {
        let area = terminal_rect(*rect, frame.area());
        frame.render_widget(Clear, area);
        let tooltip = Paragraph::new(text.clone())
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(Color::Black).bg(Color::Yellow))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(tooltip, area);
    }
}

fn render_table(frame: &mut ratatui::Frame<'_>, area: Rect, view: &TableView, view_data: &mut ViewData) {
    let widths = column_widths(view);
    let visible_rows = usize::from(area.height.saturating_sub(3)).max(1);
    let focused_row = view
        .rows
        .iter()
        .position(|row| row.iter().any(|cell| cell.tone == Tone::Focused));
    let offset = focused_row
        .map(|row| (row + 1).saturating_sub(visible_rows))
        .unwrap_or(0);

    let column_x = |column: usize| {
        let before: usize = widths.iter().take(column).map(|width| width + 1).sum();
        i32::from(area.x) + 1 + i32::try_from(before).unwrap_or(i32::MAX)
    };
    let mut record = |cell: &CellView, column: usize, y: i32| {
        let width = widths.get(column).copied().unwrap_or(MIN_COLUMN_WIDTH);
        let rect = PageRect::new(column_x(column), y, i32::try_from(width).unwrap_or(i32::MAX), 1);
        for target in &cell.targets {
            view_data.hitboxes.insert(*target, rect);
        }
    };

    let header_y = i32::from(area.y) + 1;
    for (column, header) in view.headers.iter().enumerate() {
        record(header, column, header_y);
    }
    let header = Row::new(
        view.headers
            .iter()
            .map(|cell| Cell::from(cell.text.clone()).style(cell.tone.style())),
    );

    let mut rows = Vec::new();
    for (index, row) in view.rows.iter().enumerate().skip(offset).take(visible_rows) {
        let y = header_y + 1 + i32::try_from(index - offset).unwrap_or(0);
        for (column, cell) in row.iter().enumerate() {
            record(cell, column, y);
        }
        rows.push(Row::new(
            row.iter()
                .map(|cell| Cell::from(cell.text.clone()).style(cell.tone.style())),
        ));
    }
    if rows.is_empty()
        && let Some(placeholder) = &view.placeholder
    {
        rows.push(Row::new(vec![
            Cell::from(placeholder.clone()).style(Tone::Muted.style()),
        ]));
    }

    let constraints = widths
        .iter()
        .map(|width| Constraint::Length(u16::try_from(*width).unwrap_or(u16::MAX)));
    let table = Table::new(rows, constraints)
        .header(header)
        .column_spacing(1)
        .block(Block::default().borders(Borders::ALL).title(table_title(view)));
    frame.render_widget(table, area);
}

fn table_title(view: &TableView) -> String {
    match view.rows.len() {
        1 => "1 row".to_owned(),
        count => format!("{count} rows"),
    }
}

fn render_lines(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    title: Option<&str>,
    lines: &[ViewLine],
    view_data: &mut ViewData,
) {
    let mut rendered = Vec::with_capacity(lines.len());
    for (index, line) in lines.iter().enumerate() {
        let y = i32::from(area.y) + 1 + i32::try_from(index).unwrap_or(i32::MAX);
        let mut x = i32::from(area.x) + 1;
        let mut spans = Vec::with_capacity(line.len());
        for segment in line {
            let width = i32::try_from(segment.width()).unwrap_or(i32::MAX);
            if let Some(node) = segment.node {
                view_data.hitboxes.insert(node, PageRect::new(x, y, width, 1));
            }
            x = x.saturating_add(width);
            spans.push(Span::styled(segment.text.clone(), segment.tone.style()));
        }
        rendered.push(Line::from(spans));
    }

    let mut block = Block::default().borders(Borders::ALL);
    if let Some(title) = title.filter(|title| !title.is_empty()) {
        block = block.title(title.to_owned());
    }
    frame.render_widget(Paragraph::new(rendered).block(block), area);
}

fn status_text(view_data: &ViewData) -> String {
    let mut text = view_data
        .status
        .as_ref()
        .map_or_else(|| KEY_HINTS.to_owned(), |status| status.message.clone());
    if view_data.in_flight > 0 {
        text.push_str(&format!(" · saving {}…", view_data.in_flight));
    }
    text
}

fn status_style(view_data: &ViewData) -> Style {
    match view_data.status.as_ref().map(|status| status.severity) {
        Some(Severity::Success) => Style::default().fg(Color::Green),
        Some(Severity::Error) => Style::default().fg(Color::Red),
        Some(Severity::Info) => Style::default().fg(Color::Yellow),
        None => Style::default().fg(Color::DarkGray),
    }
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
