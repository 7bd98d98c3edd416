// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! A wired page: the document plus every widget bound to it. Hosts talk to
//! the widgets only through `PageCommand` in and `PageEvent` out.

use crate::autosave::AutoSave;
use crate::binding::{
    AUTO_SAVE, CONFIRM, MODAL, MODAL_TARGET, QUICK_EDIT, SEARCH, TOOLTIP, VALIDATE,
    WidgetDefaults,
};
use crate::confirm::{ConfirmDialog, ConfirmTrigger, DialogOutcome, Resolution};
use crate::dom::Document;
use crate::overlay::{ActiveTooltip, ModalLayer, ModalTrigger, Rect, Tooltip, TooltipLayer};
use crate::quick_edit::{EditOutcome, QuickEdit};
use crate::save::{SaveOutcome, SaveRequest, Toast, TokenSource};
use crate::search::{FilterResult, SearchFilter};
use crate::sort::{SortChange, SortableTable};
use crate::timer::Millis;
use crate::validation::{FieldError, FormValidator};
use crate::{NodeId, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    CtrlEnter,
    Escape,
    Space,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageCommand {
    Click(NodeId),
    Input {
        node: NodeId,
        value: String,
    },
    Key {
        node: Option<NodeId>,
        key: Key,
    },
    Blur {
        node: NodeId,
        related: Option<NodeId>,
    },
    PointerEnter {
        node: NodeId,
        anchor: Rect,
        viewport: Rect,
    },
    PointerLeave(NodeId),
    Tick(Millis),
    SaveFinished {
        request: RequestId,
        outcome: SaveOutcome,
    },
    Submit(NodeId),
}

/// How a quick-edit session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditEnd {
    Cancelled,
    Unchanged,
    CommittedLocally,
    Saving,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    /// No widget consumed the click; the host performs the node's own action.
    DefaultAction(NodeId),
    Navigate(String),
    SubmitForm(NodeId),
    InvokeAction { name: String, trigger: NodeId },
    SaveRequested(SaveRequest),
    Toast(Toast),
    SortChanged(SortChange),
    FilterApplied(FilterResult),
    EditStarted(NodeId),
    EditFinished { node: NodeId, end: EditEnd },
    ConfirmOpened(NodeId),
    ConfirmClosed { confirmed: bool },
    ModalOpened(NodeId),
    ModalClosed(NodeId),
    TooltipShown { anchor: NodeId, rect: Rect },
    TooltipHidden(NodeId),
    ValidationFailed { form: NodeId, errors: Vec<FieldError> },
    DraftSaved(NodeId),
}

pub struct Page {
    document: Document,
    defaults: WidgetDefaults,
    tokens: Box<dyn TokenSource>,
    now: Millis,
    last_request: u64,
    tables: Vec<SortableTable>,
    edits: Vec<QuickEdit>,
    searches: Vec<SearchFilter>,
    confirms: Vec<ConfirmTrigger>,
    dialog: ConfirmDialog,
    auto_saves: Vec<AutoSave>,
    tooltips: Vec<Tooltip>,
    tooltip_layer: TooltipLayer,
    modal_triggers: Vec<ModalTrigger>,
    modals: ModalLayer,
    validators: Vec<FormValidator>,
}

impl std::fmt::Debug for Page {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Page")
            .field("nodes", &self.document.len())
            .field("now", &self.now)
            .field("tables", &self.tables.len())
            .field("edits", &self.edits.len())
            .field("searches", &self.searches.len())
            .field("confirms", &self.confirms.len())
            .field("auto_saves", &self.auto_saves.len())
            .field("tooltips", &self.tooltips.len())
            .field("modal_triggers", &self.modal_triggers.len())
            .field("validators", &self.validators.len())
            .finish_non_exhaustive()
    }
}

impl Page {
    pub fn new(
        document: Document,
        defaults: WidgetDefaults,
        tokens: impl TokenSource + 'static,
    ) -> Self {
        Self {
            document,
            defaults,
            tokens: Box::new(tokens),
            now: 0,
            last_request: 0,
            tables: Vec::new(),
            edits: Vec::new(),
            searches: Vec::new(),
            confirms: Vec::new(),
            dialog: ConfirmDialog::default(),
            auto_saves: Vec::new(),
            tooltips: Vec::new(),
            tooltip_layer: TooltipLayer::default(),
            modal_triggers: Vec::new(),
            modals: ModalLayer::default(),
            validators: Vec::new(),
        }
    }

    /// Binds every marked node that is not bound yet and returns how many
    /// new bindings were made. Running it again is harmless.
    pub fn wire(&mut self) -> usize {
        let doc = &self.document;
        let before = self.binding_count();

        let bound_tables: Vec<NodeId> = self.tables.iter().map(SortableTable::table).collect();
        self.tables.extend(SortableTable::bind_all(doc, &bound_tables));

        for node in doc.find_by_attr(QUICK_EDIT) {
            if !self.edits.iter().any(|edit| edit.target() == node) {
                self.edits.push(QuickEdit::bind(doc, node));
            }
        }
        for node in doc.find_by_attr(SEARCH) {
            if !self.searches.iter().any(|search| search.input() == node) {
                self.searches
                    .push(SearchFilter::bind(doc, node, &self.defaults));
            }
        }
        for node in doc.find_by_attr(CONFIRM) {
            if !self.confirms.iter().any(|trigger| trigger.node() == node) {
                self.confirms.push(ConfirmTrigger::bind(doc, node));
            }
        }
        for node in doc.find_by_attr(AUTO_SAVE) {
            if !self.auto_saves.iter().any(|auto_save| auto_save.form() == node) {
                self.auto_saves
                    .push(AutoSave::bind(doc, node, &self.defaults));
            }
        }
        for node in doc.find_by_attr(TOOLTIP) {
            if !self.tooltips.iter().any(|tooltip| tooltip.node() == node) {
                self.tooltips.push(Tooltip::bind(doc, node));
            }
        }
        for node in doc.find_by_attr(MODAL_TARGET) {
            if !self.modal_triggers.iter().any(|trigger| trigger.node() == node)
                && let Some(trigger) = ModalTrigger::bind(doc, node)
            {
                self.modal_triggers.push(trigger);
            }
        }
        for node in doc.find_by_attr(VALIDATE) {
            if !self.validators.iter().any(|validator| validator.form() == node) {
                self.validators.push(FormValidator::bind(doc, node));
            }
        }

        let open = self.modals.open_modal();
        for modal in self.document.find_by_attr(MODAL) {
            if Some(modal) != open {
                self.document.hide(modal);
            }
        }

        let added = self.binding_count() - before;
        tracing::debug!(added, total = self.binding_count(), "page wired");
        added
    }

    fn binding_count(&self) -> usize {
        self.tables.len()
            + self.edits.len()
            + self.searches.len()
            + self.confirms.len()
            + self.auto_saves.len()
            + self.tooltips.len()
            + self.modal_triggers.len()
            + self.validators.len()
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Direct document access for hosts that restructure the page; call
    /// `wire` afterwards to bind anything new.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn defaults(&self) -> &WidgetDefaults {
        &self.defaults
    }

    pub fn now(&self) -> Millis {
        self.now
    }

    pub fn tables(&self) -> &[SortableTable] {
        &self.tables
    }

    pub fn tooltip(&self) -> Option<&ActiveTooltip> {
        self.tooltip_layer.active()
    }

    pub fn confirm_modal(&self) -> Option<NodeId> {
        self.dialog.modal()
    }

    pub fn open_modal(&self) -> Option<NodeId> {
        self.modals.open_modal()
    }

    pub fn has_tooltip(&self, node: NodeId) -> bool {
        self.tooltips.iter().any(|tooltip| tooltip.node() == node)
    }

    /// True when `node` is the input of an active quick-edit session.
    pub fn is_edit_input(&self, node: NodeId) -> bool {
        self.edits.iter().any(|edit| edit.input() == Some(node))
    }

    /// Earliest pending timer deadline across all widgets.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.searches
            .iter()
            .filter_map(SearchFilter::deadline)
            .chain(self.auto_saves.iter().filter_map(AutoSave::deadline))
            .min()
    }

    pub fn dispatch(&mut self, command: PageCommand) -> Vec<PageEvent> {
        match command {
            PageCommand::Click(node) => self.click(node),
            PageCommand::Input { node, value } => self.input(node, &value),
            PageCommand::Key { node, key } => self.key(node, key),
            PageCommand::Blur { node, related } => self.blur(node, related),
            PageCommand::PointerEnter {
                node,
                anchor,
                viewport,
            } => self.pointer_enter(node, anchor, viewport),
            PageCommand::PointerLeave(node) => {
                if self.tooltip_layer.hide(&mut self.document, node) {
                    vec![PageEvent::TooltipHidden(node)]
                } else {
                    Vec::new()
                }
            }
            PageCommand::Tick(now) => self.tick(now),
            PageCommand::SaveFinished { request, outcome } => self.save_finished(request, &outcome),
            PageCommand::Submit(form) => self.submit(form),
        }
    }

    fn next_request(&mut self) -> RequestId {
        self.last_request += 1;
        RequestId::new(self.last_request)
    }

    fn click(&mut self, node: NodeId) -> Vec<PageEvent> {
        if self.dialog.is_open() {
            return match self.dialog.click(&mut self.document, node) {
                Some(DialogOutcome::Confirmed(resolution)) => {
                    let mut events = vec![PageEvent::ConfirmClosed { confirmed: true }];
                    events.extend(resolution_event(resolution));
                    events
                }
                Some(DialogOutcome::Cancelled) => vec![PageEvent::ConfirmClosed { confirmed: false }],
                Some(DialogOutcome::Absorbed) | None => Vec::new(),
            };
        }

        if let Some(modal) = self.modals.open_modal() {
            if let Some(closed) = self.modals.click(&mut self.document, node) {
                return vec![PageEvent::ModalClosed(closed)];
            }
            if !self.document.is_ancestor(modal, node) {
                return Vec::new();
            }
        }

        if let Some(edit) = self
            .edits
            .iter_mut()
            .find(|edit| edit.owns_control(node) && edit.input() != Some(node))
        {
            let target = edit.target();
            let outcome = edit.cancel(&mut self.document);
            return edit_events(target, outcome);
        }
        if self.is_edit_input(node) {
            return Vec::new();
        }

        if let Some(table) = self.tables.iter().find(|table| table.owns(node)) {
            return table
                .activate(&mut self.document, node)
                .map(PageEvent::SortChanged)
                .into_iter()
                .collect();
        }

        let confirm = self
            .document
            .closest(node, |doc, candidate| doc.has_attr(candidate, CONFIRM))
            .and_then(|owner| self.confirms.iter().find(|trigger| trigger.node() == owner));
        if let Some(trigger) = confirm {
            return match self.dialog.open(&mut self.document, trigger) {
                Some(_) => vec![PageEvent::ConfirmOpened(trigger.node())],
                None => Vec::new(),
            };
        }

        if let Some(trigger) = self.modal_triggers.iter().find(|trigger| trigger.node() == node) {
            let target = trigger.target();
            if self.modals.show(&mut self.document, trigger) {
                tracing::debug!(modal = %target, "modal opened");
                return vec![PageEvent::ModalOpened(target)];
            }
            return Vec::new();
        }

        let editable = self
            .document
            .closest(node, |doc, candidate| doc.has_attr(candidate, QUICK_EDIT));
        if let Some(edit) = editable.and_then(|target| self.edits.iter_mut().find(|edit| edit.target() == target)) {
            let target = edit.target();
            let outcome = edit.begin(&mut self.document);
            return edit_events(target, outcome);
        }

        if self.document.tag(node) == "button"
            && self.document.attr(node, "type").unwrap_or("submit") == "submit"
            && let Some(form) = self.document.closest_tag(node, "form")
        {
            return self.submit(form);
        }

        vec![PageEvent::DefaultAction(node)]
    }

    fn input(&mut self, node: NodeId, value: &str) -> Vec<PageEvent> {
        let now = self.now;
        self.document.set_value(node, value);

        if let Some(edit) = self.edits.iter().find(|edit| edit.input() == Some(node)) {
            edit.set_value(&mut self.document, value);
        }
        if let Some(search) = self.searches.iter_mut().find(|search| search.input() == node) {
            search.on_input(&mut self.document, value, now);
        }
        for auto_save in &mut self.auto_saves {
            if auto_save.contains(&self.document, node) {
                auto_save.touch(now);
            }
        }
        for validator in &self.validators {
            if validator.watches(node) {
                validator.clear_field(&mut self.document, node);
            }
        }
        Vec::new()
    }

    fn key(&mut self, node: Option<NodeId>, key: Key) -> Vec<PageEvent> {
        let node = node.or(self.document.focused());

        if let Some(input) = node.filter(|node| self.is_edit_input(*node)) {
            let request = self.next_request();
            let tokens = &*self.tokens;
            if let Some(edit) = self.edits.iter_mut().find(|edit| edit.input() == Some(input)) {
                let target = edit.target();
                let outcome = edit.handle_key(&mut self.document, key, request, tokens);
                return edit_events(target, outcome);
            }
        }

        match key {
            Key::Escape => {
                if let Some(DialogOutcome::Cancelled) = self.dialog.cancel(&mut self.document) {
                    return vec![PageEvent::ConfirmClosed { confirmed: false }];
                }
                match self.modals.hide(&mut self.document) {
                    Some(modal) => vec![PageEvent::ModalClosed(modal)],
                    None => Vec::new(),
                }
            }
            Key::Enter | Key::Space => {
                let Some(node) = node else {
                    return Vec::new();
                };
                match self.document.tag(node) {
                    "textarea" => Vec::new(),
                    "input" | "select" if key == Key::Space => Vec::new(),
                    "input" | "select" => match self.document.closest_tag(node, "form") {
                        Some(form) => self.submit(form),
                        None => Vec::new(),
                    },
                    _ => self.click(node),
                }
            }
            Key::CtrlEnter | Key::Other => Vec::new(),
        }
    }

    fn blur(&mut self, node: NodeId, related: Option<NodeId>) -> Vec<PageEvent> {
        if !self.is_edit_input(node) {
            return Vec::new();
        }
        let request = self.next_request();
        let tokens = &*self.tokens;
        let Some(edit) = self.edits.iter_mut().find(|edit| edit.input() == Some(node)) else {
            return Vec::new();
        };
        let target = edit.target();
        let outcome = edit.blur(&mut self.document, related, request, tokens);
        edit_events(target, outcome)
    }

    fn pointer_enter(&mut self, node: NodeId, anchor: Rect, viewport: Rect) -> Vec<PageEvent> {
        let Some(tooltip) = self.tooltips.iter().find(|tooltip| tooltip.node() == node) else {
            return Vec::new();
        };
        let margin = self.defaults.tooltip_margin;
        match self
            .tooltip_layer
            .show(&mut self.document, tooltip, anchor, viewport, margin)
        {
            Some(rect) => vec![PageEvent::TooltipShown { anchor: node, rect }],
            None => Vec::new(),
        }
    }

    fn tick(&mut self, now: Millis) -> Vec<PageEvent> {
        self.now = self.now.max(now);
        let now = self.now;
        let mut events = Vec::new();

        for search in &mut self.searches {
            if let Some(result) = search.tick(&mut self.document, now) {
                events.push(PageEvent::FilterApplied(result));
            }
        }

        let tokens = &*self.tokens;
        let last_request = &mut self.last_request;
        for auto_save in &mut self.auto_saves {
            let next = || {
                *last_request += 1;
                RequestId::new(*last_request)
            };
            if let Some(request) = auto_save.tick(&mut self.document, now, next, tokens) {
                tracing::debug!(form = %auto_save.form(), request = %request.id, "auto-save fired");
                events.push(PageEvent::SaveRequested(request));
            }
        }
        events
    }

    fn save_finished(&mut self, request: RequestId, outcome: &SaveOutcome) -> Vec<PageEvent> {
        let duration = self.defaults.toast_duration;
        if let Some(edit) = self.edits.iter_mut().find(|edit| edit.awaits(request)) {
            return edit
                .finish_save(&mut self.document, request, outcome, duration)
                .map(PageEvent::Toast)
                .into_iter()
                .collect();
        }
        let now = self.now;
        if let Some(auto_save) = self.auto_saves.iter_mut().find(|auto_save| auto_save.awaits(request)) {
            let form = auto_save.form();
            if auto_save.finish_save(&mut self.document, request, outcome, now) {
                return vec![PageEvent::DraftSaved(form)];
            }
            return Vec::new();
        }
        tracing::warn!(request = %request, "ignoring response for a request nobody is waiting on");
        Vec::new()
    }

    fn submit(&mut self, form: NodeId) -> Vec<PageEvent> {
        if let Some(validator) = self.validators.iter().find(|validator| validator.form() == form) {
            let errors = validator.validate(&mut self.document);
            if !errors.is_empty() {
                return vec![PageEvent::ValidationFailed { form, errors }];
            }
        }
        vec![PageEvent::SubmitForm(form)]
    }
}

fn resolution_event(resolution: Resolution) -> Option<PageEvent> {
    match resolution {
        Resolution::Navigate(href) => Some(PageEvent::Navigate(href)),
        Resolution::SubmitForm(form) => Some(PageEvent::SubmitForm(form)),
        Resolution::InvokeAction { name, trigger } => Some(PageEvent::InvokeAction { name, trigger }),
        Resolution::Nothing => None,
    }
}

fn edit_events(target: NodeId, outcome: EditOutcome) -> Vec<PageEvent> {
    let finished = |end| PageEvent::EditFinished { node: target, end };
    match outcome {
        EditOutcome::Ignored => Vec::new(),
        EditOutcome::Started => vec![PageEvent::EditStarted(target)],
        EditOutcome::Cancelled => vec![finished(EditEnd::Cancelled)],
        EditOutcome::Unchanged => vec![finished(EditEnd::Unchanged)],
        EditOutcome::CommittedLocally => vec![finished(EditEnd::CommittedLocally)],
        EditOutcome::SaveRequested(request) => {
            vec![finished(EditEnd::Saving), PageEvent::SaveRequested(request)]
        }
    }
}
