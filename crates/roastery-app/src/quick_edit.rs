// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! In-place editing of a single field. The editing flag and cached original
//! live as attributes on the bound node, so every target carries its own
//! session and there is no page-wide "currently editing" state.

use crate::binding::{
    EDITING, FIELD, INPUT_KIND, ORIGINAL_VALUE, QUICK_EDIT_CANCEL, SAVE_URL, SAVING, text_attr,
};
use crate::dom::Document;
use crate::page::Key;
use crate::save::{SaveBody, SaveOutcome, SaveRequest, Severity, Toast, TokenSource};
use crate::timer::Millis;
use crate::{NodeId, RequestId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputKind {
    #[default]
    Text,
    TextArea,
}

impl InputKind {
    fn parse(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some("textarea") => Self::TextArea,
            _ => Self::Text,
        }
    }

    const fn tag(self) -> &'static str {
        match self {
            Self::Text => "input",
            Self::TextArea => "textarea",
        }
    }

    const fn commits_on(self, key: Key) -> bool {
        matches!(
            (self, key),
            (Self::Text, Key::Enter) | (Self::TextArea, Key::CtrlEnter)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickEditConfig {
    pub endpoint: Option<String>,
    pub field: Option<String>,
    pub input: InputKind,
}

impl QuickEditConfig {
    pub fn from_node(doc: &Document, node: NodeId) -> Self {
        Self {
            endpoint: text_attr(doc, node, SAVE_URL),
            field: text_attr(doc, node, FIELD),
            input: InputKind::parse(doc.attr(node, INPUT_KIND)),
        }
    }

    fn remote(&self) -> Option<(&str, &str)> {
        match (&self.endpoint, &self.field) {
            (Some(endpoint), Some(field)) => Some((endpoint, field)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct InFlight {
    request: RequestId,
    original: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Ignored,
    Started,
    Cancelled,
    Unchanged,
    CommittedLocally,
    SaveRequested(SaveRequest),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuickEdit {
    target: NodeId,
    config: QuickEditConfig,
    input: Option<NodeId>,
    cancel: Option<NodeId>,
    in_flight: Option<InFlight>,
}

impl QuickEdit {
    pub fn bind(doc: &Document, target: NodeId) -> Self {
        let config = QuickEditConfig::from_node(doc, target);
        if config.endpoint.is_some() != config.field.is_some() {
            tracing::warn!(node = %target, "quick-edit needs both data-save-url and data-field; edits stay local");
        }
        Self {
            target,
            config,
            input: None,
            cancel: None,
            in_flight: None,
        }
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn config(&self) -> &QuickEditConfig {
        &self.config
    }

    pub fn input(&self) -> Option<NodeId> {
        self.input
    }

    pub fn is_editing(&self, doc: &Document) -> bool {
        doc.attr(self.target, EDITING) == Some("true")
    }

    pub fn is_saving(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn awaits(&self, request: RequestId) -> bool {
        self.in_flight
            .as_ref()
            .is_some_and(|in_flight| in_flight.request == request)
    }

    /// True for the session's own input and cancel control.
    pub fn owns_control(&self, node: NodeId) -> bool {
        self.input == Some(node) || self.cancel == Some(node)
    }

    pub fn begin(&mut self, doc: &mut Document) -> EditOutcome {
        if self.is_editing(doc) || self.is_saving() {
            return EditOutcome::Ignored;
        }
        let original = doc.text_content(self.target).trim().to_owned();
        doc.set_attr(self.target, EDITING, "true");
        doc.set_attr(self.target, ORIGINAL_VALUE, original.clone());
        doc.set_text(self.target, "");

        let input = doc.element(self.target, self.config.input.tag());
        doc.set_value(input, original);
        doc.set_attr(input, "data-selection", "all");
        let cancel = doc.element(self.target, "button");
        doc.set_attr(cancel, QUICK_EDIT_CANCEL, "");
        doc.set_attr(cancel, "title", "Cancel edit");
        doc.set_text(cancel, "✕");
        doc.focus(input);

        self.input = Some(input);
        self.cancel = Some(cancel);
        tracing::debug!(node = %self.target, "quick-edit started");
        EditOutcome::Started
    }

    pub fn set_value(&self, doc: &mut Document, value: &str) {
        if let Some(input) = self.input {
            doc.set_value(input, value);
            doc.remove_attr(input, "data-selection");
        }
    }

    pub fn handle_key(
        &mut self,
        doc: &mut Document,
        key: Key,
        request: RequestId,
        tokens: &dyn TokenSource,
    ) -> EditOutcome {
        if !self.is_editing(doc) {
            return EditOutcome::Ignored;
        }
        if key == Key::Escape {
            return self.cancel(doc);
        }
        if self.config.input.commits_on(key) {
            return self.commit(doc, request, tokens);
        }
        EditOutcome::Ignored
    }

    /// Focus left the input. Moving onto this session's cancel control
    /// cancels; anything else commits right away.
    pub fn blur(
        &mut self,
        doc: &mut Document,
        related: Option<NodeId>,
        request: RequestId,
        tokens: &dyn TokenSource,
    ) -> EditOutcome {
        if !self.is_editing(doc) {
            return EditOutcome::Ignored;
        }
        if related.is_some() && related == self.cancel {
            return self.cancel(doc);
        }
        self.commit(doc, request, tokens)
    }

    pub fn cancel(&mut self, doc: &mut Document) -> EditOutcome {
        if !self.is_editing(doc) {
            return EditOutcome::Ignored;
        }
        let original = self.leave_edit_mode(doc);
        doc.set_text(self.target, original);
        EditOutcome::Cancelled
    }

    pub fn commit(
        &mut self,
        doc: &mut Document,
        request: RequestId,
        tokens: &dyn TokenSource,
    ) -> EditOutcome {
        if !self.is_editing(doc) {
            return EditOutcome::Ignored;
        }
        let value = self
            .input
            .map(|input| doc.value(input).trim().to_owned())
            .unwrap_or_default();
        let original = self.leave_edit_mode(doc);

        if value == original {
            doc.set_text(self.target, original);
            return EditOutcome::Unchanged;
        }

        doc.set_text(self.target, value.clone());
        let Some((endpoint, field)) = self.config.remote() else {
            tracing::debug!(node = %self.target, "quick-edit kept locally");
            return EditOutcome::CommittedLocally;
        };

        let save = SaveRequest {
            id: request,
            origin: self.target,
            endpoint: endpoint.to_owned(),
            token: tokens.current_token(),
            body: SaveBody::Field {
                name: field.to_owned(),
                value,
            },
        };
        doc.set_attr(self.target, SAVING, "true");
        self.in_flight = Some(InFlight { request, original });
        EditOutcome::SaveRequested(save)
    }

    /// Applies a save result. Responses for any request other than the one
    /// this target is waiting on are dropped.
    pub fn finish_save(
        &mut self,
        doc: &mut Document,
        request: RequestId,
        outcome: &SaveOutcome,
        duration: Millis,
    ) -> Option<Toast> {
        if !self.awaits(request) {
            tracing::warn!(node = %self.target, request = %request, "ignoring stale save response");
            return None;
        }
        let in_flight = self.in_flight.take()?;
        doc.remove_attr(self.target, SAVING);

        if outcome.succeeded() {
            return Some(Toast {
                message: outcome.message().unwrap_or("Saved").to_owned(),
                severity: Severity::Success,
                duration,
            });
        }

        tracing::warn!(node = %self.target, reason = outcome.message().unwrap_or("rejected"), "quick-edit save failed");
        doc.set_text(self.target, in_flight.original);
        Some(Toast {
            message: match outcome.message() {
                Some(message) => format!("Could not save: {message}"),
                None => "Could not save".to_owned(),
            },
            severity: Severity::Error,
            duration,
        })
    }

    fn leave_edit_mode(&mut self, doc: &mut Document) -> String {
        let original = doc
            .attr(self.target, ORIGINAL_VALUE)
            .unwrap_or_default()
            .to_owned();
        doc.remove_attr(self.target, EDITING);
        doc.remove_attr(self.target, ORIGINAL_VALUE);
        self.input = None;
        self.cancel = None;
        original
    }
}
