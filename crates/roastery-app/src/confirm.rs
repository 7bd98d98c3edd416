// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::NodeId;
use crate::binding::{
    CONFIRM, CONFIRM_ACCEPT, CONFIRM_ACTION, CONFIRM_CANCEL, CONFIRM_MODAL, CONFIRM_TITLE,
    text_attr,
};
use crate::dom::Document;

const DEFAULT_TITLE: &str = "Confirm action";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmConfig {
    pub message: String,
    pub title: String,
    pub action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmTrigger {
    node: NodeId,
    config: ConfirmConfig,
}

impl ConfirmTrigger {
    pub fn bind(doc: &Document, node: NodeId) -> Self {
        Self {
            node,
            config: ConfirmConfig {
                message: doc.attr(node, CONFIRM).unwrap_or_default().trim().to_owned(),
                title: text_attr(doc, node, CONFIRM_TITLE)
                    .unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
                action: text_attr(doc, node, CONFIRM_ACTION),
            },
        }
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn config(&self) -> &ConfirmConfig {
        &self.config
    }
}

/// What a confirmed dialog does, in priority order: follow the trigger's
/// link, submit its form, or run its named action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Navigate(String),
    SubmitForm(NodeId),
    InvokeAction { name: String, trigger: NodeId },
    Nothing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    Confirmed(Resolution),
    Cancelled,
    /// Click landed inside the dialog on something inert.
    Absorbed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenDialog {
    trigger: ConfirmTrigger,
    modal: NodeId,
    accept: NodeId,
    cancel: NodeId,
}

/// The single confirmation modal a page can show at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfirmDialog {
    open: Option<OpenDialog>,
}

impl ConfirmDialog {
    pub fn is_open(&self) -> bool {
        self.open.is_some()
    }

    pub fn modal(&self) -> Option<NodeId> {
        self.open.as_ref().map(|open| open.modal)
    }

    /// Shows the dialog for `trigger`. The trigger's own default action is
    /// suppressed by the caller simply not emitting it.
    pub fn open(&mut self, doc: &mut Document, trigger: &ConfirmTrigger) -> Option<NodeId> {
        if self.is_open() {
            return None;
        }
        let modal = doc.element(doc.root(), "div");
        doc.set_attr(modal, CONFIRM_MODAL, "");
        doc.set_attr(modal, "role", "dialog");
        doc.set_attr(modal, "aria-modal", "true");

        let title = doc.element(modal, "h3");
        doc.set_text(title, trigger.config.title.clone());
        let message = doc.element(modal, "p");
        doc.set_text(message, trigger.config.message.clone());

        let cancel = doc.element(modal, "button");
        doc.set_attr(cancel, CONFIRM_CANCEL, "");
        doc.set_text(cancel, "Cancel");
        let accept = doc.element(modal, "button");
        doc.set_attr(accept, CONFIRM_ACCEPT, "");
        doc.set_text(accept, "Confirm");
        doc.focus(cancel);

        self.open = Some(OpenDialog {
            trigger: trigger.clone(),
            modal,
            accept,
            cancel,
        });
        Some(modal)
    }

    pub fn click(&mut self, doc: &mut Document, node: NodeId) -> Option<DialogOutcome> {
        let (accept, cancel, modal) = self
            .open
            .as_ref()
            .map(|open| (open.accept, open.cancel, open.modal))?;
        if node == accept {
            return self.confirm(doc);
        }
        if node == cancel || node == modal {
            return self.cancel(doc);
        }
        if doc.is_ancestor(modal, node) {
            return Some(DialogOutcome::Absorbed);
        }
        None
    }

    pub fn confirm(&mut self, doc: &mut Document) -> Option<DialogOutcome> {
        let open = self.open.take()?;
        doc.remove(open.modal);
        let resolution = resolve(doc, &open.trigger);
        tracing::debug!(trigger = %open.trigger.node, ?resolution, "confirmation accepted");
        Some(DialogOutcome::Confirmed(resolution))
    }

    pub fn cancel(&mut self, doc: &mut Document) -> Option<DialogOutcome> {
        let open = self.open.take()?;
        doc.remove(open.modal);
        doc.focus(open.trigger.node);
        Some(DialogOutcome::Cancelled)
    }
}

fn resolve(doc: &Document, trigger: &ConfirmTrigger) -> Resolution {
    let node = trigger.node;
    if doc.tag(node) == "a"
        && let Some(href) = doc.attr(node, "href").map(str::trim).filter(|href| !href.is_empty())
    {
        return Resolution::Navigate(href.to_owned());
    }
    if let Some(form) = doc.closest_tag(node, "form") {
        return Resolution::SubmitForm(form);
    }
    if let Some(name) = &trigger.config.action {
        return Resolution::InvokeAction {
            name: name.clone(),
            trigger: node,
        };
    }
    tracing::warn!(trigger = %node, "confirmed element has no link, form or action");
    Resolution::Nothing
}
