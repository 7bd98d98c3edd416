// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Marker attributes that bind document nodes to widgets, and the typed
//! parsing of their configuration. Parsing happens once at wire time.

use crate::dom::Document;
use crate::timer::Millis;
use crate::NodeId;

pub const SORTABLE: &str = "data-sortable";
pub const SORT_TYPE: &str = "data-sort-type";
pub const SORT_DIRECTION: &str = "data-sort-direction";

pub const QUICK_EDIT: &str = "data-quick-edit";
pub const QUICK_EDIT_CANCEL: &str = "data-quick-edit-cancel";
pub const FIELD: &str = "data-field";
pub const INPUT_KIND: &str = "data-input";
pub const SAVE_URL: &str = "data-save-url";
pub const EDITING: &str = "data-editing";
pub const ORIGINAL_VALUE: &str = "data-original-value";
pub const SAVING: &str = "data-saving";

pub const SEARCH: &str = "data-search";
pub const SEARCH_TARGET: &str = "data-search-target";
pub const SEARCH_ITEM: &str = "data-search-item";
pub const SEARCH_MIN_LENGTH: &str = "data-search-min-length";
pub const SEARCH_DELAY: &str = "data-search-delay";
pub const SEARCH_EMPTY: &str = "data-search-empty";
pub const SEARCH_EMPTY_TEXT: &str = "data-search-empty-text";

pub const CONFIRM: &str = "data-confirm";
pub const CONFIRM_TITLE: &str = "data-confirm-title";
pub const CONFIRM_ACTION: &str = "data-confirm-action";
pub const CONFIRM_MODAL: &str = "data-confirm-modal";
pub const CONFIRM_ACCEPT: &str = "data-confirm-accept";
pub const CONFIRM_CANCEL: &str = "data-confirm-cancel";

pub const AUTO_SAVE: &str = "data-auto-save";
pub const AUTO_SAVE_INTERVAL: &str = "data-auto-save-interval";
pub const AUTO_SAVE_INDICATOR: &str = "data-auto-save-indicator";

pub const TOOLTIP: &str = "data-tooltip";
pub const TOOLTIP_POSITION: &str = "data-tooltip-position";
pub const TOOLTIP_POPUP: &str = "data-tooltip-popup";

pub const MODAL: &str = "data-modal";
pub const MODAL_TARGET: &str = "data-modal-target";
pub const MODAL_CLOSE: &str = "data-modal-close";

pub const VALIDATE: &str = "data-validate";
pub const RULES: &str = "data-rules";
pub const FIELD_ERROR: &str = "data-field-error";

/// Fallback values for attributes a bound element leaves out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WidgetDefaults {
    pub search_delay: Millis,
    pub search_min_length: usize,
    pub auto_save_interval: Millis,
    pub toast_duration: Millis,
    pub indicator_duration: Millis,
    pub tooltip_margin: i32,
}

impl Default for WidgetDefaults {
    fn default() -> Self {
        Self {
            search_delay: 300,
            search_min_length: 1,
            auto_save_interval: 30_000,
            toast_duration: 3_000,
            indicator_duration: 2_000,
            tooltip_margin: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingError {
    InvalidNumber { attribute: &'static str, value: String },
    MissingTarget { attribute: &'static str, selector: String },
}

impl std::fmt::Display for BindingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidNumber { attribute, value } => {
                write!(f, "{attribute} expects a non-negative integer, got {value:?}")
            }
            Self::MissingTarget {
                attribute,
                selector,
            } => write!(f, "{attribute} points at {selector:?}, which is not in the page"),
        }
    }
}

impl std::error::Error for BindingError {}

/// Trimmed, non-empty attribute text.
pub fn text_attr(doc: &Document, node: NodeId, attribute: &str) -> Option<String> {
    doc.attr(node, attribute)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}

/// Reads a numeric attribute; malformed input is logged and `fallback` wins.
pub fn number_attr(doc: &Document, node: NodeId, attribute: &'static str, fallback: u64) -> u64 {
    let Some(raw) = doc.attr(node, attribute) else {
        return fallback;
    };
    match parse_number(attribute, raw) {
        Ok(value) => value,
        Err(error) => {
            tracing::warn!(node = %node, %error, "using default");
            fallback
        }
    }
}

fn parse_number(attribute: &'static str, raw: &str) -> Result<u64, BindingError> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| BindingError::InvalidNumber {
            attribute,
            value: raw.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::{SEARCH_DELAY, number_attr, text_attr};
    use crate::dom::Document;

    #[test]
    fn number_attr_falls_back_on_garbage() {
        let mut doc = Document::new();
        let input = doc.element(doc.root(), "input");

        assert_eq!(number_attr(&doc, input, SEARCH_DELAY, 300), 300);
        doc.set_attr(input, SEARCH_DELAY, " 150 ");
        assert_eq!(number_attr(&doc, input, SEARCH_DELAY, 300), 150);
        doc.set_attr(input, SEARCH_DELAY, "soon");
        assert_eq!(number_attr(&doc, input, SEARCH_DELAY, 300), 300);
    }

    #[test]
    fn text_attr_ignores_blank_values() {
        let mut doc = Document::new();
        let cell = doc.element(doc.root(), "td");
        doc.set_attr(cell, "data-field", "   ");

        assert_eq!(text_attr(&doc, cell, "data-field"), None);
        doc.set_attr(cell, "data-field", " name ");
        assert_eq!(text_attr(&doc, cell, "data-field"), Some("name".to_owned()));
    }
}
