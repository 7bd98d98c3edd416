// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::NodeId;
use crate::binding::{
    BindingError, SEARCH_DELAY, SEARCH_EMPTY, SEARCH_EMPTY_TEXT, SEARCH_ITEM, SEARCH_MIN_LENGTH,
    SEARCH_TARGET, WidgetDefaults, number_attr, text_attr,
};
use crate::dom::Document;
use crate::timer::{Debounce, Millis};

const DEFAULT_EMPTY_TEXT: &str = "No results found";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    pub target: Option<NodeId>,
    pub min_length: usize,
    pub delay: Millis,
    pub empty_text: String,
}

impl SearchConfig {
    pub fn from_node(doc: &Document, node: NodeId, defaults: &WidgetDefaults) -> Self {
        let target = match text_attr(doc, node, SEARCH_TARGET) {
            Some(selector) => {
                let resolved = doc.resolve(&selector);
                if resolved.is_none() {
                    let error = BindingError::MissingTarget {
                        attribute: SEARCH_TARGET,
                        selector,
                    };
                    tracing::warn!(node = %node, %error, "search input left unbound");
                }
                resolved
            }
            None => None,
        };
        let min_length = number_attr(
            doc,
            node,
            SEARCH_MIN_LENGTH,
            defaults.search_min_length as u64,
        );
        Self {
            target,
            min_length: usize::try_from(min_length).unwrap_or(usize::MAX),
            delay: number_attr(doc, node, SEARCH_DELAY, defaults.search_delay),
            empty_text: text_attr(doc, node, SEARCH_EMPTY_TEXT)
                .unwrap_or_else(|| DEFAULT_EMPTY_TEXT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterResult {
    pub container: NodeId,
    pub query: String,
    pub visible: usize,
    pub total: usize,
}

/// Debounced free-text filter over the `data-search-item` nodes of one
/// container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchFilter {
    input: NodeId,
    config: SearchConfig,
    timer: Debounce,
}

impl SearchFilter {
    pub fn bind(doc: &Document, input: NodeId, defaults: &WidgetDefaults) -> Self {
        let config = SearchConfig::from_node(doc, input, defaults);
        let timer = Debounce::new(config.delay);
        Self {
            input,
            config,
            timer,
        }
    }

    pub fn input(&self) -> NodeId {
        self.input
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.timer.deadline()
    }

    /// Records the keystroke and restarts the quiet period.
    pub fn on_input(&mut self, doc: &mut Document, value: &str, now: Millis) {
        doc.set_value(self.input, value);
        self.timer.schedule(now);
    }

    pub fn tick(&mut self, doc: &mut Document, now: Millis) -> Option<FilterResult> {
        self.timer.fire(now)?;
        self.apply(doc)
    }

    /// Runs one filter pass. Returns `None` when the query is shorter than
    /// the minimum length, leaving the current view untouched.
    pub fn apply(&self, doc: &mut Document) -> Option<FilterResult> {
        let container = self.config.target?;
        let query = doc.value(self.input).trim().to_owned();
        if !query.is_empty() && query.chars().count() < self.config.min_length {
            return None;
        }

        let needle = query.to_lowercase();
        let items: Vec<NodeId> = doc
            .descendants(container)
            .into_iter()
            .filter(|node| doc.has_attr(*node, SEARCH_ITEM))
            .collect();
        let mut visible = 0;
        for item in &items {
            let matches = needle.is_empty() || doc.text_content(*item).to_lowercase().contains(&needle);
            if matches {
                doc.show(*item);
                visible += 1;
            } else {
                doc.hide(*item);
            }
        }

        if !query.is_empty() && visible == 0 {
            let placeholder = self.placeholder(doc, container);
            doc.show(placeholder);
        } else if let Some(placeholder) = find_placeholder(doc, container) {
            doc.hide(placeholder);
        }

        tracing::debug!(container = %container, query = %query, visible, "filter applied");
        Some(FilterResult {
            container,
            query,
            visible,
            total: items.len(),
        })
    }

    fn placeholder(&self, doc: &mut Document, container: NodeId) -> NodeId {
        if let Some(existing) = find_placeholder(doc, container) {
            return existing;
        }
        let node = match doc.tag(container) {
            "tbody" | "table" => {
                let row = doc.element(container, "tr");
                let cell = doc.element(row, "td");
                doc.set_text(cell, self.config.empty_text.clone());
                row
            }
            "ul" | "ol" => {
                let item = doc.element(container, "li");
                doc.set_text(item, self.config.empty_text.clone());
                item
            }
            _ => {
                let block = doc.element(container, "div");
                doc.set_text(block, self.config.empty_text.clone());
                block
            }
        };
        doc.set_attr(node, SEARCH_EMPTY, "");
        node
    }
}

fn find_placeholder(doc: &Document, container: NodeId) -> Option<NodeId> {
    doc.children(container)
        .into_iter()
        .find(|child| doc.has_attr(*child, SEARCH_EMPTY))
}

#[cfg(test)]
mod tests {
    use super::SearchFilter;
    use crate::NodeId;
    use crate::binding::{SEARCH_EMPTY, SEARCH_ITEM, SEARCH_MIN_LENGTH, SEARCH_TARGET, WidgetDefaults};
    use crate::dom::Document;

    fn list_page(items: &[&str], min_length: &str) -> (Document, NodeId, NodeId, Vec<NodeId>) {
        let mut doc = Document::new();
        let input = doc.element(doc.root(), "input");
        doc.set_attr(input, SEARCH_TARGET, "#catalog");
        doc.set_attr(input, SEARCH_MIN_LENGTH, min_length);
        let list = doc.element(doc.root(), "ul");
        doc.set_attr(list, "id", "catalog");
        let nodes = items
            .iter()
            .map(|text| {
                let item = doc.element(list, "li");
                doc.set_attr(item, SEARCH_ITEM, "");
                doc.set_text(item, *text);
                item
            })
            .collect();
        (doc, input, list, nodes)
    }

    fn visible(doc: &Document, items: &[NodeId]) -> Vec<NodeId> {
        items
            .iter()
            .copied()
            .filter(|item| !doc.is_hidden(*item))
            .collect()
    }

    fn placeholders(doc: &Document, list: NodeId) -> usize {
        doc.children(list)
            .into_iter()
            .filter(|child| doc.has_attr(*child, SEARCH_EMPTY))
            .count()
    }

    #[test]
    fn short_query_leaves_view_untouched() {
        let (mut doc, input, _, items) = list_page(&["Arabica", "Cabana", "Robusta"], "2");
        let mut filter = SearchFilter::bind(&doc, input, &WidgetDefaults::default());

        filter.on_input(&mut doc, "a", 0);
        assert_eq!(filter.tick(&mut doc, 300), None);
        assert_eq!(visible(&doc, &items).len(), 3);

        filter.on_input(&mut doc, "AB", 400);
        assert_eq!(filter.tick(&mut doc, 699), None);
        let result = filter.tick(&mut doc, 700).expect("filter pass");
        assert_eq!(result.visible, 2);
        assert_eq!(visible(&doc, &items), vec![items[0], items[1]]);
        assert!(doc.has_attr(items[2], "hidden"));
        assert_eq!(doc.attr(items[2], "style"), Some("display: none"));
    }

    #[test]
    fn only_last_keystroke_in_window_runs() {
        let (mut doc, input, _, _) = list_page(&["Arabica"], "1");
        let mut filter = SearchFilter::bind(&doc, input, &WidgetDefaults::default());

        filter.on_input(&mut doc, "x", 0);
        filter.on_input(&mut doc, "xy", 250);
        assert_eq!(filter.tick(&mut doc, 300), None);
        let result = filter.tick(&mut doc, 550).expect("filter pass");
        assert_eq!(result.query, "xy");
        assert_eq!(filter.tick(&mut doc, 10_000), None);
    }

    #[test]
    fn empty_result_placeholder_is_created_once() {
        let (mut doc, input, list, items) = list_page(&["Arabica", "Bourbon", "Catuaí"], "1");
        let filter = SearchFilter::bind(&doc, input, &WidgetDefaults::default());

        doc.set_value(input, "zzz");
        filter.apply(&mut doc);
        filter.apply(&mut doc);
        assert_eq!(placeholders(&doc, list), 1);
        assert!(visible(&doc, &items).is_empty());

        doc.set_value(input, "");
        let result = filter.apply(&mut doc).expect("filter pass");
        assert_eq!(result.visible, 3);
        assert_eq!(visible(&doc, &items).len(), 3);
        let placeholder = doc
            .children(list)
            .into_iter()
            .find(|child| doc.has_attr(*child, SEARCH_EMPTY))
            .expect("placeholder kept");
        assert!(doc.is_hidden(placeholder));
    }

    #[test]
    fn missing_target_never_filters() {
        let mut doc = Document::new();
        let input = doc.element(doc.root(), "input");
        doc.set_attr(input, SEARCH_TARGET, "#nowhere");
        let mut filter = SearchFilter::bind(&doc, input, &WidgetDefaults::default());

        filter.on_input(&mut doc, "abc", 0);
        assert_eq!(filter.tick(&mut doc, 1_000), None);
    }
}
