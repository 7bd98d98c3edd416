// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Arena-backed document tree that the widgets read configuration from and
//! mutate. A detached node stops being reachable from the root and is
//! skipped by queries and renderers. Subtrees dropped with
//! [`Document::remove`] go on a free list and their slots are handed out
//! again by [`Document::create_element`].

use std::collections::BTreeMap;

use crate::NodeId;

pub const HIDDEN_ATTR: &str = "hidden";
pub const HIDDEN_STYLE: &str = "display: none";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    freed: bool,
}

impl Node {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
            children: Vec::new(),
            parent: None,
            freed: false,
        }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    nodes: Vec<Node>,
    free: Vec<NodeId>,
    focused: Option<NodeId>,
    scroll_locked: bool,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new("body")],
            free: Vec::new(),
            focused: None,
            scroll_locked: false,
        }
    }

    pub const fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.get())
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.get())
    }

    /// Arena slots in use or waiting on the free list.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Slots on the free list.
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        if let Some(id) = self.free.pop() {
            if let Some(node) = self.node_mut(id) {
                *node = Node::new(tag);
            }
            return id;
        }
        self.nodes.push(Node::new(tag));
        NodeId::new(self.nodes.len() - 1)
    }

    /// Detaches `id` and frees it along with every descendant. Callers must
    /// forget their handles into the subtree; the slots are reused by later
    /// `create_element` calls.
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root() {
            return;
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.node_mut(current) else {
                continue;
            };
            if node.freed {
                continue;
            }
            node.freed = true;
            node.parent = None;
            stack.append(&mut node.children);
            self.free.push(current);
        }
    }

    /// Creates `tag` and appends it under `parent` in one step.
    pub fn element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.create_element(tag);
        self.append_child(parent, id);
        id
    }

    fn is_live(&self, id: NodeId) -> bool {
        self.node(id).is_some_and(|node| !node.freed)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if parent == child || !self.is_live(parent) || !self.is_live(child) {
            return;
        }
        self.detach(child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.node_mut(parent) {
            node.children.push(child);
        }
    }

    /// Inserts `child` directly after `reference` under the same parent.
    pub fn insert_after(&mut self, reference: NodeId, child: NodeId) {
        let Some(parent) = self.parent(reference) else {
            return;
        };
        if !self.is_live(child) {
            return;
        }
        self.detach(child);
        let Some(node) = self.node_mut(parent) else {
            return;
        };
        let index = node
            .children
            .iter()
            .position(|candidate| *candidate == reference)
            .map_or(node.children.len(), |index| index + 1);
        node.children.insert(index, child);
        if let Some(node) = self.node_mut(child) {
            node.parent = Some(parent);
        }
    }

    pub fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        if let Some(node) = self.node_mut(parent) {
            node.children.retain(|child| *child != id);
        }
        if let Some(node) = self.node_mut(id) {
            node.parent = None;
        }
        if let Some(focused) = self.focused
            && (focused == id || self.is_ancestor(id, focused))
        {
            self.focused = None;
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).and_then(Node::parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.node(id)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    /// Rewrites the child order of `parent`. Entries that are not children of
    /// `parent` are ignored and children missing from `order` keep their
    /// relative order after the listed ones.
    pub fn reorder_children(&mut self, parent: NodeId, order: &[NodeId]) {
        let current = self.children(parent);
        let mut next: Vec<NodeId> = order
            .iter()
            .copied()
            .filter(|id| current.contains(id))
            .collect();
        next.dedup();
        for id in current {
            if !next.contains(&id) {
                next.push(id);
            }
        }
        if let Some(node) = self.node_mut(parent) {
            node.children = next;
        }
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == self.root() {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cursor = self.parent(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    pub fn tag(&self, id: NodeId) -> &str {
        self.node(id).map_or("", Node::tag)
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.node(id)
            .and_then(|node| node.attributes.get(name))
            .map(String::as_str)
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        if let Some(node) = self.node_mut(id) {
            node.attributes.insert(name.to_owned(), value.into());
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(node) = self.node_mut(id) {
            node.attributes.remove(name);
        }
    }

    /// Current value of a form control, empty when unset.
    pub fn value(&self, id: NodeId) -> &str {
        self.attr(id, "value").unwrap_or("")
    }

    pub fn set_value(&mut self, id: NodeId, value: impl Into<String>) {
        self.set_attr(id, "value", value);
    }

    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        out.push_str(&node.text);
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }

    /// Replaces every child of `id` with plain text. The old children are
    /// freed.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        for child in self.children(id) {
            self.remove(child);
        }
        if let Some(node) = self.node_mut(id) {
            node.text = text.into();
        }
    }

    /// Attached descendants of `id` in document order, excluding `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).into_iter().rev().collect();
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children(current).into_iter().rev());
        }
        out
    }

    pub fn find_by_attr(&self, name: &str) -> Vec<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .filter(|id| self.has_attr(*id, name))
            .collect()
    }

    pub fn find_by_id(&self, element_id: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|id| self.attr(*id, "id") == Some(element_id))
    }

    /// Resolves the `#id` selectors that bound elements use to point at
    /// each other. A bare id is accepted too.
    pub fn resolve(&self, selector: &str) -> Option<NodeId> {
        let selector = selector.trim();
        let element_id = selector.strip_prefix('#').unwrap_or(selector);
        if element_id.is_empty() {
            return None;
        }
        self.find_by_id(element_id)
    }

    /// Nearest node, starting at `id` itself, that satisfies `predicate`.
    pub fn closest(&self, id: NodeId, predicate: impl Fn(&Self, NodeId) -> bool) -> Option<NodeId> {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if predicate(self, current) {
                return Some(current);
            }
            cursor = self.parent(current);
        }
        None
    }

    pub fn closest_tag(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        self.closest(id, |doc, node| doc.tag(node) == tag)
    }

    pub fn hide(&mut self, id: NodeId) {
        self.set_attr(id, "style", HIDDEN_STYLE);
        self.set_attr(id, HIDDEN_ATTR, "");
    }

    pub fn show(&mut self, id: NodeId) {
        if self.attr(id, "style") == Some(HIDDEN_STYLE) {
            self.remove_attr(id, "style");
        }
        self.remove_attr(id, HIDDEN_ATTR);
    }

    /// True when `id` or any ancestor is hidden.
    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.closest(id, |doc, node| doc.has_attr(node, HIDDEN_ATTR))
            .is_some()
    }

    pub fn is_focusable(&self, id: NodeId) -> bool {
        if self.has_attr(id, "disabled") || self.is_hidden(id) {
            return false;
        }
        match self.tag(id) {
            "input" => self.attr(id, "type") != Some("hidden"),
            "textarea" | "select" | "button" => true,
            "a" => self.has_attr(id, "href"),
            _ => self.has_attr(id, "tabindex"),
        }
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn focus(&mut self, id: NodeId) {
        if self.is_attached(id) {
            self.focused = Some(id);
        }
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    pub fn scroll_locked(&self) -> bool {
        self.scroll_locked
    }

    pub fn set_scroll_locked(&mut self, locked: bool) {
        self.scroll_locked = locked;
    }
}
