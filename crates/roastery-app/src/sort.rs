// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::cmp::Ordering;

use time::Date;
use time::macros::format_description;

use crate::NodeId;
use crate::binding::{SEARCH_EMPTY, SORT_DIRECTION, SORT_TYPE, SORTABLE};
use crate::dom::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    None,
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "none" => Some(Self::None),
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub const fn next(self) -> Self {
        match self {
            Self::None | Self::Desc => Self::Asc,
            Self::Asc => Self::Desc,
        }
    }

    const fn aria_label(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::Asc => Some("ascending"),
            Self::Desc => Some("descending"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKind {
    Number,
    Date,
    #[default]
    String,
}

impl SortKind {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "number" => Self::Number,
            "date" => Self::Date,
            _ => Self::String,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Date => "date",
            Self::String => "string",
        }
    }
}

/// Orders two trimmed cell texts. Keys that fail to parse as the declared
/// kind sort after every parsed key and tie with each other.
pub fn compare_keys(kind: SortKind, left: &str, right: &str) -> Ordering {
    match kind {
        SortKind::Number => compare_parsed(parse_number(left), parse_number(right), f64::total_cmp),
        SortKind::Date => compare_parsed(parse_date(left), parse_date(right), Date::cmp),
        SortKind::String => left
            .to_lowercase()
            .cmp(&right.to_lowercase())
            .then_with(|| left.cmp(right)),
    }
}

fn compare_parsed<T>(left: Option<T>, right: Option<T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (left, right) {
        (Some(left), Some(right)) => cmp(&left, &right),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

pub fn parse_date(text: &str) -> Option<Date> {
    let text = text.trim();
    Date::parse(text, &format_description!("[year]-[month]-[day]"))
        .or_else(|_| Date::parse(text, &format_description!("[day]/[month]/[year]")))
        .ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortHeader {
    pub node: NodeId,
    pub column: usize,
    pub kind: SortKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortableTable {
    table: NodeId,
    headers: Vec<SortHeader>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortChange {
    pub table: NodeId,
    pub column: usize,
    pub direction: SortDirection,
}

impl SortableTable {
    /// Groups every `data-sortable` header under its owning table.
    pub fn bind_all(doc: &Document, skip: &[NodeId]) -> Vec<Self> {
        let mut tables: Vec<Self> = Vec::new();
        for header in doc.find_by_attr(SORTABLE) {
            let Some(table) = doc.closest_tag(header, "table") else {
                tracing::warn!(node = %header, "sortable header outside a table");
                continue;
            };
            if skip.contains(&table) {
                continue;
            }
            let sort_header = SortHeader {
                node: header,
                column: column_index(doc, header),
                kind: SortKind::parse(doc.attr(header, SORT_TYPE).unwrap_or_default()),
            };
            match tables.iter_mut().find(|bound| bound.table == table) {
                Some(bound) => bound.headers.push(sort_header),
                None => tables.push(Self {
                    table,
                    headers: vec![sort_header],
                }),
            }
        }
        tables
    }

    pub fn table(&self) -> NodeId {
        self.table
    }

    pub fn headers(&self) -> &[SortHeader] {
        &self.headers
    }

    pub fn owns(&self, header: NodeId) -> bool {
        self.headers.iter().any(|sort_header| sort_header.node == header)
    }

    pub fn direction(doc: &Document, header: NodeId) -> SortDirection {
        doc.attr(header, SORT_DIRECTION)
            .and_then(SortDirection::parse)
            .unwrap_or_default()
    }

    /// Advances the clicked header's direction, resets its siblings and
    /// reorders the body rows in place with a stable sort.
    pub fn activate(&self, doc: &mut Document, header: NodeId) -> Option<SortChange> {
        let sort_header = self.headers.iter().find(|sort_header| sort_header.node == header)?.clone();
        let direction = Self::direction(doc, header).next();

        for other in &self.headers {
            doc.set_attr(other.node, SORT_DIRECTION, SortDirection::None.as_str());
            doc.remove_attr(other.node, "aria-sort");
        }
        doc.set_attr(header, SORT_DIRECTION, direction.as_str());
        if let Some(label) = direction.aria_label() {
            doc.set_attr(header, "aria-sort", label);
        }

        let body = self.body(doc);
        let mut keyed: Vec<(NodeId, String)> = self
            .rows(doc, body)
            .into_iter()
            .map(|row| (row, cell_key(doc, row, sort_header.column)))
            .collect();
        keyed.sort_by(|(_, left), (_, right)| {
            let ordering = compare_keys(sort_header.kind, left, right);
            if direction == SortDirection::Desc {
                ordering.reverse()
            } else {
                ordering
            }
        });
        let order: Vec<NodeId> = keyed.into_iter().map(|(row, _)| row).collect();
        doc.reorder_children(body, &order);

        tracing::debug!(table = %self.table, column = sort_header.column, direction = direction.as_str(), "table sorted");
        Some(SortChange {
            table: self.table,
            column: sort_header.column,
            direction,
        })
    }

    fn body(&self, doc: &Document) -> NodeId {
        doc.children(self.table)
            .into_iter()
            .find(|child| doc.tag(*child) == "tbody")
            .unwrap_or(self.table)
    }

    fn rows(&self, doc: &Document, body: NodeId) -> Vec<NodeId> {
        doc.children(body)
            .into_iter()
            .filter(|row| doc.tag(*row) == "tr" && !doc.has_attr(*row, SEARCH_EMPTY))
            .filter(|row| !self.headers.iter().any(|sort_header| doc.parent(sort_header.node) == Some(*row)))
            .collect()
    }
}

fn is_cell(doc: &Document, node: NodeId) -> bool {
    matches!(doc.tag(node), "th" | "td")
}

fn column_index(doc: &Document, header: NodeId) -> usize {
    let Some(row) = doc.parent(header) else {
        return 0;
    };
    doc.children(row)
        .into_iter()
        .filter(|cell| is_cell(doc, *cell))
        .position(|cell| cell == header)
        .unwrap_or(0)
}

fn cell_key(doc: &Document, row: NodeId, column: usize) -> String {
    doc.children(row)
        .into_iter()
        .filter(|cell| is_cell(doc, *cell))
        .nth(column)
        .map(|cell| doc.text_content(cell).trim().to_owned())
        .unwrap_or_default()
}
