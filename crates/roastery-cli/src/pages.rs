// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Builds a list page for an arbitrary backend resource from its records.

use roastery_app::binding::{
    FIELD, QUICK_EDIT, SAVE_URL, SEARCH, SEARCH_EMPTY_TEXT, SEARCH_ITEM, SEARCH_TARGET, SORT_TYPE,
    SORTABLE,
};
use roastery_app::{Document, SortKind, parse_date};
use roastery_http::Record;

const HIDDEN_FIELDS: [&str; 4] = ["created_at", "updated_at", "description", "url"];
const READ_ONLY_SUFFIXES: [&str; 2] = ["_name", "_display"];

pub fn records_page(resource: &str, records: &[Record]) -> Document {
    let mut doc = Document::new();
    let root = doc.root();

    let title = doc.element(root, "h1");
    doc.set_text(title, humanize(resource));

    let toolbar = doc.element(root, "div");
    let search = doc.element(toolbar, "input");
    doc.set_attr(search, "aria-label", "Search");
    doc.set_attr(search, "placeholder", format!("Search {}", resource.replace(['-', '_'], " ")));
    doc.set_attr(search, SEARCH, "");
    doc.set_attr(search, SEARCH_TARGET, "#records");
    doc.set_attr(search, SEARCH_EMPTY_TEXT, "No matching records");

    let columns = columns(records);
    let table = doc.element(root, "table");
    let head = doc.element(table, "thead");
    let header_row = doc.element(head, "tr");
    for column in &columns {
        let th = doc.element(header_row, "th");
        doc.set_attr(th, SORTABLE, "");
        doc.set_attr(th, SORT_TYPE, column_kind(records, column).as_str());
        doc.set_attr(th, "tabindex", "0");
        doc.set_text(th, humanize(column));
    }

    let body = doc.element(table, "tbody");
    doc.set_attr(body, "id", "records");
    for record in records {
        let row = doc.element(body, "tr");
        doc.set_attr(row, SEARCH_ITEM, "");
        let endpoint = record
            .id()
            .map(|id| format!("/api/v1/{}/{id}/", resource.trim_matches('/')));
        for column in &columns {
            let cell = doc.element(row, "td");
            doc.set_text(cell, record.get(column).unwrap_or_default());
            if let Some(endpoint) = &endpoint
                && is_editable(column)
            {
                doc.set_attr(cell, QUICK_EDIT, "");
                doc.set_attr(cell, SAVE_URL, endpoint.as_str());
                doc.set_attr(cell, FIELD, column.as_str());
                doc.set_attr(cell, "tabindex", "0");
            }
        }
    }

    doc
}

/// `id` first, then every other visible field in name order.
fn columns(records: &[Record]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for record in records {
        for (name, _) in record.fields() {
            if name != "id" && !HIDDEN_FIELDS.contains(&name) && !names.iter().any(|n| n == name) {
                names.push(name.to_owned());
            }
        }
    }
    names.sort();
    names.insert(0, "id".to_owned());
    names
}

fn column_kind(records: &[Record], column: &str) -> SortKind {
    let values: Vec<&str> = records
        .iter()
        .filter_map(|record| record.get(column))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .collect();
    if values.is_empty() {
        return SortKind::String;
    }
    if values.iter().all(|value| value.parse::<f64>().is_ok()) {
        SortKind::Number
    } else if values.iter().all(|value| parse_date(value).is_some()) {
        SortKind::Date
    } else {
        SortKind::String
    }
}

fn is_editable(column: &str) -> bool {
    column != "id" && !READ_ONLY_SUFFIXES.iter().any(|suffix| column.ends_with(suffix))
}

fn humanize(name: &str) -> String {
    let spaced = name.trim_matches('/').replace(['-', '_'], " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::{humanize, records_page};
    use roastery_app::binding::{FIELD, QUICK_EDIT, SAVE_URL, SORT_TYPE};
    use roastery_app::{Document, NodeId};
    use roastery_http::Record;

    fn products() -> Vec<Record> {
        vec![
            Record::from_pairs([
                ("id", "4"),
                ("name", "Café Tradicional 250g"),
                ("sale_price", "15.90"),
                ("category_name", "Café Torrado"),
                ("launched", "2024-03-01"),
                ("created_at", "2024-03-01T10:00:00Z"),
            ]),
            Record::from_pairs([
                ("id", "7"),
                ("name", "Café Gourmet 500g"),
                ("sale_price", "32.50"),
                ("category_name", "Especiais"),
                ("launched", "15/08/2023"),
                ("created_at", "2023-08-15T10:00:00Z"),
            ]),
        ]
    }

    fn headers(doc: &Document) -> Vec<NodeId> {
        doc.descendants(doc.root())
            .into_iter()
            .filter(|&node| doc.tag(node) == "th")
            .collect()
    }

    #[test]
    fn columns_start_with_id_and_skip_timestamps() {
        let doc = records_page("products", &products());
        let labels: Vec<String> = headers(&doc)
            .into_iter()
            .map(|th| doc.text_content(th))
            .collect();
        assert_eq!(
            labels,
            vec!["Id", "Category name", "Launched", "Name", "Sale price"]
        );
    }

    #[test]
    fn sort_kinds_are_inferred_from_values() {
        let doc = records_page("products", &products());
        let kinds: Vec<&str> = headers(&doc)
            .into_iter()
            .map(|th| doc.attr(th, SORT_TYPE).unwrap_or_default())
            .collect();
        assert_eq!(kinds, vec!["number", "string", "date", "string", "number"]);
    }

    #[test]
    fn editable_cells_post_to_the_record_endpoint() {
        let doc = records_page("products", &products());
        let editable: Vec<(String, String)> = doc
            .find_by_attr(QUICK_EDIT)
            .into_iter()
            .map(|cell| {
                (
                    doc.attr(cell, SAVE_URL).unwrap_or_default().to_owned(),
                    doc.attr(cell, FIELD).unwrap_or_default().to_owned(),
                )
            })
            .collect();
        assert_eq!(editable.len(), 6);
        assert!(editable.contains(&("/api/v1/products/7/".to_owned(), "sale_price".to_owned())));
        assert!(!editable.iter().any(|(_, field)| field == "id" || field == "category_name"));
    }

    #[test]
    fn records_without_id_are_read_only() {
        let records = vec![Record::from_pairs([("name", "Embalagem 250g")])];
        let doc = records_page("materials", &records);
        assert!(doc.find_by_attr(QUICK_EDIT).is_empty());
        assert!(doc.find_by_id("records").is_some());
    }

    #[test]
    fn humanize_capitalizes_and_spaces() {
        assert_eq!(humanize("sales-orders"), "Sales orders");
        assert_eq!(humanize("minimum_stock"), "Minimum stock");
        assert_eq!(humanize(""), "");
    }
}
