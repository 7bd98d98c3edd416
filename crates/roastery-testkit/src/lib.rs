// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use anyhow::{Result, anyhow};
use roastery_app::binding::{
    AUTO_SAVE, CONFIRM, CONFIRM_TITLE, FIELD, MODAL, MODAL_CLOSE, MODAL_TARGET, QUICK_EDIT,
    RULES, SAVE_URL, SEARCH, SEARCH_EMPTY_TEXT, SEARCH_ITEM, SEARCH_MIN_LENGTH, SEARCH_TARGET,
    SORT_TYPE, SORTABLE, TOOLTIP, TOOLTIP_POSITION, VALIDATE,
};
use roastery_app::{Document, NodeId, SaveRequest, SaveResponse, SaveTransport, StaticToken};
use time::{Date, Month};

pub const DEMO_TOKEN: &str = "demo-csrf-token";

const CATEGORIES: [&str; 4] = ["Café Torrado", "Café Verde", "Embalagens", "Especiais"];
const SUPPLIERS: [&str; 2] = ["Fazenda Santa Clara", "Embalagens Premium Ltda"];

const BLEND_NAMES: [&str; 10] = [
    "Bourbon Amarelo",
    "Catuaí Vermelho",
    "Mundo Novo",
    "Acaiá",
    "Topázio",
    "Icatu",
    "Obatã",
    "Arara",
    "Catucaí",
    "Geisha",
];
const ROASTS: [&str; 3] = ["Torra Clara", "Torra Média", "Torra Escura"];
const WEIGHTS: [(&str, i64); 3] = [("250g", 1), ("500g", 2), ("1kg", 4)];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: u32,
    pub code: String,
    pub name: String,
    pub category: String,
    pub cost_cents: i64,
    pub price_cents: i64,
    pub stock: u32,
    pub minimum_stock: u32,
    pub launched: Date,
}

impl Product {
    pub fn is_low_stock(&self) -> bool {
        self.stock < self.minimum_stock
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Material {
    pub code: String,
    pub name: String,
    pub unit: String,
    pub stock: u32,
    pub supplier: String,
}

pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}{}.{:02}", cents / 100, cents % 100)
}

fn date(year: i32, month: Month, day: u8) -> Date {
    Date::from_calendar_date(year, month, day).unwrap_or(Date::MIN)
}

fn product(
    id: u32,
    name: &str,
    category: &str,
    (cost_cents, price_cents): (i64, i64),
    (stock, minimum_stock): (u32, u32),
    launched: Date,
) -> Product {
    Product {
        id,
        code: format!("PROD{id:03}"),
        name: name.to_owned(),
        category: category.to_owned(),
        cost_cents,
        price_cents,
        stock,
        minimum_stock,
        launched,
    }
}

/// The factory's standing catalog.
pub fn demo_products() -> Vec<Product> {
    vec![
        product(1, "Café Gourmet 250g", CATEGORIES[0], (1_550, 2_590), (150, 20), date(2023, Month::March, 1)),
        product(2, "Café Premium 500g", CATEGORIES[0], (2_800, 4_500), (80, 15), date(2022, Month::November, 14)),
        product(3, "Café Especial 1kg", CATEGORIES[3], (5_200, 8_500), (40, 10), date(2024, Month::June, 3)),
        product(4, "Café Tradicional 250g", CATEGORIES[0], (850, 1_590), (200, 30), date(2021, Month::August, 20)),
        product(5, "Café Orgânico 500g", CATEGORIES[3], (3_500, 5_500), (8, 10), date(2024, Month::February, 9)),
    ]
}

pub fn demo_materials() -> Vec<Material> {
    let material = |code: &str, name: &str, unit: &str, stock: u32, supplier: &str| Material {
        code: code.to_owned(),
        name: name.to_owned(),
        unit: unit.to_owned(),
        stock,
        supplier: supplier.to_owned(),
    };
    vec![
        material("MAT001", "Café Verde Arábica", "kg", 1_200, SUPPLIERS[0]),
        material("MAT002", "Café Verde Conilon", "kg", 640, SUPPLIERS[0]),
        material("MAT003", "Embalagem Valvulada 250g", "un", 5_000, SUPPLIERS[1]),
        material("MAT004", "Embalagem Valvulada 500g", "un", 2_500, SUPPLIERS[1]),
        material("MAT005", "Caixa de Papelão 12un", "un", 300, SUPPLIERS[1]),
    ]
}

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn range(&mut self, min: u64, max: u64) -> u64 {
        if max <= min {
            return min;
        }
        min + self.next_u64() % (max - min + 1)
    }
}

/// Deterministic extra catalog rows for long-table demos and tests.
#[derive(Debug, Clone)]
pub struct CatalogFaker {
    rng: DeterministicRng,
}

impl CatalogFaker {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(if seed == 0 { 1 } else { seed }),
        }
    }

    pub fn product(&mut self, id: u32) -> Product {
        let blend = BLEND_NAMES[self.rng.int_n(BLEND_NAMES.len())];
        let roast = ROASTS[self.rng.int_n(ROASTS.len())];
        let (weight, factor) = WEIGHTS[self.rng.int_n(WEIGHTS.len())];
        let cost_cents = (self.rng.range(700, 1_800) as i64) * factor;
        let margin = self.rng.range(40, 90) as i64;
        let minimum_stock = self.rng.range(5, 30) as u32;
        let days = self.rng.range(0, 1_460) as i64;
        Product {
            id,
            code: format!("PROD{id:03}"),
            name: format!("{blend} {roast} {weight}"),
            category: CATEGORIES[if factor == 4 { 3 } else { 0 }].to_owned(),
            cost_cents,
            price_cents: cost_cents + cost_cents * margin / 100,
            stock: self.rng.range(0, 400) as u32,
            minimum_stock,
            launched: date(2021, Month::January, 1) + time::Duration::days(days),
        }
    }

    pub fn products(&mut self, first_id: u32, count: usize) -> Vec<Product> {
        (0..count)
            .map(|offset| self.product(first_id + offset as u32))
            .collect()
    }
}

pub fn demo_token() -> StaticToken {
    StaticToken(DEMO_TOKEN.to_owned())
}

/// Handles into the nodes tests and hosts poke at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoPage {
    pub document: Document,
    pub search: NodeId,
    pub products: NodeId,
    pub headers: Vec<NodeId>,
    pub name_cells: Vec<NodeId>,
    pub price_cells: Vec<NodeId>,
    pub delete_links: Vec<NodeId>,
    pub notes_form: NodeId,
    pub notes: NodeId,
    pub customer_trigger: NodeId,
    pub customer_modal: NodeId,
    pub customer_form: NodeId,
}

const COLUMNS: [(&str, &str); 7] = [
    ("Código", "string"),
    ("Produto", "string"),
    ("Categoria", "string"),
    ("Custo", "number"),
    ("Preço", "number"),
    ("Estoque", "number"),
    ("Lançamento", "date"),
];

pub fn demo_page() -> DemoPage {
    products_page(&demo_products())
}

/// Builds the products screen: search box, sortable table with quick-edit
/// cells and confirmed deletes, an auto-saved roasting notes form and a
/// validated new-customer form in a modal.
pub fn products_page(products: &[Product]) -> DemoPage {
    let mut doc = Document::new();
    let root = doc.root();

    let title = doc.element(root, "h1");
    doc.set_text(title, "Produtos");

    let toolbar = doc.element(root, "div");
    let search = doc.element(toolbar, "input");
    doc.set_attr(search, "aria-label", "Buscar");
    doc.set_attr(search, "placeholder", "Buscar produto");
    doc.set_attr(search, SEARCH, "");
    doc.set_attr(search, SEARCH_TARGET, "#products");
    doc.set_attr(search, SEARCH_MIN_LENGTH, "2");
    doc.set_attr(search, SEARCH_EMPTY_TEXT, "Nenhum produto encontrado");
    let customer_trigger = doc.element(toolbar, "button");
    doc.set_attr(customer_trigger, "type", "button");
    doc.set_attr(customer_trigger, MODAL_TARGET, "#new-customer");
    doc.set_text(customer_trigger, "Novo cliente");

    let table = doc.element(root, "table");
    doc.set_attr(table, "id", "catalog");
    let head = doc.element(table, "thead");
    let header_row = doc.element(head, "tr");
    let headers = COLUMNS
        .iter()
        .map(|(label, kind)| {
            let th = doc.element(header_row, "th");
            doc.set_attr(th, SORTABLE, "");
            doc.set_attr(th, SORT_TYPE, *kind);
            doc.set_attr(th, "tabindex", "0");
            doc.set_text(th, *label);
            th
        })
        .collect();
    let actions_header = doc.element(header_row, "th");
    doc.set_text(actions_header, "");

    let products_body = doc.element(table, "tbody");
    doc.set_attr(products_body, "id", "products");
    let mut name_cells = Vec::with_capacity(products.len());
    let mut price_cells = Vec::with_capacity(products.len());
    let mut delete_links = Vec::with_capacity(products.len());
    for product in products {
        let row = doc.element(products_body, "tr");
        doc.set_attr(row, SEARCH_ITEM, "");
        let endpoint = format!("/api/v1/products/{}/", product.id);

        let code = doc.element(row, "td");
        doc.set_text(code, product.code.clone());
        let name = doc.element(row, "td");
        doc.set_text(name, product.name.clone());
        editable(&mut doc, name, &endpoint, "name");
        name_cells.push(name);
        let category = doc.element(row, "td");
        doc.set_text(category, product.category.clone());
        let cost = doc.element(row, "td");
        doc.set_text(cost, format_cents(product.cost_cents));
        let price = doc.element(row, "td");
        doc.set_text(price, format_cents(product.price_cents));
        editable(&mut doc, price, &endpoint, "sale_price");
        price_cells.push(price);

        let stock = doc.element(row, "td");
        if product.is_low_stock() {
            let badge = doc.element(stock, "span");
            doc.set_text(badge, product.stock.to_string());
            doc.set_attr(badge, "tabindex", "0");
            doc.set_attr(
                badge,
                TOOLTIP,
                format!("Estoque abaixo do mínimo ({})", product.minimum_stock),
            );
            doc.set_attr(badge, TOOLTIP_POSITION, "right");
        } else {
            doc.set_text(stock, product.stock.to_string());
        }

        let launched = doc.element(row, "td");
        doc.set_text(launched, product.launched.to_string());

        let actions = doc.element(row, "td");
        let delete = doc.element(actions, "a");
        doc.set_attr(delete, "href", format!("/inventory/products/{}/delete/", product.id));
        doc.set_attr(delete, CONFIRM, format!("Excluir {}?", product.name));
        doc.set_attr(delete, CONFIRM_TITLE, "Excluir produto");
        doc.set_text(delete, "Excluir");
        delete_links.push(delete);
    }

    let notes_form = doc.element(root, "form");
    doc.set_attr(notes_form, AUTO_SAVE, "");
    doc.set_attr(notes_form, SAVE_URL, "/production/orders/1/draft/");
    let notes_title = doc.element(notes_form, "h2");
    doc.set_text(notes_title, "Ordem de produção OP-0001");
    let batch = doc.element(notes_form, "input");
    doc.set_attr(batch, "name", "batch");
    doc.set_value(batch, "L-0425");
    let notes = doc.element(notes_form, "textarea");
    doc.set_attr(notes, "name", "notes");
    doc.set_attr(notes, TOOLTIP, "Salvo automaticamente após uma pausa na digitação");
    doc.set_attr(notes, TOOLTIP_POSITION, "bottom");

    let customer_modal = doc.element(root, "div");
    doc.set_attr(customer_modal, "id", "new-customer");
    doc.set_attr(customer_modal, MODAL, "");
    let modal_title = doc.element(customer_modal, "h2");
    doc.set_text(modal_title, "Novo cliente");
    let customer_form = doc.element(customer_modal, "form");
    doc.set_attr(customer_form, VALIDATE, "");
    doc.set_attr(customer_form, "action", "/sales/customers/new/");
    for (name, placeholder, rules) in [
        ("name", "Cafeteria do Centro", "required|min:3"),
        ("email", "pedidos@cafecentral.com.br", "required|email"),
        ("credit_limit", "50000.00", "numeric|min:0|max:100000"),
    ] {
        let field = doc.element(customer_form, "input");
        doc.set_attr(field, "name", name);
        doc.set_attr(field, "placeholder", placeholder);
        doc.set_attr(field, RULES, rules);
    }
    let submit = doc.element(customer_form, "button");
    doc.set_attr(submit, "type", "submit");
    doc.set_text(submit, "Salvar");
    let close = doc.element(customer_form, "button");
    doc.set_attr(close, "type", "button");
    doc.set_attr(close, MODAL_CLOSE, "");
    doc.set_text(close, "Fechar");

    DemoPage {
        document: doc,
        search,
        products: products_body,
        headers,
        name_cells,
        price_cells,
        delete_links,
        notes_form,
        notes,
        customer_trigger,
        customer_modal,
        customer_form,
    }
}

fn editable(doc: &mut Document, cell: NodeId, endpoint: &str, field: &str) {
    doc.set_attr(cell, QUICK_EDIT, "");
    doc.set_attr(cell, SAVE_URL, endpoint);
    doc.set_attr(cell, FIELD, field);
    doc.set_attr(cell, "tabindex", "0");
}

/// Scripted answer for one save.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scripted {
    Respond(SaveResponse),
    Fail(String),
}

/// Records every request and answers from a script, accepting once the
/// script runs dry.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    requests: Mutex<Vec<SaveRequest>>,
    script: Mutex<VecDeque<Scripted>>,
    latency: Duration,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push(&self, answer: Scripted) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(answer);
        }
    }

    pub fn requests(&self) -> Vec<SaveRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

impl SaveTransport for RecordingTransport {
    fn send(&self, request: &SaveRequest) -> Result<SaveResponse> {
        if !self.latency.is_zero() {
            thread::sleep(self.latency);
        }
        self.requests
            .lock()
            .map_err(|_| anyhow!("recording transport lock poisoned"))?
            .push(request.clone());
        let answer = self
            .script
            .lock()
            .map_err(|_| anyhow!("recording transport lock poisoned"))?
            .pop_front();
        match answer {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(message)) => Err(anyhow!(message)),
            None => Ok(SaveResponse::ok()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        CatalogFaker, RecordingTransport, Scripted, demo_page, demo_products, demo_token,
        format_cents,
    };
    use roastery_app::binding::{SEARCH_ITEM, WidgetDefaults};
    use roastery_app::{
        NodeId, Page, PageCommand, PageEvent, RequestId, SaveBody, SaveOutcome, SaveRequest,
        SaveResponse, SaveTransport,
    };

    #[test]
    fn faker_is_deterministic() {
        let left = CatalogFaker::new(42).products(10, 5);
        let right = CatalogFaker::new(42).products(10, 5);
        assert_eq!(left, right);
        assert!(left.iter().all(|product| product.price_cents > product.cost_cents));
        assert_eq!(left[0].code, "PROD010");
    }

    #[test]
    fn cents_render_with_two_decimals() {
        assert_eq!(format_cents(2_590), "25.90");
        assert_eq!(format_cents(5), "0.05");
        assert_eq!(format_cents(-1_500), "-15.00");
    }

    #[test]
    fn demo_page_wires_every_widget() {
        let demo = demo_page();
        let products = demo_products();
        assert_eq!(demo.name_cells.len(), products.len());

        let mut page = Page::new(demo.document, WidgetDefaults::default(), demo_token());
        let bound = page.wire();
        // table, 10 quick-edit cells, search, 5 confirms, auto-save,
        // 2 tooltips, modal trigger, validator
        assert_eq!(bound, 1 + 10 + 1 + 5 + 1 + 2 + 1 + 1);
        assert!(page.document().is_hidden(demo.customer_modal));
    }

    #[test]
    fn searching_demo_catalog_narrows_rows() {
        let demo = demo_page();
        let mut page = Page::new(demo.document, WidgetDefaults::default(), demo_token());
        page.wire();

        page.dispatch(PageCommand::Input {
            node: demo.search,
            value: "premium".to_owned(),
        });
        let events = page.dispatch(PageCommand::Tick(300));

        assert!(matches!(
            events.as_slice(),
            [PageEvent::FilterApplied(result)] if result.visible == 1 && result.total == 5
        ));
        let visible: Vec<NodeId> = page
            .document()
            .children(demo.products)
            .into_iter()
            .filter(|row| page.document().has_attr(*row, SEARCH_ITEM) && !page.document().is_hidden(*row))
            .collect();
        assert_eq!(visible.len(), 1);
    }

    #[test]
    fn recording_transport_follows_script_then_accepts() {
        let transport = RecordingTransport::new();
        transport.push(Scripted::Respond(SaveResponse::rejected("preço inválido")));
        transport.push(Scripted::Fail("timeout".to_owned()));
        let request = SaveRequest {
            id: RequestId::new(1),
            origin: NodeId::new(1),
            endpoint: "/api/v1/products/1/".to_owned(),
            token: "t".to_owned(),
            body: SaveBody::Field {
                name: "sale_price".to_owned(),
                value: "26.90".to_owned(),
            },
        };

        let first = SaveOutcome::from_result(transport.send(&request));
        let second = SaveOutcome::from_result(transport.send(&request));
        let third = SaveOutcome::from_result(transport.send(&request));

        assert!(!first.succeeded());
        assert_eq!(second, SaveOutcome::Failed("timeout".to_owned()));
        assert!(third.succeeded());
        assert_eq!(transport.requests().len(), 3);
    }
}
