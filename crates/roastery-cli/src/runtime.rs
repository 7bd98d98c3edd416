// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::config::Config;
use crate::pages::records_page;
use anyhow::{Context, Result, bail};
use roastery_app::{Page, SaveTransport};
use roastery_app::binding::WidgetDefaults;
use roastery_testkit::{CatalogFaker, RecordingTransport, demo_products, demo_token, products_page};
use std::fs::{self, OpenOptions};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "ROASTERY_LOG";
const DEMO_SEED: u64 = 0x5EED_CAFE;
const DEMO_EXTRA_PRODUCTS: usize = 25;
const DEMO_LATENCY: Duration = Duration::from_millis(350);

/// A wired page and the transport its saves go through.
pub struct Session {
    pub page: Page,
    pub transport: Arc<dyn SaveTransport>,
}

/// Sends `tracing` output to the log file; the terminal belongs to the UI.
pub fn init_logging(config: &Config) -> Result<()> {
    let path = config.log_path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| {
            format!(
                "open log file {} -- set [log].file to a writable path",
                path.display()
            )
        })?;

    let filter = match EnvFilter::try_from_env(LOG_ENV) {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(config.log_level())
            .with_context(|| format!("invalid log.level {:?}", config.log_level()))?,
    };

    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
    {
        Ok(()) => tracing::info!(log = %path.display(), "logging started"),
        // Tests and embedders may install a subscriber first; keep theirs.
        Err(error) => {
            tracing::debug!(log = %path.display(), %error, "subscriber already installed");
        }
    }
    Ok(())
}

/// Offline catalog with a transport that accepts every save after a short
/// delay, so the saving state is visible.
pub fn demo_session(defaults: WidgetDefaults) -> Session {
    let mut products = demo_products();
    let first_extra = products.iter().map(|product| product.id).max().unwrap_or(0) + 1;
    products.extend(CatalogFaker::new(DEMO_SEED).products(first_extra, DEMO_EXTRA_PRODUCTS));

    let demo = products_page(&products);
    let mut page = Page::new(demo.document, defaults, demo_token());
    let bound = page.wire();
    tracing::debug!(products = products.len(), bound, "demo page ready");

    Session {
        page,
        transport: Arc::new(RecordingTransport::new().with_latency(DEMO_LATENCY)),
    }
}

pub fn live_session(config: &Config, resource: &str) -> Result<Session> {
    let Some(configured_token) = config.csrf_token() else {
        bail!(
            "no CSRF token configured -- set ROASTERY_CSRF_TOKEN or [server].csrf_token to the csrftoken cookie of a logged-in session"
        );
    };

    let client = roastery_http::Client::new(config.base_url(), config.timeout()?)?
        .with_session(config.session_id());
    let resources = client
        .list_resources()
        .with_context(|| format!("read the API root of {}", client.base_url()))?;
    if !resources.iter().any(|offered| offered == resource) {
        bail!(
            "unknown resource {resource:?}; the API offers: {}",
            resources.join(", ")
        );
    }

    let records = client.list_records(resource).with_context(|| {
        if client.has_session() {
            format!("load {resource} from {}", client.base_url())
        } else {
            format!(
                "load {resource} from {} -- set ROASTERY_SESSION_ID or [server].session_id to the sessionid cookie of a logged-in session",
                client.base_url()
            )
        }
    })?;
    tracing::info!(resource, records = records.len(), "records loaded");

    // Re-read on every save so a rotated token applies without a restart.
    let tokens = move || config_token_override().unwrap_or_else(|| configured_token.clone());

    let mut page = Page::new(
        records_page(resource, &records),
        config.widget_defaults()?,
        tokens,
    );
    page.wire();

    Ok(Session {
        page,
        transport: Arc::new(client),
    })
}

fn config_token_override() -> Option<String> {
    std::env::var("ROASTERY_CSRF_TOKEN")
        .ok()
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::{demo_session, init_logging, live_session};
    use crate::config::{Config, env_lock};
    use anyhow::Result;
    use roastery_app::binding::{QUICK_EDIT, WidgetDefaults};
    use std::thread;
    use tiny_http::{Header, Response, Server};

    fn live_config(base_url: &str, dir: &std::path::Path) -> Result<Config> {
        let path = dir.join("config.toml");
        std::fs::write(
            &path,
            format!(
                "version = 1\n[server]\nbase_url = \"{base_url}\"\ntimeout = \"2s\"\ncsrf_token = \"file-token\"\nsession_id = \"file-session\"\n"
            ),
        )?;
        Config::load(&path)
    }

    /// Answers one request per payload and reports each URL with its `Cookie` header.
    fn serve_json(
        server: Server,
        payloads: Vec<String>,
    ) -> thread::JoinHandle<Result<Vec<(String, Option<String>)>>> {
        thread::spawn(move || -> Result<Vec<(String, Option<String>)>> {
            let mut seen = Vec::new();
            for payload in payloads {
                let request = server.recv()?;
                let cookie = request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("Cookie"))
                    .map(|header| header.value.as_str().to_owned());
                seen.push((request.url().to_owned(), cookie));
                let header = Header::from_bytes("Content-Type", "application/json")
                    .map_err(|()| anyhow::anyhow!("bad header"))?;
                request.respond(Response::from_string(payload).with_header(header))?;
            }
            Ok(seen)
        })
    }

    #[test]
    fn demo_session_extends_the_catalog() {
        let session = demo_session(WidgetDefaults::default());
        let doc = session.page.document();
        let rows = doc
            .find_by_id("products")
            .map(|body| doc.children(body).len())
            .unwrap_or_default();
        assert_eq!(rows, 30);
        assert_eq!(doc.find_by_attr(QUICK_EDIT).len(), 60);
        assert_eq!(session.page.tables().len(), 1);
    }

    #[test]
    fn live_session_builds_a_page_from_the_listing() -> Result<()> {
        let server = Server::http("127.0.0.1:0").map_err(|error| anyhow::anyhow!("{error}"))?;
        let base_url = format!("http://{}/", server.server_addr());
        let root = format!(r#"{{"products": "{base_url}api/v1/products/"}}"#);
        let handle = serve_json(
            server,
            vec![
                root,
                r#"{"count": 1, "results": [{"id": 3, "name": "Café Gourmet 500g", "sale_price": "32.50"}]}"#.to_owned(),
            ],
        );

        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let config = live_config(&base_url, temp.path())?;
        let session = live_session(&config, "products")?;
        let requests = handle
            .join()
            .map_err(|_| anyhow::anyhow!("server thread panicked"))??;

        assert_eq!(requests[0].0, "/api/v1/");
        assert_eq!(requests[1].0, "/api/v1/products/");
        assert_eq!(requests[1].1.as_deref(), Some("sessionid=file-session"));
        let doc = session.page.document();
        let cells = doc.find_by_attr(QUICK_EDIT);
        assert_eq!(cells.len(), 2);
        assert_eq!(doc.text_content(cells[0]), "Café Gourmet 500g");
        Ok(())
    }

    #[test]
    fn live_session_rejects_resources_the_api_does_not_offer() -> Result<()> {
        let server = Server::http("127.0.0.1:0").map_err(|error| anyhow::anyhow!("{error}"))?;
        let base_url = format!("http://{}/", server.server_addr());
        let root = format!(
            r#"{{"materials": "{base_url}api/v1/materials/", "products": "{base_url}api/v1/products/"}}"#
        );
        let handle = serve_json(server, vec![root]);

        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let config = live_config(&base_url, temp.path())?;
        let error = match live_session(&config, "produtos") {
            Ok(_) => anyhow::bail!("unknown resource should fail"),
            Err(error) => error,
        };
        let requests = handle
            .join()
            .map_err(|_| anyhow::anyhow!("server thread panicked"))??;

        assert_eq!(requests.len(), 1);
        let message = error.to_string();
        assert!(message.contains("unknown resource \"produtos\""));
        assert!(message.contains("materials, products"));
        Ok(())
    }

    #[test]
    fn second_logging_init_keeps_the_first_subscriber() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let log_file = temp.path().join("logs").join("roastery.log");
        std::fs::write(
            &path,
            format!("version = 1\n[log]\nlevel = \"debug\"\nfile = \"{}\"\n", log_file.display()),
        )?;
        let config = Config::load(&path)?;

        init_logging(&config)?;
        init_logging(&config)?;
        assert!(log_file.exists());
        Ok(())
    }

    #[test]
    fn live_session_requires_a_token() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "version = 1\n")?;
        let config = Config::load(&path)?;
        if config.csrf_token().is_some() {
            // ROASTERY_CSRF_TOKEN is set in this environment.
            return Ok(());
        }
        let error = match live_session(&config, "products") {
            Ok(_) => anyhow::bail!("missing token should fail"),
            Err(error) => error,
        };
        assert!(error.to_string().contains("ROASTERY_CSRF_TOKEN"));
        Ok(())
    }
}
