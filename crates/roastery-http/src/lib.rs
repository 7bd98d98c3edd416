// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Blocking HTTP transport for the backend's save endpoints and its
//! `/api/v1/` record listings.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use reqwest::blocking::Client as HttpClient;
use reqwest::blocking::RequestBuilder;
use reqwest::header::{ACCEPT, COOKIE, REFERER};
use reqwest::{Method, StatusCode};
use roastery_app::{SaveBody, SaveRequest, SaveResponse, SaveTransport};
use serde::Deserialize;
use serde_json::Value;
use url::Url;

pub const API_PREFIX: &str = "api/v1/";
const CSRF_HEADER: &str = "X-CSRFToken";
const REQUESTED_WITH_HEADER: &str = "X-Requested-With";
const REQUESTED_WITH: &str = "XMLHttpRequest";
const TOKEN_FIELD: &str = "csrfmiddlewaretoken";
const SESSION_COOKIE: &str = "sessionid";
const CSRF_COOKIE: &str = "csrftoken";

/// One row of a listing, every value flattened to display text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    fields: BTreeMap<String, String>,
}

impl Record {
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn id(&self) -> Option<&str> {
        self.get("id").filter(|id| !id.is_empty())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    base_url: Url,
    timeout: Duration,
    session: Option<String>,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            bail!("server.base_url must not be empty");
        }
        let mut base_url = Url::parse(trimmed)
            .with_context(|| format!("server.base_url {trimmed:?} is not a valid URL"))?;
        if base_url.cannot_be_a_base() {
            bail!("server.base_url {trimmed:?} must be an http(s) URL");
        }
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            session: None,
            http,
        })
    }

    /// Sends `sessionid` with every request so session-authenticated views
    /// accept them.
    pub fn with_session(mut self, session: Option<String>) -> Self {
        self.session = session
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());
        self
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute endpoints are used as given; anything else resolves against
    /// the base URL the way a browser resolves a link.
    pub fn endpoint(&self, endpoint: &str) -> Result<Url> {
        let endpoint = endpoint.trim();
        match Url::parse(endpoint) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base_url
                .join(endpoint)
                .with_context(|| format!("resolve endpoint {endpoint:?}")),
            Err(error) => Err(error).with_context(|| format!("parse endpoint {endpoint:?}")),
        }
    }

    /// Sends a field or form save as `application/x-www-form-urlencoded`.
    ///
    /// Field saves aimed at an `/api/v1/` detail route go out as `PATCH`
    /// with the token in the header only; everything else is a `POST` that
    /// also carries `csrfmiddlewaretoken`. The token doubles as the
    /// `csrftoken` cookie. Non-2xx answers become errors; a 2xx
    /// `{"success": false}` does not, and a 2xx object without `success`
    /// (a serialized record) counts as saved.
    pub fn save(&self, request: &SaveRequest) -> Result<SaveResponse> {
        let url = self.endpoint(&request.endpoint)?;
        let method = self.save_method(&url, &request.body);
        tracing::debug!(request = %request.id, url = %url, method = %method, "sending save");

        let mut pairs = request.form_pairs();
        if method == Method::PATCH {
            pairs.retain(|(name, _)| name != TOKEN_FIELD);
        }
        let builder = self
            .http
            .request(method, url.clone())
            .header(CSRF_HEADER, request.token.as_str())
            .header(REQUESTED_WITH_HEADER, REQUESTED_WITH)
            .header(REFERER, self.base_url.as_str())
            .header(ACCEPT, "application/json")
            .form(&pairs);
        let response = self
            .with_cookies(builder, Some(&request.token))
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;

        let status = response.status();
        let body = response.text().context("read save response")?;
        if !status.is_success() {
            return Err(clean_error_response(status, &body));
        }
        decode_save_response(&body).with_context(|| format!("decode save response from {url}"))
    }

    fn save_method(&self, url: &Url, body: &SaveBody) -> Method {
        let api_root = format!("{}{API_PREFIX}", self.base_url.path());
        let detail_route = url.origin() == self.base_url.origin()
            && url.path().starts_with(&api_root)
            && url.path().len() > api_root.len();
        if detail_route && matches!(body, SaveBody::Field { .. }) {
            Method::PATCH
        } else {
            Method::POST
        }
    }

    fn with_cookies(&self, builder: RequestBuilder, csrf_token: Option<&str>) -> RequestBuilder {
        let cookies: Vec<String> = [
            self.session.as_deref().map(|value| format!("{SESSION_COOKIE}={value}")),
            csrf_token
                .filter(|token| !token.is_empty())
                .map(|token| format!("{CSRF_COOKIE}={token}")),
        ]
        .into_iter()
        .flatten()
        .collect();
        if cookies.is_empty() {
            builder
        } else {
            builder.header(COOKIE, cookies.join("; "))
        }
    }

    /// Names of the resources the API root advertises.
    pub fn list_resources(&self) -> Result<Vec<String>> {
        let root = self.get_json(API_PREFIX)?;
        let Value::Object(entries) = root else {
            bail!("API root at {}{API_PREFIX} is not a JSON object", self.base_url);
        };
        Ok(entries.into_iter().map(|(name, _)| name).collect())
    }

    /// Fetches `{base}/api/v1/{resource}/`, plain or paginated.
    pub fn list_records(&self, resource: &str) -> Result<Vec<Record>> {
        let resource = resource.trim().trim_matches('/');
        if resource.is_empty()
            || !resource
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_')
        {
            bail!("resource name {resource:?} is invalid -- use a name like `products`");
        }

        let listing: Listing = serde_json::from_value(self.get_json(&format!("{API_PREFIX}{resource}/"))?)
            .with_context(|| format!("decode {resource} listing"))?;
        let rows = match listing {
            Listing::Plain(rows) => rows,
            Listing::Paged { results } => results,
        };
        Ok(rows.into_iter().filter_map(flatten_record).collect())
    }

    fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.endpoint(path)?;
        let builder = self.http.get(url.clone()).header(ACCEPT, "application/json");
        let response = self
            .with_cookies(builder, None)
            .send()
            .map_err(|error| connection_error(self.base_url(), error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        response.json().with_context(|| format!("decode JSON from {url}"))
    }
}

impl SaveTransport for Client {
    fn send(&self, request: &SaveRequest) -> Result<SaveResponse> {
        self.save(request)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Listing {
    Plain(Vec<Value>),
    Paged { results: Vec<Value> },
}

fn decode_save_response(body: &str) -> Result<SaveResponse> {
    let value: Value = serde_json::from_str(body)?;
    if !value.is_object() {
        bail!("expected a JSON object, got {value}");
    }
    if value.get("success").is_some() {
        return Ok(serde_json::from_value(value)?);
    }
    Ok(SaveResponse::ok())
}

fn flatten_record(row: Value) -> Option<Record> {
    let entries = match row {
        Value::Object(entries) => entries,
        other => {
            tracing::warn!(entry = %other, "skipping listing entry that is not an object");
            return None;
        }
    };
    Some(Record {
        fields: entries
            .into_iter()
            .map(|(key, value)| (key, display_value(&value)))
            .collect(),
    })
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    anyhow!(
        "cannot reach {} -- check server.base_url and that the server is running ({})",
        base_url,
        error
    )
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(Value::Object(parsed)) = serde_json::from_str::<Value>(body) {
        for key in ["message", "detail", "error"] {
            if let Some(Value::String(message)) = parsed.get(key)
                && !message.is_empty()
            {
                return anyhow!("server error ({}): {}", status.as_u16(), message);
            }
        }
        let field_error = parsed.iter().find_map(|(field, value)| {
            let first = value.as_array()?.first()?.as_str()?;
            Some(if field == "non_field_errors" {
                first.to_owned()
            } else {
                format!("{field}: {first}")
            })
        });
        if let Some(message) = field_error {
            return anyhow!("server error ({}): {}", status.as_u16(), message);
        }
    }

    let body = body.trim();
    if !body.is_empty() && body.len() < 100 && !body.contains('{') && !body.contains('<') {
        return anyhow!("server error ({}): {}", status.as_u16(), body);
    }

    anyhow!("server returned {}", status.as_u16())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::Result;
    use reqwest::StatusCode;
    use serde_json::json;

    use reqwest::Method;
    use roastery_app::{SaveBody, SaveResponse};
    use url::Url;

    use super::{
        Client, clean_error_response, decode_save_response, display_value, flatten_record,
    };

    #[test]
    fn base_url_gains_trailing_slash_and_joins_relative_paths() -> Result<()> {
        let client = Client::new("http://127.0.0.1:8000/app", Duration::from_secs(1))?;
        assert_eq!(client.base_url(), "http://127.0.0.1:8000/app/");
        assert_eq!(
            client.endpoint("api/v1/products/")?.as_str(),
            "http://127.0.0.1:8000/app/api/v1/products/"
        );
        assert_eq!(
            client.endpoint("/production/orders/3/draft/")?.as_str(),
            "http://127.0.0.1:8000/production/orders/3/draft/"
        );
        assert_eq!(
            client.endpoint("https://erp.example.com/save/")?.as_str(),
            "https://erp.example.com/save/"
        );
        Ok(())
    }

    #[test]
    fn empty_or_invalid_base_url_is_rejected() {
        let empty = Client::new("  ", Duration::from_secs(1)).expect_err("empty url");
        assert!(empty.to_string().contains("server.base_url"));
        let bogus = Client::new("not a url", Duration::from_secs(1)).expect_err("bad url");
        assert!(bogus.to_string().contains("not a valid URL"));
    }

    #[test]
    fn error_bodies_are_summarized() {
        let status = StatusCode::BAD_REQUEST;
        let cases = [
            (r#"{"success": false, "message": "Produto não encontrado"}"#, "server error (400): Produto não encontrado"),
            (r#"{"detail": "Authentication credentials were not provided."}"#, "server error (400): Authentication credentials were not provided."),
            (r#"{"sale_price": ["Sale price must be greater than zero."]}"#, "server error (400): sale_price: Sale price must be greater than zero."),
            ("CSRF verification failed", "server error (400): CSRF verification failed"),
            ("<html><body>oops</body></html>", "server returned 400"),
        ];
        for (body, expected) in cases {
            assert_eq!(clean_error_response(status, body).to_string(), expected);
        }
    }

    #[test]
    fn record_values_become_display_text() {
        let record = flatten_record(json!({
            "id": 4,
            "name": "Café Tradicional 250g",
            "sale_price": "15.90",
            "is_active": true,
            "description": null,
        }))
        .expect("object row");
        assert_eq!(record.id(), Some("4"));
        assert_eq!(record.get("is_active"), Some("true"));
        assert_eq!(record.get("description"), Some(""));
        assert_eq!(display_value(&json!([1, 2])), "[1,2]");
        assert_eq!(flatten_record(json!("loose")), None);
    }

    #[test]
    fn only_api_field_saves_are_patched() -> Result<()> {
        let client = Client::new("http://127.0.0.1:8000/", Duration::from_secs(1))?;
        let field = SaveBody::Field {
            name: "name".to_owned(),
            value: "Café".to_owned(),
        };
        let form = SaveBody::Form {
            fields: Vec::new(),
            auto_save: true,
        };
        let cases = [
            ("http://127.0.0.1:8000/api/v1/products/3/", &field, Method::PATCH),
            ("http://127.0.0.1:8000/api/v1/products/3/", &form, Method::POST),
            ("http://127.0.0.1:8000/api/v1/", &field, Method::POST),
            ("http://127.0.0.1:8000/sales/api/orders/status-update/", &field, Method::POST),
            ("http://erp.example.com/api/v1/products/3/", &field, Method::POST),
        ];
        for (url, body, expected) in cases {
            assert_eq!(client.save_method(&Url::parse(url)?, body), expected, "{url}");
        }
        Ok(())
    }

    #[test]
    fn save_replies_decode_with_or_without_success() -> Result<()> {
        assert_eq!(
            decode_save_response(r#"{"success": false, "message": "Preço inválido"}"#)?,
            SaveResponse::rejected("Preço inválido")
        );
        assert_eq!(
            decode_save_response(r#"{"id": 3, "name": "Café Especial 1kg"}"#)?,
            SaveResponse::ok()
        );
        assert!(decode_save_response("[1, 2]").is_err());
        assert!(decode_save_response("<html>").is_err());
        Ok(())
    }

    #[test]
    fn blank_session_is_ignored() -> Result<()> {
        let client = Client::new("http://127.0.0.1:8000/", Duration::from_secs(1))?;
        assert!(!client.clone().with_session(Some("  ".to_owned())).has_session());
        assert!(client.with_session(Some("abc123".to_owned())).has_session());
        Ok(())
    }
}
