// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::timer::Millis;
use crate::{NodeId, RequestId};

/// Supplies the anti-forgery token attached to every write request. Read
/// fresh for each request; implementations must not mutate shared state.
pub trait TokenSource {
    fn current_token(&self) -> String;
}

/// Token fixed for the lifetime of the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn current_token(&self) -> String {
        self.0.clone()
    }
}

impl<F> TokenSource for F
where
    F: Fn() -> String,
{
    fn current_token(&self) -> String {
        self()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveBody {
    Field {
        name: String,
        value: String,
    },
    Form {
        fields: Vec<(String, String)>,
        auto_save: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRequest {
    pub id: RequestId,
    pub origin: NodeId,
    pub endpoint: String,
    pub token: String,
    pub body: SaveBody,
}

impl SaveRequest {
    /// Form-encoded pairs in wire order, token last.
    pub fn form_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = match &self.body {
            SaveBody::Field { name, value } => vec![(name.clone(), value.clone())],
            SaveBody::Form { fields, auto_save } => {
                let mut pairs = fields.clone();
                if *auto_save {
                    pairs.push(("auto_save".to_owned(), "true".to_owned()));
                }
                pairs
            }
        };
        pairs.push(("csrfmiddlewaretoken".to_owned(), self.token.clone()));
        pairs
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

impl SaveResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// Executes save requests. Hosts call it off the UI thread and report back
/// with `PageCommand::SaveFinished`.
pub trait SaveTransport: Send + Sync {
    fn send(&self, request: &SaveRequest) -> Result<SaveResponse>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(SaveResponse),
    Failed(String),
}

impl SaveOutcome {
    pub fn from_result(result: Result<SaveResponse>) -> Self {
        match result {
            Ok(response) => Self::Saved(response),
            Err(error) => Self::Failed(format!("{error:#}")),
        }
    }

    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Saved(response) if response.success)
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Saved(response) => response.message.as_deref(),
            Self::Failed(message) => Some(message),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Error,
    Info,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Info => "info",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub message: String,
    pub severity: Severity,
    pub duration: Millis,
}

#[cfg(test)]
mod tests {
    use super::{SaveBody, SaveOutcome, SaveRequest, SaveResponse, StaticToken, TokenSource};
    use crate::{NodeId, RequestId};

    #[test]
    fn field_pairs_carry_token_last() {
        let request = SaveRequest {
            id: RequestId::new(1),
            origin: NodeId::new(4),
            endpoint: "/products/1/".to_owned(),
            token: "tok".to_owned(),
            body: SaveBody::Field {
                name: "name".to_owned(),
                value: "Espresso".to_owned(),
            },
        };

        assert_eq!(
            request.form_pairs(),
            vec![
                ("name".to_owned(), "Espresso".to_owned()),
                ("csrfmiddlewaretoken".to_owned(), "tok".to_owned()),
            ]
        );
    }

    #[test]
    fn form_pairs_mark_auto_save() {
        let request = SaveRequest {
            id: RequestId::new(2),
            origin: NodeId::new(9),
            endpoint: "/notes/".to_owned(),
            token: "tok".to_owned(),
            body: SaveBody::Form {
                fields: vec![("notes".to_owned(), "torra média".to_owned())],
                auto_save: true,
            },
        };

        let pairs = request.form_pairs();
        assert!(pairs.contains(&("auto_save".to_owned(), "true".to_owned())));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn outcome_success_requires_flag() {
        assert!(SaveOutcome::Saved(SaveResponse::ok()).succeeded());
        assert!(!SaveOutcome::Saved(SaveResponse::rejected("no")).succeeded());
        assert!(!SaveOutcome::from_result(Err(anyhow::anyhow!("offline"))).succeeded());
    }

    #[test]
    fn closures_act_as_token_sources() {
        let source = || "abc".to_owned();
        assert_eq!(source.current_token(), "abc");
        assert_eq!(StaticToken("xyz".to_owned()).current_token(), "xyz");
    }
}
