//! Proposer that posts each request to an HTTP endpoint.
//!
//! The endpoint receives the [`ProposalRequest`] as JSON plus the grammar
//! reference, and answers with either plain text or a JSON body carrying a
//! `proposal` string or the rule document itself.

use std::env;
use std::time::Duration;

use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;

use super::{ProposalRequest, Proposer};
use crate::error::ProposerError;
use crate::logs::{log_info_indent, log_warning};
use crate::rules::grammar_description;

pub const URL_VAR: &str = "STATSFLOW_PROPOSER_URL";
pub const TOKEN_VAR: &str = "STATSFLOW_PROPOSER_TOKEN";

/// Default number of retries
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

#[derive(Serialize)]
struct RequestBody<'a> {
    grammar: &'static str,
    #[serde(flatten)]
    request: &'a ProposalRequest,
}

#[derive(Clone)]
pub struct HttpProposer {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    max_retries: u32,
}

impl HttpProposer {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            token: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    /// Build from `STATSFLOW_PROPOSER_URL` and the optional
    /// `STATSFLOW_PROPOSER_TOKEN`, reading `.env` first.
    pub fn from_env() -> Result<Self, ProposerError> {
        let _ = dotenvy::dotenv();

        let url = env::var(URL_VAR)
            .map_err(|_| ProposerError::MissingEndpoint(format!("{} not set", URL_VAR)))?;
        let mut proposer = Self::new(url);
        if let Ok(token) = env::var(TOKEN_VAR) {
            if !token.trim().is_empty() {
                proposer = proposer.with_token(token);
            }
        }
        Ok(proposer)
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn post(&self, request: &ProposalRequest) -> Result<String, ProposerError> {
        let mut builder = self.client.post(&self.url).json(&RequestBody {
            grammar: grammar_description(),
            request,
        });
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ProposerError::RequestFailed(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ProposerError::RequestFailed(e.to_string()))?;

        if status.is_server_error() {
            return Err(ProposerError::RequestFailed(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(ProposerError::ApiError(format!("HTTP {}: {}", status, body)));
        }
        proposal_text(&body)
    }
}

impl Proposer for HttpProposer {
    fn propose<'a>(&'a self, request: &'a ProposalRequest) -> BoxFuture<'a, Result<String, ProposerError>> {
        Box::pin(async move {
            let mut attempt = 1;
            loop {
                log_info_indent(format!("POST {} (try {}/{})", self.url, attempt, self.max_retries), 1);
                match self.post(request).await {
                    Err(ProposerError::RequestFailed(message)) if attempt < self.max_retries => {
                        log_warning(format!("Proposer request failed: {}, retrying in {}ms", message, RETRY_DELAY_MS));
                        tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                        attempt += 1;
                    }
                    other => return other,
                }
            }
        })
    }
}

/// Pull the proposal out of a response body.
fn proposal_text(body: &str) -> Result<String, ProposerError> {
    if body.trim().is_empty() {
        return Err(ProposerError::EmptyResponse);
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => match map.get("proposal") {
            Some(Value::String(text)) if text.trim().is_empty() => Err(ProposerError::EmptyResponse),
            Some(Value::String(text)) => Ok(text.clone()),
            Some(other) => Ok(other.to_string()),
            None => Ok(body.to_string()),
        },
        _ => Ok(body.to_string()),
    }
}
