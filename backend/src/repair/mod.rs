//! Propose / validate / repair loop.
//!
//! A [`Proposer`] drafts a rule document from a data description and a grid
//! preview. Each draft is decoded and executed; on failure the error text is
//! sent back with the next request, until a draft succeeds or
//! `max_attempts` is used up.

pub mod http;

use std::sync::Arc;

use futures::future::BoxFuture;
use serde::Serialize;

use crate::error::{ProposerError, RepairError};
use crate::grid::Grid;
use crate::interpreter::NormalizedTable;
use crate::logs::{log_info, log_info_indent, log_success, log_warning};
use crate::pipeline::check_and_execute;
use crate::rules::ParserDefinition;
use crate::runtime::DataDescriptionData;

pub use http::HttpProposer;

/// Default number of proposals before giving up
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default number of grid rows shown to the proposer
pub const DEFAULT_PREVIEW_ROWS: usize = 30;

/// Everything a proposer gets for one attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ProposalRequest {
    pub data_description: DataDescriptionData,
    pub grid_preview: String,
    pub user_note: Option<String>,
    /// 1-based
    pub attempt: u32,
    /// The document that failed last time, if any.
    pub previous_document: Option<String>,
    /// Why it failed.
    pub feedback: Option<String>,
}

/// Drafts rule documents. Returns free text that contains one JSON object,
/// optionally inside a fenced code block.
pub trait Proposer: Send + Sync {
    fn propose<'a>(&'a self, request: &'a ProposalRequest) -> BoxFuture<'a, Result<String, ProposerError>>;
}

#[derive(Debug, Clone)]
pub struct RepairOptions {
    pub max_attempts: u32,
    pub preview_rows: usize,
    /// Treat a document that yields no records as a failure.
    pub require_records: bool,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            preview_rows: DEFAULT_PREVIEW_ROWS,
            require_records: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepairOutcome {
    pub definition: ParserDefinition,
    pub table: NormalizedTable,
    /// Proposals used, including the successful one.
    pub attempts: u32,
}

pub struct RepairLoop {
    proposer: Arc<dyn Proposer>,
    options: RepairOptions,
}

impl RepairLoop {
    pub fn new(proposer: Arc<dyn Proposer>, options: RepairOptions) -> Self {
        Self { proposer, options }
    }

    pub fn options(&self) -> &RepairOptions {
        &self.options
    }

    /// Ask for documents until one decodes and executes on `grid`.
    ///
    /// A proposer failure ends the loop at once; invalid documents are fed
    /// back as `feedback` on the next request.
    pub async fn run(
        &self,
        description: &DataDescriptionData,
        grid: &Grid,
        user_note: Option<&str>,
    ) -> Result<RepairOutcome, RepairError> {
        let max_attempts = self.options.max_attempts.max(1);
        let grid_preview = grid.preview(self.options.preview_rows);
        let mut previous_document = None;
        let mut feedback: Option<String> = None;

        for attempt in 1..=max_attempts {
            log_info(format!("Proposal attempt {}/{}", attempt, max_attempts));
            let request = ProposalRequest {
                data_description: description.clone(),
                grid_preview: grid_preview.clone(),
                user_note: user_note.map(str::to_string),
                attempt,
                previous_document: previous_document.take(),
                feedback: feedback.take(),
            };

            let text = self.proposer.propose(&request).await?;
            let document = extract_json(&text).to_string();

            match check_and_execute(&document, grid) {
                Ok((_, table)) if table.is_empty() && self.options.require_records => {
                    log_warning("Document is valid but produced no records");
                    feedback = Some(
                        "the document is valid but produced no records; check data_cells, \
                         the walking directions and the skip lists"
                            .to_string(),
                    );
                }
                Ok((definition, table)) => {
                    log_success(format!(
                        "'{}' accepted after {} attempt(s), {} records",
                        definition.parser_name,
                        attempt,
                        table.len()
                    ));
                    return Ok(RepairOutcome {
                        definition,
                        table,
                        attempts: attempt,
                    });
                }
                Err(message) => {
                    log_warning(format!("Attempt {} rejected", attempt));
                    log_info_indent(&message, 1);
                    feedback = Some(message);
                }
            }
            previous_document = Some(document);
        }

        Err(RepairError::Exhausted {
            attempts: max_attempts,
            last_error: feedback.unwrap_or_default(),
        })
    }
}

/// Locate the JSON object in a proposer's answer: a ```json block, then any
/// fenced block, then the outermost braces. Falls back to the whole text.
pub fn extract_json(text: &str) -> &str {
    fenced(text, "```json")
        .or_else(|| fenced(text, "```"))
        .or_else(|| outer_braces(text))
        .unwrap_or(text)
        .trim()
}

fn fenced<'a>(text: &'a str, opening: &str) -> Option<&'a str> {
    let start = text.find(opening)? + opening.len();
    let rest = &text[start..];
    // skip an info string such as `json` after a bare fence
    let body_start = if opening == "```" {
        rest.find('\n').map(|i| i + 1).unwrap_or(0)
    } else {
        0
    };
    let body = &rest[body_start..];
    let end = body.find("```")?;
    Some(&body[..end])
}

fn outer_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
