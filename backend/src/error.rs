//! Error types for the statsflow extraction pipeline.
//!
//! One error enum per layer:
//!
//! - [`GridError`] - reading and decoding a grid from disk
//! - [`StructuralError`] - a rule document does not match the grammar
//! - [`ExtractionError`] - evaluating a rule document against a grid failed
//! - [`RuntimeError`] - artifact store and worker resolution errors
//! - [`WorkerError`] - a worker's own computation failed
//! - [`ProposerError`] / [`RepairError`] - the propose/validate/repair loop
//! - [`RegistryError`] - stored definition registry
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::rules::{Action, Role};
use crate::runtime::ArtifactKind;

// =============================================================================
// Grid Errors
// =============================================================================

/// Errors while loading a grid from a file or raw bytes.
#[derive(Debug, Error)]
pub enum GridError {
    /// Failed to read file.
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    /// Content could not be decoded.
    #[error("Failed to decode content: {0}")]
    Encoding(String),

    /// Delimited content is malformed.
    #[error("Invalid CSV content: {0}")]
    Csv(#[from] csv::Error),

    /// No cells at all.
    #[error("Grid is empty")]
    Empty,
}

// =============================================================================
// Structural Errors (rule document grammar)
// =============================================================================

/// A rule document failed grammar validation.
///
/// Every variant quotes the offending field path so the message can be fed
/// back to whoever proposed the document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StructuralError {
    /// The text is not JSON at all.
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    /// A required field is absent.
    #[error("{path}: missing required field")]
    MissingField { path: String },

    /// A field the grammar does not know.
    #[error("{path}: unknown field")]
    UnknownField { path: String },

    /// A field is present but has the wrong type or value.
    #[error("{path}: {message}")]
    InvalidField { path: String, message: String },

    /// A source object matches no shape, or mixes several.
    #[error("{path}: ambiguous source, {message}")]
    AmbiguousSource { path: String, message: String },

    /// An extractor carries a role literal other than its fixed one.
    #[error("{path}: role must be '{expected}', found '{found}'")]
    RoleMismatch {
        path: String,
        expected: String,
        found: String,
    },

    /// `max_count` below zero.
    #[error("{path}: max_count must not be negative (got {value})")]
    NegativeCount { path: String, value: i64 },

    /// One alias source mapped to two different targets.
    #[error("{path}: alias '{from}' maps to both '{first}' and '{second}'")]
    ConflictingAlias {
        path: String,
        from: String,
        first: String,
        second: String,
    },

    /// An alias target is itself renamed again.
    #[error("{path}: alias target '{target}' is itself aliased to '{next}'")]
    AliasChain {
        path: String,
        target: String,
        next: String,
    },

    /// The document has no areas.
    #[error("areas: at least one area is required")]
    NoAreas,

    /// A role is sourced both from the headers and from the area.
    #[error("{path}: {role} is sourced more than once (data_headers.roles and area fields)")]
    DuplicateRole { path: String, role: Role },

    /// A required role has no source.
    #[error("{path}: no source for {role}; add it to data_headers.roles or to the area")]
    MissingRole { path: String, role: Role },

    /// A walking direction runs parallel to the data direction.
    #[error("{path}: direction '{found}' must be perpendicular to data_direction '{data_direction}'")]
    NotPerpendicular {
        path: String,
        found: String,
        data_direction: String,
    },
}

// =============================================================================
// Extraction Errors (interpreter)
// =============================================================================

/// Fatal evaluation failures. Any of these aborts the whole definition.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractionError {
    /// A cell failed extraction and its action is `fail` or `stop`.
    #[error("area {area}, {role} at {location}: {reason} (cell content: {content:?}, on_validation_error: {action})")]
    Cell {
        area: usize,
        role: String,
        location: String,
        content: String,
        reason: String,
        action: Action,
    },

    /// A data cell holds something other than a number.
    #[error("area {area}, value at ({row}, {col}): not a number (cell content: {content:?})")]
    NotANumber {
        area: usize,
        row: usize,
        col: usize,
        content: String,
    },

    /// A `default` that cannot be converted for its role.
    #[error("area {area}, {role}: default {default:?} is not usable: {reason}")]
    InvalidDefault {
        area: usize,
        role: String,
        default: String,
        reason: String,
    },

    /// A record's metric is not in `available_metrics`.
    #[error("metric check failed: '{metric}' is not one of the available metrics [{available}] (on_metric_check_failed: {action})")]
    MetricCheck {
        metric: String,
        available: String,
        action: Action,
    },
}

// =============================================================================
// Runtime Errors
// =============================================================================

/// Errors from the typed dataflow runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// No artifact under this logical name.
    #[error("artifact '{0}' not found")]
    NotFound(String),

    /// The slot exists but holds another kind.
    #[error("artifact '{name}' holds {found}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: ArtifactKind,
        found: ArtifactKind,
    },

    /// Zero or several artifacts of a declared input kind.
    #[error("worker '{worker}' needs exactly one {kind} artifact, found {count}")]
    AmbiguousOrMissingInput {
        worker: String,
        kind: ArtifactKind,
        count: usize,
    },

    /// A worker returned a kind it did not declare.
    #[error("worker '{worker}' produced undeclared artifact kind {kind}")]
    UndeclaredOutput { worker: String, kind: ArtifactKind },

    /// A declared input that nothing can produce.
    #[error("worker '{worker}' needs {kind}, which no worker produces and is not supplied externally")]
    UncoveredInput { worker: String, kind: ArtifactKind },

    /// Two workers registered under one name.
    #[error("duplicate worker name '{0}'")]
    DuplicateWorker(String),

    /// Lookup of an unregistered worker.
    #[error("unknown worker '{0}'")]
    UnknownWorker(String),

    /// Lookup of an unknown session.
    #[error("session {0} not found")]
    SessionNotFound(String),

    /// A payload that does not deserialize into its kind.
    #[error("invalid {kind} payload: {message}")]
    InvalidPayload { kind: ArtifactKind, message: String },

    /// The worker's own computation failed.
    #[error("worker '{worker}' failed: {source}")]
    Worker {
        worker: String,
        #[source]
        source: WorkerError,
    },
}

/// Failures inside a worker's computation.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Could not load the grid behind a file artifact.
    #[error(transparent)]
    Grid(#[from] GridError),

    /// The stored definition failed on the grid.
    #[error("extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    /// The repair loop gave up.
    #[error(transparent)]
    Repair(#[from] RepairError),

    /// Definition registry failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The runtime handed over something the worker cannot use.
    #[error("unexpected input: {0}")]
    UnexpectedInput(String),
}

// =============================================================================
// Proposer / Repair Errors
// =============================================================================

/// Errors talking to an external rule-document proposer.
#[derive(Debug, Error)]
pub enum ProposerError {
    /// Endpoint not configured.
    #[error("Missing proposer endpoint: {0}")]
    MissingEndpoint(String),

    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// The proposer answered with an error status.
    #[error("Proposer error: {0}")]
    ApiError(String),

    /// The proposer answered with nothing.
    #[error("Empty proposal")]
    EmptyResponse,
}

/// Terminal failures of the propose/validate/repair loop.
#[derive(Debug, Error)]
pub enum RepairError {
    /// The proposer itself failed.
    #[error("proposer failed: {0}")]
    Proposer(#[from] ProposerError),

    /// Every attempt produced an invalid document.
    #[error("no valid rule document after {attempts} attempt(s); last error: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors from the stored definition registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Definition not found.
    #[error("Definition not found: {0}")]
    NotFound(String),

    /// Invalid definition data.
    #[error("Invalid definition: {0}")]
    InvalidDefinition(#[from] StructuralError),

    /// IO error.
    #[error("Registry IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error.
    #[error("Registry JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Grid loading error.
    #[error("Grid error: {0}")]
    Grid(#[from] GridError),

    /// Rule document grammar error.
    #[error("Rule document error: {0}")]
    Structural(#[from] StructuralError),

    /// Interpreter error.
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Repair loop error.
    #[error("Repair error: {0}")]
    Repair(#[from] RepairError),

    /// Registry error.
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Runtime error.
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Nothing left to try: no stored definition worked and no proposer is available.
    #[error("No usable definition: {0}")]
    NoDefinition(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for grid loading.
pub type GridResult<T> = Result<T, GridError>;

/// Result type for rule document decoding.
pub type StructuralResult<T> = Result<T, StructuralError>;

/// Result type for interpreter operations.
pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
