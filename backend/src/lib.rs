//! # statsflow - rule-driven extraction of usage statistics
//!
//! statsflow turns heterogeneous, hand-made spreadsheet/CSV usage reports
//! into one normalized table. Instead of a parser per source, each report
//! layout is described by a declarative rule document (a
//! [`ParserDefinition`]) that is checked, then evaluated against the grid.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  CSV File   │────▶│    Grid     │────▶│ Interpreter │────▶│ Normalized  │
//! │ (any enc.)  │     │  (r, c)     │     │  (rules)    │     │   table     │
//! └─────────────┘     └─────────────┘     └──────▲──────┘     └─────────────┘
//!                                                │
//!                     ┌─────────────┐     ┌──────┴──────┐
//!                     │  Proposer   │────▶│   Repair    │  registry of stored
//!                     │ (external)  │◀────│    loop     │  definitions first
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use statsflow::{load_path, validate_and_execute};
//!
//! let grid = load_path("report.csv")?;
//! let rules = std::fs::read_to_string("rules.json")?;
//! let table = validate_and_execute(&rules, &grid)?;
//! println!("{}", table.to_csv()?);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`grid`] - Cell grids and CSV loading with encoding detection
//! - [`rules`] - Rule document model and structural validation
//! - [`interpreter`] - Evaluation of a rule document against a grid
//! - [`runtime`] - Typed artifact store, workers and sessions
//! - [`repair`] - Propose / validate / repair loop
//! - [`cache`] - Registry of stored definitions
//! - [`validation`] - Output row schema validation
//! - [`pipeline`] - High-level entry points
//! - [`logs`] - Progress log channel

// Core modules
pub mod error;
pub mod logs;

// Input
pub mod grid;

// Rule documents
pub mod rules;
pub mod interpreter;

// Dataflow
pub mod runtime;
pub mod repair;

// Storage and validation
pub mod cache;
pub mod validation;

pub mod pipeline;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ExtractionError, GridError, PipelineError, ProposerError, RegistryError, RepairError,
    RuntimeError, StructuralError, WorkerError,
};

// =============================================================================
// Re-exports - Grid
// =============================================================================

pub use grid::{load_bytes, load_path, parse_str, Cell, Grid};

// =============================================================================
// Re-exports - Rules
// =============================================================================

pub use rules::{
    example_definition, grammar_description, Action, Area, Coord, CoordRange, Direction,
    ExtractParams, ParserDefinition, Role, Source, TitleIdKind,
};

// =============================================================================
// Re-exports - Interpreter
// =============================================================================

pub use interpreter::{execute, execute_table, Column, NormalizedTable, Record};

// =============================================================================
// Re-exports - Runtime
// =============================================================================

pub use runtime::{
    Artifact, ArtifactKind, DataDescriptionData, ExtractionWorker, FileData, ParsingRulesWorker,
    PlatformData, PlatformWorker, Runtime, Sessions, UserInfoData, Worker, WorkerRegistry,
};

// =============================================================================
// Re-exports - Repair
// =============================================================================

pub use repair::{HttpProposer, ProposalRequest, Proposer, RepairLoop, RepairOptions, RepairOutcome};

// =============================================================================
// Re-exports - Registry (Cache)
// =============================================================================

pub use cache::{DefinitionRegistry, StoredDefinition};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{is_valid_row, validate_row, validate_table, RowError};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{
    check_and_execute, validate_and_execute, DefinitionOrigin, ExtractionReport, Pipeline,
    PipelineOptions,
};
