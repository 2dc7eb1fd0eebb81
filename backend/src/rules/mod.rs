//! Extraction rule documents.
//!
//! A rule document ([`ParserDefinition`]) says where in a grid the metrics,
//! dates, titles and dimensions live and how the numeric values relate to
//! them. Documents are JSON, usually written by a proposer, and are checked
//! structurally by the decoder in this module before anything touches a
//! grid. See [`grammar_description`] for the wire shape.

pub mod decode;
pub mod definition;
pub mod extractors;
pub mod params;
pub mod source;

pub use decode::{Decode, FieldPath};
pub use definition::{
    example_definition, grammar_description, Area, DataFormat, DataHeaders, Heuristics,
    ParserDefinition, NON_COUNTER_GENERIC,
};
pub use extractors::{
    ComposedDate, DateOrigin, DatePart, DateSource, DimensionSource, HeaderRole, MetricSource,
    OrganizationSource, Role, TitleIdKind, TitleIdSource, TitleSource,
};
pub use params::{Action, ExtractParams, Pattern};
pub use source::{Coord, CoordRange, Direction, Literal, Scalar, Source};
