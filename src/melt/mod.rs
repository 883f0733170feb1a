//! Environment melting - flatten an AAS environment into relational records
//!
//! This module walks a parsed environment tree and produces one ordered
//! batch of records per document: shells, submodels, submodel elements with
//! parent links, and typed value rows.
//!
//! ## Typed values
//!
//! Scalar values are routed to a string, integer or double table by the
//! coercion engine. Object-valued attributes (relationship endpoints, list
//! settings, event fields) become reference rows holding their JSON form.

pub mod types;
pub mod builder;
pub mod cache;
pub mod coerce;
pub mod extractor;
pub mod writer;

pub use types::{Batch, MeltConfig, Record, RecordId, ValueFamily};
pub use builder::RecordBuilder;
pub use cache::ConceptCache;
pub use coerce::{coerce, natural_family, reconcile_range, Coerced, RangeValues, ScalarValue};
pub use extractor::AasMelter;
pub use writer::{JsonlSink, MemorySink, RecordSink, StreamSink};
