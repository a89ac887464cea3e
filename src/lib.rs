// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # ontorxn
//!
//! Builds OntoRXN knowledge graphs from computed reaction networks.
//!
//! ## Architecture
//!
//! - **Ingest** (`dot`): DOT multigraph with series keys and tooltips
//! - **Canonical networks** (`network`): parallel-edge dedupe, component split,
//!   optional collapse, renaming by label, formula annotation
//! - **Report** (`report`): calculation list, series configuration and field dictionaries
//! - **Ontology store** (`store`): schema-driven entities with functional and
//!   multivalued properties, oxigraph snapshots, CONSTRUCT patterns, Turtle output
//! - **Correlation** (`correlate`): calculations, species, stages and steps
//! - **Semantic graph** (`semantic`): triples as a typed property graph for inspection
//!
//! ## Library usage
//!
//! ```no_run
//! use ontorxn::engine::{BuildConfig, Builder};
//! use ontorxn::report::ReportDump;
//!
//! let report = ReportDump::load("report.json".as_ref()).unwrap();
//! let dot = std::fs::read_to_string("network.dot").unwrap();
//! let mut builder = Builder::ontorxn(BuildConfig::default()).unwrap();
//! let output = builder.build(&dot, &report).unwrap();
//! builder.save("network.ttl".as_ref()).unwrap();
//! println!("{} stages", output.maps.stages.len());
//! ```

pub mod correlate;
pub mod dot;
pub mod engine;
pub mod error;
pub mod network;
pub mod report;
pub mod semantic;
pub mod store;
