//! # isatab-core
//!
//! The deterministic ISA-Tab translator.
//!
//! This crate converts study and assay tables into an experimental graph
//! (sources, samples, materials, data files and the processes linking them)
//! and serializes such graphs back into tables.
//!
//! ## Components
//!
//! - `header`: column-label grammar
//! - `codec`: value, unit and ontology cell groups
//! - `graph`: typed node arena
//! - `ingestor`: table to graph reconstruction
//! - `paths`: end-to-end path enumeration
//! - `compositor`: graph to table serialization
//! - `investigation`: protocol, factor and ontology-source registries
//! - `export`: canonical form, isomorphism, checksums and snapshots
//!
//! ## Architectural Constraints
//!
//! - Strings in, strings out: no file or network I/O
//! - Deterministic: ordered collections only, no randomness
//! - No floating-point arithmetic; floats are parsed and printed, never
//!   computed with

// =============================================================================
// MODULES
// =============================================================================

pub mod codec;
pub mod compositor;
pub mod config;
pub mod export;
pub mod formats;
pub mod graph;
pub mod header;
pub mod ingestor;
pub mod investigation;
pub mod paths;
pub mod primitives;
pub mod report;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    AssayNameLabel, Characteristic, Comment, DataFileLabel, FactorValue, IsaError, MaterialType,
    NodeId, OntologyAnnotation, ParameterValue, Qualifier, TableKind, Unit, Value,
};

// =============================================================================
// RE-EXPORTS: Translator
// =============================================================================

pub use codec::{Codec, ValueShape, encode};
pub use compositor::Compositor;
pub use export::{
    CanonicalGraph, SnapshotHeader, canonical_checksum, canonical_diff, is_isomorphic, snapshot,
};
pub use graph::{Graph, Node, NodeTag, Process, RunAttribute, SerializableGraph};
pub use header::{Header, HeaderKind, classify, clean};
pub use ingestor::{Ingestor, Translation};
pub use investigation::{OntologySource, Protocol, Registry, StudyFactor};
pub use paths::PathSet;
pub use report::{Diagnostic, DiagnosticCode, Report, Severity};

#[cfg(feature = "crypto-hash")]
pub use export::canonical_crypto_hash;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use config::{QuoteStyle, TabOptions};
pub use formats::Table;
