//! # Core Type Definitions
//!
//! Value-level types shared by every component of the translator:
//! - Node handles (`NodeId`) and table kinds (`TableKind`)
//! - Cell values (`OntologyAnnotation`, `Value`, `Unit`)
//! - Qualifiers (`Qualifier`, `Comment`)
//! - Closed label sets (`labels`)
//! - Error taxonomy (`IsaError`)
//!
//! ## Determinism Guarantees
//!
//! Identifiers and labels implement `Ord` so they can key `BTreeMap`s.
//! Floating-point values are stored, compared and printed but never
//! computed with.

pub mod labels;

pub use labels::{AssayNameLabel, DataFileLabel, MaterialType};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// NODE HANDLES
// =============================================================================

/// Handle of a node in the graph arena.
///
/// Handles are contiguous indices assigned in creation order. They are only
/// meaningful for the graph that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub usize);

impl NodeId {
    /// The arena index of this handle.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which of the two table kinds a file is.
///
/// Study tables start paths at sources; assay tables start them at samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableKind {
    #[default]
    Study,
    Assay,
}

// =============================================================================
// ONTOLOGY ANNOTATION
// =============================================================================

/// A term label pointing at an external controlled vocabulary.
///
/// `term_source` names an ontology source registered at investigation level;
/// `term_accession` is the term's identifier inside that source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OntologyAnnotation {
    /// Human-readable term label.
    pub term: String,
    /// Name of the ontology source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_source: Option<String>,
    /// Accession of the term inside its source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term_accession: Option<String>,
}

impl OntologyAnnotation {
    /// A bare term with neither source nor accession.
    #[must_use]
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            term_source: None,
            term_accession: None,
        }
    }

    /// A term with source and accession.
    #[must_use]
    pub fn sourced(
        term: impl Into<String>,
        source: impl Into<String>,
        accession: impl Into<String>,
    ) -> Self {
        Self {
            term: term.into(),
            term_source: Some(source.into()),
            term_accession: Some(accession.into()),
        }
    }

    /// Source name as a cell, empty when absent.
    #[must_use]
    pub fn source_cell(&self) -> &str {
        self.term_source.as_deref().unwrap_or_default()
    }

    /// Accession as a cell, empty when absent.
    #[must_use]
    pub fn accession_cell(&self) -> &str {
        self.term_accession.as_deref().unwrap_or_default()
    }
}

// =============================================================================
// CELL VALUES
// =============================================================================

/// The value part of a qualifier.
///
/// `Int` and `Float` only arise for cells followed by a Unit column.
/// `Float` never holds NaN or an infinity; such cells stay `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Verbatim cell text.
    Text(String),
    /// Integer promoted from a unit-bearing cell.
    Int(i64),
    /// Decimal promoted from a unit-bearing cell.
    Float(f64),
    /// Ontology-annotated term.
    Term(OntologyAnnotation),
}

impl Value {
    /// Whether the value is an `Int` or a `Float`.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Whether the value renders as an empty cell.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(s) => s.is_empty(),
            Self::Term(oa) => oa.term.is_empty(),
            Self::Int(_) | Self::Float(_) => false,
        }
    }

    /// Promote a cell to a number: integer when it parses as one, otherwise a
    /// finite float. Returns `None` when neither applies.
    #[must_use]
    pub fn parse_number(cell: &str) -> Option<Self> {
        let cell = cell.trim();
        if let Ok(i) = cell.parse::<i64>() {
            return Some(Self::Int(i));
        }
        match cell.parse::<f64>() {
            Ok(f) if f.is_finite() => Some(Self::Float(f)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    /// Renders the primary cell of the value.
    ///
    /// Floats always carry a decimal point or exponent so they re-read as
    /// floats.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => {
                let text = x.to_string();
                if text.contains(['.', 'e', 'E']) {
                    f.write_str(&text)
                } else {
                    write!(f, "{text}.0")
                }
            }
            Self::Term(oa) => f.write_str(&oa.term),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<OntologyAnnotation> for Value {
    fn from(oa: OntologyAnnotation) -> Self {
        Self::Term(oa)
    }
}

/// Unit of a numeric qualifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Unit {
    /// Free-text unit with no ontology reference.
    Plain(String),
    /// Ontology-annotated unit.
    Term(OntologyAnnotation),
}

impl Unit {
    /// The unit label as written in the Unit cell.
    #[must_use]
    pub fn label(&self) -> &str {
        match self {
            Self::Plain(s) => s,
            Self::Term(oa) => &oa.term,
        }
    }
}

// =============================================================================
// QUALIFIERS
// =============================================================================

/// A categorised value attached to a node.
///
/// Characteristics, factor values and parameter values all share this shape;
/// the list they live in tells them apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qualifier {
    /// Category, factor or parameter name (the bracketed header argument).
    pub category: String,
    /// The qualifier's value.
    pub value: Value,
    /// Unit, for numeric values only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
}

impl Qualifier {
    /// A unit-less qualifier.
    ///
    /// A number without a unit has no table encoding, so it is stored as
    /// text.
    #[must_use]
    pub fn new(category: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = match value.into() {
            v @ (Value::Int(_) | Value::Float(_)) => Value::Text(v.to_string()),
            v => v,
        };
        Self {
            category: category.into(),
            value,
            unit: None,
        }
    }

    /// A numeric qualifier with a unit.
    #[must_use]
    pub fn with_unit(category: impl Into<String>, value: Value, unit: Unit) -> Self {
        Self {
            category: category.into(),
            value,
            unit: Some(unit),
        }
    }
}

/// A characteristic of a material.
pub type Characteristic = Qualifier;
/// A factor value of a sample.
pub type FactorValue = Qualifier;
/// A parameter value of a process.
pub type ParameterValue = Qualifier;

/// A free-text comment, preserved verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Comment {
    /// The bracketed header argument.
    pub name: String,
    /// The cell text.
    pub value: String,
}

impl Comment {
    /// Create a new comment.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that abort a translation.
///
/// Structural errors carry the file name; recoverable findings never become
/// an `IsaError` but are collected as diagnostics in a `Report`.
#[derive(Debug, Error)]
pub enum IsaError {
    /// The table has no header line.
    #[error("{file}: header line missing")]
    HeaderMissing { file: String },

    /// The first header cell is empty.
    #[error("{file}: first header cell is empty")]
    EmptyFirstHeader { file: String },

    /// A cell holds a tab or a newline.
    #[error("{file}: tab or newline in cell at row {row}, column {column}")]
    IllegalCellCharacter {
        file: String,
        row: usize,
        column: usize,
    },

    /// A bracketed qualifier label is not closed.
    #[error("{file}: unmatched bracket in header '{header}'")]
    UnmatchedBracket { file: String, header: String },

    /// A data row is wider or narrower than the header.
    #[error("{file}: row {row} has {found} cells, header has {expected}")]
    RowWidthMismatch {
        file: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A handle does not belong to the graph.
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// The graph breaks a structural invariant.
    #[error("Graph integrity violation: {0}")]
    IntegrityViolation(String),

    /// Path enumeration exceeded a computational bound.
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Reading or writing a file failed.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl IsaError {
    /// Stable integer code of the error.
    #[must_use]
    pub const fn code(&self) -> u16 {
        match self {
            Self::HeaderMissing { .. } => 4100,
            Self::EmptyFirstHeader { .. } => 4101,
            Self::IllegalCellCharacter { .. } => 4102,
            Self::UnmatchedBracket { .. } => 4103,
            Self::RowWidthMismatch { .. } => 4104,
            Self::NodeNotFound(_) | Self::IntegrityViolation(_) => 5001,
            Self::CapacityExceeded(_) => 5002,
            Self::SerializationError(_) => 5100,
            Self::IoError(_) => 5200,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
