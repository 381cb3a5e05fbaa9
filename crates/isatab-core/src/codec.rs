//! # Value Codec
//!
//! A qualifier value occupies one to four adjacent columns, selected by the
//! companion labels that follow the value column:
//!
//! | Shape | Columns |
//! |---|---|
//! | `Text` | value |
//! | `Term` | value, Term Source REF, Term Accession Number |
//! | `Number` | value, Unit |
//! | `TermNumber` | value, Unit, Term Source REF, Term Accession Number |
//!
//! An empty value cell means the qualifier is absent, whatever its
//! companions hold.

use crate::header::HeaderKind;
use crate::investigation::Registry;
use crate::report::{Diagnostic, DiagnosticCode, Report};
use crate::{OntologyAnnotation, Unit, Value};
use std::collections::BTreeSet;

// =============================================================================
// SHAPES
// =============================================================================

/// Column layout of one value unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ValueShape {
    /// Verbatim string.
    Text,
    /// Ontology annotation.
    Term,
    /// Number with a plain unit.
    Number,
    /// Number with an ontology-annotated unit.
    TermNumber,
}

impl ValueShape {
    /// Number of columns, value column included.
    #[must_use]
    pub const fn width(self) -> usize {
        match self {
            Self::Text => 1,
            Self::Number => 2,
            Self::Term => 3,
            Self::TermNumber => 4,
        }
    }

    /// Companion labels following the value column.
    #[must_use]
    pub const fn companions(self) -> &'static [HeaderKind] {
        match self {
            Self::Text => &[],
            Self::Term => &[HeaderKind::TermSourceRef, HeaderKind::TermAccessionNumber],
            Self::Number => &[HeaderKind::Unit],
            Self::TermNumber => &[
                HeaderKind::Unit,
                HeaderKind::TermSourceRef,
                HeaderKind::TermAccessionNumber,
            ],
        }
    }

    /// Shape announced by the labels after a value column.
    ///
    /// Rules are tried in order: Term, TermNumber, Number, Text.
    #[must_use]
    pub fn detect(following: &[HeaderKind]) -> Self {
        let starts = |shape: Self| following.starts_with(shape.companions());
        if starts(Self::Term) {
            Self::Term
        } else if starts(Self::TermNumber) {
            Self::TermNumber
        } else if starts(Self::Number) {
            Self::Number
        } else {
            Self::Text
        }
    }

    /// Shape a value needs to be written without loss.
    #[must_use]
    pub const fn of(value: &Value, unit: Option<&Unit>) -> Self {
        match (value, unit) {
            (_, Some(Unit::Term(_))) => Self::TermNumber,
            (_, Some(Unit::Plain(_))) => Self::Number,
            (Value::Term(_), None) => Self::Term,
            _ => Self::Text,
        }
    }

    /// Smallest shape able to hold values of both shapes.
    ///
    /// Unit shapes absorb `Term`; a term stored there keeps only its label.
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        match (self, other) {
            (Self::TermNumber, _) | (_, Self::TermNumber) => Self::TermNumber,
            (Self::Number, _) | (_, Self::Number) => Self::Number,
            (Self::Term, _) | (_, Self::Term) => Self::Term,
            (Self::Text, Self::Text) => Self::Text,
        }
    }
}

// =============================================================================
// ENCODE
// =============================================================================

/// Render a value into the cells of `shape`.
///
/// Exact for `ValueShape::of(value, unit)`; otherwise the value is coerced
/// (a plain unit leaves the source cells empty, a term in a unit shape
/// keeps its label only, a unit in a `Text` or `Term` shape is dropped).
#[must_use]
pub fn encode(shape: ValueShape, value: &Value, unit: Option<&Unit>) -> Vec<String> {
    let mut cells = vec![value.to_string()];
    match shape {
        ValueShape::Text => {}
        ValueShape::Term => match value {
            Value::Term(oa) => {
                cells.push(oa.source_cell().to_string());
                cells.push(oa.accession_cell().to_string());
            }
            _ => cells.extend([String::new(), String::new()]),
        },
        ValueShape::Number => cells.push(unit.map(Unit::label).unwrap_or_default().to_string()),
        ValueShape::TermNumber => match unit {
            Some(Unit::Term(oa)) => cells.extend([
                oa.term.clone(),
                oa.source_cell().to_string(),
                oa.accession_cell().to_string(),
            ]),
            Some(Unit::Plain(label)) => cells.extend([label.clone(), String::new(), String::new()]),
            None => cells.extend([String::new(), String::new(), String::new()]),
        },
    }
    cells
}

// =============================================================================
// DECODE
// =============================================================================

/// Decoder bound to an investigation registry.
///
/// Unregistered term sources are reported once per decoder.
#[derive(Debug)]
pub struct Codec<'a> {
    registry: &'a Registry,
    warned_sources: BTreeSet<String>,
}

impl<'a> Codec<'a> {
    /// Create a decoder.
    #[must_use]
    pub const fn new(registry: &'a Registry) -> Self {
        Self {
            registry,
            warned_sources: BTreeSet::new(),
        }
    }

    /// Decode the cells of one value unit.
    ///
    /// `cells` holds `shape.width()` cells, value first. Returns `None` when
    /// the value cell is empty.
    pub fn decode(
        &mut self,
        shape: ValueShape,
        cells: &[&str],
        row: usize,
        report: &mut Report,
    ) -> Option<(Value, Option<Unit>)> {
        let cell = |i: usize| cells.get(i).copied().unwrap_or_default();
        let raw = cell(0);
        if raw.is_empty() {
            return None;
        }
        match shape {
            ValueShape::Text => Some((Value::Text(raw.to_string()), None)),
            ValueShape::Term => {
                let oa = self.annotation(raw, cell(1), cell(2), row, report);
                Some((Value::Term(oa), None))
            }
            ValueShape::Number => {
                let unit = cell(1);
                if unit.is_empty() {
                    return Some((Value::Text(raw.to_string()), None));
                }
                let value = promote(raw, row, report);
                Some((value, Some(Unit::Plain(unit.to_string()))))
            }
            ValueShape::TermNumber => {
                let unit = cell(1);
                if unit.is_empty() {
                    return Some((Value::Text(raw.to_string()), None));
                }
                let value = promote(raw, row, report);
                let oa = self.annotation(unit, cell(2), cell(3), row, report);
                Some((value, Some(Unit::Term(oa))))
            }
        }
    }

    fn annotation(
        &mut self,
        term: &str,
        source: &str,
        accession: &str,
        row: usize,
        report: &mut Report,
    ) -> OntologyAnnotation {
        if source.is_empty() && !accession.is_empty() {
            report.push(
                Diagnostic::new(
                    DiagnosticCode::MalformedTriple,
                    "term accession without term source",
                )
                .with_supplemental(format!("{term} ({accession})"))
                .at_row(row),
            );
        }
        if !source.is_empty()
            && !self.registry.has_source(source)
            && self.warned_sources.insert(source.to_string())
        {
            report.push(
                Diagnostic::new(
                    DiagnosticCode::UnregisteredTermSource,
                    "term source not registered",
                )
                .with_supplemental(source)
                .at_row(row),
            );
        }
        OntologyAnnotation {
            term: term.to_string(),
            term_source: non_empty(source),
            term_accession: non_empty(accession),
        }
    }
}

fn promote(raw: &str, row: usize, report: &mut Report) -> Value {
    Value::parse_number(raw).unwrap_or_else(|| {
        report.push(
            Diagnostic::new(
                DiagnosticCode::NumericPromotion,
                "value with unit is not numeric, kept as text",
            )
            .with_supplemental(raw)
            .at_row(row),
        );
        Value::Text(raw.to_string())
    })
}

fn non_empty(cell: &str) -> Option<String> {
    (!cell.is_empty()).then(|| cell.to_string())
}

// =============================================================================
// TESTS
// =============================================================================
