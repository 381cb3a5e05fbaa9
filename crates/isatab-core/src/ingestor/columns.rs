//! Column grouping and implicit protocol insertion.
//!
//! A group starts at every node label and every `Protocol REF`, and owns the
//! qualifier columns up to the next one. Adjacent node groups get a
//! synthetic `Protocol REF` between them, except adjacent data files, which
//! are sibling outputs of one process. An assay-name column outside a
//! protocol group opens a synthetic one.

use crate::codec::ValueShape;
use crate::graph::NodeTag;
use crate::header::{Header, HeaderKind, classify};
use crate::report::{Diagnostic, DiagnosticCode, Report};
use crate::AssayNameLabel;

/// What a group's primary column holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    /// A material or data-file name.
    Node(NodeTag),
    /// A protocol name.
    Protocol,
}

/// Semantic role of a qualifier value unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Characteristic(String),
    FactorValue(String),
    ParameterValue(String),
    Comment(String),
    Date,
    Performer,
    AssayName(AssayNameLabel),
}

/// One qualifier value unit inside a group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub kind: FieldKind,
    /// Index of the value column.
    pub column: usize,
    pub shape: ValueShape,
}

/// A primary column and the qualifier columns it owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnGroup {
    pub kind: GroupKind,
    /// Primary column; `None` for a synthetic Protocol REF.
    pub primary: Option<usize>,
    pub fields: Vec<Field>,
}

impl ColumnGroup {
    fn new(kind: GroupKind, primary: Option<usize>) -> Self {
        Self {
            kind,
            primary,
            fields: Vec::new(),
        }
    }

    /// Whether this is a protocol group.
    #[must_use]
    pub const fn is_protocol(&self) -> bool {
        matches!(self.kind, GroupKind::Protocol)
    }

    /// Whether this is a synthetic protocol group.
    #[must_use]
    pub const fn is_synthetic(&self) -> bool {
        self.is_protocol() && self.primary.is_none()
    }

    fn accepts(&self, field: &FieldKind) -> bool {
        use FieldKind as F;
        match self.kind {
            GroupKind::Protocol => matches!(
                field,
                F::ParameterValue(_) | F::Date | F::Performer | F::Comment(_) | F::AssayName(_)
            ),
            GroupKind::Node(NodeTag::DataFile(_)) => matches!(field, F::Comment(_)),
            GroupKind::Node(NodeTag::Sample) => matches!(
                field,
                F::Characteristic(_) | F::FactorValue(_) | F::Comment(_)
            ),
            GroupKind::Node(_) => matches!(field, F::Characteristic(_) | F::Comment(_)),
        }
    }
}

/// The grouped header of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub groups: Vec<ColumnGroup>,
    /// Number of synthetic Protocol REF groups.
    pub synthetic: usize,
}

impl Layout {
    /// Group a header row. Never fails; stray columns are reported and
    /// ignored.
    pub fn build(headers: &[String], report: &mut Report) -> Self {
        let classified: Vec<Header> = headers.iter().map(|h| classify(h)).collect();
        let kinds: Vec<HeaderKind> = classified.iter().map(|h| h.kind).collect();
        let mut groups: Vec<ColumnGroup> = Vec::new();
        let mut synthetic = 0usize;

        let mut i = 0;
        while i < classified.len() {
            let header = &classified[i];
            let mut width = 1;
            match header.kind {
                HeaderKind::ProtocolRef => groups.push(ColumnGroup::new(GroupKind::Protocol, Some(i))),
                HeaderKind::AssayName(label) => {
                    if !groups.last().is_some_and(ColumnGroup::is_protocol) {
                        synthetic = synthetic.saturating_add(1);
                        report.push(
                            Diagnostic::new(
                                DiagnosticCode::SyntheticProtocolRef,
                                "Protocol REF inserted before assay-name column",
                            )
                            .with_supplemental(&headers[i]),
                        );
                        groups.push(ColumnGroup::new(GroupKind::Protocol, None));
                    }
                    if let Some(group) = groups.last_mut() {
                        group.fields.push(Field {
                            kind: FieldKind::AssayName(label),
                            column: i,
                            shape: ValueShape::Text,
                        });
                    }
                }
                kind if kind.is_node() => {
                    if let Some(tag) = node_tag(kind) {
                        groups.push(ColumnGroup::new(GroupKind::Node(tag), Some(i)));
                    }
                }
                kind if kind.is_companion() => report.push(
                    Diagnostic::new(
                        DiagnosticCode::OrphanCompanion,
                        "companion column without a value column, ignored",
                    )
                    .with_supplemental(&headers[i]),
                ),
                HeaderKind::Ignored | HeaderKind::Malformed => report.push(
                    Diagnostic::new(DiagnosticCode::UnknownHeader, "unrecognised header, ignored")
                        .with_supplemental(&headers[i]),
                ),
                _ => {
                    let Some((kind, valued)) = field_kind(header) else {
                        i += 1;
                        continue;
                    };
                    let shape = if valued {
                        ValueShape::detect(&kinds[i + 1..])
                    } else {
                        ValueShape::Text
                    };
                    width = shape.width();
                    match groups.last_mut() {
                        Some(group) if group.accepts(&kind) => group.fields.push(Field {
                            kind,
                            column: i,
                            shape,
                        }),
                        _ => report.push(
                            Diagnostic::new(
                                DiagnosticCode::UnknownHeader,
                                "qualifier outside a group that can hold it, ignored",
                            )
                            .with_supplemental(&headers[i]),
                        ),
                    }
                }
            }
            i += width;
        }

        let groups = insert_protocols(groups, &mut synthetic, report);
        tracing::debug!(groups = groups.len(), synthetic, "columns grouped");
        Self { groups, synthetic }
    }

    /// Indices of node groups, in column order.
    pub fn node_groups(&self) -> impl Iterator<Item = usize> + '_ {
        self.groups
            .iter()
            .enumerate()
            .filter(|(_, g)| !g.is_protocol())
            .map(|(i, _)| i)
    }

    /// Nearest node group before `group`, skipping protocol groups.
    #[must_use]
    pub fn node_before(&self, group: usize) -> Option<usize> {
        (0..group).rev().find(|&g| !self.groups[g].is_protocol())
    }

    /// Nearest node group after `group`, skipping protocol groups.
    #[must_use]
    pub fn node_after(&self, group: usize) -> Option<usize> {
        (group + 1..self.groups.len()).find(|&g| !self.groups[g].is_protocol())
    }
}

/// Map a primary header kind to the tag of the nodes it names.
#[must_use]
pub const fn node_tag(kind: HeaderKind) -> Option<NodeTag> {
    match kind {
        HeaderKind::Source => Some(NodeTag::Source),
        HeaderKind::Sample => Some(NodeTag::Sample),
        HeaderKind::Material(t) => Some(NodeTag::Material(t)),
        HeaderKind::DataFile(l) => Some(NodeTag::DataFile(l)),
        _ => None,
    }
}

/// Field role of a qualifier header, and whether it takes companions.
fn field_kind(header: &Header) -> Option<(FieldKind, bool)> {
    let arg = header.argument().to_string();
    let kind = match header.kind {
        HeaderKind::Characteristics => (FieldKind::Characteristic(arg), true),
        HeaderKind::MaterialType | HeaderKind::Label => {
            (FieldKind::Characteristic(header.label()), true)
        }
        HeaderKind::FactorValue => (FieldKind::FactorValue(arg), true),
        HeaderKind::ParameterValue => (FieldKind::ParameterValue(arg), true),
        HeaderKind::Comment => (FieldKind::Comment(arg), false),
        HeaderKind::Date => (FieldKind::Date, false),
        HeaderKind::Performer => (FieldKind::Performer, false),
        _ => return None,
    };
    Some(kind)
}

fn insert_protocols(
    groups: Vec<ColumnGroup>,
    synthetic: &mut usize,
    report: &mut Report,
) -> Vec<ColumnGroup> {
    let mut out: Vec<ColumnGroup> = Vec::with_capacity(groups.len());
    for group in groups {
        if let (Some(prev), GroupKind::Node(next)) = (out.last(), group.kind) {
            let siblings = matches!(
                (prev.kind, next),
                (GroupKind::Node(NodeTag::DataFile(_)), NodeTag::DataFile(_))
            );
            if !prev.is_protocol() && !siblings {
                *synthetic = synthetic.saturating_add(1);
                report.push(
                    Diagnostic::new(
                        DiagnosticCode::SyntheticProtocolRef,
                        "Protocol REF inserted between adjacent node columns",
                    )
                    .with_supplemental(format!("before column {}", group.primary.unwrap_or_default())),
                );
                out.push(ColumnGroup::new(GroupKind::Protocol, None));
            }
        }
        out.push(group);
    }
    out
}

// =============================================================================
// TESTS
// =============================================================================
