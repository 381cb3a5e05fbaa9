//! # Header Grammar
//!
//! Column labels of study and assay tables form a small language:
//! - primary node labels (`Source Name`, `Sample Name`, data-file labels...)
//! - `Protocol REF` and the assay-name labels that follow it
//! - bracketed qualifiers `Kind[Argument]`
//! - fixed qualifier labels (`Unit`, `Term Source REF`, `Date`...)
//! - a trailing `.<integer>` disambiguation suffix on duplicated labels
//!
//! `classify` is total: anything unrecognised becomes `Ignored` and keeps its
//! cleaned label so it can be written back. `classify(clean(h))` always
//! equals `classify(h)`.

use crate::types::labels::matches_label;
use crate::{AssayNameLabel, DataFileLabel, MaterialType};
use std::fmt;

// =============================================================================
// KIND TAGS
// =============================================================================

/// Kind of a column label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeaderKind {
    /// `Source Name`
    Source,
    /// `Sample Name`
    Sample,
    /// `Extract Name`, `Labeled Extract Name`
    Material(MaterialType),
    /// One of the data-file labels.
    DataFile(DataFileLabel),
    /// `Protocol REF`
    ProtocolRef,
    /// One of the assay-name labels.
    AssayName(AssayNameLabel),
    /// `Characteristics[...]`
    Characteristics,
    /// `Factor Value[...]`
    FactorValue,
    /// `Parameter Value[...]`
    ParameterValue,
    /// `Comment[...]`
    Comment,
    /// `Unit` or `Unit[...]`
    Unit,
    /// `Term Source REF`
    TermSourceRef,
    /// `Term Accession Number`
    TermAccessionNumber,
    /// `Material Type`, or `Characteristics[Material Type]`
    MaterialType,
    /// `Label`, or `Characteristics[Label]`
    Label,
    /// `Date`
    Date,
    /// `Performer`
    Performer,
    /// Unrecognised label, kept verbatim.
    Ignored,
    /// Label with an unmatched bracket.
    Malformed,
}

impl HeaderKind {
    /// Whether the label opens a material or data-file group.
    #[must_use]
    pub const fn is_node(self) -> bool {
        matches!(
            self,
            Self::Source | Self::Sample | Self::Material(_) | Self::DataFile(_)
        )
    }

    /// Whether the label opens a column group.
    #[must_use]
    pub const fn opens_group(self) -> bool {
        self.is_node() || matches!(self, Self::ProtocolRef)
    }

    /// Whether the label is a companion of a preceding value column.
    #[must_use]
    pub const fn is_companion(self) -> bool {
        matches!(
            self,
            Self::Unit | Self::TermSourceRef | Self::TermAccessionNumber
        )
    }

    /// Stable lower-case tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Sample => "sample",
            Self::Material(_) => "material",
            Self::DataFile(_) => "data_file",
            Self::ProtocolRef => "protocol_ref",
            Self::AssayName(_) => "assay_name",
            Self::Characteristics => "characteristics",
            Self::FactorValue => "factor_value",
            Self::ParameterValue => "parameter_value",
            Self::Comment => "comment",
            Self::Unit => "unit",
            Self::TermSourceRef => "term_source_ref",
            Self::TermAccessionNumber => "term_accession_number",
            Self::MaterialType => "material_type",
            Self::Label => "label",
            Self::Date => "date",
            Self::Performer => "performer",
            Self::Ignored => "ignored",
            Self::Malformed => "malformed",
        }
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// =============================================================================
// HEADER
// =============================================================================

/// A classified column label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Header {
    /// Kind tag.
    pub kind: HeaderKind,
    /// Bracketed argument, or the verbatim label for `Ignored`/`Malformed`.
    pub argument: Option<String>,
}

impl Header {
    /// A label without argument.
    #[must_use]
    pub const fn bare(kind: HeaderKind) -> Self {
        Self {
            kind,
            argument: None,
        }
    }

    /// A label with an argument.
    #[must_use]
    pub fn with_argument(kind: HeaderKind, argument: impl Into<String>) -> Self {
        Self {
            kind,
            argument: Some(argument.into()),
        }
    }

    /// The argument, empty when absent.
    #[must_use]
    pub fn argument(&self) -> &str {
        self.argument.as_deref().unwrap_or_default()
    }

    /// Canonical column label.
    #[must_use]
    pub fn label(&self) -> String {
        let arg = self.argument();
        match self.kind {
            HeaderKind::Source => "Source Name".to_string(),
            HeaderKind::Sample => "Sample Name".to_string(),
            HeaderKind::Material(t) => t.label().to_string(),
            HeaderKind::DataFile(l) => l.label().to_string(),
            HeaderKind::ProtocolRef => "Protocol REF".to_string(),
            HeaderKind::AssayName(l) => l.label().to_string(),
            HeaderKind::Characteristics => format!("Characteristics[{arg}]"),
            HeaderKind::FactorValue => format!("Factor Value[{arg}]"),
            HeaderKind::ParameterValue => format!("Parameter Value[{arg}]"),
            HeaderKind::Comment => format!("Comment[{arg}]"),
            HeaderKind::Unit if self.argument.is_some() => format!("Unit[{arg}]"),
            HeaderKind::Unit => "Unit".to_string(),
            HeaderKind::TermSourceRef => "Term Source REF".to_string(),
            HeaderKind::TermAccessionNumber => "Term Accession Number".to_string(),
            HeaderKind::MaterialType => "Material Type".to_string(),
            HeaderKind::Label => "Label".to_string(),
            HeaderKind::Date => "Date".to_string(),
            HeaderKind::Performer => "Performer".to_string(),
            HeaderKind::Ignored | HeaderKind::Malformed => arg.to_string(),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

// =============================================================================
// GRAMMAR
// =============================================================================

const FIXED_LABELS: [(&str, HeaderKind); 10] = [
    ("Source Name", HeaderKind::Source),
    ("Sample Name", HeaderKind::Sample),
    ("Protocol REF", HeaderKind::ProtocolRef),
    ("Unit", HeaderKind::Unit),
    ("Term Source REF", HeaderKind::TermSourceRef),
    ("Term Accession Number", HeaderKind::TermAccessionNumber),
    ("Material Type", HeaderKind::MaterialType),
    ("Label", HeaderKind::Label),
    ("Date", HeaderKind::Date),
    ("Performer", HeaderKind::Performer),
];

const BRACKET_KINDS: [(&str, HeaderKind); 5] = [
    ("Characteristics", HeaderKind::Characteristics),
    ("Factor Value", HeaderKind::FactorValue),
    ("Parameter Value", HeaderKind::ParameterValue),
    ("Comment", HeaderKind::Comment),
    ("Unit", HeaderKind::Unit),
];

/// Classify a column label. Total over all strings.
#[must_use]
pub fn classify(header: &str) -> Header {
    parse(strip_suffixes(header))
}

/// Canonical form of a label: surrounding whitespace and disambiguation
/// suffixes removed, recognised labels in canonical case.
#[must_use]
pub fn clean(header: &str) -> String {
    classify(header).label()
}

fn strip_suffixes(header: &str) -> &str {
    let mut s = header.trim();
    while let Some((head, tail)) = s.rsplit_once('.') {
        if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
            break;
        }
        s = head.trim_end();
    }
    s
}

fn parse(label: &str) -> Header {
    if label.contains(['[', ']']) {
        return parse_bracketed(label);
    }
    if let Some((_, kind)) = FIXED_LABELS.iter().find(|(l, _)| matches_label(l, label)) {
        return Header::bare(*kind);
    }
    if let Some(t) = MaterialType::from_label(label) {
        return Header::bare(HeaderKind::Material(t));
    }
    if let Some(l) = DataFileLabel::from_label(label) {
        return Header::bare(HeaderKind::DataFile(l));
    }
    if let Some(l) = AssayNameLabel::from_label(label) {
        return Header::bare(HeaderKind::AssayName(l));
    }
    Header::with_argument(HeaderKind::Ignored, label)
}

fn parse_bracketed(label: &str) -> Header {
    if !brackets_balanced(label) {
        return Header::with_argument(HeaderKind::Malformed, label);
    }
    let parts = label
        .find('[')
        .zip(label.strip_suffix(']'))
        .map(|(open, inner)| (&label[..open], &inner[open + 1..]));
    let Some((kind, argument)) = parts else {
        return Header::with_argument(HeaderKind::Ignored, label);
    };
    let argument = argument.trim();
    let Some((_, kind)) = BRACKET_KINDS.iter().find(|(k, _)| matches_label(k, kind)) else {
        return Header::with_argument(HeaderKind::Ignored, label);
    };
    if argument.is_empty() {
        return Header::with_argument(HeaderKind::Ignored, label);
    }
    match kind {
        HeaderKind::Characteristics if matches_label("Material Type", argument) => {
            Header::bare(HeaderKind::MaterialType)
        }
        HeaderKind::Characteristics if matches_label("Label", argument) => {
            Header::bare(HeaderKind::Label)
        }
        _ => Header::with_argument(*kind, argument),
    }
}

fn brackets_balanced(label: &str) -> bool {
    let mut depth = 0usize;
    for c in label.chars() {
        match c {
            '[' => depth = depth.saturating_add(1),
            ']' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_labels() {
        assert_eq!(classify("Source Name").kind, HeaderKind::Source);
        assert_eq!(
            classify("Labeled Extract Name").kind,
            HeaderKind::Material(MaterialType::LabeledExtract)
        );
        assert_eq!(
            classify("Raw Spectral Data File").kind,
            HeaderKind::DataFile(DataFileLabel::RawSpectralData)
        );
        assert_eq!(
            classify("MS Assay Name").kind,
            HeaderKind::AssayName(AssayNameLabel::MsAssayName)
        );
        assert_eq!(classify("Protocol REF").kind, HeaderKind::ProtocolRef);
    }

    #[test]
    fn bracketed_labels_carry_argument() {
        let h = classify("Characteristics[Organism]");
        assert_eq!(h.kind, HeaderKind::Characteristics);
        assert_eq!(h.argument(), "Organism");

        let h = classify("factor value [ dose ]");
        assert_eq!(h.kind, HeaderKind::FactorValue);
        assert_eq!(h.label(), "Factor Value[dose]");
    }

    #[test]
    fn material_type_and_label_are_equivalent_forms() {
        assert_eq!(classify("Characteristics[Material Type]").kind, HeaderKind::MaterialType);
        assert_eq!(classify("Material Type").kind, HeaderKind::MaterialType);
        assert_eq!(classify("Characteristics[Label]").label(), "Label");
    }

    #[test]
    fn suffixes_are_stripped() {
        assert_eq!(clean("Sample Name.1"), "Sample Name");
        assert_eq!(clean("Protocol REF.0.2"), "Protocol REF");
        assert_eq!(clean("Characteristics[dose].3"), "Characteristics[dose]");
        assert_eq!(clean(" term source ref "), "Term Source REF");
    }

    #[test]
    fn unknown_headers_are_ignored_verbatim() {
        let h = classify("Hybridization Temperature");
        assert_eq!(h.kind, HeaderKind::Ignored);
        assert_eq!(h.label(), "Hybridization Temperature");

        let h = classify("Foo[bar]");
        assert_eq!(h.kind, HeaderKind::Ignored);
        assert_eq!(h.label(), "Foo[bar]");
    }

    #[test]
    fn unmatched_brackets_are_malformed() {
        assert_eq!(classify("Characteristics[Organism").kind, HeaderKind::Malformed);
        assert_eq!(classify("Comment]x[").kind, HeaderKind::Malformed);
    }

    #[test]
    fn clean_is_idempotent() {
        for h in ["Sample Name.1", "x.1.2", "Comment[a.1]", "  unit ", "Foo[", "."] {
            assert_eq!(clean(&clean(h)), clean(h), "{h}");
            assert_eq!(classify(&clean(h)), classify(h), "{h}");
        }
    }
}
