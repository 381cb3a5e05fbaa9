//! Closed label sets of the table vocabulary.
//!
//! Each enum is the exhaustive list of one header family. Labels match
//! case-insensitively after trimming and always render in canonical case.

use serde::{Deserialize, Serialize};

/// Type tag of an intermediate material (neither source nor sample).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MaterialType {
    /// `Extract Name`
    Extract,
    /// `Labeled Extract Name`
    LabeledExtract,
}

impl MaterialType {
    /// Every material type, in header order.
    pub const ALL: [Self; 2] = [Self::Extract, Self::LabeledExtract];

    /// The primary column label of this material type.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Extract => "Extract Name",
            Self::LabeledExtract => "Labeled Extract Name",
        }
    }

    /// Parse a primary column label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| matches_label(t.label(), label))
    }
}

/// Kind of a data-file artifact, one per data-file column label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DataFileLabel {
    RawData,
    RawSpectralData,
    DerivedSpectralData,
    DerivedArrayData,
    DerivedArrayDataMatrix,
    ArrayData,
    ProteinAssignment,
    PeptideAssignment,
    PostTranslationalModificationAssignment,
    AcquisitionParameterData,
    FreeInductionDecayData,
    Image,
    DerivedData,
    MetaboliteAssignment,
    MetaboliteIdentification,
}

impl DataFileLabel {
    /// Every data-file label, in vocabulary order.
    pub const ALL: [Self; 15] = [
        Self::RawData,
        Self::RawSpectralData,
        Self::DerivedSpectralData,
        Self::DerivedArrayData,
        Self::DerivedArrayDataMatrix,
        Self::ArrayData,
        Self::ProteinAssignment,
        Self::PeptideAssignment,
        Self::PostTranslationalModificationAssignment,
        Self::AcquisitionParameterData,
        Self::FreeInductionDecayData,
        Self::Image,
        Self::DerivedData,
        Self::MetaboliteAssignment,
        Self::MetaboliteIdentification,
    ];

    /// The column label of this data-file kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::RawData => "Raw Data File",
            Self::RawSpectralData => "Raw Spectral Data File",
            Self::DerivedSpectralData => "Derived Spectral Data File",
            Self::DerivedArrayData => "Derived Array Data File",
            Self::DerivedArrayDataMatrix => "Derived Array Data Matrix File",
            Self::ArrayData => "Array Data File",
            Self::ProteinAssignment => "Protein Assignment File",
            Self::PeptideAssignment => "Peptide Assignment File",
            Self::PostTranslationalModificationAssignment => {
                "Post Translational Modification Assignment File"
            }
            Self::AcquisitionParameterData => "Acquisition Parameter Data File",
            Self::FreeInductionDecayData => "Free Induction Decay Data File",
            Self::Image => "Image File",
            Self::DerivedData => "Derived Data File",
            Self::MetaboliteAssignment => "Metabolite Assignment File",
            Self::MetaboliteIdentification => "Metabolite Identification File",
        }
    }

    /// Parse a data-file column label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| matches_label(l.label(), label))
    }
}

/// Assay-name column labels, selected by the protocol type of the process
/// whose Protocol REF group they sit in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssayNameLabel {
    AssayName,
    MsAssayName,
    NmrAssayName,
    HybridizationAssayName,
    ScanName,
    NormalizationName,
    DataTransformationName,
    ArrayDesignRef,
}

impl AssayNameLabel {
    /// Every assay-name label.
    pub const ALL: [Self; 8] = [
        Self::AssayName,
        Self::MsAssayName,
        Self::NmrAssayName,
        Self::HybridizationAssayName,
        Self::ScanName,
        Self::NormalizationName,
        Self::DataTransformationName,
        Self::ArrayDesignRef,
    ];

    /// The column label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::AssayName => "Assay Name",
            Self::MsAssayName => "MS Assay Name",
            Self::NmrAssayName => "NMR Assay Name",
            Self::HybridizationAssayName => "Hybridization Assay Name",
            Self::ScanName => "Scan Name",
            Self::NormalizationName => "Normalization Name",
            Self::DataTransformationName => "Data Transformation Name",
            Self::ArrayDesignRef => "Array Design REF",
        }
    }

    /// Whether the column names the process run (every label but
    /// `Array Design REF`, which references an array design instead).
    #[must_use]
    pub const fn names_process(self) -> bool {
        !matches!(self, Self::ArrayDesignRef)
    }

    /// Parse an assay-name column label.
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| matches_label(l.label(), label))
    }
}

/// Case-insensitive, whitespace-tolerant label comparison.
pub(crate) fn matches_label(canonical: &str, candidate: &str) -> bool {
    canonical.eq_ignore_ascii_case(candidate.trim())
}
