//! # Investigation Bridge
//!
//! The slice of the investigation descriptor that table translation needs:
//! - ontology sources (consulted for every Term Source REF)
//! - protocols with their parameter names and protocol type
//! - study factors
//! - optionally, the sample names of the study table (for assay checks)
//!
//! The registry is read-only while a table is translated. The only
//! mutations (synthesized protocols) happen before edges are wired.

use crate::primitives::UNKNOWN_PROTOCOL;
use crate::report::{Diagnostic, DiagnosticCode, Report};
use crate::types::labels::matches_label;
use crate::{AssayNameLabel, IsaError, OntologyAnnotation};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// DESCRIPTORS
// =============================================================================

/// An ontology source declared at investigation level.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OntologySource {
    pub name: String,
    pub file: String,
    pub version: String,
    pub description: String,
}

impl OntologySource {
    /// A source known only by name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// A protocol declared at study level.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Protocol {
    /// Name used by Protocol REF cells.
    pub name: String,
    /// Protocol type; selects the assay-name column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_type: Option<OntologyAnnotation>,
    /// Declared parameter names, in declaration order.
    #[serde(default)]
    pub parameters: Vec<String>,
}

impl Protocol {
    /// A protocol without type or parameters.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the protocol type.
    #[must_use]
    pub fn with_type(mut self, term: impl Into<String>) -> Self {
        self.protocol_type = Some(OntologyAnnotation::new(term));
        self
    }

    /// Declare parameters.
    #[must_use]
    pub fn with_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters.extend(names.into_iter().map(Into::into));
        self
    }

    /// Whether `parameter` is declared on this protocol.
    #[must_use]
    pub fn declares(&self, parameter: &str) -> bool {
        self.parameters.iter().any(|p| p == parameter)
    }

    /// Assay-name columns demanded by the protocol type.
    #[must_use]
    pub fn assay_name_labels(&self) -> &'static [AssayNameLabel] {
        match &self.protocol_type {
            Some(t) => assay_name_labels(&t.term),
            None => &[],
        }
    }
}

/// A study factor.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StudyFactor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub factor_type: Option<OntologyAnnotation>,
}

impl StudyFactor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            factor_type: None,
        }
    }
}

// =============================================================================
// PROTOCOL TYPES
// =============================================================================

const MS: &[AssayNameLabel] = &[AssayNameLabel::MsAssayName];
const NMR: &[AssayNameLabel] = &[AssayNameLabel::NmrAssayName];
const HYBRIDIZATION: &[AssayNameLabel] = &[
    AssayNameLabel::HybridizationAssayName,
    AssayNameLabel::ArrayDesignRef,
];
const SCAN: &[AssayNameLabel] = &[AssayNameLabel::ScanName];
const NORMALIZATION: &[AssayNameLabel] = &[AssayNameLabel::NormalizationName];
const TRANSFORMATION: &[AssayNameLabel] = &[AssayNameLabel::DataTransformationName];
const GENERIC: &[AssayNameLabel] = &[AssayNameLabel::AssayName];

/// Synonym sets of protocol types, each with the columns it selects.
const PROTOCOL_TYPES: [(&[&str], &[AssayNameLabel]); 7] = [
    (
        &["mass spectrometry", "mass spectrometry assay", "ms"],
        MS,
    ),
    (
        &["nmr spectroscopy", "nmr spectroscopy assay", "nmr assay", "nmr"],
        NMR,
    ),
    (
        &["nucleic acid hybridization", "hybridization", "hybridisation"],
        HYBRIDIZATION,
    ),
    (
        &["data collection", "array scanning", "scanning", "scan"],
        SCAN,
    ),
    (&["normalization", "normalisation"], NORMALIZATION),
    (
        &["data transformation", "data processing"],
        TRANSFORMATION,
    ),
    (
        &[
            "nucleic acid sequencing",
            "sequencing",
            "library sequencing",
            "high-throughput sequencing",
            "assay",
            "generic assay",
        ],
        GENERIC,
    ),
];

/// Assay-name columns selected by a protocol-type term (case-insensitive).
/// Unknown types select none.
#[must_use]
pub fn assay_name_labels(protocol_type: &str) -> &'static [AssayNameLabel] {
    PROTOCOL_TYPES
        .iter()
        .find(|(synonyms, _)| synonyms.iter().any(|s| matches_label(s, protocol_type)))
        .map_or(&[][..], |(_, labels)| *labels)
}

// =============================================================================
// REGISTRY
// =============================================================================

/// Registries consulted by reconstruction and serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RegistryDocument", into = "RegistryDocument")]
pub struct Registry {
    ontology_sources: BTreeMap<String, OntologySource>,
    protocols: BTreeMap<String, Protocol>,
    factors: BTreeMap<String, StudyFactor>,
    study_samples: Option<BTreeSet<String>>,
}

impl Registry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register an ontology source.
    #[must_use]
    pub fn with_source(mut self, source: OntologySource) -> Self {
        self.ontology_sources.insert(source.name.clone(), source);
        self
    }

    /// Builder: register a protocol.
    #[must_use]
    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.register_protocol(protocol);
        self
    }

    /// Builder: register a study factor.
    #[must_use]
    pub fn with_factor(mut self, factor: StudyFactor) -> Self {
        self.factors.insert(factor.name.clone(), factor);
        self
    }

    /// Builder: declare the study's sample names.
    #[must_use]
    pub fn with_study_samples<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.study_samples = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Register or replace a protocol.
    pub fn register_protocol(&mut self, protocol: Protocol) {
        self.protocols.insert(protocol.name.clone(), protocol);
    }

    /// Look up a protocol by name.
    #[must_use]
    pub fn protocol(&self, name: &str) -> Option<&Protocol> {
        self.protocols.get(name)
    }

    /// All protocols, by name.
    pub fn protocols(&self) -> impl Iterator<Item = &Protocol> {
        self.protocols.values()
    }

    /// Whether a study factor of this name exists.
    #[must_use]
    pub fn has_factor(&self, name: &str) -> bool {
        self.factors.contains_key(name)
    }

    /// All study factors, by name.
    pub fn factors(&self) -> impl Iterator<Item = &StudyFactor> {
        self.factors.values()
    }

    /// Whether an ontology source of this name exists.
    #[must_use]
    pub fn has_source(&self, name: &str) -> bool {
        self.ontology_sources.contains_key(name)
    }

    /// All ontology sources, by name.
    pub fn sources(&self) -> impl Iterator<Item = &OntologySource> {
        self.ontology_sources.values()
    }

    /// Declared study samples, when known.
    #[must_use]
    pub const fn study_samples(&self) -> Option<&BTreeSet<String>> {
        self.study_samples.as_ref()
    }

    /// Register the synthetic `unknown` protocol once.
    ///
    /// Returns `true` when it was newly registered.
    pub fn declare_unknown_protocol(&mut self, report: &mut Report) -> bool {
        if self.protocols.contains_key(UNKNOWN_PROTOCOL) {
            return false;
        }
        self.register_protocol(Protocol::new(UNKNOWN_PROTOCOL));
        report.push(Diagnostic::new(
            DiagnosticCode::SyntheticProtocol,
            "synthetic protocol registered",
        )
        .with_supplemental(UNKNOWN_PROTOCOL));
        true
    }

    /// Register a protocol referenced by a table but absent from the
    /// registry, declaring the parameter names seen with it.
    pub fn synthesize_protocol(&mut self, name: &str, parameters: &[String], report: &mut Report) {
        if let Some(existing) = self.protocols.get_mut(name) {
            for p in parameters {
                if !existing.declares(p) {
                    existing.parameters.push(p.clone());
                }
            }
            return;
        }
        report.push(
            Diagnostic::new(
                DiagnosticCode::UnregisteredProtocol,
                "protocol not registered, synthesized",
            )
            .with_supplemental(name),
        );
        let mut protocol = Protocol::new(name);
        for p in parameters {
            if !protocol.declares(p) {
                protocol.parameters.push(p.clone());
            }
        }
        self.register_protocol(protocol);
    }
}

// =============================================================================
// DOCUMENT FORM
// =============================================================================

/// List-shaped registry, as read from a JSON or TOML context file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryDocument {
    pub ontology_sources: Vec<OntologySource>,
    pub protocols: Vec<Protocol>,
    pub factors: Vec<StudyFactor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub study_samples: Option<Vec<String>>,
}

impl TryFrom<RegistryDocument> for Registry {
    type Error = IsaError;

    fn try_from(doc: RegistryDocument) -> Result<Self, Self::Error> {
        let mut registry = Self::new();
        for source in doc.ontology_sources {
            if registry.has_source(&source.name) {
                return Err(duplicate("ontology source", &source.name));
            }
            registry = registry.with_source(source);
        }
        for protocol in doc.protocols {
            if registry.protocol(&protocol.name).is_some() {
                return Err(duplicate("protocol", &protocol.name));
            }
            registry.register_protocol(protocol);
        }
        for factor in doc.factors {
            if registry.has_factor(&factor.name) {
                return Err(duplicate("factor", &factor.name));
            }
            registry = registry.with_factor(factor);
        }
        if let Some(samples) = doc.study_samples {
            registry = registry.with_study_samples(samples);
        }
        Ok(registry)
    }
}

impl From<Registry> for RegistryDocument {
    fn from(registry: Registry) -> Self {
        Self {
            ontology_sources: registry.ontology_sources.into_values().collect(),
            protocols: registry.protocols.into_values().collect(),
            factors: registry.factors.into_values().collect(),
            study_samples: registry.study_samples.map(|s| s.into_iter().collect()),
        }
    }
}

fn duplicate(what: &str, name: &str) -> IsaError {
    IsaError::SerializationError(format!("duplicate {what} '{name}'"))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_type_selects_assay_name() {
        assert_eq!(assay_name_labels("Mass Spectrometry"), MS);
        assert_eq!(
            assay_name_labels("nucleic acid hybridization"),
            &[
                AssayNameLabel::HybridizationAssayName,
                AssayNameLabel::ArrayDesignRef
            ]
        );
        assert_eq!(
            assay_name_labels("nucleic acid sequencing"),
            &[AssayNameLabel::AssayName]
        );
        assert!(assay_name_labels("extraction").is_empty());
    }

    #[test]
    fn unknown_protocol_registered_once() {
        let mut registry = Registry::new();
        let mut report = Report::new();
        assert!(registry.declare_unknown_protocol(&mut report));
        assert!(!registry.declare_unknown_protocol(&mut report));
        assert_eq!(report.count(DiagnosticCode::SyntheticProtocol), 1);
        assert!(registry.protocol(UNKNOWN_PROTOCOL).is_some());
    }

    #[test]
    fn synthesized_protocol_declares_seen_parameters() {
        let mut registry = Registry::new();
        let mut report = Report::new();
        registry.synthesize_protocol("labeling", &["dye".to_string()], &mut report);
        let p = registry.protocol("labeling").expect("synthesized");
        assert!(p.declares("dye"));
        assert!(report.has(DiagnosticCode::UnregisteredProtocol));
    }

    #[test]
    fn document_rejects_duplicates() {
        let doc = RegistryDocument {
            factors: vec![StudyFactor::new("dose"), StudyFactor::new("dose")],
            ..RegistryDocument::default()
        };
        assert!(Registry::try_from(doc).is_err());
    }

    #[test]
    fn registry_json_round_trip() {
        let registry = Registry::new()
            .with_source(OntologySource::named("UO"))
            .with_protocol(Protocol::new("extraction").with_parameters(["kit"]))
            .with_factor(StudyFactor::new("dose"));
        let json = serde_json::to_string(&registry).expect("serialize");
        let back: Registry = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, registry);
    }
}
