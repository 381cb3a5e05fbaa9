//! # Run Reports
//!
//! Recoverable warnings and per-row semantic errors found while translating
//! one table. Structural-fatal problems abort with an `IsaError` instead;
//! everything else lands here and the caller receives the partial result
//! together with the report.

use crate::IsaError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// CODES
// =============================================================================

/// Severity of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Translation continued unchanged or with a documented fallback.
    Warning,
    /// A row was skipped or the graph is inconsistent.
    Error,
    /// The file was abandoned.
    Fatal,
}

/// Closed set of non-fatal findings, each with a stable integer code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DiagnosticCode {
    UnregisteredProtocol,
    UnregisteredFactor,
    UndeclaredParameter,
    UnknownAssaySample,
    IsolatedProcess,
    UnregisteredTermSource,
    UnknownHeader,
    RowWidthMismatch,
    DuplicateQualifier,
    MalformedTriple,
    SyntheticProtocolRef,
    SyntheticProtocol,
    NumericPromotion,
    OrphanCompanion,
    IntegrityViolation,
}

impl DiagnosticCode {
    /// The stable integer code.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::UnregisteredProtocol => 1007,
            Self::UnregisteredFactor => 1008,
            Self::UndeclaredParameter => 1009,
            Self::UnknownAssaySample => 1013,
            Self::IsolatedProcess => 1020,
            Self::UnregisteredTermSource => 3009,
            Self::UnknownHeader => 4014,
            Self::RowWidthMismatch => 4104,
            Self::DuplicateQualifier => 4201,
            Self::MalformedTriple => 4202,
            Self::SyntheticProtocolRef => 4203,
            Self::SyntheticProtocol => 4204,
            Self::NumericPromotion => 4205,
            Self::OrphanCompanion => 4206,
            Self::IntegrityViolation => 5001,
        }
    }

    /// Severity implied by the code.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::UnregisteredFactor
            | Self::UndeclaredParameter
            | Self::IsolatedProcess
            | Self::IntegrityViolation => Severity::Error,
            _ => Severity::Warning,
        }
    }
}

// =============================================================================
// DIAGNOSTIC
// =============================================================================

/// One structured finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable integer code.
    pub code: u16,
    /// Severity.
    pub severity: Severity,
    /// Short message.
    pub message: String,
    /// Free-text context (offending header, cell, key...).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub supplemental: String,
    /// Zero-based data row, when the finding belongs to one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
}

impl Diagnostic {
    /// Create a diagnostic for a known code.
    #[must_use]
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code: code.code(),
            severity: code.severity(),
            message: message.into(),
            supplemental: String::new(),
            row: None,
        }
    }

    /// Attach free-text context.
    #[must_use]
    pub fn with_supplemental(mut self, supplemental: impl Into<String>) -> Self {
        self.supplemental = supplemental.into();
        self
    }

    /// Attach a data row.
    #[must_use]
    pub const fn at_row(mut self, row: usize) -> Self {
        self.row = Some(row);
        self
    }
}

impl From<&IsaError> for Diagnostic {
    fn from(err: &IsaError) -> Self {
        Self {
            code: err.code(),
            severity: Severity::Fatal,
            message: err.to_string(),
            supplemental: String::new(),
            row: None,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        write!(f, "[{}] {level}: {}", self.code, self.message)?;
        if let Some(row) = self.row {
            write!(f, " (row {row})")?;
        }
        if !self.supplemental.is_empty() {
            write!(f, ": {}", self.supplemental)?;
        }
        Ok(())
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Per-run accumulation of diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    /// Findings in the order they were raised.
    pub diagnostics: Vec<Diagnostic>,
    /// Data rows skipped because of a semantic error.
    pub skipped_rows: BTreeSet<usize>,
}

impl Report {
    /// Create an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finding and log it.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        match diagnostic.severity {
            Severity::Warning => tracing::warn!(
                code = diagnostic.code,
                row = diagnostic.row,
                supplemental = %diagnostic.supplemental,
                "{}",
                diagnostic.message
            ),
            Severity::Error | Severity::Fatal => tracing::error!(
                code = diagnostic.code,
                row = diagnostic.row,
                supplemental = %diagnostic.supplemental,
                "{}",
                diagnostic.message
            ),
        }
        self.diagnostics.push(diagnostic);
    }

    /// Record a semantic error and mark its row as skipped.
    pub fn skip_row(&mut self, row: usize, diagnostic: Diagnostic) {
        self.skipped_rows.insert(row);
        self.push(diagnostic.at_row(row));
    }

    /// Append every finding of another report.
    pub fn merge(&mut self, other: Self) {
        self.diagnostics.extend(other.diagnostics);
        self.skipped_rows.extend(other.skipped_rows);
    }

    /// Whether any finding carries `code`.
    #[must_use]
    pub fn has(&self, code: DiagnosticCode) -> bool {
        self.diagnostics.iter().any(|d| d.code == code.code())
    }

    /// Number of findings carrying `code`.
    #[must_use]
    pub fn count(&self, code: DiagnosticCode) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.code == code.code())
            .count()
    }

    /// Findings of `Warning` severity.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Findings of `Error` severity or worse.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity >= Severity::Error)
    }

    /// Whether the report holds no finding at all.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for d in &self.diagnostics {
            writeln!(f, "{d}")?;
        }
        if !self.skipped_rows.is_empty() {
            let rows: Vec<String> = self.skipped_rows.iter().map(ToString::to_string).collect();
            writeln!(f, "skipped rows: {}", rows.join(", "))?;
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_imply_severity() {
        assert_eq!(
            DiagnosticCode::UnregisteredFactor.severity(),
            Severity::Error
        );
        assert_eq!(
            DiagnosticCode::UnregisteredTermSource.severity(),
            Severity::Warning
        );
        assert_eq!(DiagnosticCode::UnknownHeader.code(), 4014);
    }

    #[test]
    fn skipped_rows_are_listed() {
        let mut report = Report::new();
        report.skip_row(
            4,
            Diagnostic::new(DiagnosticCode::UnregisteredFactor, "factor not registered"),
        );
        report.push(Diagnostic::new(DiagnosticCode::UnknownHeader, "ignored"));

        assert!(report.skipped_rows.contains(&4));
        assert_eq!(report.errors().count(), 1);
        assert_eq!(report.warnings().count(), 1);
        assert!(report.has(DiagnosticCode::UnknownHeader));
        assert!(report.to_string().contains("skipped rows: 4"));
    }

    #[test]
    fn fatal_errors_render_as_diagnostics() {
        let err = IsaError::EmptyFirstHeader {
            file: "a_assay.txt".to_string(),
        };
        let d = Diagnostic::from(&err);
        assert_eq!(d.code, 4101);
        assert_eq!(d.severity, Severity::Fatal);
    }
}
