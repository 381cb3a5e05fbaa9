//! Table-format options.
//!
//! Every field has a default, so a partial TOML file is a valid
//! configuration.

use serde::{Deserialize, Serialize};

/// When emitted cells are wrapped in double quotes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteStyle {
    /// Never quote.
    Never,
    /// Quote cells that contain whitespace or a quote character.
    #[default]
    Whitespace,
    /// Quote every cell.
    Always,
}

/// Knobs of the tab-separated format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabOptions {
    /// Keep surrounding quotes as part of the cell on read.
    pub read_cell_quotes: bool,
    /// Quoting of emitted cells and headers.
    pub write_quotes: QuoteStyle,
    /// Pad or truncate rows whose width differs from the header instead of
    /// failing.
    pub force_fit_columns: bool,
    /// Emit sample factor values in assay tables.
    pub write_factor_values_in_assays: bool,
    /// Drop value columns that are empty in every row.
    pub drop_empty_columns: bool,
}

impl Default for TabOptions {
    fn default() -> Self {
        Self {
            read_cell_quotes: false,
            write_quotes: QuoteStyle::Whitespace,
            force_fit_columns: true,
            write_factor_values_in_assays: false,
            drop_empty_columns: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_document_keeps_defaults() {
        let opts: TabOptions =
            serde_json::from_str(r#"{"write_quotes":"never"}"#).expect("parse");
        assert_eq!(opts.write_quotes, QuoteStyle::Never);
        assert!(opts.force_fit_columns);
        assert!(opts.drop_empty_columns);
        assert!(!opts.read_cell_quotes);
    }
}
