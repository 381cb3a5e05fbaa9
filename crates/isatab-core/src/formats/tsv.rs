//! # Tab-Separated Tables
//!
//! One study or assay file: a header line followed by data rows of string
//! cells. This is a pure transformation between text and `Table`; file I/O
//! lives in the app layer.
//!
//! Read rules:
//! - blank lines and lines whose first cell starts with `#` are skipped
//! - surrounding double quotes are stripped (`""` unescapes to `"`) unless
//!   `read_cell_quotes` is set
//! - rows narrower or wider than the header are fitted (warning 4104) or
//!   rejected, depending on `force_fit_columns`

use crate::config::{QuoteStyle, TabOptions};
use crate::header::{HeaderKind, classify};
use crate::primitives::{COMMENT_MARKER, DELIMITER, QUOTE};
use crate::report::{Diagnostic, DiagnosticCode, Report};
use crate::IsaError;

// =============================================================================
// TABLE
// =============================================================================

/// An in-memory table: header cells plus rows of equal width.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Table {
    /// File name, used in error messages.
    pub name: String,
    /// Header cells, verbatim (suffixes included).
    pub headers: Vec<String>,
    /// Data rows; every row has `headers.len()` cells.
    pub rows: Vec<Vec<String>>,
}

impl Table {
    /// Create an empty table with the given header.
    #[must_use]
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Number of columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Append a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.width(), String::new());
        self.rows.push(row);
    }

    /// Cell at (row, column), empty when out of range.
    #[must_use]
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map_or("", String::as_str)
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// Parse tab-separated text.
    ///
    /// Fails on the structural errors: missing header, empty first header
    /// cell, unmatched bracket in a header, and (without force-fit) rows of
    /// the wrong width.
    pub fn parse(
        name: &str,
        text: &str,
        options: &TabOptions,
        report: &mut Report,
    ) -> Result<Self, IsaError> {
        let mut lines = text
            .split('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .map(|l| split_line(l, options.read_cell_quotes))
            .filter(|cells| !is_skipped(cells));

        let headers = lines.next().ok_or_else(|| IsaError::HeaderMissing {
            file: name.to_string(),
        })?;
        if headers.first().is_none_or(|h| h.trim().is_empty()) {
            return Err(IsaError::EmptyFirstHeader {
                file: name.to_string(),
            });
        }
        if let Some(bad) = headers
            .iter()
            .find(|h| classify(h).kind == HeaderKind::Malformed)
        {
            return Err(IsaError::UnmatchedBracket {
                file: name.to_string(),
                header: bad.clone(),
            });
        }

        let mut table = Self::new(name, headers);
        for (row, mut cells) in lines.enumerate() {
            let expected = table.width();
            let found = cells.len();
            if found != expected {
                let extras_empty = cells.iter().skip(expected).all(|c| c.trim().is_empty());
                if !options.force_fit_columns && !(found > expected && extras_empty) {
                    return Err(IsaError::RowWidthMismatch {
                        file: name.to_string(),
                        row,
                        expected,
                        found,
                    });
                }
                if found < expected || !extras_empty {
                    report.push(
                        Diagnostic::new(
                            DiagnosticCode::RowWidthMismatch,
                            "row width differs from header, fitted",
                        )
                        .with_supplemental(format!("{found} cells, header has {expected}"))
                        .at_row(row),
                    );
                }
                cells.resize(expected, String::new());
            }
            table.rows.push(cells);
        }
        tracing::debug!(
            file = name,
            columns = table.width(),
            rows = table.rows.len(),
            "table parsed"
        );
        Ok(table)
    }

    // =========================================================================
    // WRITE
    // =========================================================================

    /// Render as tab-separated text, one line per row, header first.
    ///
    /// A cell holding a tab or a line break is an error; its `row` is the
    /// 1-based line of the output (the header is line 1).
    pub fn to_tsv(&self, options: &TabOptions) -> Result<String, IsaError> {
        let mut out = String::new();
        let lines = std::iter::once(&self.headers).chain(self.rows.iter());
        for (line, cells) in lines.enumerate() {
            for (column, cell) in cells.iter().enumerate() {
                if cell.contains(['\t', '\n', '\r']) {
                    return Err(IsaError::IllegalCellCharacter {
                        file: self.name.clone(),
                        row: line.saturating_add(1),
                        column,
                    });
                }
                if column > 0 {
                    out.push(DELIMITER);
                }
                push_cell(&mut out, cell, options.write_quotes);
            }
            out.push('\n');
        }
        Ok(out)
    }
}

fn split_line(line: &str, keep_quotes: bool) -> Vec<String> {
    line.split(DELIMITER)
        .map(|cell| {
            if keep_quotes {
                cell.to_string()
            } else {
                unquote(cell)
            }
        })
        .collect()
}

fn unquote(cell: &str) -> String {
    let quote = QUOTE.to_string();
    match cell
        .strip_prefix(QUOTE)
        .and_then(|c| c.strip_suffix(QUOTE))
    {
        Some(inner) => inner.replace(&quote.repeat(2), &quote),
        None => cell.to_string(),
    }
}

fn is_skipped(cells: &[String]) -> bool {
    let blank = cells.iter().all(|c| c.trim().is_empty());
    let comment = cells
        .first()
        .is_some_and(|c| c.trim_start().starts_with(COMMENT_MARKER));
    blank || comment
}

fn push_cell(out: &mut String, cell: &str, style: QuoteStyle) {
    let quoted = match style {
        QuoteStyle::Never => false,
        QuoteStyle::Whitespace => cell.contains(|c: char| c.is_whitespace() || c == QUOTE),
        QuoteStyle::Always => true,
    };
    if quoted {
        out.push(QUOTE);
        for c in cell.chars() {
            if c == QUOTE {
                out.push(QUOTE);
            }
            out.push(c);
        }
        out.push(QUOTE);
    } else {
        out.push_str(cell);
    }
}

// =============================================================================
// TESTS
// =============================================================================
