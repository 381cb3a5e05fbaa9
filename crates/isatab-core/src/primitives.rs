//! # Innate Primitives
//!
//! Hardcoded constants of the ISA-Tab table grammar and the translator's
//! computational bounds.
//!
//! These primitives are compiled into the binary and are immutable at runtime.
//!
//! ## Primitives
//!
//! 1. **Table Primitives**: delimiter, comment marker, quote character.
//! 2. **Identity Primitives**: separators used when synthesizing process keys.
//! 3. **Bound Primitives**: limits that keep path enumeration finite.

/// Cell delimiter of study and assay tables.
pub const DELIMITER: char = '\t';

/// A line whose first cell starts with this marker is a comment.
///
/// Comment lines are skipped on read and never written.
pub const COMMENT_MARKER: char = '#';

/// Quote character stripped from (or wrapped around) cells.
pub const QUOTE: char = '"';

/// Protocol name carried by synthetic Protocol REF columns.
///
/// The investigation bridge registers a protocol of this name once per
/// study when any synthetic insertion happened.
pub const UNKNOWN_PROTOCOL: &str = "unknown";

/// Separator between anchor value and protocol name in a process key.
pub const ANCHOR_SEPARATOR: &str = "/";

/// Separator between key components carrying parameter values, dates and
/// performers.
pub const KEY_SEPARATOR: &str = ":";

/// Separator between a protocol name and the row index in the fallback key.
pub const ROW_SEPARATOR: &str = "-";

/// Joiner for multiple parameter values inside one process key.
pub const PARAMETER_JOINER: &str = "/";

/// Maximum number of nodes on a single path.
///
/// A longer path means the acyclicity invariant has been broken upstream.
pub const MAX_PATH_LENGTH: usize = 1000;

/// Maximum number of end-to-end paths a single graph may produce.
///
/// Path count equals the row count of the emitted table; this keeps a
/// pathological graph from exhausting memory.
pub const MAX_PATH_COUNT: usize = 2_000_000;
