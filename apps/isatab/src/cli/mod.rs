//! # isatab CLI Module
//!
//! This module implements the CLI interface for isatab.
//!
//! ## Available Commands
//!
//! - `classify` - Show kind and argument of column headers
//! - `read` - Reconstruct the graph of a table
//! - `write` - Serialize a graph into a table
//! - `roundtrip` - Read, write and re-read a table, checking isomorphism
//! - `paths` - Enumerate the end-to-end paths of a graph
//! - `hash` - Fingerprint the canonical graph of a table
//! - `verify` - Check a table against a snapshot written by `hash`

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use isatab_core::{IsaError, TableKind};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// isatab - ISA-Tab study/assay table translator
///
/// Reconstructs experimental graphs from tab-separated study and assay
/// tables, and serializes graphs back into tables.
#[derive(Parser, Debug)]
#[command(name = "isatab")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Suppress human-readable summaries
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Tab-format options file (TOML); defaults to ./isatab.toml when present
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Table kind flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Study,
    Assay,
}

impl From<KindArg> for TableKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Study => Self::Study,
            KindArg::Assay => Self::Assay,
        }
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show kind tag, argument and cleaned form of each header
    Classify {
        /// Header labels
        #[arg(required = true)]
        headers: Vec<String>,
    },

    /// Reconstruct the graph of a table and print the report
    Read {
        /// Study or assay table
        #[arg(short, long)]
        table: PathBuf,

        /// Investigation context (JSON or TOML)
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Table kind; inferred from an `a_` file prefix when absent
        #[arg(short = 'r', long = "kind", value_enum)]
        kind: Option<KindArg>,

        /// Write the graph as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Serialize a graph into a table file
    Write {
        /// Graph JSON document
        #[arg(short, long)]
        graph: PathBuf,

        /// Investigation context (JSON or TOML)
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Table kind
        #[arg(short = 'r', long = "kind", value_enum)]
        kind: KindArg,

        /// Output table
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Read, write and re-read a table; report isomorphism
    Roundtrip {
        /// Study or assay table
        #[arg(short, long)]
        table: PathBuf,

        /// Investigation context (JSON or TOML)
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Table kind; inferred from an `a_` file prefix when absent
        #[arg(short = 'r', long = "kind", value_enum)]
        kind: Option<KindArg>,

        /// Keep the rewritten table
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Count the paths of a graph and show the longest-attribute one
    Paths {
        /// Graph JSON document
        #[arg(short, long)]
        graph: PathBuf,

        /// Table kind whose start nodes begin paths
        #[arg(short = 'r', long = "kind", value_enum, default_value = "study")]
        kind: KindArg,
    },

    /// Checksum of the canonical graph of a table
    Hash {
        /// Study or assay table
        #[arg(short, long)]
        table: PathBuf,

        /// Investigation context (JSON or TOML)
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Table kind; inferred from an `a_` file prefix when absent
        #[arg(short = 'r', long = "kind", value_enum)]
        kind: Option<KindArg>,

        /// Also write a binary snapshot of the canonical graph
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },

    /// Check that a table still describes the graph of a snapshot
    Verify {
        /// Study or assay table
        #[arg(short, long)]
        table: PathBuf,

        /// Investigation context (JSON or TOML)
        #[arg(short, long)]
        context: Option<PathBuf>,

        /// Table kind; inferred from an `a_` file prefix when absent
        #[arg(short = 'r', long = "kind", value_enum)]
        kind: Option<KindArg>,

        /// Snapshot written by `hash --snapshot`
        #[arg(short, long)]
        snapshot: PathBuf,
    },
}

/// Output switches shared by every command.
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    pub json_mode: bool,
    pub quiet: bool,
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub fn execute(cli: Cli) -> Result<(), IsaError> {
    let out = Output {
        json_mode: cli.json_mode,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Classify { headers } => cmd_classify(&headers, out),
        Commands::Read {
            table,
            context,
            kind,
            output,
        } => {
            let options = crate::settings::load_options(cli.config.as_deref())?;
            cmd_read(
                &table,
                context.as_deref(),
                kind.map(Into::into),
                output.as_deref(),
                &options,
                out,
            )
        }
        Commands::Write {
            graph,
            context,
            kind,
            output,
        } => {
            let options = crate::settings::load_options(cli.config.as_deref())?;
            cmd_write(
                &graph,
                context.as_deref(),
                kind.into(),
                &output,
                &options,
                out,
            )
        }
        Commands::Roundtrip {
            table,
            context,
            kind,
            output,
        } => {
            let options = crate::settings::load_options(cli.config.as_deref())?;
            cmd_roundtrip(
                &table,
                context.as_deref(),
                kind.map(Into::into),
                output.as_deref(),
                &options,
                out,
            )
        }
        Commands::Paths { graph, kind } => cmd_paths(&graph, kind.into(), out),
        Commands::Hash {
            table,
            context,
            kind,
            snapshot,
        } => {
            let options = crate::settings::load_options(cli.config.as_deref())?;
            cmd_hash(
                &table,
                context.as_deref(),
                kind.map(Into::into),
                snapshot.as_deref(),
                &options,
                out,
            )
        }
        Commands::Verify {
            table,
            context,
            kind,
            snapshot,
        } => {
            let options = crate::settings::load_options(cli.config.as_deref())?;
            cmd_verify(
                &table,
                context.as_deref(),
                kind.map(Into::into),
                &snapshot,
                &options,
                out,
            )
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
