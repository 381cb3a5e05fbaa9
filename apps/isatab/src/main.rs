//! # isatab - ISA-Tab Translator
//!
//! The binary over the deterministic ISA-Tab translator.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                                              │
//! │           apps/isatab (THE BINARY)           │
//! │                                              │
//! │  ┌─────────────┐        ┌────────────────┐   │
//! │  │    CLI      │        │    Settings    │   │
//! │  │   (clap)    │        │  (toml, json)  │   │
//! │  └──────┬──────┘        └───────┬────────┘   │
//! │         └───────────┬───────────┘            │
//! │                     ▼                        │
//! │            ┌──────────────────┐              │
//! │            │   isatab-core    │              │
//! │            │ (THE TRANSLATOR) │              │
//! │            └──────────────────┘              │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! isatab classify "Characteristics[organism]" "Term Source REF"
//! isatab read -t s_study.txt -c context.json -o graph.json
//! isatab write -g graph.json -c context.json -r study -o s_out.txt
//! isatab roundtrip -t a_assay.txt -c context.json
//! isatab paths -g graph.json
//! isatab hash -t s_study.txt -c context.json
//! ```

use clap::Parser;
use isatab::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

fn main() {
    // ISATAB_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("ISATAB_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "isatab=info,isatab_core=warn".into());

    // stdout carries command output only.
    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(std::io::stderr),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if let Err(e) = cli::execute(cli) {
        tracing::error!(code = e.code(), "Error: {}", e);
        std::process::exit(1);
    }
}
