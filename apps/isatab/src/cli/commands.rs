//! CLI command implementations.
//!
//! Each `cmd_*` function loads its inputs through `settings`, calls the core,
//! and prints either a human-readable summary or one JSON document.

use super::Output;
use crate::settings::{self, MAX_GRAPH_FILE_SIZE, MAX_SNAPSHOT_FILE_SIZE, MAX_TABLE_FILE_SIZE};
use isatab_core::{
    CanonicalGraph, Compositor, Graph, Ingestor, IsaError, PathSet, Registry, Report, TabOptions,
    TableKind, Translation, canonical_checksum, canonical_crypto_hash, canonical_diff, classify,
    clean, is_isomorphic, snapshot,
};
use std::path::Path;

/// Print a JSON document on stdout.
fn emit_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_default()
    );
}

/// File name used in diagnostics.
fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .unwrap_or_else(|| path.display().to_string())
}

// =============================================================================
// LOADING
// =============================================================================

/// Read and reconstruct a table file.
///
/// Protocols the table references but `registry` lacks are registered into
/// it.
pub fn read_table(
    table: &Path,
    kind: TableKind,
    registry: &mut Registry,
    options: &TabOptions,
) -> Result<Translation, IsaError> {
    let text = settings::read_text(table, MAX_TABLE_FILE_SIZE)?;
    let translation = Ingestor::read(&display_name(table), &text, kind, registry, options)?;
    tracing::info!(
        table = %table.display(),
        nodes = translation.graph.len(),
        diagnostics = translation.report.diagnostics.len(),
        skipped_rows = translation.report.skipped_rows.len(),
        "table read"
    );
    Ok(translation)
}

/// Load a graph JSON document.
pub fn load_graph(path: &Path) -> Result<Graph, IsaError> {
    let text = settings::read_text(path, MAX_GRAPH_FILE_SIZE)?;
    serde_json::from_str(&text)
        .map_err(|e| IsaError::SerializationError(format!("Graph '{}': {}", path.display(), e)))
}

fn print_report(report: &Report, out: Output) {
    if out.quiet {
        return;
    }
    if report.is_clean() {
        println!("No findings.");
    } else {
        print!("{report}");
    }
}

// =============================================================================
// CLASSIFY COMMAND
// =============================================================================

/// Show kind tag, argument and cleaned form of each header.
pub fn cmd_classify(headers: &[String], out: Output) -> Result<(), IsaError> {
    if out.json_mode {
        let rows: Vec<serde_json::Value> = headers
            .iter()
            .map(|h| {
                let header = classify(h);
                serde_json::json!({
                    "input": h,
                    "kind": header.kind.tag(),
                    "argument": header.argument,
                    "clean": clean(h),
                })
            })
            .collect();
        emit_json(&serde_json::Value::Array(rows));
        return Ok(());
    }

    for h in headers {
        let header = classify(h);
        match &header.argument {
            Some(arg) => println!("{:?}\t{}\t[{}]\t{}", h, header.kind, arg, header.label()),
            None => println!("{:?}\t{}\t-\t{}", h, header.kind, header.label()),
        }
    }
    Ok(())
}

// =============================================================================
// READ COMMAND
// =============================================================================

/// Reconstruct the graph of a table and print the report.
///
/// Findings do not fail the command; only structural errors of the file do.
pub fn cmd_read(
    table: &Path,
    context: Option<&Path>,
    kind: Option<TableKind>,
    output: Option<&Path>,
    options: &TabOptions,
    out: Output,
) -> Result<(), IsaError> {
    let kind = settings::infer_kind(kind, table);
    let mut registry = settings::load_context(context)?;
    let translation = read_table(table, kind, &mut registry, options)?;

    let written = match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&translation.graph)
                .map_err(|e| IsaError::SerializationError(format!("Graph JSON: {}", e)))?;
            Some(settings::write_file(path, &json)?)
        }
        None => None,
    };

    if out.json_mode {
        emit_json(&serde_json::json!({
            "table": table.to_string_lossy(),
            "kind": kind,
            "valid": translation.is_valid(),
            "node_count": translation.graph.len(),
            "process_count": translation.graph.processes().count(),
            "graph": written.as_ref().map(|p| p.to_string_lossy()),
            "report": translation.report,
        }));
        return Ok(());
    }

    if !out.quiet {
        println!("Table:     {}", table.display());
        println!("Kind:      {:?}", kind);
        println!("Nodes:     {}", translation.graph.len());
        println!("Processes: {}", translation.graph.processes().count());
        if let Some(path) = &written {
            println!("Graph:     {}", path.display());
        }
        println!();
    }
    print_report(&translation.report, out);
    Ok(())
}

// =============================================================================
// WRITE COMMAND
// =============================================================================

/// Serialize a graph into a table file.
///
/// Protocols the graph references but the context lacks are declared before
/// composing, each with a 4204 warning.
pub fn cmd_write(
    graph: &Path,
    context: Option<&Path>,
    kind: TableKind,
    output: &Path,
    options: &TabOptions,
    out: Output,
) -> Result<(), IsaError> {
    let graph_data = load_graph(graph)?;
    let mut registry = settings::load_context(context)?;
    let mut report = Report::new();
    Compositor::declare_protocols(&graph_data, &mut registry, &mut report);

    let name = display_name(output);
    let table = Compositor::compose(&name, &graph_data, kind, &registry, options)?;
    let text = table.to_tsv(options)?;
    let written = settings::write_file(output, &text)?;
    tracing::info!(output = %written.display(), rows = table.rows.len(), "table written");

    if out.json_mode {
        emit_json(&serde_json::json!({
            "output": written.to_string_lossy(),
            "kind": kind,
            "columns": table.headers.len(),
            "rows": table.rows.len(),
            "report": report,
        }));
        return Ok(());
    }

    if !out.quiet {
        println!(
            "Wrote {} rows x {} columns to {}",
            table.rows.len(),
            table.headers.len(),
            written.display()
        );
    }
    if !report.is_clean() {
        print_report(&report, out);
    }
    Ok(())
}

// =============================================================================
// ROUNDTRIP COMMAND
// =============================================================================

/// Outcome of reading, writing and re-reading a table.
#[derive(Debug, Clone)]
pub struct RoundTrip {
    pub kind: TableKind,
    pub first: Translation,
    pub text: String,
    pub second: Translation,
}

impl RoundTrip {
    /// Whether both reads yield the same graph up to node handles.
    #[must_use]
    pub fn is_isomorphic(&self) -> bool {
        is_isomorphic(&self.first.graph, &self.second.graph)
    }

    /// Canonical lines lost (`- `) or gained (`+ `) by the rewrite.
    #[must_use]
    pub fn diff(&self) -> Vec<String> {
        canonical_diff(&self.first.graph, &self.second.graph)
    }
}

/// Read a table, write its graph back, and read the result again.
pub fn roundtrip(
    table: &Path,
    context: Option<&Path>,
    kind: Option<TableKind>,
    options: &TabOptions,
) -> Result<RoundTrip, IsaError> {
    let kind = settings::infer_kind(kind, table);
    let mut registry = settings::load_context(context)?;
    let first = read_table(table, kind, &mut registry, options)?;

    let name = display_name(table);
    let text = Compositor::write(&name, &first.graph, kind, &registry, options)?;
    let second = Ingestor::read(&name, &text, kind, &mut registry, options)?;

    Ok(RoundTrip {
        kind,
        first,
        text,
        second,
    })
}

/// Round-trip a table and report isomorphism.
///
/// A non-isomorphic round trip fails the command after printing the diff.
pub fn cmd_roundtrip(
    table: &Path,
    context: Option<&Path>,
    kind: Option<TableKind>,
    output: Option<&Path>,
    options: &TabOptions,
    out: Output,
) -> Result<(), IsaError> {
    let trip = roundtrip(table, context, kind, options)?;
    if let Some(path) = output {
        settings::write_file(path, &trip.text)?;
    }

    let diff = trip.diff();
    let isomorphic = diff.is_empty();

    if out.json_mode {
        emit_json(&serde_json::json!({
            "table": table.to_string_lossy(),
            "kind": trip.kind,
            "isomorphic": isomorphic,
            "diff": diff,
            "first_report": trip.first.report,
            "second_report": trip.second.report,
        }));
    } else if !out.quiet {
        println!("Table:      {}", table.display());
        println!("Isomorphic: {}", isomorphic);
        for line in &diff {
            println!("  {line}");
        }
    }

    if isomorphic {
        Ok(())
    } else {
        Err(IsaError::IntegrityViolation(format!(
            "round trip of '{}' changed {} canonical lines",
            table.display(),
            diff.len()
        )))
    }
}

// =============================================================================
// PATHS COMMAND
// =============================================================================

/// Count the paths of a graph and show the longest-attribute path.
pub fn cmd_paths(graph: &Path, kind: TableKind, out: Output) -> Result<(), IsaError> {
    let graph_data = load_graph(graph)?;
    let paths = PathSet::enumerate(&graph_data, kind)?;

    let mut longest = Vec::new();
    for &id in paths.longest(&graph_data).unwrap_or_default() {
        let node = graph_data.node(id)?;
        longest.push(format!("{}: {}", node.tag().label(), node.primary()));
    }

    if out.json_mode {
        emit_json(&serde_json::json!({
            "graph": graph.to_string_lossy(),
            "kind": kind,
            "path_count": paths.len(),
            "longest": longest,
        }));
        return Ok(());
    }

    println!("Paths: {}", paths.len());
    if !out.quiet && !longest.is_empty() {
        println!("Longest:");
        for step in &longest {
            println!("  {step}");
        }
    }
    Ok(())
}

// =============================================================================
// HASH COMMAND
// =============================================================================

/// Checksums of the canonical graph of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fingerprint {
    pub checksum: u64,
    pub blake3: String,
}

impl Fingerprint {
    fn of(graph: &Graph) -> Result<Self, IsaError> {
        Ok(Self {
            checksum: canonical_checksum(graph),
            blake3: canonical_crypto_hash(graph)?,
        })
    }
}

/// Reconstruct a table and fingerprint its canonical graph.
pub fn fingerprint(
    table: &Path,
    context: Option<&Path>,
    kind: Option<TableKind>,
    options: &TabOptions,
) -> Result<Fingerprint, IsaError> {
    Fingerprint::of(&read_graph(table, context, kind, options)?)
}

fn read_graph(
    table: &Path,
    context: Option<&Path>,
    kind: Option<TableKind>,
    options: &TabOptions,
) -> Result<Graph, IsaError> {
    let kind = settings::infer_kind(kind, table);
    let mut registry = settings::load_context(context)?;
    Ok(read_table(table, kind, &mut registry, options)?.graph)
}

/// Print the checksums of a table's canonical graph, optionally keeping a
/// snapshot of it for `verify`.
pub fn cmd_hash(
    table: &Path,
    context: Option<&Path>,
    kind: Option<TableKind>,
    snapshot_path: Option<&Path>,
    options: &TabOptions,
    out: Output,
) -> Result<(), IsaError> {
    let graph = read_graph(table, context, kind, options)?;
    let print = Fingerprint::of(&graph)?;
    let written = match snapshot_path {
        Some(path) => {
            let bytes = snapshot(&graph)?;
            let written = settings::write_file(path, &bytes)?;
            tracing::info!(snapshot = %written.display(), bytes = bytes.len(), "snapshot written");
            Some(written)
        }
        None => None,
    };

    if out.json_mode {
        emit_json(&serde_json::json!({
            "table": table.to_string_lossy(),
            "checksum": format!("{:016x}", print.checksum),
            "blake3": print.blake3,
            "snapshot": written.as_ref().map(|p| p.to_string_lossy()),
        }));
        return Ok(());
    }

    if out.quiet {
        println!("{}", print.blake3);
    } else {
        println!("Checksum: {:016x}", print.checksum);
        println!("BLAKE3:   {}", print.blake3);
        if let Some(path) = &written {
            println!("Snapshot: {}", path.display());
        }
    }
    Ok(())
}

// =============================================================================
// VERIFY COMMAND
// =============================================================================

/// Compare a table's canonical graph with a snapshot written by `hash`.
///
/// Returns the canonical lines lost (`- `) or gained (`+ `) since the
/// snapshot; empty when the table still describes the same graph.
pub fn verify(
    table: &Path,
    context: Option<&Path>,
    kind: Option<TableKind>,
    snapshot_path: &Path,
    options: &TabOptions,
) -> Result<Vec<String>, IsaError> {
    let bytes = settings::read_bytes(snapshot_path, MAX_SNAPSHOT_FILE_SIZE)?;
    let recorded = CanonicalGraph::from_snapshot(&bytes)?;
    let graph = read_graph(table, context, kind, options)?;
    Ok(recorded.diff(&CanonicalGraph::from_graph(&graph)))
}

/// Check a table against a snapshot; a difference fails the command after
/// printing it.
pub fn cmd_verify(
    table: &Path,
    context: Option<&Path>,
    kind: Option<TableKind>,
    snapshot_path: &Path,
    options: &TabOptions,
    out: Output,
) -> Result<(), IsaError> {
    let diff = verify(table, context, kind, snapshot_path, options)?;
    let matches = diff.is_empty();

    if out.json_mode {
        emit_json(&serde_json::json!({
            "table": table.to_string_lossy(),
            "snapshot": snapshot_path.to_string_lossy(),
            "matches": matches,
            "diff": diff,
        }));
    } else if !out.quiet {
        println!("Table:    {}", table.display());
        println!("Snapshot: {}", snapshot_path.display());
        println!("Matches:  {}", matches);
        for line in &diff {
            println!("  {line}");
        }
    }

    if matches {
        Ok(())
    } else {
        Err(IsaError::IntegrityViolation(format!(
            "'{}' differs from snapshot '{}' in {} canonical lines",
            table.display(),
            snapshot_path.display(),
            diff.len()
        )))
    }
}
