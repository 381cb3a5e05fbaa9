//! # Ingestor Module
//!
//! Graph reconstruction from one study or assay table.
//!
//! Phases, in order:
//! 1. group columns and insert synthetic Protocol REFs (`columns`)
//! 2. register unregistered and synthetic protocols
//! 3. check every row; rows with a semantic error are skipped
//! 4. materialize material and data-file nodes, deduplicated by name
//! 5. key processes (`keygen`) and wire their inputs and outputs
//! 6. chain consecutive processes
//!
//! Derivation sets, the assay-sample check and graph integrity are settled
//! once every row is in.
//!
//! A protocol group whose cell is empty is inactive in that row and
//! transparent to wiring. A synthetic group is active when its assay-name
//! cell or the following node cell is filled.

pub mod columns;
pub mod keygen;

use crate::codec::Codec;
use crate::config::TabOptions;
use crate::formats::Table;
use crate::graph::{Graph, Node, NodeTag, RunAttribute};
use crate::investigation::Registry;
use crate::primitives::UNKNOWN_PROTOCOL;
use crate::report::{Diagnostic, DiagnosticCode, Report};
use crate::{Comment, IsaError, NodeId, Qualifier, TableKind};
use columns::{Field, FieldKind, GroupKind, Layout};
use keygen::{KeyGen, ProcessKey, primary_cell, protocol_cell};
use std::collections::{BTreeMap, BTreeSet};

/// A reconstructed graph and the findings of its run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Translation {
    pub graph: Graph,
    pub report: Report,
}

impl Translation {
    /// Whether no finding of `Error` severity or worse was raised.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.report.errors().next().is_none()
    }
}

/// The Ingestor turns tables into graphs.
///
/// The Ingestor:
/// - Groups columns and recovers omitted Protocol REFs
/// - Registers protocols the investigation does not know
/// - Deduplicates materials by name and processes by synthesized key
/// - Never fails on a structurally sound table: findings go to the report
pub struct Ingestor;

impl Ingestor {
    /// Parse tab-separated text and reconstruct its graph.
    ///
    /// Fails only on structural errors of the text itself.
    pub fn read(
        name: &str,
        text: &str,
        kind: TableKind,
        registry: &mut Registry,
        options: &TabOptions,
    ) -> Result<Translation, IsaError> {
        let mut report = Report::new();
        let table = Table::parse(name, text, options, &mut report)?;
        let mut translation = Self::ingest(&table, kind, registry);
        report.merge(translation.report);
        translation.report = report;
        Ok(translation)
    }

    /// Reconstruct the graph of a parsed table.
    ///
    /// Protocols the table references but `registry` lacks are registered
    /// into it before any row is wired.
    pub fn ingest(table: &Table, kind: TableKind, registry: &mut Registry) -> Translation {
        let mut report = Report::new();
        let layout = Layout::build(&table.headers, &mut report);
        register_protocols(&layout, table, registry, &mut report);

        let registry: &Registry = registry;
        let rows: Vec<usize> = (0..table.rows.len())
            .filter(|&row| check_row(&layout, table, row, registry, &mut report))
            .collect();

        let mut builder = Builder {
            layout: &layout,
            table,
            keys: KeyGen::new(&layout, table, &rows),
            codec: Codec::new(registry),
            graph: Graph::new(),
            nodes: BTreeMap::new(),
            processes: BTreeMap::new(),
        };
        for &row in &rows {
            builder.row(row, &mut report);
        }
        let mut graph = builder.graph;

        derive(&mut graph, &mut report);
        if kind == TableKind::Assay {
            check_samples(&graph, registry, &mut report);
        }
        for violation in graph.integrity_violations() {
            report.push(
                Diagnostic::new(DiagnosticCode::IntegrityViolation, "graph integrity violation")
                    .with_supplemental(violation),
            );
        }

        tracing::debug!(
            file = %table.name,
            rows = rows.len(),
            nodes = graph.len(),
            skipped = report.skipped_rows.len(),
            "table ingested"
        );
        Translation { graph, report }
    }
}

// =============================================================================
// PROTOCOL REGISTRATION
// =============================================================================

fn register_protocols(layout: &Layout, table: &Table, registry: &mut Registry, report: &mut Report) {
    let mut unregistered: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut synthetic_parameters: Vec<String> = Vec::new();

    for (g, group) in layout.groups.iter().enumerate() {
        if !group.is_protocol() {
            continue;
        }
        let parameters = parameter_names(&group.fields);
        if group.is_synthetic() {
            push_unique(&mut synthetic_parameters, parameters);
            continue;
        }
        for row in 0..table.rows.len() {
            let name = protocol_cell(layout, table, g, row);
            if name.is_empty() || registry.protocol(name).is_some() {
                continue;
            }
            push_unique(
                unregistered.entry(name.to_string()).or_default(),
                parameters.clone(),
            );
        }
    }

    for (name, parameters) in &unregistered {
        registry.synthesize_protocol(name, parameters, report);
    }
    if layout.synthetic > 0 {
        registry.declare_unknown_protocol(report);
        if !synthetic_parameters.is_empty() {
            registry.synthesize_protocol(UNKNOWN_PROTOCOL, &synthetic_parameters, report);
        }
    }
}

fn parameter_names(fields: &[Field]) -> Vec<String> {
    fields
        .iter()
        .filter_map(|f| match &f.kind {
            FieldKind::ParameterValue(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

fn push_unique(into: &mut Vec<String>, items: Vec<String>) {
    for item in items {
        if !into.contains(&item) {
            into.push(item);
        }
    }
}

// =============================================================================
// ROW CHECKS
// =============================================================================

fn process_active(layout: &Layout, table: &Table, group: usize, row: usize) -> bool {
    let g = &layout.groups[group];
    if !g.is_synthetic() {
        return !protocol_cell(layout, table, group, row).is_empty();
    }
    let named = g
        .fields
        .iter()
        .any(|f| matches!(f.kind, FieldKind::AssayName(_)) && !table.cell(row, f.column).is_empty());
    named
        || layout
            .node_after(group)
            .is_some_and(|n| !primary_cell(layout, table, n, row).is_empty())
}

/// Whether `row` is free of semantic errors. Errors are reported and the
/// row is marked skipped.
fn check_row(
    layout: &Layout,
    table: &Table,
    row: usize,
    registry: &Registry,
    report: &mut Report,
) -> bool {
    let mut errors = Vec::new();
    let mut any_node = false;
    let mut any_process = false;

    for (g, group) in layout.groups.iter().enumerate() {
        match group.kind {
            GroupKind::Node(_) => {
                any_node |= !primary_cell(layout, table, g, row).is_empty();
                for field in &group.fields {
                    if let FieldKind::FactorValue(name) = &field.kind {
                        if !table.cell(row, field.column).is_empty() && !registry.has_factor(name) {
                            errors.push(
                                Diagnostic::new(
                                    DiagnosticCode::UnregisteredFactor,
                                    "factor value names an unregistered study factor",
                                )
                                .with_supplemental(name.as_str()),
                            );
                        }
                    }
                }
            }
            GroupKind::Protocol => {
                if !process_active(layout, table, g, row) {
                    continue;
                }
                any_process = true;
                let protocol = protocol_cell(layout, table, g, row);
                let declared = registry.protocol(protocol);
                for field in &group.fields {
                    if let FieldKind::ParameterValue(name) = &field.kind {
                        if !table.cell(row, field.column).is_empty()
                            && !declared.is_some_and(|p| p.declares(name))
                        {
                            errors.push(
                                Diagnostic::new(
                                    DiagnosticCode::UndeclaredParameter,
                                    "parameter not declared on its protocol",
                                )
                                .with_supplemental(format!("{name} ({protocol})")),
                            );
                        }
                    }
                }
            }
        }
    }

    if any_process && !any_node {
        errors.push(Diagnostic::new(
            DiagnosticCode::IsolatedProcess,
            "process without inputs and without outputs",
        ));
    }

    let keep = errors.is_empty();
    for diagnostic in errors {
        report.skip_row(row, diagnostic);
    }
    keep
}

// =============================================================================
// ROW BUILDER
// =============================================================================

struct Builder<'a> {
    layout: &'a Layout,
    table: &'a Table,
    keys: KeyGen<'a>,
    codec: Codec<'a>,
    graph: Graph,
    nodes: BTreeMap<(NodeTag, String), NodeId>,
    processes: BTreeMap<ProcessKey, NodeId>,
}

impl Builder<'_> {
    /// Materialize and wire one row.
    ///
    /// A process takes as input the nearest filled node before it with no
    /// active process in between, and as outputs the filled nodes after it
    /// up to the next active process. Active processes with no filled node
    /// between them are chained.
    fn row(&mut self, row: usize, report: &mut Report) {
        let (layout, table) = (self.layout, self.table);
        let mut last_node: Option<NodeId> = None;
        let mut last_process: Option<NodeId> = None;
        let mut node_since_process = false;

        for (g, group) in layout.groups.iter().enumerate() {
            match group.kind {
                GroupKind::Node(tag) => {
                    let name = primary_cell(layout, table, g, row);
                    if name.is_empty() {
                        continue;
                    }
                    let id = self.node(tag, name);
                    self.qualify(id, &group.fields, row, report);
                    if let Some(p) = last_process {
                        note(self.graph.add_output(p, id), Some(row), report);
                    }
                    last_node = Some(id);
                    node_since_process = true;
                }
                GroupKind::Protocol => {
                    if !process_active(layout, table, g, row) {
                        continue;
                    }
                    let id = self.process(g, row, report);
                    let wired = match (last_process, last_node) {
                        (Some(previous), _) if !node_since_process => self.graph.link(previous, id),
                        (_, Some(input)) => self.graph.add_input(id, input),
                        _ => Ok(()),
                    };
                    note(wired, Some(row), report);
                    last_process = Some(id);
                    node_since_process = false;
                }
            }
        }
    }

    fn node(&mut self, tag: NodeTag, name: &str) -> NodeId {
        let key = (tag, name.to_string());
        if let Some(&id) = self.nodes.get(&key) {
            return id;
        }
        let node = match tag {
            NodeTag::Source => Node::source(name),
            NodeTag::Sample => Node::sample(name),
            NodeTag::Material(t) => Node::material(name, t),
            NodeTag::DataFile(label) => Node::data_file(name, label),
            NodeTag::Process => Node::process(name),
        };
        let id = self.graph.add(node);
        self.nodes.insert(key, id);
        id
    }

    fn process(&mut self, group: usize, row: usize, report: &mut Report) -> NodeId {
        let key = self.keys.key(group, row);
        let id = match self.processes.get(&key) {
            Some(&id) => id,
            None => {
                let id = self.graph.add(Node::process(key.protocol.as_str()));
                self.processes.insert(key, id);
                id
            }
        };

        let (layout, table) = (self.layout, self.table);
        let fields = &layout.groups[group].fields;
        for field in fields {
            let attribute = match field.kind {
                FieldKind::AssayName(label) if label.names_process() => RunAttribute::Name,
                FieldKind::AssayName(_) => RunAttribute::ArrayDesignRef,
                FieldKind::Date => RunAttribute::Date,
                FieldKind::Performer => RunAttribute::Performer,
                _ => continue,
            };
            let cell = table.cell(row, field.column).trim();
            if cell.is_empty() {
                continue;
            }
            match self.graph.set_run_attribute(id, attribute, cell) {
                Ok(true) => {}
                Ok(false) => report.push(
                    Diagnostic::new(
                        DiagnosticCode::DuplicateQualifier,
                        "conflicting run attribute, first value kept",
                    )
                    .with_supplemental(format!("{attribute:?}: {cell}"))
                    .at_row(row),
                ),
                Err(err) => note(Err(err), Some(row), report),
            }
        }
        self.qualify(id, fields, row, report);
        id
    }

    /// Attach the qualifier and comment fields of a group to `id`; on a
    /// conflict with an earlier row the first value wins.
    fn qualify(&mut self, id: NodeId, fields: &[Field], row: usize, report: &mut Report) {
        let table = self.table;
        for field in fields {
            let cells: Vec<&str> = (field.column..field.column + field.shape.width())
                .map(|c| table.cell(row, c))
                .collect();
            match &field.kind {
                FieldKind::Comment(name) => {
                    let Some(&value) = cells.first().filter(|v| !v.is_empty()) else {
                        continue;
                    };
                    let existing = self.graph.node(id).ok().and_then(|n| {
                        n.comments()
                            .iter()
                            .find(|c| &c.name == name)
                            .map(|c| c.value == value)
                    });
                    match existing {
                        Some(true) => {}
                        Some(false) => duplicate(report, name, row),
                        None => note(
                            self.graph.append_comment(id, Comment::new(name.as_str(), value)),
                            Some(row),
                            report,
                        ),
                    }
                }
                FieldKind::Characteristic(category)
                | FieldKind::FactorValue(category)
                | FieldKind::ParameterValue(category) => {
                    let Some((value, unit)) = self.codec.decode(field.shape, &cells, row, report)
                    else {
                        continue;
                    };
                    let qualifier = Qualifier {
                        category: category.clone(),
                        value,
                        unit,
                    };
                    match existing_qualifier(&self.graph, id, &field.kind).map(|q| *q == qualifier) {
                        Some(true) => {}
                        Some(false) => duplicate(report, category, row),
                        None => {
                            let appended = match field.kind {
                                FieldKind::Characteristic(_) => {
                                    self.graph.append_characteristic(id, qualifier)
                                }
                                FieldKind::FactorValue(_) => self.graph.append_factor_value(id, qualifier),
                                _ => self.graph.append_parameter_value(id, qualifier),
                            };
                            note(appended, Some(row), report);
                        }
                    }
                }
                FieldKind::Date | FieldKind::Performer | FieldKind::AssayName(_) => {}
            }
        }
    }
}

fn existing_qualifier<'g>(graph: &'g Graph, id: NodeId, kind: &FieldKind) -> Option<&'g Qualifier> {
    let node = graph.node(id).ok()?;
    let (list, category) = match kind {
        FieldKind::Characteristic(c) => (node.characteristics(), c),
        FieldKind::FactorValue(c) => (node.factor_values(), c),
        FieldKind::ParameterValue(c) => (
            node.as_process().map_or(&[][..], |p| p.parameter_values.as_slice()),
            c,
        ),
        _ => return None,
    };
    list.iter().find(|q| &q.category == category)
}

fn duplicate(report: &mut Report, category: &str, row: usize) {
    report.push(
        Diagnostic::new(
            DiagnosticCode::DuplicateQualifier,
            "conflicting qualifier value, first value kept",
        )
        .with_supplemental(category)
        .at_row(row),
    );
}

/// Record a rejected edge; `row` is `None` outside the row pass.
fn note(result: Result<(), IsaError>, row: Option<usize>, report: &mut Report) {
    if let Err(err) = result {
        let diagnostic = Diagnostic::new(DiagnosticCode::IntegrityViolation, "edge rejected")
            .with_supplemental(err.to_string());
        report.push(match row {
            Some(row) => diagnostic.at_row(row),
            None => diagnostic,
        });
    }
}

// =============================================================================
// POST-PASS
// =============================================================================

/// Fill `derives_from` (every upstream source) and `generated_from` (the
/// nearest upstream samples).
fn derive(graph: &mut Graph, report: &mut Report) {
    let mut derives = Vec::new();
    let mut generated = Vec::new();
    for (id, node) in graph.nodes() {
        match node {
            Node::Sample(_) => derives.extend(
                upstream(graph, id, NodeTag::Source)
                    .into_iter()
                    .map(|s| (id, s)),
            ),
            Node::DataFile(_) => generated.extend(
                upstream(graph, id, NodeTag::Sample)
                    .into_iter()
                    .map(|s| (id, s)),
            ),
            _ => {}
        }
    }

    for (sample, source) in derives {
        note(graph.add_derives_from(sample, source), None, report);
    }
    for (file, sample) in generated {
        note(graph.add_generated_from(file, sample), None, report);
    }
}

/// Nearest nodes tagged `target` upstream of `start`; the walk stops at
/// each one it finds.
fn upstream(graph: &Graph, start: NodeId, target: NodeTag) -> BTreeSet<NodeId> {
    let mut found = BTreeSet::new();
    let mut visited = BTreeSet::from([start]);
    let mut stack = vec![start];
    while let Some(id) = stack.pop() {
        let Ok(node) = graph.node(id) else { continue };
        if id != start && node.tag() == target {
            found.insert(id);
            continue;
        }
        let before: Vec<NodeId> = match node.as_process() {
            Some(p) => p.inputs.iter().copied().chain(p.previous).collect(),
            None => graph.producers(id).to_vec(),
        };
        for b in before {
            if visited.insert(b) {
                stack.push(b);
            }
        }
    }
    found
}

fn check_samples(graph: &Graph, registry: &Registry, report: &mut Report) {
    let Some(declared) = registry.study_samples() else {
        return;
    };
    for (_, node) in graph.nodes() {
        if let Node::Sample(s) = node {
            if !declared.contains(&s.name) {
                report.push(
                    Diagnostic::new(
                        DiagnosticCode::UnknownAssaySample,
                        "assay sample not declared in the study",
                    )
                    .with_supplemental(s.name.as_str()),
                );
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
