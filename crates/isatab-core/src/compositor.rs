//! # Compositor Module
//!
//! Table serialization: graph in, study or assay table out.
//!
//! 1. enumerate paths; the longest-attribute path is the column template
//! 2. align every other path to the template slots by node kind, adding a
//!    slot after the last aligned one for any node that does not fit, with
//!    empty Protocol REF slots keeping node slots apart
//! 3. give each slot the union of its nodes' qualifier columns, each value
//!    unit wide enough for every value it holds
//! 4. project each path onto one row
//! 5. sort rows by the first cell (stable), drop duplicates, then drop
//!    value units that are empty in every row
//!
//! Slot column order: the primary label, then for materials characteristics,
//! factor values and comments; for processes the assay-name column chosen
//! by the protocol type, Array Design REF, parameter values, Date, Performer
//! and comments.

use crate::codec::{ValueShape, encode};
use crate::config::TabOptions;
use crate::formats::Table;
use crate::graph::{Graph, Node, NodeTag, Process};
use crate::header::{Header, HeaderKind};
use crate::investigation::{Protocol, Registry};
use crate::paths::PathSet;
use crate::primitives::UNKNOWN_PROTOCOL;
use crate::report::{Diagnostic, DiagnosticCode, Report};
use crate::types::labels::matches_label;
use crate::{AssayNameLabel, IsaError, NodeId, Qualifier, TableKind};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// SCHEMA
// =============================================================================

/// What one value unit of a slot holds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Cell {
    Primary,
    AssayName(AssayNameLabel),
    ArrayDesignRef,
    Characteristic(String),
    FactorValue(String),
    ParameterValue(String),
    Date,
    Performer,
    Comment(String),
}

impl Cell {
    /// Position class inside a slot.
    const fn rank(&self) -> u8 {
        match self {
            Self::Primary => 0,
            Self::AssayName(_) => 1,
            Self::ArrayDesignRef => 2,
            Self::Characteristic(_) => 3,
            Self::FactorValue(_) => 4,
            Self::ParameterValue(_) => 5,
            Self::Date => 6,
            Self::Performer => 7,
            Self::Comment(_) => 8,
        }
    }
}

#[derive(Debug, Clone)]
struct ValueUnit {
    cell: Cell,
    shape: ValueShape,
}

/// The columns one node per row is projected onto.
#[derive(Debug, Clone)]
struct Slot {
    tag: NodeTag,
    units: Vec<ValueUnit>,
}

impl Slot {
    fn new(tag: NodeTag) -> Self {
        Self {
            tag,
            units: vec![ValueUnit {
                cell: Cell::Primary,
                shape: ValueShape::Text,
            }],
        }
    }

    fn upsert(&mut self, cell: Cell, shape: ValueShape) {
        match self.units.iter_mut().find(|u| u.cell == cell) {
            Some(unit) => unit.shape = unit.shape.join(shape),
            None => self.units.push(ValueUnit { cell, shape }),
        }
    }

    fn absorb(&mut self, node: &Node, with_factors: bool, registry: &Registry) {
        for q in node.characteristics() {
            self.upsert(Cell::Characteristic(q.category.clone()), shape_of(q));
        }
        if with_factors {
            for q in node.factor_values() {
                self.upsert(Cell::FactorValue(q.category.clone()), shape_of(q));
            }
        }
        if let Some(p) = node.as_process() {
            let labels = registry
                .protocol(&p.protocol)
                .map_or(&[][..], Protocol::assay_name_labels);
            let naming = labels.iter().copied().find(|l| l.names_process());
            match (naming, &p.name) {
                (Some(label), _) => self.upsert(Cell::AssayName(label), ValueShape::Text),
                (None, Some(_)) => {
                    self.upsert(Cell::AssayName(AssayNameLabel::AssayName), ValueShape::Text);
                }
                (None, None) => {}
            }
            if labels.contains(&AssayNameLabel::ArrayDesignRef) || p.array_design_ref.is_some() {
                self.upsert(Cell::ArrayDesignRef, ValueShape::Text);
            }
            for q in &p.parameter_values {
                self.upsert(Cell::ParameterValue(q.category.clone()), shape_of(q));
            }
            if p.date.is_some() {
                self.upsert(Cell::Date, ValueShape::Text);
            }
            if p.performer.is_some() {
                self.upsert(Cell::Performer, ValueShape::Text);
            }
        }
        for c in node.comments() {
            self.upsert(Cell::Comment(c.name.clone()), ValueShape::Text);
        }
    }

    /// Units in column order; first-seen order within each class.
    fn settle(&mut self) {
        self.units.sort_by_key(|u| u.cell.rank());
        if self.units.iter().filter(|u| matches!(u.cell, Cell::AssayName(_))).count() > 1 {
            let mut named = false;
            self.units.retain(|u| match u.cell {
                Cell::AssayName(_) => !std::mem::replace(&mut named, true),
                _ => true,
            });
        }
    }

    fn width(&self) -> usize {
        self.units.iter().map(|u| u.shape.width()).sum()
    }
}

fn shape_of(q: &Qualifier) -> ValueShape {
    ValueShape::of(&q.value, q.unit.as_ref())
}

/// Header kind of the primary column of a slot.
const fn primary_kind(tag: NodeTag) -> HeaderKind {
    match tag {
        NodeTag::Source => HeaderKind::Source,
        NodeTag::Sample => HeaderKind::Sample,
        NodeTag::Material(t) => HeaderKind::Material(t),
        NodeTag::DataFile(l) => HeaderKind::DataFile(l),
        NodeTag::Process => HeaderKind::ProtocolRef,
    }
}

fn value_header(cell: &Cell, tag: NodeTag) -> String {
    let header = match cell {
        Cell::Primary => Header::bare(primary_kind(tag)),
        Cell::AssayName(label) => Header::bare(HeaderKind::AssayName(*label)),
        Cell::ArrayDesignRef => Header::bare(HeaderKind::AssayName(AssayNameLabel::ArrayDesignRef)),
        Cell::Characteristic(c) if matches_label("Material Type", c) => {
            Header::bare(HeaderKind::MaterialType)
        }
        Cell::Characteristic(c) if matches_label("Label", c) => Header::bare(HeaderKind::Label),
        Cell::Characteristic(c) => Header::with_argument(HeaderKind::Characteristics, c.as_str()),
        Cell::FactorValue(c) => Header::with_argument(HeaderKind::FactorValue, c.as_str()),
        Cell::ParameterValue(c) => Header::with_argument(HeaderKind::ParameterValue, c.as_str()),
        Cell::Date => Header::bare(HeaderKind::Date),
        Cell::Performer => Header::bare(HeaderKind::Performer),
        Cell::Comment(c) => Header::with_argument(HeaderKind::Comment, c.as_str()),
    };
    header.label()
}

// =============================================================================
// COMPOSITOR
// =============================================================================

/// The Compositor turns graphs into tables.
///
/// The Compositor:
/// - Enumerates end-to-end paths and picks the column template
/// - Projects every path onto one row
/// - Never invents nodes: every cell comes from a graph node
pub struct Compositor;

impl Compositor {
    /// Register the protocols a graph uses but `registry` lacks, and the
    /// synthetic `unknown` protocol when the graph uses it.
    ///
    /// Registered protocols are left as declared; a parameter value they do
    /// not declare is reported as 1009. Call before `compose` so assay-name
    /// columns follow every protocol.
    pub fn declare_protocols(graph: &Graph, registry: &mut Registry, report: &mut Report) {
        let mut seen: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (_, p) in graph.processes() {
            let params = seen.entry(p.protocol.as_str()).or_default();
            for q in &p.parameter_values {
                if !params.contains(&q.category) {
                    params.push(q.category.clone());
                }
            }
        }
        for (name, params) in seen {
            if name == UNKNOWN_PROTOCOL {
                registry.declare_unknown_protocol(report);
                registry.synthesize_protocol(name, &params, report);
                continue;
            }
            let Some(protocol) = registry.protocol(name) else {
                registry.synthesize_protocol(name, &params, report);
                continue;
            };
            for p in params.iter().filter(|p| !protocol.declares(p)) {
                report.push(
                    Diagnostic::new(
                        DiagnosticCode::UndeclaredParameter,
                        "parameter not declared on its protocol",
                    )
                    .with_supplemental(format!("{p} ({name})")),
                );
            }
        }
    }

    /// Serialize a graph into a table.
    ///
    /// Fails when path enumeration fails.
    pub fn compose(
        name: &str,
        graph: &Graph,
        kind: TableKind,
        registry: &Registry,
        options: &TabOptions,
    ) -> Result<Table, IsaError> {
        let paths = PathSet::enumerate(graph, kind)?;
        let Some(template) = paths.longest(graph) else {
            return Ok(Table::new(name, Vec::new()));
        };
        let with_factors = kind == TableKind::Study || options.write_factor_values_in_assays;

        // Slots are append-only; `order` holds slot indices in column order.
        let mut slots: Vec<Slot> = Vec::new();
        let mut order: Vec<usize> = Vec::new();
        let mut aligned: Vec<Vec<(usize, NodeId)>> = Vec::with_capacity(paths.len());

        for path in std::iter::once(template).chain(paths.iter()) {
            let mut placed = Vec::with_capacity(path.len());
            let mut position = 0usize;
            for &id in path {
                let node = graph.node(id)?;
                let tag = node.tag();
                let found = order[position..]
                    .iter()
                    .position(|&s| slots[s].tag == tag)
                    .map(|offset| position + offset);
                let at = match found {
                    Some(at) => at,
                    None => insert_slot(&mut slots, &mut order, position, tag),
                };
                slots[order[at]].absorb(node, with_factors, registry);
                placed.push((order[at], id));
                position = at + 1;
            }
            aligned.push(placed);
        }
        // The template's own alignment is only there to seed the slots.
        aligned.remove(0);
        for slot in &mut slots {
            slot.settle();
        }

        let headers = header_row(&slots, &order);
        let offsets: BTreeMap<usize, usize> = order
            .iter()
            .scan(0usize, |at, &s| {
                let start = *at;
                *at += slots[s].width();
                Some((s, start))
            })
            .collect();

        let mut table = Table::new(name, headers);
        for placed in &aligned {
            let mut row = vec![String::new(); table.width()];
            for &(slot, id) in placed {
                let node = graph.node(id)?;
                let mut column = offsets.get(&slot).copied().unwrap_or_default();
                for unit in &slots[slot].units {
                    for (i, cell) in project(unit, node).into_iter().enumerate() {
                        if let Some(target) = row.get_mut(column + i) {
                            *target = cell;
                        }
                    }
                    column += unit.shape.width();
                }
            }
            table.rows.push(row);
        }

        let projected = table.rows.len();
        table.rows.sort_by(|a, b| a.first().cmp(&b.first()));
        let mut seen = BTreeSet::new();
        table.rows.retain(|row| seen.insert(row.clone()));
        let duplicates = projected - table.rows.len();

        if options.drop_empty_columns {
            drop_empty_units(&mut table, &slots, &order);
        }

        tracing::debug!(
            paths = paths.len(),
            rows = table.rows.len(),
            columns = table.width(),
            duplicates,
            "table composed"
        );
        Ok(table)
    }

    /// Serialize a graph into tab-separated text.
    pub fn write(
        name: &str,
        graph: &Graph,
        kind: TableKind,
        registry: &Registry,
        options: &TabOptions,
    ) -> Result<String, IsaError> {
        Self::compose(name, graph, kind, registry, options)?.to_tsv(options)
    }
}

/// Open a slot at column position `at` and return its position.
///
/// Two node slots never touch: an empty Protocol REF slot goes between a new
/// node slot and a node slot after it, so the reader opens no synthetic
/// protocol there. The slot before `at` is the path's previous slot, never a
/// node, since paths alternate nodes and processes.
fn insert_slot(slots: &mut Vec<Slot>, order: &mut Vec<usize>, at: usize, tag: NodeTag) -> usize {
    let next_is_node = order
        .get(at)
        .is_some_and(|&s| slots[s].tag != NodeTag::Process);
    if tag != NodeTag::Process && next_is_node {
        slots.push(Slot::new(NodeTag::Process));
        order.insert(at, slots.len() - 1);
    }
    slots.push(Slot::new(tag));
    order.insert(at, slots.len() - 1);
    at
}

/// Header cells, unsuffixed.
fn header_row(slots: &[Slot], order: &[usize]) -> Vec<String> {
    let mut headers = Vec::new();
    for &s in order {
        let slot = &slots[s];
        for unit in &slot.units {
            headers.push(value_header(&unit.cell, slot.tag));
            headers.extend(unit.shape.companions().iter().map(|k| Header::bare(*k).label()));
        }
    }
    headers
}

/// Cells of one value unit for one node.
fn project(unit: &ValueUnit, node: &Node) -> Vec<String> {
    let width = unit.shape.width();
    let text = |s: Option<&str>| vec![s.unwrap_or_default().to_string()];
    let qualifier = |list: &[Qualifier], category: &str| {
        list.iter()
            .find(|q| q.category == category)
            .map_or_else(
                || vec![String::new(); width],
                |q| encode(unit.shape, &q.value, q.unit.as_ref()),
            )
    };
    let process: Option<&Process> = node.as_process();
    match &unit.cell {
        Cell::Primary => text(Some(node.primary())),
        Cell::AssayName(_) => text(process.and_then(|p| p.name.as_deref())),
        Cell::ArrayDesignRef => text(process.and_then(|p| p.array_design_ref.as_deref())),
        Cell::Date => text(process.and_then(|p| p.date.as_deref())),
        Cell::Performer => text(process.and_then(|p| p.performer.as_deref())),
        Cell::Characteristic(c) => qualifier(node.characteristics(), c),
        Cell::FactorValue(c) => qualifier(node.factor_values(), c),
        Cell::ParameterValue(c) => {
            qualifier(process.map_or(&[][..], |p| p.parameter_values.as_slice()), c)
        }
        Cell::Comment(name) => text(
            node.comments()
                .iter()
                .find(|c| &c.name == name)
                .map(|c| c.value.as_str()),
        ),
    }
}

/// Remove value units whose cells are empty in every row.
fn drop_empty_units(table: &mut Table, slots: &[Slot], order: &[usize]) {
    let mut keep = Vec::with_capacity(table.width());
    let mut column = 0usize;
    for &s in order {
        for unit in &slots[s].units {
            let span = column..column + unit.shape.width();
            let empty = unit.cell != Cell::Primary
                && table
                    .rows
                    .iter()
                    .all(|row| row[span.clone()].iter().all(String::is_empty));
            keep.extend(std::iter::repeat_n(!empty, unit.shape.width()));
            column = span.end;
        }
    }
    let filter = |cells: &mut Vec<String>| {
        let mut flags = keep.iter();
        cells.retain(|_| flags.next().copied().unwrap_or(true));
    };
    filter(&mut table.headers);
    for row in &mut table.rows {
        filter(row);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::investigation::Protocol;
    use crate::{DataFileLabel, MaterialType, OntologyAnnotation, Unit, Value};

    fn registry() -> Registry {
        Registry::new()
            .with_protocol(Protocol::new("sample collection"))
            .with_protocol(Protocol::new("extraction"))
            .with_protocol(Protocol::new("mass spectrometry").with_type("mass spectrometry"))
    }

    fn write(graph: &Graph, kind: TableKind) -> String {
        let options = TabOptions {
            write_quotes: crate::config::QuoteStyle::Never,
            ..TabOptions::default()
        };
        Compositor::write("t.txt", graph, kind, &registry(), &options).expect("write")
    }

    #[test]
    fn split_writes_two_rows() {
        let mut g = Graph::new();
        let src = g.add(Node::source("source1"));
        let p = g.add(Node::process("sample collection"));
        let s2 = g.add(Node::sample("sample2"));
        let s1 = g.add(Node::sample("sample1"));
        g.add_input(p, src).expect("input");
        g.add_output(p, s2).expect("output");
        g.add_output(p, s1).expect("output");
        assert_eq!(
            write(&g, TableKind::Study),
            "Source Name\tProtocol REF\tSample Name\n\
             source1\tsample collection\tsample2\n\
             source1\tsample collection\tsample1\n"
        );
    }

    #[test]
    fn assay_name_follows_its_protocol() {
        let mut g = Graph::new();
        let s = g.add(Node::sample("sample1"));
        let ext = g.add(Node::process("extraction"));
        let e = g.add(Node::material("extract1", MaterialType::Extract));
        let ms = g.add(Node::process("mass spectrometry"));
        let f = g.add(Node::data_file("r1.raw", crate::DataFileLabel::RawSpectralData));
        g.add_input(ext, s).expect("input");
        g.add_output(ext, e).expect("output");
        g.add_input(ms, e).expect("input");
        g.add_output(ms, f).expect("output");
        g.set_run_attribute(ms, crate::graph::RunAttribute::Name, "run-7")
            .expect("name");

        let table =
            Compositor::compose("a.txt", &g, TableKind::Assay, &registry(), &TabOptions::default())
                .expect("compose");
        assert_eq!(
            table.headers,
            vec![
                "Sample Name",
                "Protocol REF",
                "Extract Name",
                "Protocol REF",
                "MS Assay Name",
                "Raw Spectral Data File"
            ]
        );
        assert_eq!(table.rows[0][4], "run-7");
    }

    #[test]
    fn value_units_take_their_widest_shape() {
        let mut g = Graph::new();
        let a = g.add(Node::source("a"));
        let b = g.add(Node::source("b"));
        g.append_characteristic(
            a,
            Qualifier::new(
                "Organism",
                OntologyAnnotation::sourced("Homo sapiens", "NCBITaxon", "NCBITaxon_9606"),
            ),
        )
        .expect("a");
        g.append_characteristic(b, Qualifier::new("Organism", "Mus musculus"))
            .expect("b");
        g.append_characteristic(
            b,
            Qualifier::with_unit("body weight", Value::Int(72), Unit::Plain("kg".into())),
        )
        .expect("b");
        let table =
            Compositor::compose("s.txt", &g, TableKind::Study, &registry(), &TabOptions::default())
                .expect("compose");
        assert_eq!(
            table.headers,
            vec![
                "Source Name",
                "Characteristics[Organism]",
                "Term Source REF",
                "Term Accession Number",
                "Characteristics[body weight]",
                "Unit"
            ]
        );
        assert_eq!(table.rows[0], vec!["a", "Homo sapiens", "NCBITaxon", "NCBITaxon_9606", "", ""]);
        assert_eq!(table.rows[1], vec!["b", "Mus musculus", "", "", "72", "kg"]);
    }

    #[test]
    fn paths_missing_from_the_template_get_new_slots() {
        let mut g = Graph::new();
        let src = g.add(Node::source("source1"));
        let p = g.add(Node::process("sample collection"));
        let s = g.add(Node::sample("sample1"));
        g.add_input(p, src).expect("input");
        g.add_output(p, s).expect("output");
        g.append_characteristic(s, Qualifier::new("sex", "female"))
            .expect("characteristic");
        let q = g.add(Node::process("extraction"));
        let e = g.add(Node::material("extract1", MaterialType::Extract));
        g.add_input(q, src).expect("input");
        g.add_output(q, e).expect("output");

        let table =
            Compositor::compose("s.txt", &g, TableKind::Study, &registry(), &TabOptions::default())
                .expect("compose");
        assert_eq!(
            table.headers,
            vec![
                "Source Name",
                "Protocol REF",
                "Extract Name",
                "Protocol REF",
                "Sample Name",
                "Characteristics[sex]"
            ]
        );
        assert!(table.rows.iter().any(|r| r[2] == "extract1" && r[4].is_empty()));
        assert!(table.rows.iter().any(|r| r[4] == "sample1" && r[2].is_empty()));
        assert!(table.rows.iter().all(|r| r[3].is_empty()));
    }

    #[test]
    fn new_material_slot_never_borders_a_node_slot() {
        // sample1 -> extraction -> extract1 -> labeling -> f1.raw, and
        // sample1 -> labeling -> labeled1 on a second, shorter path.
        let mut g = Graph::new();
        let s = g.add(Node::sample("sample1"));
        let extraction = g.add(Node::process("extraction"));
        let e = g.add(Node::material("extract1", MaterialType::Extract));
        let labeling = g.add(Node::process("labeling"));
        let f = g.add(Node::data_file("f1.raw", DataFileLabel::RawData));
        g.add_input(extraction, s).expect("input");
        g.add_output(extraction, e).expect("output");
        g.add_input(labeling, e).expect("input");
        g.add_output(labeling, f).expect("output");
        let direct = g.add(Node::process("labeling"));
        let le = g.add(Node::material("labeled1", MaterialType::LabeledExtract));
        g.add_input(direct, s).expect("input");
        g.add_output(direct, le).expect("output");

        let mut registry = registry().with_protocol(Protocol::new("labeling"));
        let options = TabOptions::default();
        let table = Compositor::compose("a.txt", &g, TableKind::Assay, &registry, &options)
            .expect("compose");
        for pair in table.headers.windows(2) {
            assert!(
                pair.iter().any(|h| h == "Protocol REF"),
                "adjacent node columns in {:?}",
                table.headers
            );
        }

        let text = table.to_tsv(&options).expect("tsv");
        let back = crate::Ingestor::read("a.txt", &text, TableKind::Assay, &mut registry, &options)
            .expect("read");
        assert!(back.report.is_clean(), "{}", back.report);
        assert!(registry.protocol(UNKNOWN_PROTOCOL).is_none());
        assert!(
            crate::is_isomorphic(&g, &back.graph),
            "{:?}",
            crate::canonical_diff(&g, &back.graph)
        );
    }

    #[test]
    fn writing_twice_is_identical() {
        let mut g = Graph::new();
        for i in 0..5 {
            let src = g.add(Node::source(format!("source{i}")));
            let p = g.add(Node::process("sample collection"));
            let s = g.add(Node::sample(format!("sample{i}")));
            g.add_input(p, src).expect("input");
            g.add_output(p, s).expect("output");
        }
        assert_eq!(write(&g, TableKind::Study), write(&g, TableKind::Study));
    }

    #[test]
    fn unknown_protocol_is_declared() {
        let mut g = Graph::new();
        let s = g.add(Node::sample("s"));
        let p = g.add(Node::process(UNKNOWN_PROTOCOL));
        g.add_input(p, s).expect("input");
        let mut registry = registry();
        let mut report = Report::new();
        Compositor::declare_protocols(&g, &mut registry, &mut report);
        assert!(registry.protocol(UNKNOWN_PROTOCOL).is_some());
        assert!(registry.protocol("sample collection").is_some());
    }

    #[test]
    fn registered_protocols_are_not_widened() {
        let mut g = Graph::new();
        let s = g.add(Node::sample("s"));
        let p = g.add(Node::process("extraction"));
        let e = g.add(Node::material("e", MaterialType::Extract));
        g.add_input(p, s).expect("input");
        g.add_output(p, e).expect("output");
        g.append_parameter_value(p, Qualifier::new("speed", "fast"))
            .expect("parameter");
        let mut registry = registry();
        let mut report = Report::new();
        Compositor::declare_protocols(&g, &mut registry, &mut report);
        assert_eq!(report.count(DiagnosticCode::UndeclaredParameter), 1);
        assert!(!report.has(DiagnosticCode::UnregisteredProtocol));
        assert!(
            !registry
                .protocol("extraction")
                .is_some_and(|p| p.declares("speed"))
        );
    }

    #[test]
    fn unregistered_protocols_take_their_parameters() {
        let mut g = Graph::new();
        let s = g.add(Node::sample("s"));
        let p = g.add(Node::process("growth"));
        g.add_input(p, s).expect("input");
        g.append_parameter_value(p, Qualifier::new("speed", "fast"))
            .expect("parameter");
        let mut registry = registry();
        let mut report = Report::new();
        Compositor::declare_protocols(&g, &mut registry, &mut report);
        assert!(report.has(DiagnosticCode::UnregisteredProtocol));
        assert!(!report.has(DiagnosticCode::UndeclaredParameter));
        assert!(registry.protocol("growth").is_some_and(|p| p.declares("speed")));
    }
}
