//! # Canonical Export Module
//!
//! Node handles depend on reading order, so two graphs describing the same
//! experiment rarely share them. The canonical form keys every node by
//! content instead:
//!
//! - materials and files by kind label and name;
//! - processes by protocol, run attributes, input and output keys, and the
//!   key of the previous process when they have no input.
//!
//! Qualifiers are flattened to strings, so a bare term equals the same text
//! and a number equals its decimal rendering. Only input, output and link
//! edges are kept; `derives_from` and `generated_from` follow from them.
//!
//! Two graphs are isomorphic when their canonical forms are equal. The
//! canonical form also encodes to a bit-exact `postcard` snapshot, which a
//! later reading of the same table can be checked against.

use crate::graph::{Graph, Node, NodeTag, Process};
use crate::{IsaError, NodeId, Qualifier, Unit};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// Leading bytes of every snapshot.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"ISAG";

/// Snapshot layout version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Most entries (nodes, edges and properties together) a snapshot may
/// declare.
pub const MAX_SNAPSHOT_ENTRIES: u64 = 20_000_000;

/// First record of a snapshot, decoded before the body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
    pub nodes: u64,
    pub edges: u64,
    pub properties: u64,
    /// `CanonicalGraph::checksum` of the body.
    pub checksum: u64,
}

impl SnapshotHeader {
    /// Header describing `graph`.
    #[must_use]
    pub fn describe(graph: &CanonicalGraph) -> Self {
        let count = |n: usize| u64::try_from(n).unwrap_or(u64::MAX);
        Self {
            magic: SNAPSHOT_MAGIC,
            version: SNAPSHOT_VERSION,
            nodes: count(graph.nodes.len()),
            edges: count(graph.edges.len()),
            properties: count(graph.properties.len()),
            checksum: graph.checksum(),
        }
    }

    /// Total declared entries.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.nodes
            .saturating_add(self.edges)
            .saturating_add(self.properties)
    }

    /// Reject foreign, newer or oversized snapshots before the body is
    /// decoded.
    pub fn check(&self) -> Result<(), IsaError> {
        if self.magic != SNAPSHOT_MAGIC {
            return Err(IsaError::SerializationError(
                "not a graph snapshot".to_string(),
            ));
        }
        if self.version != SNAPSHOT_VERSION {
            return Err(IsaError::SerializationError(format!(
                "snapshot version {} is not supported (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        if self.entries() > MAX_SNAPSHOT_ENTRIES {
            return Err(IsaError::CapacityExceeded(format!(
                "snapshot declares {} entries, more than {MAX_SNAPSHOT_ENTRIES}",
                self.entries()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// CANONICAL NODE & EDGE
// =============================================================================

/// A node in canonical format, sorted by key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct CanonicalNode {
    /// Content key (sort key).
    pub key: String,

    /// Primary column label of the node's kind.
    pub kind: String,
}

/// An edge in canonical format, sorted by (from, to, relation).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct CanonicalEdge {
    /// Key of the upstream node.
    pub from: String,

    /// Key of the downstream node.
    pub to: String,

    /// `input`, `output` or `link`.
    pub relation: String,
}

/// A property in canonical format, sorted by (node, attribute, value).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct CanonicalProperty {
    /// Key of the owning node.
    pub node: String,

    /// `characteristic[..]`, `factor[..]`, `parameter[..]`, `comment[..]` or
    /// a run attribute name.
    pub attribute: String,

    /// Flattened value.
    pub value: String,
}

// =============================================================================
// CANONICAL GRAPH
// =============================================================================

/// A graph in canonical format for bit-exact serialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CanonicalGraph {
    /// Nodes sorted by key, keys unique.
    pub nodes: Vec<CanonicalNode>,

    /// Edges sorted and deduplicated.
    pub edges: Vec<CanonicalEdge>,

    /// Properties sorted and deduplicated.
    pub properties: Vec<CanonicalProperty>,
}

impl CanonicalGraph {
    /// Create a canonical graph from a regular graph.
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        let keys = node_keys(graph);
        let key = |id: &NodeId| keys.get(id).cloned().unwrap_or_default();

        let mut nodes = BTreeSet::new();
        let mut edges = BTreeSet::new();
        let mut properties = BTreeSet::new();
        let mut property = |node: &str, attribute: String, value: String| {
            properties.insert(CanonicalProperty {
                node: node.to_string(),
                attribute,
                value,
            });
        };

        for (id, node) in graph.nodes() {
            let own = key(&id);
            nodes.insert(CanonicalNode {
                key: own.clone(),
                kind: node.tag().label().to_string(),
            });
            for q in node.characteristics() {
                property(&own, format!("characteristic[{}]", q.category), flatten(q));
            }
            for q in node.factor_values() {
                property(&own, format!("factor[{}]", q.category), flatten(q));
            }
            for c in node.comments() {
                property(&own, format!("comment[{}]", c.name), c.value.clone());
            }
            let Some(p) = node.as_process() else {
                continue;
            };
            for q in &p.parameter_values {
                property(&own, format!("parameter[{}]", q.category), flatten(q));
            }
            for (attribute, value) in run_attributes(p) {
                property(&own, attribute.to_string(), value.to_string());
            }
            let edge = |from: String, to: String, relation: &str| CanonicalEdge {
                from,
                to,
                relation: relation.to_string(),
            };
            edges.extend(p.inputs.iter().map(|i| edge(key(i), own.clone(), "input")));
            edges.extend(p.outputs.iter().map(|o| edge(own.clone(), key(o), "output")));
            edges.extend(p.next.iter().map(|n| edge(own.clone(), key(n), "link")));
        }

        Self {
            nodes: nodes.into_iter().collect(),
            edges: edges.into_iter().collect(),
            properties: properties.into_iter().collect(),
        }
    }

    /// Compute a deterministic checksum of the data.
    ///
    /// XOR-rotate over the sorted content. Not a cryptographic hash; it
    /// detects accidental corruption only.
    #[must_use]
    pub fn checksum(&self) -> u64 {
        let fold = |seed: u64, s: &str| {
            s.bytes()
                .fold(seed, |h, b| h.rotate_left(5) ^ u64::from(b))
        };
        let mut hash: u64 = 0;

        for node in &self.nodes {
            hash ^= fold(13, &node.key).rotate_left(13);
            hash ^= fold(7, &node.kind).rotate_left(7);
        }

        for edge in &self.edges {
            hash ^= fold(17, &edge.from).rotate_left(17);
            hash ^= fold(11, &edge.to).rotate_left(11);
            hash ^= fold(5, &edge.relation).rotate_left(5);
        }

        for prop in &self.properties {
            hash ^= fold(19, &prop.node).rotate_left(19);
            hash ^= fold(23, &prop.attribute).rotate_left(23);
            hash ^= fold(29, &prop.value).rotate_left(29);
        }

        hash
    }
}

/// Content keys of every node.
fn node_keys(graph: &Graph) -> BTreeMap<NodeId, String> {
    let mut keys = BTreeMap::new();
    for (id, node) in graph.nodes() {
        if !node.is_process() {
            keys.insert(id, format!("{}:{}", node.tag().label(), node.primary()));
        }
    }
    let process_keys: Vec<(NodeId, String)> = graph
        .processes()
        .map(|(id, _)| (id, process_key(graph, id, &keys)))
        .collect();
    keys.extend(process_keys);
    keys
}

/// Key of a process; a chain of input-less processes folds in each
/// predecessor's own key.
fn process_key(graph: &Graph, id: NodeId, materials: &BTreeMap<NodeId, String>) -> String {
    let mut chain: Vec<&Process> = Vec::new();
    let mut current = graph.process(id).ok();
    while let Some(p) = current {
        chain.push(p);
        if !p.inputs.is_empty() || chain.len() > graph.len() {
            break;
        }
        current = p.previous.and_then(|prev| graph.process(prev).ok());
    }

    let sorted = |ids: &[NodeId]| {
        ids.iter()
            .filter_map(|i| materials.get(i).map(String::as_str))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect::<Vec<_>>()
            .join(",")
    };
    chain.iter().rev().fold(String::new(), |upstream, p| {
        let run: Vec<String> = run_attributes(p)
            .map(|(attribute, value)| format!("{attribute}={value}"))
            .collect();
        format!(
            "{}:{}[{}]({})->({}){}",
            NodeTag::Process.label(),
            p.protocol,
            run.join(";"),
            sorted(&p.inputs),
            sorted(&p.outputs),
            if upstream.is_empty() {
                String::new()
            } else {
                format!("<{upstream}>")
            }
        )
    })
}

fn run_attributes(p: &Process) -> impl Iterator<Item = (&'static str, &str)> {
    [
        ("name", &p.name),
        ("date", &p.date),
        ("performer", &p.performer),
        ("array design", &p.array_design_ref),
    ]
    .into_iter()
    .filter_map(|(attribute, value)| value.as_deref().map(|v| (attribute, v)))
}

/// Qualifier as `value|source|accession|unit|unit source|unit accession`.
fn flatten(q: &Qualifier) -> String {
    let (source, accession) = match &q.value {
        crate::Value::Term(oa) => (oa.source_cell(), oa.accession_cell()),
        _ => ("", ""),
    };
    let (unit, unit_source, unit_accession) = match &q.unit {
        Some(Unit::Term(oa)) => (oa.term.as_str(), oa.source_cell(), oa.accession_cell()),
        Some(Unit::Plain(label)) => (label.as_str(), "", ""),
        None => ("", "", ""),
    };
    format!("{}|{source}|{accession}|{unit}|{unit_source}|{unit_accession}", q.value)
}

// =============================================================================
// SNAPSHOTS
// =============================================================================

impl CanonicalGraph {
    /// Encode as a snapshot: a `SnapshotHeader` followed by the body, both
    /// `postcard`.
    pub fn to_snapshot(&self) -> Result<Vec<u8>, IsaError> {
        let encode_err =
            |e: postcard::Error| IsaError::SerializationError(format!("snapshot: {e}"));
        let header = SnapshotHeader::describe(self);
        let mut bytes = postcard::to_allocvec(&header).map_err(encode_err)?;
        bytes.extend(postcard::to_allocvec(self).map_err(encode_err)?);
        Ok(bytes)
    }

    /// Decode a snapshot, checking the header against the body.
    pub fn from_snapshot(data: &[u8]) -> Result<Self, IsaError> {
        let (header, body) = postcard::take_from_bytes::<SnapshotHeader>(data)
            .map_err(|e| IsaError::SerializationError(format!("snapshot header: {e}")))?;
        header.check()?;
        let graph: Self = postcard::from_bytes(body)
            .map_err(|e| IsaError::SerializationError(format!("snapshot body: {e}")))?;

        let found = SnapshotHeader::describe(&graph);
        if found.entries() != header.entries() {
            return Err(IsaError::SerializationError(format!(
                "snapshot body holds {} entries, header declares {}",
                found.entries(),
                header.entries()
            )));
        }
        if found.checksum != header.checksum {
            return Err(IsaError::SerializationError(format!(
                "snapshot checksum {:016x} does not match body {:016x}",
                header.checksum, found.checksum
            )));
        }
        Ok(graph)
    }

    /// Entries present in one side only, as `- entry` (only in `self`) and
    /// `+ entry` (only in `other`) lines.
    #[must_use]
    pub fn diff(&self, other: &Self) -> Vec<String> {
        let left = self.lines();
        let right = other.lines();
        left.difference(&right)
            .map(|l| format!("- {l}"))
            .chain(right.difference(&left).map(|l| format!("+ {l}")))
            .collect()
    }

    fn lines(&self) -> BTreeSet<String> {
        let nodes = self.nodes.iter().map(|n| format!("node {}", n.key));
        let props = self
            .properties
            .iter()
            .map(|p| format!("property {} {}={}", p.node, p.attribute, p.value));
        let edges = self
            .edges
            .iter()
            .map(|e| format!("edge {} -{}-> {}", e.from, e.relation, e.to));
        nodes.chain(props).chain(edges).collect()
    }
}

/// Snapshot of a graph's canonical form.
pub fn snapshot(graph: &Graph) -> Result<Vec<u8>, IsaError> {
    CanonicalGraph::from_graph(graph).to_snapshot()
}

/// Compute the canonical checksum of a graph.
#[must_use]
pub fn canonical_checksum(graph: &Graph) -> u64 {
    CanonicalGraph::from_graph(graph).checksum()
}

/// Whether two graphs hold the same nodes, qualifiers and edges, up to
/// handles.
#[must_use]
pub fn is_isomorphic(a: &Graph, b: &Graph) -> bool {
    CanonicalGraph::from_graph(a) == CanonicalGraph::from_graph(b)
}

/// Node, property and edge entries present in one graph only.
#[must_use]
pub fn canonical_diff(a: &Graph, b: &Graph) -> Vec<String> {
    CanonicalGraph::from_graph(a).diff(&CanonicalGraph::from_graph(b))
}

/// BLAKE3 of a graph's snapshot, as 64 hex characters.
///
/// Requires the `crypto-hash` feature.
#[cfg(feature = "crypto-hash")]
pub fn canonical_crypto_hash(graph: &Graph) -> Result<String, IsaError> {
    Ok(blake3::hash(&snapshot(graph)?).to_hex().to_string())
}

/// Key of a single node, as used in canonical entries.
#[must_use]
pub fn node_key(graph: &Graph, id: NodeId) -> Option<String> {
    let node: &Node = graph.node(id).ok()?;
    if node.is_process() {
        return Some(process_key(graph, id, &node_keys(graph)));
    }
    Some(format!("{}:{}", node.tag().label(), node.primary()))
}

// =============================================================================
// TESTS
// =============================================================================
