//! # Experimental Graph
//!
//! A node arena of materials, data files and processes.
//!
//! - Handles (`NodeId`) are contiguous indices in creation order.
//! - Edges live on processes only: `inputs` (node -> process) and `outputs`
//!   (process -> node). Process chaining uses `previous`/`next` links, never
//!   edges.
//! - Reverse indexes of consuming and producing processes are kept for path
//!   enumeration.
//!
//! Node equality is by handle. Deduplication by name is the ingestor's job.
//! Integrity is checked on demand by `validate`, not during construction.

use crate::{
    Characteristic, Comment, DataFileLabel, FactorValue, IsaError, MaterialType, NodeId,
    ParameterValue,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// NODE KINDS
// =============================================================================

/// A starting biological material.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Source {
    pub name: String,
    #[serde(default)]
    pub characteristics: Vec<Characteristic>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// A derived biological material.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    #[serde(default)]
    pub characteristics: Vec<Characteristic>,
    #[serde(default)]
    pub factor_values: Vec<FactorValue>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Sources this sample derives from.
    #[serde(default)]
    pub derives_from: Vec<NodeId>,
}

/// An intermediate material with a type tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub material_type: MaterialType,
    #[serde(default)]
    pub characteristics: Vec<Characteristic>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

/// An output artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataFile {
    pub filename: String,
    pub label: DataFileLabel,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Samples this file was generated from.
    #[serde(default)]
    pub generated_from: Vec<NodeId>,
}

/// One execution of a protocol.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Process {
    /// Name of the executed protocol.
    pub protocol: String,
    /// Run name, from the assay-name column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub performer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub array_design_ref: Option<String>,
    #[serde(default)]
    pub parameter_values: Vec<ParameterValue>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    #[serde(default)]
    pub inputs: Vec<NodeId>,
    #[serde(default)]
    pub outputs: Vec<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<NodeId>,
}

impl Process {
    /// A process executing `protocol`, with no edges.
    #[must_use]
    pub fn new(protocol: impl Into<String>) -> Self {
        Self {
            protocol: protocol.into(),
            ..Self::default()
        }
    }
}

/// Single-valued execution metadata of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAttribute {
    Name,
    Date,
    Performer,
    ArrayDesignRef,
}

/// Kind discriminator; node names are unique per tag within one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeTag {
    Source,
    Sample,
    Material(MaterialType),
    DataFile(DataFileLabel),
    Process,
}

impl NodeTag {
    /// Label of the primary column holding nodes of this kind.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Source => "Source Name",
            Self::Sample => "Sample Name",
            Self::Material(t) => t.label(),
            Self::DataFile(l) => l.label(),
            Self::Process => "Protocol REF",
        }
    }
}

/// A node of the experimental graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Source(Source),
    Sample(Sample),
    Material(Material),
    DataFile(DataFile),
    Process(Process),
}

impl Node {
    /// A source without qualifiers.
    #[must_use]
    pub fn source(name: impl Into<String>) -> Self {
        Self::Source(Source {
            name: name.into(),
            ..Source::default()
        })
    }

    /// A sample without qualifiers.
    #[must_use]
    pub fn sample(name: impl Into<String>) -> Self {
        Self::Sample(Sample {
            name: name.into(),
            ..Sample::default()
        })
    }

    /// An intermediate material without qualifiers.
    #[must_use]
    pub fn material(name: impl Into<String>, material_type: MaterialType) -> Self {
        Self::Material(Material {
            name: name.into(),
            material_type,
            characteristics: Vec::new(),
            comments: Vec::new(),
        })
    }

    /// A data file without comments.
    #[must_use]
    pub fn data_file(filename: impl Into<String>, label: DataFileLabel) -> Self {
        Self::DataFile(DataFile {
            filename: filename.into(),
            label,
            comments: Vec::new(),
            generated_from: Vec::new(),
        })
    }

    /// A process without edges.
    #[must_use]
    pub fn process(protocol: impl Into<String>) -> Self {
        Self::Process(Process::new(protocol))
    }

    /// Kind discriminator.
    #[must_use]
    pub const fn tag(&self) -> NodeTag {
        match self {
            Self::Source(_) => NodeTag::Source,
            Self::Sample(_) => NodeTag::Sample,
            Self::Material(m) => NodeTag::Material(m.material_type),
            Self::DataFile(d) => NodeTag::DataFile(d.label),
            Self::Process(_) => NodeTag::Process,
        }
    }

    /// The primary cell: material name, file name, or protocol name.
    #[must_use]
    pub fn primary(&self) -> &str {
        match self {
            Self::Source(s) => &s.name,
            Self::Sample(s) => &s.name,
            Self::Material(m) => &m.name,
            Self::DataFile(d) => &d.filename,
            Self::Process(p) => &p.protocol,
        }
    }

    /// Whether the node is a process.
    #[must_use]
    pub const fn is_process(&self) -> bool {
        matches!(self, Self::Process(_))
    }

    /// Characteristics, for materials.
    #[must_use]
    pub fn characteristics(&self) -> &[Characteristic] {
        match self {
            Self::Source(s) => &s.characteristics,
            Self::Sample(s) => &s.characteristics,
            Self::Material(m) => &m.characteristics,
            Self::DataFile(_) | Self::Process(_) => &[],
        }
    }

    /// Factor values, for samples.
    #[must_use]
    pub fn factor_values(&self) -> &[FactorValue] {
        match self {
            Self::Sample(s) => &s.factor_values,
            _ => &[],
        }
    }

    /// Comments of any node.
    #[must_use]
    pub fn comments(&self) -> &[Comment] {
        match self {
            Self::Source(s) => &s.comments,
            Self::Sample(s) => &s.comments,
            Self::Material(m) => &m.comments,
            Self::DataFile(d) => &d.comments,
            Self::Process(p) => &p.comments,
        }
    }

    /// The process payload, if any.
    #[must_use]
    pub const fn as_process(&self) -> Option<&Process> {
        match self {
            Self::Process(p) => Some(p),
            _ => None,
        }
    }

    fn comments_mut(&mut self) -> &mut Vec<Comment> {
        match self {
            Self::Source(s) => &mut s.comments,
            Self::Sample(s) => &mut s.comments,
            Self::Material(m) => &mut m.comments,
            Self::DataFile(d) => &mut d.comments,
            Self::Process(p) => &mut p.comments,
        }
    }
}

// =============================================================================
// GRAPH
// =============================================================================

/// The experimental graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SerializableGraph", into = "SerializableGraph")]
pub struct Graph {
    /// Arena: `NodeId(i)` is `nodes[i]`.
    nodes: Vec<Node>,
    /// Reverse index: node -> processes that take it as input.
    consumers: BTreeMap<NodeId, Vec<NodeId>>,
    /// Reverse index: node -> processes that output it.
    producers: BTreeMap<NodeId, Vec<NodeId>>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no node.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a node and return its handle.
    ///
    /// Edges and links carried by the node are ignored; use `add_input`,
    /// `add_output` and `link` to wire it.
    pub fn add(&mut self, mut node: Node) -> NodeId {
        match &mut node {
            Node::Process(p) => {
                p.inputs.clear();
                p.outputs.clear();
                p.previous = None;
                p.next = None;
            }
            Node::Sample(s) => s.derives_from.clear(),
            Node::DataFile(d) => d.generated_from.clear(),
            Node::Source(_) | Node::Material(_) => {}
        }
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> Result<&Node, IsaError> {
        self.nodes.get(id.index()).ok_or(IsaError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, IsaError> {
        self.nodes
            .get_mut(id.index())
            .ok_or(IsaError::NodeNotFound(id))
    }

    /// Look up a process.
    pub fn process(&self, id: NodeId) -> Result<&Process, IsaError> {
        self.node(id)?
            .as_process()
            .ok_or_else(|| IsaError::IntegrityViolation(format!("{id} is not a process")))
    }

    fn process_mut(&mut self, id: NodeId) -> Result<&mut Process, IsaError> {
        match self.node_mut(id)? {
            Node::Process(p) => Ok(p),
            _ => Err(IsaError::IntegrityViolation(format!(
                "{id} is not a process"
            ))),
        }
    }

    /// All nodes with their handles, in creation order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// All processes with their handles, in creation order.
    pub fn processes(&self) -> impl Iterator<Item = (NodeId, &Process)> {
        self.nodes()
            .filter_map(|(id, n)| n.as_process().map(|p| (id, p)))
    }

    /// First node with this tag and primary cell.
    #[must_use]
    pub fn find(&self, tag: NodeTag, primary: &str) -> Option<NodeId> {
        self.nodes()
            .find(|(_, n)| n.tag() == tag && n.primary() == primary)
            .map(|(id, _)| id)
    }

    /// Processes that take `id` as input.
    #[must_use]
    pub fn consumers(&self, id: NodeId) -> &[NodeId] {
        self.consumers.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Processes that output `id`.
    #[must_use]
    pub fn producers(&self, id: NodeId) -> &[NodeId] {
        self.producers.get(&id).map_or(&[], Vec::as_slice)
    }

    /// Outgoing neighbours along process edges and chaining links.
    ///
    /// A process leads to its outputs and to its next process; any other
    /// node leads to the processes consuming it.
    #[must_use]
    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        match self.nodes.get(id.index()) {
            Some(Node::Process(p)) => p.outputs.iter().copied().chain(p.next).collect(),
            Some(_) => self.consumers(id).to_vec(),
            None => Vec::new(),
        }
    }

    /// Whether no process produces this node and no process precedes it.
    #[must_use]
    pub fn is_root(&self, id: NodeId) -> bool {
        match self.nodes.get(id.index()) {
            Some(Node::Process(p)) => p.previous.is_none() && p.inputs.is_empty(),
            Some(_) => self.producers(id).is_empty(),
            None => false,
        }
    }

    // =========================================================================
    // QUALIFIERS
    // =========================================================================

    /// Append a characteristic to a material.
    pub fn append_characteristic(&mut self, id: NodeId, c: Characteristic) -> Result<(), IsaError> {
        match self.node_mut(id)? {
            Node::Source(s) => s.characteristics.push(c),
            Node::Sample(s) => s.characteristics.push(c),
            Node::Material(m) => m.characteristics.push(c),
            Node::DataFile(_) | Node::Process(_) => {
                return Err(IsaError::IntegrityViolation(format!(
                    "{id} cannot carry characteristics"
                )));
            }
        }
        Ok(())
    }

    /// Append a factor value to a sample.
    pub fn append_factor_value(&mut self, id: NodeId, fv: FactorValue) -> Result<(), IsaError> {
        match self.node_mut(id)? {
            Node::Sample(s) => {
                s.factor_values.push(fv);
                Ok(())
            }
            _ => Err(IsaError::IntegrityViolation(format!(
                "{id} cannot carry factor values"
            ))),
        }
    }

    /// Append a parameter value to a process.
    pub fn append_parameter_value(
        &mut self,
        id: NodeId,
        pv: ParameterValue,
    ) -> Result<(), IsaError> {
        self.process_mut(id)?.parameter_values.push(pv);
        Ok(())
    }

    /// Append a comment to any node.
    pub fn append_comment(&mut self, id: NodeId, comment: Comment) -> Result<(), IsaError> {
        self.node_mut(id)?.comments_mut().push(comment);
        Ok(())
    }

    /// Set a run attribute of a process.
    ///
    /// The first value wins: returns `Ok(false)` when a different value was
    /// already set, leaving it in place.
    pub fn set_run_attribute(
        &mut self,
        id: NodeId,
        attribute: RunAttribute,
        value: &str,
    ) -> Result<bool, IsaError> {
        let p = self.process_mut(id)?;
        let slot = match attribute {
            RunAttribute::Name => &mut p.name,
            RunAttribute::Date => &mut p.date,
            RunAttribute::Performer => &mut p.performer,
            RunAttribute::ArrayDesignRef => &mut p.array_design_ref,
        };
        if let Some(existing) = slot.as_deref() {
            return Ok(existing == value);
        }
        *slot = Some(value.to_string());
        Ok(true)
    }

    // =========================================================================
    // EDGES
    // =========================================================================

    /// Connect `node -> process`. Idempotent.
    pub fn add_input(&mut self, process: NodeId, node: NodeId) -> Result<(), IsaError> {
        self.check_endpoint(node)?;
        let p = self.process_mut(process)?;
        if p.inputs.contains(&node) {
            return Ok(());
        }
        p.inputs.push(node);
        self.consumers.entry(node).or_default().push(process);
        Ok(())
    }

    /// Connect `process -> node`. Idempotent.
    pub fn add_output(&mut self, process: NodeId, node: NodeId) -> Result<(), IsaError> {
        self.check_endpoint(node)?;
        let p = self.process_mut(process)?;
        if p.outputs.contains(&node) {
            return Ok(());
        }
        p.outputs.push(node);
        self.producers.entry(node).or_default().push(process);
        Ok(())
    }

    fn check_endpoint(&self, node: NodeId) -> Result<(), IsaError> {
        if self.node(node)?.is_process() {
            return Err(IsaError::IntegrityViolation(format!(
                "process {node} cannot be an edge endpoint; use link"
            )));
        }
        Ok(())
    }

    /// Chain two processes: sets `previous.next` and `next.previous`.
    ///
    /// Either both links are set or neither is. Relinking an existing pair
    /// is a no-op; replacing a different existing link is an error.
    pub fn link(&mut self, previous: NodeId, next: NodeId) -> Result<(), IsaError> {
        if previous == next {
            return Err(IsaError::IntegrityViolation(format!(
                "process {previous} cannot follow itself"
            )));
        }
        let p = self.process(previous)?;
        let n = self.process(next)?;
        if p.next.is_some_and(|x| x != next) || n.previous.is_some_and(|x| x != previous) {
            return Err(IsaError::IntegrityViolation(format!(
                "{previous} -> {next} conflicts with an existing link"
            )));
        }
        self.process_mut(previous)?.next = Some(next);
        self.process_mut(next)?.previous = Some(previous);
        Ok(())
    }

    /// Record that a sample derives from a source. Idempotent.
    pub fn add_derives_from(&mut self, sample: NodeId, source: NodeId) -> Result<(), IsaError> {
        if !matches!(self.node(source)?, Node::Source(_)) {
            return Err(IsaError::IntegrityViolation(format!(
                "{source} is not a source"
            )));
        }
        match self.node_mut(sample)? {
            Node::Sample(s) => {
                if !s.derives_from.contains(&source) {
                    s.derives_from.push(source);
                }
                Ok(())
            }
            _ => Err(IsaError::IntegrityViolation(format!(
                "{sample} is not a sample"
            ))),
        }
    }

    /// Record that a data file was generated from a sample. Idempotent.
    pub fn add_generated_from(&mut self, file: NodeId, sample: NodeId) -> Result<(), IsaError> {
        if !matches!(self.node(sample)?, Node::Sample(_)) {
            return Err(IsaError::IntegrityViolation(format!(
                "{sample} is not a sample"
            )));
        }
        match self.node_mut(file)? {
            Node::DataFile(d) => {
                if !d.generated_from.contains(&sample) {
                    d.generated_from.push(sample);
                }
                Ok(())
            }
            _ => Err(IsaError::IntegrityViolation(format!(
                "{file} is not a data file"
            ))),
        }
    }

    // =========================================================================
    // INTEGRITY
    // =========================================================================

    /// Every structural invariant the graph breaks, in node order.
    #[must_use]
    pub fn integrity_violations(&self) -> Vec<String> {
        let mut found = Vec::new();
        let in_range = |id: &NodeId| id.index() < self.nodes.len();

        for (id, node) in self.nodes() {
            match node {
                Node::Process(p) => {
                    for &x in p.inputs.iter().chain(&p.outputs) {
                        match self.nodes.get(x.index()) {
                            None => found.push(format!("{id} references missing node {x}")),
                            Some(n) if n.is_process() => {
                                found.push(format!("{id} has process {x} as an edge endpoint"));
                            }
                            Some(_) => {}
                        }
                    }
                    if p.inputs.is_empty()
                        && p.outputs.is_empty()
                        && p.previous.is_none()
                        && p.next.is_none()
                    {
                        found.push(format!("process {id} has no inputs, outputs or links"));
                    }
                    if let Some(next) = p.next {
                        match self.nodes.get(next.index()).and_then(Node::as_process) {
                            Some(n) if n.previous == Some(id) => {
                                if p.outputs.iter().any(|o| n.inputs.contains(o)) {
                                    found.push(format!(
                                        "chained processes {id} -> {next} share a material"
                                    ));
                                }
                            }
                            _ => found.push(format!("{id} -> {next} link is not mirrored")),
                        }
                    }
                    if let Some(prev) = p.previous {
                        let mirrored = self
                            .nodes
                            .get(prev.index())
                            .and_then(Node::as_process)
                            .is_some_and(|q| q.next == Some(id));
                        if !mirrored {
                            found.push(format!("{prev} -> {id} link is not mirrored"));
                        }
                    }
                }
                Node::Sample(s) => {
                    for x in &s.derives_from {
                        if !in_range(x) || !matches!(self.nodes[x.index()], Node::Source(_)) {
                            found.push(format!("sample {id} derives from non-source {x}"));
                        }
                    }
                }
                Node::DataFile(d) => {
                    for x in &d.generated_from {
                        if !in_range(x) || !matches!(self.nodes[x.index()], Node::Sample(_)) {
                            found.push(format!("data file {id} generated from non-sample {x}"));
                        }
                    }
                }
                Node::Source(_) | Node::Material(_) => {}
            }
        }
        if found.is_empty() && self.has_cycle() {
            found.push("graph contains a cycle".to_string());
        }
        found
    }

    /// Check every structural invariant.
    pub fn validate(&self) -> Result<(), IsaError> {
        match self.integrity_violations().into_iter().next() {
            Some(v) => Err(IsaError::IntegrityViolation(v)),
            None => Ok(()),
        }
    }

    /// Iterative three-colour DFS over `successors`.
    fn has_cycle(&self) -> bool {
        const WHITE: u8 = 0;
        const GREY: u8 = 1;
        const BLACK: u8 = 2;
        let mut colour = vec![WHITE; self.nodes.len()];
        for start in 0..self.nodes.len() {
            if colour[start] != WHITE {
                continue;
            }
            let mut stack: Vec<(NodeId, Vec<NodeId>)> =
                vec![(NodeId(start), self.successors(NodeId(start)))];
            colour[start] = GREY;
            while let Some((node, pending)) = stack.last_mut() {
                let node = *node;
                let Some(next) = pending.pop() else {
                    colour[node.index()] = BLACK;
                    stack.pop();
                    continue;
                };
                match colour.get(next.index()).copied() {
                    Some(GREY) => return true,
                    Some(WHITE) => {
                        colour[next.index()] = GREY;
                        stack.push((next, self.successors(next)));
                    }
                    _ => {}
                }
            }
        }
        false
    }

    fn rebuild_indexes(&mut self) {
        self.consumers.clear();
        self.producers.clear();
        for (i, node) in self.nodes.iter().enumerate() {
            if let Node::Process(p) = node {
                for &input in &p.inputs {
                    self.consumers.entry(input).or_default().push(NodeId(i));
                }
                for &output in &p.outputs {
                    self.producers.entry(output).or_default().push(NodeId(i));
                }
            }
        }
    }
}

// =============================================================================
// SERIALIZATION
// =============================================================================

/// Serializable representation of the graph: the arena in handle order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub nodes: Vec<Node>,
}

impl From<Graph> for SerializableGraph {
    fn from(graph: Graph) -> Self {
        Self { nodes: graph.nodes }
    }
}

impl TryFrom<SerializableGraph> for Graph {
    type Error = IsaError;

    /// Rebuild the arena, rejecting handles that point outside it.
    fn try_from(sg: SerializableGraph) -> Result<Self, Self::Error> {
        let len = sg.nodes.len();
        for (i, node) in sg.nodes.iter().enumerate() {
            let refs: Vec<NodeId> = match node {
                Node::Process(p) => p
                    .inputs
                    .iter()
                    .chain(&p.outputs)
                    .copied()
                    .chain(p.previous)
                    .chain(p.next)
                    .collect(),
                Node::Sample(s) => s.derives_from.clone(),
                Node::DataFile(d) => d.generated_from.clone(),
                Node::Source(_) | Node::Material(_) => Vec::new(),
            };
            if let Some(bad) = refs.into_iter().find(|r| r.index() >= len) {
                return Err(IsaError::SerializationError(format!(
                    "node #{i} references missing node {bad}"
                )));
            }
        }
        let mut graph = Self {
            nodes: sg.nodes,
            consumers: BTreeMap::new(),
            producers: BTreeMap::new(),
        };
        graph.rebuild_indexes();
        Ok(graph)
    }
}

// =============================================================================
// TESTS
// =============================================================================
