//! # Path Enumeration
//!
//! A path runs from a root (a node nothing produces, or a process with no
//! input and no predecessor) to a sink (a node with no successor), following
//! process inputs, outputs and `next` links.
//!
//! Roots of the table's start kind (sources for study tables, samples for
//! assay tables) are enumerated first, in node order, then every other root,
//! so that each edge lies on at least one path.
//!
//! Enumeration is an iterative DFS. Runs of out-degree-1 nodes are
//! memoized and appended in one step.

use crate::codec::ValueShape;
use crate::graph::{Graph, Node};
use crate::primitives::{MAX_PATH_COUNT, MAX_PATH_LENGTH};
use crate::{IsaError, NodeId, Qualifier, TableKind};
use std::collections::BTreeMap;

/// Every end-to-end path of a graph, in enumeration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSet {
    paths: Vec<Vec<NodeId>>,
}

/// A memoized out-degree-1 run and the successors of its last node.
#[derive(Debug, Clone)]
struct Run {
    nodes: Vec<NodeId>,
    branches: Vec<NodeId>,
}

impl PathSet {
    /// Enumerate all paths.
    ///
    /// Fails when a cycle is met or a bound of `primitives` is exceeded.
    pub fn enumerate(graph: &Graph, kind: TableKind) -> Result<Self, IsaError> {
        let mut runs: BTreeMap<NodeId, Run> = BTreeMap::new();
        let mut paths: Vec<Vec<NodeId>> = Vec::new();
        let mut on_path = vec![false; graph.len()];

        for start in start_nodes(graph, kind) {
            let mut path: Vec<NodeId> = Vec::new();
            let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];
            while let Some((node, depth)) = stack.pop() {
                for left in path.drain(depth..) {
                    on_path[left.index()] = false;
                }
                let run = match runs.get(&node) {
                    Some(run) => run.clone(),
                    None => {
                        let run = follow(graph, node)?;
                        runs.insert(node, run.clone());
                        run
                    }
                };
                for &n in &run.nodes {
                    if on_path[n.index()] {
                        return Err(IsaError::IntegrityViolation(format!(
                            "graph contains a cycle through {n}"
                        )));
                    }
                    on_path[n.index()] = true;
                    path.push(n);
                }
                if path.len() > MAX_PATH_LENGTH {
                    return Err(IsaError::CapacityExceeded(format!(
                        "path longer than {MAX_PATH_LENGTH} nodes"
                    )));
                }
                if run.branches.is_empty() {
                    if paths.len() >= MAX_PATH_COUNT {
                        return Err(IsaError::CapacityExceeded(format!(
                            "more than {MAX_PATH_COUNT} paths"
                        )));
                    }
                    paths.push(path.clone());
                    continue;
                }
                let depth = path.len();
                stack.extend(run.branches.iter().rev().map(|&b| (b, depth)));
            }
            for left in path.drain(..) {
                on_path[left.index()] = false;
            }
        }

        tracing::debug!(paths = paths.len(), memoized = runs.len(), "paths enumerated");
        Ok(Self { paths })
    }

    /// Number of paths.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether there is no path.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Paths in enumeration order.
    pub fn iter(&self) -> impl Iterator<Item = &[NodeId]> {
        self.paths.iter().map(Vec::as_slice)
    }

    /// The path needing the most columns.
    ///
    /// Ties go to the longer path, then to the smallest handle sequence.
    #[must_use]
    pub fn longest(&self, graph: &Graph) -> Option<&[NodeId]> {
        self.paths
            .iter()
            .map(|p| (column_weight(graph, p), p))
            .max_by(|(wa, a), (wb, b)| {
                wa.cmp(wb)
                    .then(a.len().cmp(&b.len()))
                    .then_with(|| b.cmp(a))
            })
            .map(|(_, p)| p.as_slice())
    }
}

/// Roots, start kind first.
#[must_use]
pub fn start_nodes(graph: &Graph, kind: TableKind) -> Vec<NodeId> {
    let preferred = |node: &Node| match kind {
        TableKind::Study => matches!(node, Node::Source(_)),
        TableKind::Assay => matches!(node, Node::Sample(_)),
    };
    let roots: Vec<(NodeId, bool)> = graph
        .nodes()
        .filter(|(id, _)| graph.is_root(*id))
        .map(|(id, node)| (id, preferred(node)))
        .collect();
    roots
        .iter()
        .filter(|(_, p)| *p)
        .chain(roots.iter().filter(|(_, p)| !*p))
        .map(|(id, _)| *id)
        .collect()
}

/// Follow out-degree-1 successors from `start`.
fn follow(graph: &Graph, start: NodeId) -> Result<Run, IsaError> {
    let mut nodes = vec![start];
    let mut branches = graph.successors(start);
    while let [next] = branches.as_slice() {
        let next = *next;
        if nodes.contains(&next) {
            return Err(IsaError::IntegrityViolation(format!(
                "graph contains a cycle through {next}"
            )));
        }
        if nodes.len() > MAX_PATH_LENGTH {
            return Err(IsaError::CapacityExceeded(format!(
                "path longer than {MAX_PATH_LENGTH} nodes"
            )));
        }
        nodes.push(next);
        branches = graph.successors(next);
    }
    Ok(Run { nodes, branches })
}

/// Columns the nodes of a path need, value units at full width.
fn column_weight(graph: &Graph, path: &[NodeId]) -> usize {
    let width = |qs: &[Qualifier]| -> usize {
        qs.iter()
            .map(|q| ValueShape::of(&q.value, q.unit.as_ref()).width())
            .sum()
    };
    path.iter()
        .filter_map(|&id| graph.node(id).ok())
        .map(|node| {
            let run = node.as_process().map_or(0, |p| {
                width(&p.parameter_values)
                    + [&p.name, &p.date, &p.performer, &p.array_design_ref]
                        .iter()
                        .filter(|v| v.is_some())
                        .count()
            });
            1 + width(node.characteristics())
                + width(node.factor_values())
                + node.comments().len()
                + run
        })
        .sum()
}

// =============================================================================
// TESTS
// =============================================================================
