//! Service dependency graph.
//!
//! [`build_dag`] turns the caller's [`ServiceNode`] list into a
//! [`DependencyDag`] without judging it. [`validate_dag`] looks for cycles and
//! [`topological_sort`] produces the deterministic bring-up order.
//!
//! Edges point from the dependency to the dependent: `db -> api` means `api`
//! waits for `db`.

mod order;

pub use order::{topological_sort, validate_dag, DagValidation};

use serde::{Deserialize, Serialize};

use crate::service::ServiceNode;

/// Whether an edge takes part in ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Counted for in-degree, ordering, cycle detection and the health gate.
    Required,
    /// Informational only.
    Optional,
}

/// Directed relation: `to` depends on `from` being healthy first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

impl DependencyEdge {
    pub fn is_required(&self) -> bool {
        self.kind == EdgeKind::Required
    }
}

/// The node set plus the edges derived from it.
///
/// Built fresh for every run and never mutated afterwards; there are no
/// setters, only [`build_dag`].
#[derive(Debug, Clone)]
pub struct DependencyDag {
    nodes: Vec<ServiceNode>,
    edges: Vec<DependencyEdge>,
}

impl DependencyDag {
    /// Nodes in the order the caller supplied them.
    pub fn nodes(&self) -> &[ServiceNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Look up a node by id.
    pub fn node(&self, id: &str) -> Option<&ServiceNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node(id).is_some()
    }

    /// Node ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| node.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Derive edges from each node's declared dependencies.
///
/// One `Required` edge `dep -> node` per entry in `dependencies`, one
/// `Optional` edge per entry in `optional_dependencies`. No validation
/// happens here so callers can inspect a broken graph before rejecting it.
pub fn build_dag(nodes: Vec<ServiceNode>) -> DependencyDag {
    let mut edges = Vec::new();
    for node in &nodes {
        for dep in &node.dependencies {
            edges.push(DependencyEdge {
                from: dep.clone(),
                to: node.id.clone(),
                kind: EdgeKind::Required,
            });
        }
        for dep in &node.optional_dependencies {
            edges.push(DependencyEdge {
                from: dep.clone(),
                to: node.id.clone(),
                kind: EdgeKind::Optional,
            });
        }
    }

    DependencyDag { nodes, edges }
}
