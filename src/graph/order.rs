//! Cycle detection and bring-up ordering.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::{Result, StartupError};

use super::DependencyDag;

/// Outcome of [`validate_dag`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DagValidation {
    pub valid: bool,
    /// Each cycle is the path from the first repeated node back to itself,
    /// e.g. `["a", "b", "a"]`. At most one cycle is reported per DFS root.
    pub cycles: Vec<Vec<String>>,
}

impl DagValidation {
    pub fn is_valid(&self) -> bool {
        self.valid
    }
}

/// Depth-first search from every unvisited node, following required edges.
///
/// A successor already on the current path closes a cycle; the search from
/// that root stops there and the next unvisited root is tried.
pub fn validate_dag(dag: &DependencyDag) -> DagValidation {
    let adjacency = required_successors(dag);
    let mut visited: HashSet<&str> = HashSet::new();
    let mut cycles = Vec::new();

    for node in dag.nodes() {
        if visited.contains(node.id.as_str()) {
            continue;
        }
        if let Some(cycle) = find_cycle(node.id.as_str(), &adjacency, &mut visited) {
            tracing::debug!(cycle = ?cycle, "dependency cycle detected");
            cycles.push(cycle);
        }
    }

    DagValidation {
        valid: cycles.is_empty(),
        cycles,
    }
}

/// Iterative DFS from `root`. Each stack frame is a node plus the index of
/// its next successor to visit, so chain depth never touches the call stack.
fn find_cycle<'a>(
    root: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
) -> Option<Vec<String>> {
    let mut stack: Vec<(&'a str, usize)> = vec![(root, 0)];
    let mut on_path: HashSet<&'a str> = HashSet::from([root]);
    visited.insert(root);

    while let Some((id, cursor)) = stack.last_mut() {
        let id = *id;
        let next = adjacency
            .get(id)
            .and_then(|successors| successors.get(*cursor))
            .copied();

        let Some(next) = next else {
            stack.pop();
            on_path.remove(id);
            continue;
        };
        *cursor += 1;

        if on_path.contains(next) {
            let start = stack.iter().position(|(step, _)| *step == next).unwrap_or(0);
            let mut cycle: Vec<String> = stack[start..]
                .iter()
                .map(|(step, _)| step.to_string())
                .collect();
            cycle.push(next.to_string());
            return Some(cycle);
        }
        if visited.insert(next) {
            on_path.insert(next);
            stack.push((next, 0));
        }
    }

    None
}

/// Kahn's algorithm over required edges.
///
/// Zero in-degree nodes are seeded in insertion order and the queue is FIFO,
/// so identical input always yields the identical order. Fails with
/// [`StartupError::Unorderable`] rather than returning a partial order when a
/// cycle or a dangling dependency keeps some node from reaching in-degree 0.
pub fn topological_sort(dag: &DependencyDag) -> Result<Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = HashMap::with_capacity(dag.len());
    for id in dag.ids() {
        if in_degree.insert(id, 0).is_some() {
            return Err(StartupError::DuplicateService(id.to_string()));
        }
    }

    let mut successors: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in dag.edges().iter().filter(|edge| edge.is_required()) {
        if let Some(degree) = in_degree.get_mut(edge.to.as_str()) {
            *degree += 1;
        }
        successors
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
    }

    let mut queue: VecDeque<&str> = dag
        .ids()
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(dag.len());

    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());
        let Some(next) = successors.get(id) else {
            continue;
        };
        for &succ in next {
            if let Some(degree) = in_degree.get_mut(succ) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(succ);
                }
            }
        }
    }

    if order.len() < dag.len() {
        return Err(StartupError::Unorderable {
            ordered: order.len(),
            total: dag.len(),
        });
    }

    Ok(order)
}

fn required_successors(dag: &DependencyDag) -> HashMap<&str, Vec<&str>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in dag.edges().iter().filter(|edge| edge.is_required()) {
        adjacency
            .entry(edge.from.as_str())
            .or_default()
            .push(edge.to.as_str());
    }
    adjacency
}
