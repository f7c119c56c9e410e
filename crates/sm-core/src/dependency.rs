//! Dependency index: derived edges between model objects
//!
//! An edge `A -> B` means "the formulas of A reference B". Edges are never
//! authored: [`DependencyIndex::recompute`] replaces every outgoing edge of an
//! object with whatever the analyzer reported for its current formulas, and
//! [`DependencyIndex::remove`] drops an object together with all of its edges.

use crate::object::ObjectId;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Bidirectional view over the dependency edges of a model
#[derive(Debug, Default)]
pub struct DependencyIndex {
    /// Edge direction: dependent -> dependency
    graph: StableDiGraph<ObjectId, ()>,

    /// Map from object id to node index
    node_map: HashMap<ObjectId, NodeIndex>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn node(&mut self, id: ObjectId) -> NodeIndex {
        if let Some(&idx) = self.node_map.get(&id) {
            idx
        } else {
            let idx = self.graph.add_node(id);
            self.node_map.insert(id, idx);
            idx
        }
    }

    /// Replace all outgoing edges of `source` with edges to `targets`.
    ///
    /// Self references are kept. Returns `true` if the edge set changed.
    pub fn recompute(&mut self, source: ObjectId, targets: &BTreeSet<ObjectId>) -> bool {
        if self.depends_on_set(source) == *targets {
            return false;
        }

        let idx = self.node(source);
        let stale: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in stale {
            self.graph.remove_edge(edge);
        }

        for target in targets {
            let target_idx = self.node(*target);
            self.graph.add_edge(idx, target_idx, ());
        }

        log::debug!(
            "Dependencies of {} recomputed: {} edge(s)",
            source,
            targets.len()
        );
        true
    }

    /// Drop `id` and every edge in which it is source or target.
    ///
    /// Callers gate deletion on [`referenced_by`](Self::referenced_by) first.
    pub fn remove(&mut self, id: ObjectId) -> bool {
        match self.node_map.remove(&id) {
            Some(idx) => {
                self.graph.remove_node(idx);
                true
            }
            None => false,
        }
    }

    /// Objects `id` depends on. Borrows the index, so it can never go stale.
    pub fn depends_on(&self, id: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Objects that depend on `id`
    pub fn referenced_by(&self, id: ObjectId) -> impl Iterator<Item = ObjectId> + '_ {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: ObjectId, direction: Direction) -> impl Iterator<Item = ObjectId> + '_ {
        self.node_map
            .get(&id)
            .into_iter()
            .flat_map(move |&idx| self.graph.neighbors_directed(idx, direction))
            .map(move |n| self.graph[n])
    }

    /// Sorted snapshot of [`depends_on`](Self::depends_on)
    pub fn depends_on_set(&self, id: ObjectId) -> BTreeSet<ObjectId> {
        self.depends_on(id).collect()
    }

    /// Sorted snapshot of [`referenced_by`](Self::referenced_by)
    pub fn referenced_by_set(&self, id: ObjectId) -> BTreeSet<ObjectId> {
        self.referenced_by(id).collect()
    }

    pub fn has_edge(&self, from: ObjectId, to: ObjectId) -> bool {
        match (self.node_map.get(&from), self.node_map.get(&to)) {
            (Some(&a), Some(&b)) => self.graph.contains_edge(a, b),
            _ => false,
        }
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Every edge as `(dependent, dependency)`, sorted
    pub fn edges(&self) -> BTreeSet<(ObjectId, ObjectId)> {
        self.graph
            .edge_references()
            .map(|e| (self.graph[e.source()], self.graph[e.target()]))
            .collect()
    }

    /// Transitive dependencies up to `max_depth` hops, nearest first
    pub fn all_dependencies(&self, id: ObjectId, max_depth: usize) -> Vec<ObjectId> {
        self.traverse_bfs_bounded(id, Direction::Outgoing, max_depth)
    }

    /// Transitive dependents up to `max_depth` hops, nearest first
    pub fn all_referencers(&self, id: ObjectId, max_depth: usize) -> Vec<ObjectId> {
        self.traverse_bfs_bounded(id, Direction::Incoming, max_depth)
    }

    /// BFS from `id` in `direction`; neighbors of a node are visited in id order.
    fn traverse_bfs_bounded(&self, id: ObjectId, direction: Direction, max_depth: usize) -> Vec<ObjectId> {
        let mut result = Vec::new();
        let mut visited = HashSet::new();
        visited.insert(id);
        let mut queue = VecDeque::new();
        queue.push_back((id, 0usize));

        while let Some((current, depth)) = queue.pop_front() {
            if depth >= max_depth {
                continue;
            }
            let neighbors: BTreeSet<ObjectId> = self.neighbors(current, direction).collect();
            for neighbor in neighbors {
                if visited.insert(neighbor) {
                    result.push(neighbor);
                    queue.push_back((neighbor, depth + 1));
                }
            }
        }

        result
    }

    /// Shortest dependency cycle through `id`, as `[id, .., id]`.
    ///
    /// A direct self reference is not a cycle: formulas may legitimately
    /// reference their own object.
    pub fn circular_path(&self, id: ObjectId) -> Option<Vec<ObjectId>> {
        let mut parent: HashMap<ObjectId, ObjectId> = HashMap::new();
        let mut queue = VecDeque::new();
        queue.push_back(id);

        while let Some(current) = queue.pop_front() {
            let neighbors: BTreeSet<ObjectId> = self.depends_on(current).collect();
            for next in neighbors {
                if next == current {
                    continue;
                }
                if next == id {
                    let mut path = Vec::new();
                    let mut node = current;
                    while node != id {
                        path.push(node);
                        match parent.get(&node) {
                            Some(&p) => node = p,
                            None => break,
                        }
                    }
                    path.push(id);
                    path.reverse();
                    path.push(id);
                    return Some(path);
                }
                if !parent.contains_key(&next) {
                    parent.insert(next, current);
                    queue.push_back(next);
                }
            }
        }
        None
    }
}

#[cfg(test)]
#[path = "dependency_test.rs"]
mod tests;
