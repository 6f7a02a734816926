//! Dependency views over a flat edge list.
//!
//! [`build_view`] scans the whole edge list on every call: O(E) per entity,
//! nothing retained between calls. When many views are needed over the same
//! large list, build a [`DependencyIndex`] once; it keeps a petgraph adjacency
//! structure and answers [`DependencyIndex::view`] with identical results.
//!
//! # Semantics
//!
//! - `using`: edges whose `id` is the entity, projected to the referenced side.
//! - `referenced`: edges whose `ref_id` is the entity, projected to the using side,
//!   tallied by type into `referenced_by_types`.
//! - An entity that both uses and is used by the same peer shows it in both
//!   lists. Nothing is de-duplicated; order follows the edge list.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;

use crate::types::{DependencyEdge, DependencyView};

/// Compute the dependency view of `entity_id` by scanning `edges`.
pub fn build_view(edges: &[DependencyEdge], entity_id: &str) -> DependencyView {
    let mut view = DependencyView::default();
    for edge in edges {
        if edge.id == entity_id {
            view.using.push(edge.target());
        }
        if edge.ref_id == entity_id {
            view.referenced.push(edge.source());
            *view
                .referenced_by_types
                .entry(edge.kind.clone())
                .or_insert(0) += 1;
        }
    }
    view
}

/// Pre-indexed adjacency over an edge list.
///
/// Nodes are entity ids; each graph edge carries the position of its source
/// row so views keep edge-list order.
pub struct DependencyIndex {
    graph: DiGraph<String, usize>,
    node_map: HashMap<String, NodeIndex>,
    edges: Vec<DependencyEdge>,
}

impl DependencyIndex {
    /// Build the index in one pass over `edges`.
    pub fn from_edges(edges: Vec<DependencyEdge>) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map: HashMap<String, NodeIndex> = HashMap::new();

        for (position, edge) in edges.iter().enumerate() {
            let src = *node_map
                .entry(edge.id.clone())
                .or_insert_with(|| graph.add_node(edge.id.clone()));
            let dst = *node_map
                .entry(edge.ref_id.clone())
                .or_insert_with(|| graph.add_node(edge.ref_id.clone()));
            graph.add_edge(src, dst, position);
        }

        Self {
            graph,
            node_map,
            edges,
        }
    }

    /// Same result as [`build_view`] over the indexed edges.
    pub fn view(&self, entity_id: &str) -> DependencyView {
        let mut view = DependencyView::default();
        let node = match self.node_map.get(entity_id) {
            Some(&idx) => idx,
            None => return view,
        };

        for position in self.positions(node, Direction::Outgoing) {
            view.using.push(self.edges[position].target());
        }
        for position in self.positions(node, Direction::Incoming) {
            let edge = &self.edges[position];
            view.referenced.push(edge.source());
            *view
                .referenced_by_types
                .entry(edge.kind.clone())
                .or_insert(0) += 1;
        }
        view
    }

    /// Edge-list positions touching `node` in `direction`, in list order.
    fn positions(&self, node: NodeIndex, direction: Direction) -> Vec<usize> {
        let mut positions: Vec<usize> = self
            .graph
            .edges_directed(node, direction)
            .map(|edge| *edge.weight())
            .collect();
        positions.sort_unstable();
        positions
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn has_node(&self, entity_id: &str) -> bool {
        self.node_map.contains_key(entity_id)
    }
}
