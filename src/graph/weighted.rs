//! Weighted similarity graph and its per-threshold filtered views

use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::HashMap;

/// One undirected similarity edge between two node indices
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedEdge {
    pub source: u32,
    pub target: u32,
    pub weight: f64,
}

/// Immutable base graph: string node ids and weighted undirected edges
///
/// Built once by [`GraphBuilder`](crate::graph::GraphBuilder) and shared
/// read-only across every sweep step.
#[derive(Debug, Clone)]
pub struct WeightedGraph {
    pub(crate) node_ids: Vec<String>,
    pub(crate) id_to_index: HashMap<String, u32>,
    pub(crate) edges: Vec<WeightedEdge>,
    /// Every edge weight, ascending
    pub(crate) sorted_weights: Vec<f64>,
}

impl WeightedGraph {
    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_id(&self, idx: u32) -> Option<&str> {
        self.node_ids.get(idx as usize).map(|s| s.as_str())
    }

    pub fn index_of(&self, id: &str) -> Option<u32> {
        self.id_to_index.get(id).copied()
    }

    pub fn node_ids(&self) -> &[String] {
        &self.node_ids
    }

    /// Edge weight at quantile `q` of the full weight distribution
    ///
    /// Linear interpolation between the two closest ranks, position
    /// `q * (n - 1)`. `q` is clamped to `[0, 1]`.
    pub fn weight_quantile(&self, q: f64) -> f64 {
        let weights = &self.sorted_weights;
        let last = weights.len() - 1;
        let pos = q.clamp(0.0, 1.0) * last as f64;
        let lo = pos.floor() as usize;
        let hi = pos.ceil() as usize;
        if lo == hi {
            return weights[lo];
        }
        weights[lo] + (weights[hi] - weights[lo]) * (pos - lo as f64)
    }

    /// Build the view holding only edges with weight >= threshold
    ///
    /// Nodes are the endpoints of surviving edges, in first-seen edge order.
    pub fn filtered(&self, threshold: f64) -> FilteredGraph {
        let mut graph = UnGraph::<String, f64>::new_undirected();
        let mut index: HashMap<String, NodeIndex> = HashMap::new();

        for edge in self.edges.iter().filter(|e| e.weight >= threshold) {
            let a = self.view_node(&mut graph, &mut index, edge.source);
            let b = self.view_node(&mut graph, &mut index, edge.target);
            graph.add_edge(a, b, edge.weight);
        }

        FilteredGraph {
            threshold,
            graph,
            index,
        }
    }

    /// View over every edge of the graph
    pub fn unfiltered(&self) -> FilteredGraph {
        self.filtered(f64::NEG_INFINITY)
    }

    fn view_node(
        &self,
        graph: &mut UnGraph<String, f64>,
        index: &mut HashMap<String, NodeIndex>,
        node: u32,
    ) -> NodeIndex {
        let id = &self.node_ids[node as usize];
        if let Some(&idx) = index.get(id) {
            return idx;
        }
        let idx = graph.add_node(id.clone());
        index.insert(id.clone(), idx);
        idx
    }
}

/// Threshold-filtered undirected view of a [`WeightedGraph`]
#[derive(Debug, Clone)]
pub struct FilteredGraph {
    pub threshold: f64,
    graph: UnGraph<String, f64>,
    index: HashMap<String, NodeIndex>,
}

impl FilteredGraph {
    pub fn graph(&self) -> &UnGraph<String, f64> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Node id stored at a petgraph index
    pub fn node_id(&self, idx: NodeIndex) -> &str {
        &self.graph[idx]
    }
}

#[cfg(test)]
mod tests {
    use crate::graph::GraphBuilder;

    fn sample() -> crate::graph::WeightedGraph {
        let mut builder = GraphBuilder::with_capacity(5, 4);
        builder.add_edge("a", "b", 0.9).unwrap();
        builder.add_edge("c", "d", 0.1).unwrap();
        builder.add_edge("b", "c", 0.5).unwrap();
        builder.add_edge("d", "e", 0.3).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_weight_quantile_interpolates() {
        let graph = sample();
        // sorted: 0.1, 0.3, 0.5, 0.9
        assert!((graph.weight_quantile(0.0) - 0.1).abs() < 1e-12);
        assert!((graph.weight_quantile(1.0) - 0.9).abs() < 1e-12);
        // pos = 1.5 -> halfway between 0.3 and 0.5
        assert!((graph.weight_quantile(0.5) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_filtered_keeps_heavy_edges_only() {
        let graph = sample();
        let view = graph.filtered(0.5);
        assert_eq!(view.edge_count(), 2);
        assert_eq!(view.node_count(), 3);
        assert!(view.node_index("a").is_some());
        assert!(view.node_index("e").is_none());

        // base graph untouched
        assert_eq!(graph.edge_count(), 4);
        assert_eq!(graph.unfiltered().edge_count(), 4);
    }

    #[test]
    fn test_filtered_above_max_is_empty() {
        let graph = sample();
        let view = graph.filtered(2.0);
        assert_eq!(view.node_count(), 0);
        assert_eq!(view.edge_count(), 0);
    }
}
