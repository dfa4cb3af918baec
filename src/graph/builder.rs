//! Graph construction module

use crate::error::{Error, Result};
use crate::graph::weighted::{WeightedEdge, WeightedGraph};
use std::collections::{HashMap, HashSet};

/// Builder for incrementally constructing a WeightedGraph
pub struct GraphBuilder {
    /// Mapping from string IDs to node indices
    id_to_index: HashMap<String, u32>,

    /// Node string IDs
    node_ids: Vec<String>,

    /// Edges in insertion order
    edges: Vec<WeightedEdge>,

    /// Normalized (low, high) endpoint pairs already added
    seen_pairs: HashSet<(u32, u32)>,
}

impl GraphBuilder {
    /// Create a new graph builder with the given capacity
    pub fn with_capacity(node_capacity: usize, edge_capacity: usize) -> Self {
        Self {
            id_to_index: HashMap::with_capacity(node_capacity),
            node_ids: Vec::with_capacity(node_capacity),
            edges: Vec::with_capacity(edge_capacity),
            seen_pairs: HashSet::with_capacity(edge_capacity),
        }
    }

    /// Get or create a node ID for the given string ID
    pub fn get_or_create_node(&mut self, id: &str) -> u32 {
        if let Some(&idx) = self.id_to_index.get(id) {
            return idx;
        }

        let idx = self.node_ids.len() as u32;
        self.id_to_index.insert(id.to_string(), idx);
        self.node_ids.push(id.to_string());

        idx
    }

    /// Register a node that may have no edges
    pub fn add_node(&mut self, id: &str) {
        self.get_or_create_node(id);
    }

    /// Add an undirected weighted edge
    pub fn add_edge(&mut self, src_id: &str, dst_id: &str, weight: f64) -> Result<()> {
        if !weight.is_finite() || weight < 0.0 {
            return Err(Error::InvalidWeight {
                node_a: src_id.to_string(),
                node_b: dst_id.to_string(),
                weight,
            });
        }
        if src_id == dst_id {
            return Err(Error::InvalidInput(format!("self loop on node '{}'", src_id)));
        }

        let src = self.get_or_create_node(src_id);
        let dst = self.get_or_create_node(dst_id);

        let pair = if src < dst { (src, dst) } else { (dst, src) };
        if !self.seen_pairs.insert(pair) {
            return Err(Error::DuplicateEdge {
                node_a: src_id.to_string(),
                node_b: dst_id.to_string(),
            });
        }

        self.edges.push(WeightedEdge {
            source: src,
            target: dst,
            weight,
        });

        Ok(())
    }

    /// Build the immutable weighted graph
    pub fn build(self) -> Result<WeightedGraph> {
        if self.edges.is_empty() {
            return Err(Error::InvalidInput("graph has no edges".to_string()));
        }

        // Weight distribution is fixed once for every later quantile lookup
        let mut sorted_weights: Vec<f64> = self.edges.iter().map(|e| e.weight).collect();
        sorted_weights.sort_by(|a, b| a.total_cmp(b));

        Ok(WeightedGraph {
            node_ids: self.node_ids,
            id_to_index: self.id_to_index,
            edges: self.edges,
            sorted_weights,
        })
    }
}
