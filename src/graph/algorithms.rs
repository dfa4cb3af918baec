//! Graph metrics computed on the subgraph induced by a group of nodes

use crate::graph::FilteredGraph;
use petgraph::visit::EdgeRef;
use statrs::statistics::Statistics;
use std::collections::HashMap;

/// Metrics of one induced subgraph
///
/// Every field is `None` when the measure is undefined for the subgraph
/// (no members, fewer than two members for density, no edges or constant
/// degrees for assortativity).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InducedMetrics {
    pub weighted_clustering: Option<f64>,
    pub unweighted_clustering: Option<f64>,
    pub density: Option<f64>,
    pub weighted_assortativity: Option<f64>,
    pub unweighted_assortativity: Option<f64>,
}

/// Adjacency of an induced subgraph over local member positions
struct InducedSubgraph {
    /// Sorted (neighbor, weight) lists
    adjacency: Vec<Vec<(usize, f64)>>,
    /// Weight per normalized (low, high) pair
    weights: HashMap<(usize, usize), f64>,
}

impl InducedSubgraph {
    fn build(view: &FilteredGraph, members: &[String]) -> Self {
        let position: HashMap<&str, usize> = members
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut adjacency = vec![Vec::new(); members.len()];
        let mut weights = HashMap::new();

        for (i, id) in members.iter().enumerate() {
            // Members missing from the view are isolated in the subgraph
            let Some(node) = view.node_index(id) else {
                continue;
            };
            for edge in view.graph().edges(node) {
                let other = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                if let Some(&j) = position.get(view.node_id(other)) {
                    adjacency[i].push((j, *edge.weight()));
                    weights.insert((i.min(j), i.max(j)), *edge.weight());
                }
            }
        }
        for list in &mut adjacency {
            list.sort_by_key(|&(j, _)| j);
        }

        Self { adjacency, weights }
    }

    fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    fn edge_count(&self) -> usize {
        self.weights.len()
    }

    fn weight(&self, a: usize, b: usize) -> Option<f64> {
        self.weights.get(&(a.min(b), a.max(b))).copied()
    }
}

/// Compute every metric for the subgraph of `view` induced by `members`
pub fn induced_metrics(view: &FilteredGraph, members: &[String]) -> InducedMetrics {
    if members.is_empty() {
        return InducedMetrics::default();
    }

    let sub = InducedSubgraph::build(view, members);

    InducedMetrics {
        weighted_clustering: Some(average_clustering(&sub, true)),
        unweighted_clustering: Some(average_clustering(&sub, false)),
        density: density(&sub),
        weighted_assortativity: degree_assortativity(&sub, true),
        unweighted_assortativity: degree_assortativity(&sub, false),
    }
}

/// Actual edges / possible undirected pairs, undefined below two nodes
fn density(sub: &InducedSubgraph) -> Option<f64> {
    let n = sub.node_count();
    if n < 2 {
        return None;
    }
    let possible = n * (n - 1) / 2;
    Some(sub.edge_count() as f64 / possible as f64)
}

/// Mean local clustering coefficient over all nodes
///
/// The weighted variant scores each triangle by the geometric mean of its
/// edge weights, normalized by the largest weight in the subgraph.
fn average_clustering(sub: &InducedSubgraph, weighted: bool) -> f64 {
    let max_weight = sub.weights.values().copied().fold(0.0_f64, f64::max);

    let total: f64 = (0..sub.node_count())
        .map(|i| {
            let neighbors = &sub.adjacency[i];
            let degree = neighbors.len();
            if degree < 2 {
                return 0.0;
            }

            let mut score = 0.0;
            for (a, &(j, w_ij)) in neighbors.iter().enumerate() {
                for &(k, w_ik) in &neighbors[a + 1..] {
                    let Some(w_jk) = sub.weight(j, k) else {
                        continue;
                    };
                    score += if weighted && max_weight > 0.0 {
                        ((w_ij / max_weight) * (w_ik / max_weight) * (w_jk / max_weight)).cbrt()
                    } else {
                        1.0
                    };
                }
            }

            2.0 * score / (degree * (degree - 1)) as f64
        })
        .sum();

    total / sub.node_count() as f64
}

/// Pearson correlation of the degrees at either end of every edge
fn degree_assortativity(sub: &InducedSubgraph, weighted: bool) -> Option<f64> {
    if sub.edge_count() == 0 {
        return None;
    }

    let degrees: Vec<f64> = sub
        .adjacency
        .iter()
        .map(|neighbors| {
            if weighted {
                neighbors.iter().map(|&(_, w)| w).sum()
            } else {
                neighbors.len() as f64
            }
        })
        .collect();

    // Each undirected edge contributes both orientations
    let mut xs = Vec::with_capacity(2 * sub.edge_count());
    let mut ys = Vec::with_capacity(2 * sub.edge_count());
    for (i, neighbors) in sub.adjacency.iter().enumerate() {
        for &(j, _) in neighbors {
            xs.push(degrees[i]);
            ys.push(degrees[j]);
        }
    }

    let covariance = xs.iter().covariance(ys.iter());
    let sx = xs.iter().std_dev();
    let sy = ys.iter().std_dev();
    let r = covariance / (sx * sy);
    r.is_finite().then_some(r)
}
