//! Partitioning oracle consumed by the threshold sweep
//!
//! The sweep treats community detection as a black box: given a filtered
//! graph, an optional seed assignment and a resolution, the oracle returns a
//! community label for every node. [`Louvain`] is the bundled oracle.
//!
//! ## Louvain (Blondel et al. 2008)
//!
//! 1. **Local moving**: nodes move to the neighboring community with the
//!    best modularity gain until no move improves the partition. On the
//!    first level nodes start in their seed community.
//! 2. **Aggregation**: communities become nodes of a weighted meta-graph,
//!    internal weight becomes self-loops.
//! 3. Repeat from singletons on the meta-graph until modularity stops
//!    improving.

use crate::cluster::{Assignment, CommunityLabel};
use crate::error::{Error, Result};
use petgraph::graph::UnGraph;
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};

/// Community detection used at every sweep step
pub trait PartitionOracle: Send + Sync {
    /// Label every node of `graph`, indexed by node index.
    ///
    /// Must be deterministic for identical graph, seed, resolution and
    /// random state.
    fn partition(
        &self,
        graph: &UnGraph<String, f64>,
        seed: Option<&Assignment>,
        resolution: f64,
        random_state: u64,
    ) -> Result<Vec<CommunityLabel>>;
}

/// Weighted graph of one aggregation level
struct Level {
    /// (neighbor, weight), self-loops excluded
    adjacency: Vec<Vec<(usize, f64)>>,
    self_loops: Vec<f64>,
}

impl Level {
    fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Weighted degree, self-loops counted twice
    fn degrees(&self) -> Vec<f64> {
        self.adjacency
            .iter()
            .zip(&self.self_loops)
            .map(|(neighbors, sl)| neighbors.iter().map(|&(_, w)| w).sum::<f64>() + 2.0 * sl)
            .collect()
    }

    fn total_weight(&self) -> f64 {
        self.degrees().iter().sum::<f64>() / 2.0
    }
}

/// Louvain modularity optimization
#[derive(Debug, Clone)]
pub struct Louvain {
    /// Maximum local-moving passes per level
    max_iter: usize,
    /// Maximum aggregation levels
    max_levels: usize,
    /// Minimum modularity improvement to continue
    min_modularity_gain: f64,
    /// Shuffle the node visiting order with the random state
    randomize: bool,
}

impl Louvain {
    pub fn new() -> Self {
        Self {
            max_iter: 100,
            max_levels: 32,
            min_modularity_gain: 1e-7,
            randomize: false,
        }
    }

    /// Visit nodes in an order shuffled from the random state
    pub fn with_randomize(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    fn modularity(level: &Level, communities: &[usize], resolution: f64) -> f64 {
        let m = level.total_weight();
        if m == 0.0 {
            return 0.0;
        }

        let degrees = level.degrees();
        let n_comms = communities.iter().copied().max().map_or(0, |c| c + 1);
        let mut internal = vec![0.0; n_comms];
        let mut totals = vec![0.0; n_comms];

        for (i, neighbors) in level.adjacency.iter().enumerate() {
            let ci = communities[i];
            totals[ci] += degrees[i];
            internal[ci] += level.self_loops[i];
            for &(j, w) in neighbors {
                // each edge is listed from both ends
                if i < j && communities[j] == ci {
                    internal[ci] += w;
                }
            }
        }

        internal
            .iter()
            .zip(&totals)
            .map(|(inc, tot)| inc / m - resolution * (tot / (2.0 * m)).powi(2))
            .sum()
    }

    /// Phase 1: greedy local moving from `communities`
    fn local_moving(
        &self,
        level: &Level,
        mut communities: Vec<usize>,
        order: &[usize],
        resolution: f64,
    ) -> Vec<usize> {
        let m = level.total_weight();
        if m == 0.0 {
            return communities;
        }

        let degrees = level.degrees();
        let mut totals = vec![0.0; level.node_count()];
        for (i, &c) in communities.iter().enumerate() {
            totals[c] += degrees[i];
        }

        for _ in 0..self.max_iter {
            let mut moved = false;

            for &node in order {
                let current = communities[node];
                let ki = degrees[node];

                // BTreeMap keeps candidate communities in a stable order
                let mut links: BTreeMap<usize, f64> = BTreeMap::new();
                for &(neighbor, w) in &level.adjacency[node] {
                    *links.entry(communities[neighbor]).or_insert(0.0) += w;
                }

                totals[current] -= ki;
                let gain = |comm: usize, w_in: f64| w_in - resolution * totals[comm] * ki / (2.0 * m);

                let mut best = current;
                let mut best_gain = gain(current, links.get(&current).copied().unwrap_or(0.0));
                for (&comm, &w_in) in &links {
                    if comm == current {
                        continue;
                    }
                    let g = gain(comm, w_in);
                    if g > best_gain {
                        best_gain = g;
                        best = comm;
                    }
                }

                totals[best] += ki;
                if best != current {
                    communities[node] = best;
                    moved = true;
                }
            }

            if !moved {
                break;
            }
        }

        communities
    }

    /// Phase 2: contract communities into a meta-graph
    fn aggregate(level: &Level, communities: &[usize]) -> Level {
        let n_new = communities.iter().copied().max().map_or(0, |c| c + 1);
        let mut self_loops = vec![0.0; n_new];
        let mut links: BTreeMap<(usize, usize), f64> = BTreeMap::new();

        for (i, neighbors) in level.adjacency.iter().enumerate() {
            let ci = communities[i];
            self_loops[ci] += level.self_loops[i];
            for &(j, w) in neighbors {
                if i >= j {
                    continue;
                }
                let cj = communities[j];
                if ci == cj {
                    self_loops[ci] += w;
                } else {
                    *links.entry((ci.min(cj), ci.max(cj))).or_insert(0.0) += w;
                }
            }
        }

        let mut adjacency = vec![Vec::new(); n_new];
        for ((a, b), w) in links {
            adjacency[a].push((b, w));
            adjacency[b].push((a, w));
        }

        Level {
            adjacency,
            self_loops,
        }
    }

    fn visiting_order(&self, n: usize, rng: &mut StdRng) -> Vec<usize> {
        let mut order: Vec<usize> = (0..n).collect();
        if self.randomize {
            order.shuffle(rng);
        }
        order
    }
}

impl Default for Louvain {
    fn default() -> Self {
        Self::new()
    }
}

/// Renumber labels to 0..k in order of first appearance
fn renumber(labels: &[usize]) -> Vec<usize> {
    let mut mapping: HashMap<usize, usize> = HashMap::new();
    labels
        .iter()
        .map(|&label| {
            let next = mapping.len();
            *mapping.entry(label).or_insert(next)
        })
        .collect()
}

impl PartitionOracle for Louvain {
    fn partition(
        &self,
        graph: &UnGraph<String, f64>,
        seed: Option<&Assignment>,
        resolution: f64,
        random_state: u64,
    ) -> Result<Vec<CommunityLabel>> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(Error::invalid_parameter(
                "resolution",
                format!("must be a positive number, got {}", resolution),
            ));
        }

        let n = graph.node_count();
        if n == 0 {
            return Ok(Vec::new());
        }

        let mut adjacency = vec![Vec::new(); n];
        let mut self_loops = vec![0.0; n];
        for edge in graph.edge_references() {
            let (i, j, w) = (edge.source().index(), edge.target().index(), *edge.weight());
            if i == j {
                self_loops[i] += w;
            } else {
                adjacency[i].push((j, w));
                adjacency[j].push((i, w));
            }
        }
        let mut level = Level {
            adjacency,
            self_loops,
        };

        // Seeded nodes start together, unseeded nodes start alone
        let initial: Vec<usize> = {
            let raw: Vec<(bool, usize)> = graph
                .node_indices()
                .map(|idx| match seed.and_then(|s| s.get(&graph[idx])) {
                    Some(&label) => (true, label as usize),
                    None => (false, idx.index()),
                })
                .collect();
            let mut mapping: HashMap<(bool, usize), usize> = HashMap::new();
            raw.into_iter()
                .map(|key| {
                    let next = mapping.len();
                    *mapping.entry(key).or_insert(next)
                })
                .collect()
        };

        let mut rng = StdRng::seed_from_u64(random_state);
        let order = self.visiting_order(n, &mut rng);
        let first = renumber(&self.local_moving(&level, initial, &order, resolution));
        let mut modularity = Self::modularity(&level, &first, resolution);
        let mut dendrogram = vec![first];

        for _ in 1..self.max_levels {
            let Some(last) = dendrogram.last() else {
                break;
            };
            level = Self::aggregate(&level, last);
            let n_level = level.node_count();

            let order = self.visiting_order(n_level, &mut rng);
            let partition = renumber(&self.local_moving(
                &level,
                (0..n_level).collect(),
                &order,
                resolution,
            ));
            let new_modularity = Self::modularity(&level, &partition, resolution);
            if new_modularity - modularity < self.min_modularity_gain {
                break;
            }
            modularity = new_modularity;
            dendrogram.push(partition);
        }

        // Expand the top level back down to the original nodes
        let mut labels: Vec<usize> = (0..n).collect();
        for partition in &dendrogram {
            for label in labels.iter_mut() {
                *label = partition[*label];
            }
        }

        Ok(renumber(&labels)
            .into_iter()
            .map(|label| label as CommunityLabel)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_from(edges: &[(&str, &str, f64)]) -> UnGraph<String, f64> {
        let mut graph = UnGraph::new_undirected();
        let mut index = HashMap::new();
        for &(a, b, w) in edges {
            let ia = *index
                .entry(a)
                .or_insert_with(|| graph.add_node(a.to_string()));
            let ib = *index
                .entry(b)
                .or_insert_with(|| graph.add_node(b.to_string()));
            graph.add_edge(ia, ib, w);
        }
        graph
    }

    #[test]
    fn test_louvain_two_cliques() {
        let graph = graph_from(&[
            ("a0", "a1", 1.0),
            ("a1", "a2", 1.0),
            ("a0", "a2", 1.0),
            ("b0", "b1", 1.0),
            ("b1", "b2", 1.0),
            ("b0", "b2", 1.0),
            ("a2", "b0", 0.1),
        ]);

        let labels = Louvain::new().partition(&graph, None, 1.0, 0).unwrap();
        assert_eq!(labels.len(), 6);
        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], labels[4]);
        assert_eq!(labels[4], labels[5]);
        assert_ne!(labels[0], labels[3]);
        // labels numbered by first appearance
        assert_eq!(labels[0], 0);
    }

    #[test]
    fn test_louvain_disjoint_pairs() {
        let graph = graph_from(&[("A", "B", 0.9), ("C", "D", 0.1)]);
        let labels = Louvain::new().partition(&graph, None, 1.0, 0).unwrap();
        assert_eq!(labels, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_louvain_is_deterministic() {
        let graph = graph_from(&[
            ("a", "b", 0.3),
            ("b", "c", 0.8),
            ("c", "d", 0.5),
            ("d", "a", 0.2),
            ("c", "e", 0.9),
        ]);
        let louvain = Louvain::new().with_randomize(true);
        let first = louvain.partition(&graph, None, 1.0, 7).unwrap();
        let second = louvain.partition(&graph, None, 1.0, 7).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_louvain_empty_and_edgeless() {
        let empty = UnGraph::<String, f64>::new_undirected();
        assert!(Louvain::new().partition(&empty, None, 1.0, 0).unwrap().is_empty());

        let mut lonely = UnGraph::<String, f64>::new_undirected();
        lonely.add_node("x".to_string());
        lonely.add_node("y".to_string());
        let labels = Louvain::new().partition(&lonely, None, 1.0, 0).unwrap();
        assert_eq!(labels, vec![0, 1]);
    }

    #[test]
    fn test_louvain_accepts_seed() {
        let graph = graph_from(&[("a", "b", 1.0), ("c", "d", 1.0)]);
        let seed: Assignment = [("a", 5), ("b", 5), ("c", 9), ("d", 9)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        let labels = Louvain::new().partition(&graph, Some(&seed), 1.0, 0).unwrap();
        assert_eq!(labels, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_louvain_rejects_bad_resolution() {
        let graph = graph_from(&[("a", "b", 1.0)]);
        assert!(Louvain::new().partition(&graph, None, 0.0, 0).is_err());
    }
}
