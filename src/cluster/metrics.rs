//! Per-group, per-threshold statistics along the group lineage

use crate::cluster::{GroupId, TrackedRecord};
use crate::graph::algorithms::induced_metrics;
use crate::graph::WeightedGraph;
use itertools::Itertools;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Network statistics of one group at one sweep step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    pub step: usize,
    pub quantile: f64,
    pub threshold: f64,
    pub group: GroupId,
    pub size: usize,
    pub weighted_clustering: Option<f64>,
    pub unweighted_clustering: Option<f64>,
    pub density: Option<f64>,
    pub weighted_assortativity: Option<f64>,
    pub unweighted_assortativity: Option<f64>,
    /// Size relative to the group's size at its first observed step
    pub size_fraction_of_initial: f64,
}

/// Summary of how long a group holds together as the threshold rises
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupCoordination {
    pub group: GroupId,
    /// Area under size fraction over quantile
    pub coordination: f64,
    pub max_size: usize,
}

/// Compute one row per (step, group) for every group seen so far
///
/// A group gets rows from the step where it first appears to the end of
/// the sweep; steps where it has no members carry size 0 and no metrics.
/// Groups of one step are measured in parallel.
pub fn aggregate_statistics(graph: &WeightedGraph, records: &[TrackedRecord]) -> Vec<GroupStats> {
    log::info!("Computing group statistics over {} steps", records.len());

    let mut labels: BTreeSet<GroupId> = BTreeSet::new();
    let mut rows: Vec<GroupStats> = Vec::new();

    for (i, record) in records.iter().enumerate() {
        labels.extend(record.coordinated_groups.keys().copied());
        let view = graph.filtered(record.threshold);

        log::debug!(
            "Processing threshold {} ({}/{}) with {} groups",
            record.threshold,
            i + 1,
            records.len(),
            labels.len()
        );

        let ids: Vec<GroupId> = labels.iter().copied().collect();
        let step_rows: Vec<GroupStats> = ids
            .par_iter()
            .map(|&group| {
                let members = record
                    .coordinated_groups
                    .get(&group)
                    .map(|m| m.as_slice())
                    .unwrap_or(&[]);
                let metrics = induced_metrics(&view, members);
                GroupStats {
                    step: record.step,
                    quantile: record.quantile,
                    threshold: record.threshold,
                    group,
                    size: members.len(),
                    weighted_clustering: metrics.weighted_clustering,
                    unweighted_clustering: metrics.unweighted_clustering,
                    density: metrics.density,
                    weighted_assortativity: metrics.weighted_assortativity,
                    unweighted_assortativity: metrics.unweighted_assortativity,
                    size_fraction_of_initial: 0.0,
                }
            })
            .collect();
        rows.extend(step_rows);
    }

    // The first row of each group is its most permissive observation
    let mut initial: HashMap<GroupId, usize> = HashMap::new();
    for row in &mut rows {
        let base = *initial.entry(row.group).or_insert(row.size);
        row.size_fraction_of_initial = if base > 0 {
            row.size as f64 / base as f64
        } else {
            0.0
        };
    }

    rows
}

/// Trapezoidal area of each group's size fraction over quantile
pub fn coordination_scores(rows: &[GroupStats]) -> Vec<GroupCoordination> {
    rows.iter()
        .into_group_map_by(|row| row.group)
        .into_iter()
        .sorted_by_key(|(group, _)| *group)
        .map(|(group, group_rows)| {
            let coordination = group_rows
                .iter()
                .tuple_windows()
                .map(|(a, b)| {
                    (b.quantile - a.quantile)
                        * (a.size_fraction_of_initial + b.size_fraction_of_initial)
                        / 2.0
                })
                .sum();
            let max_size = group_rows.iter().map(|row| row.size).max().unwrap_or(0);
            GroupCoordination {
                group,
                coordination,
                max_size,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::tracking::track_records;
    use crate::cluster::{RawPartition, SweepRecord};
    use crate::graph::GraphBuilder;

    fn graph() -> WeightedGraph {
        let mut builder = GraphBuilder::with_capacity(6, 6);
        builder.add_edge("a", "b", 0.9).unwrap();
        builder.add_edge("b", "c", 0.8).unwrap();
        builder.add_edge("a", "c", 0.2).unwrap();
        builder.add_edge("d", "e", 0.1).unwrap();
        builder.add_edge("e", "f", 0.3).unwrap();
        builder.add_edge("c", "d", 0.05).unwrap();
        builder.build().unwrap()
    }

    fn raw(communities: &[&[&str]]) -> RawPartition {
        communities
            .iter()
            .enumerate()
            .map(|(label, members)| {
                (
                    label as u32,
                    members.iter().map(|m| m.to_string()).collect(),
                )
            })
            .collect()
    }

    fn tracked() -> Vec<TrackedRecord> {
        let records = vec![
            SweepRecord {
                step: 0,
                quantile: 0.0,
                threshold: 0.05,
                communities_raw: raw(&[&["a", "b", "c"], &["d", "e", "f"]]),
            },
            SweepRecord {
                step: 1,
                quantile: 0.5,
                threshold: 0.25,
                communities_raw: raw(&[&["a", "b", "c"], &["e", "f"]]),
            },
            SweepRecord {
                step: 2,
                quantile: 1.0,
                threshold: 0.9,
                communities_raw: raw(&[&["a", "b"]]),
            },
        ];
        track_records(records, 2).unwrap().0
    }

    #[test]
    fn test_rows_cover_every_step_and_group() {
        let rows = aggregate_statistics(&graph(), &tracked());
        assert_eq!(rows.len(), 6);

        let last_group_one = rows
            .iter()
            .find(|r| r.step == 2 && r.group == 1)
            .unwrap();
        assert_eq!(last_group_one.size, 0);
        assert_eq!(last_group_one.density, None);
        assert_eq!(last_group_one.weighted_clustering, None);
        assert_eq!(last_group_one.size_fraction_of_initial, 0.0);
    }

    #[test]
    fn test_metrics_use_filtered_graph() {
        let rows = aggregate_statistics(&graph(), &tracked());

        let first = rows.iter().find(|r| r.step == 0 && r.group == 0).unwrap();
        assert_eq!(first.density, Some(1.0));
        assert!((first.unweighted_clustering.unwrap() - 1.0).abs() < 1e-12);

        // threshold 0.25 drops (a, c): a path of two edges remains
        let second = rows.iter().find(|r| r.step == 1 && r.group == 0).unwrap();
        assert!((second.density.unwrap() - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(second.unweighted_clustering, Some(0.0));

        for row in &rows {
            if let Some(density) = row.density {
                assert!((0.0..=1.0).contains(&density));
            }
        }
    }

    #[test]
    fn test_size_fraction_relative_to_first_step() {
        let rows = aggregate_statistics(&graph(), &tracked());
        let fractions: Vec<f64> = rows
            .iter()
            .filter(|r| r.group == 1)
            .map(|r| r.size_fraction_of_initial)
            .collect();
        assert_eq!(fractions.len(), 3);
        assert!((fractions[0] - 1.0).abs() < 1e-12);
        assert!((fractions[1] - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(fractions[2], 0.0);
    }

    #[test]
    fn test_late_group_gets_rows_from_first_appearance() {
        let records = vec![
            SweepRecord {
                step: 0,
                quantile: 0.0,
                threshold: 0.05,
                communities_raw: raw(&[&["a", "b", "c"]]),
            },
            SweepRecord {
                step: 1,
                quantile: 1.0,
                threshold: 0.1,
                communities_raw: raw(&[&["a", "b", "c"], &["d", "e", "f"]]),
            },
        ];
        let (tracked, _) = track_records(records, 2).unwrap();
        let rows = aggregate_statistics(&graph(), &tracked);
        assert_eq!(rows.len(), 3);
        let late = rows.iter().find(|r| r.group == 1).unwrap();
        assert_eq!(late.step, 1);
        assert_eq!(late.size_fraction_of_initial, 1.0);
    }

    #[test]
    fn test_coordination_scores() {
        let rows = aggregate_statistics(&graph(), &tracked());
        let scores = coordination_scores(&rows);
        assert_eq!(scores.len(), 2);

        // group 0: fractions 1, 1, 2/3 over quantiles 0, 0.5, 1
        let expected = 0.5 * 1.0 + 0.5 * (1.0 + 2.0 / 3.0) / 2.0;
        assert!((scores[0].coordination - expected).abs() < 1e-12);
        assert_eq!(scores[0].max_size, 3);

        // group 1: fractions 1, 2/3, 0
        let expected = 0.5 * (1.0 + 2.0 / 3.0) / 2.0 + 0.5 * (2.0 / 3.0) / 2.0;
        assert!((scores[1].coordination - expected).abs() < 1e-12);
    }
}
