//! Seed communities for the first sweep step

use crate::cluster::oracle::PartitionOracle;
use crate::cluster::{flatten_partition, reverse_assignment, Assignment, RawPartition};
use crate::error::{Error, Result};
use crate::graph::WeightedGraph;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Read a `label -> [member ids]` JSON file as a node assignment
pub fn load_seed_communities(path: &Path) -> Result<Assignment> {
    log::info!("Loading seed partition from {}", path.display());
    let reader = BufReader::new(File::open(path)?);
    let communities: RawPartition = serde_json::from_reader(reader)?;
    let assignment = flatten_partition(&communities);
    log::info!(
        "Seed partition has {} communities over {} nodes",
        communities.len(),
        assignment.len()
    );
    Ok(assignment)
}

/// Partition the unfiltered graph once and label communities by size
///
/// Community 0 is the largest; equal sizes keep the oracle's label order.
pub fn compute_seed_communities<O: PartitionOracle + ?Sized>(
    graph: &WeightedGraph,
    oracle: &O,
    resolution: f64,
    random_state: u64,
) -> Result<RawPartition> {
    log::info!("Extracting seed communities with resolution {}", resolution);

    let view = graph.unfiltered();
    let labels = oracle.partition(view.graph(), None, resolution, random_state)?;
    if labels.len() != view.node_count() {
        return Err(Error::Oracle(format!(
            "seed partition: {} labels for {} nodes",
            labels.len(),
            view.node_count()
        )));
    }

    let g = view.graph();
    let raw = reverse_assignment(g.node_indices().map(|idx| (g[idx].as_str(), labels[idx.index()])));

    let mut ordered: Vec<Vec<String>> = raw.into_values().collect();
    ordered.sort_by(|a, b| b.len().cmp(&a.len()));

    Ok(ordered
        .into_iter()
        .enumerate()
        .map(|(i, members)| (i as u32, members))
        .collect())
}

pub fn save_seed_communities(communities: &RawPartition, path: &Path) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, communities)?;
    writer.flush()?;
    log::info!("Formatted seed partition saved to {}", path.display());
    Ok(())
}
