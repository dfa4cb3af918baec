//! Results persistence module

use crate::cluster::lineage::Survival;
use crate::cluster::metrics::{GroupCoordination, GroupStats};
use crate::config::TrackingConfig;
use crate::error::Result;
use crate::graph::WeightedGraph;
use crate::pipeline::TrackingRun;
use polars::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, to_string_pretty};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// JSON-lines writer that flushes after every record
///
/// Each line is durable once `write` returns, so a sweep aborted later
/// leaves every completed step on disk.
pub struct JsonlWriter<W: Write> {
    inner: BufWriter<W>,
}

impl JsonlWriter<File> {
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self::new(File::create(path)?))
    }
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            inner: BufWriter::new(writer),
        }
    }

    pub fn write<T: Serialize>(&mut self, record: &T) -> Result<()> {
        serde_json::to_writer(&mut self.inner, record)?;
        self.inner.write_all(b"\n")?;
        self.inner.flush()?;
        Ok(())
    }
}

/// Read every record of a JSON-lines file, skipping blank lines
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(records)
}

/// Flat table of the per-group statistics
pub fn statistics_frame(rows: &[GroupStats]) -> Result<DataFrame> {
    let f = |get: fn(&GroupStats) -> f64| rows.iter().map(get).collect::<Vec<f64>>();
    let opt = |get: fn(&GroupStats) -> Option<f64>| rows.iter().map(get).collect::<Vec<_>>();

    let df = DataFrame::new(vec![
        Column::new("step".into(), rows.iter().map(|r| r.step as u64).collect::<Vec<_>>()),
        Column::new("quantile".into(), f(|r| r.quantile)),
        Column::new("threshold".into(), f(|r| r.threshold)),
        Column::new("group".into(), rows.iter().map(|r| r.group).collect::<Vec<u32>>()),
        Column::new("size".into(), rows.iter().map(|r| r.size as u64).collect::<Vec<_>>()),
        Column::new("weighted_clustering".into(), opt(|r| r.weighted_clustering)),
        Column::new("unweighted_clustering".into(), opt(|r| r.unweighted_clustering)),
        Column::new("density".into(), opt(|r| r.density)),
        Column::new("weighted_assortativity".into(), opt(|r| r.weighted_assortativity)),
        Column::new("unweighted_assortativity".into(), opt(|r| r.unweighted_assortativity)),
        Column::new("size_fraction_of_initial".into(), f(|r| r.size_fraction_of_initial)),
    ])?;
    Ok(df)
}

pub fn save_statistics_csv(rows: &[GroupStats], path: &Path) -> Result<()> {
    let mut df = statistics_frame(rows)?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    log::info!("Saved {} statistics rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn save_statistics_parquet(rows: &[GroupStats], path: &Path) -> Result<()> {
    let mut df = statistics_frame(rows)?;
    let file = File::create(path)?;
    ParquetWriter::new(file).finish(&mut df)?;
    log::info!("Saved {} statistics rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write every node with the last coordinated group it survives in
///
/// Nodes that never reach a coordinated group get empty fields.
pub fn save_node_coordination(
    graph: &WeightedGraph,
    survivals: &BTreeMap<String, Survival>,
    path: &Path,
) -> Result<()> {
    let ids = graph.node_ids();
    let lookup = |id: &String| survivals.get(id);

    let mut df = DataFrame::new(vec![
        Column::new("user_id".into(), ids.to_vec()),
        Column::new(
            "quantile".into(),
            ids.iter().map(|id| lookup(id).map(|s| s.quantile)).collect::<Vec<_>>(),
        ),
        Column::new(
            "threshold".into(),
            ids.iter().map(|id| lookup(id).map(|s| s.threshold)).collect::<Vec<_>>(),
        ),
        Column::new(
            "coordinated_group".into(),
            ids.iter().map(|id| lookup(id).map(|s| s.group)).collect::<Vec<_>>(),
        ),
    ])?;

    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(&mut df)?;
    log::info!(
        "Node coordination for {} of {} nodes saved to {}",
        survivals.len(),
        ids.len(),
        path.display()
    );
    Ok(())
}

pub fn save_coordination_scores(scores: &[GroupCoordination], path: &Path) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(to_string_pretty(scores)?.as_bytes())?;
    Ok(())
}

/// Save run parameters and headline counts
pub fn save_summary(
    graph: &WeightedGraph,
    config: &TrackingConfig,
    run: &TrackingRun,
    path: &Path,
) -> Result<()> {
    log::info!("Saving summary information");

    let final_groups = run
        .records
        .last()
        .map_or(0, |r| r.coordinated_groups.len());

    let summary = json!({
        "graph_stats": {
            "node_count": graph.node_count(),
            "edge_count": graph.edge_count(),
            "min_weight": graph.weight_quantile(0.0),
            "max_weight": graph.weight_quantile(1.0),
        },
        "sweep": {
            "resolution": config.resolution,
            "min_cardinality": config.min_cardinality,
            "quantile_start": config.quantile_start,
            "quantile_stop": config.quantile_stop,
            "quantile_steps": config.quantile_steps,
            "random_state": config.random_state,
            "completed_steps": run.records.len(),
            "cancelled": run.cancelled,
        },
        "group_stats": {
            "groups_found": run.already_found,
            "groups_at_last_step": final_groups,
        }
    });

    let mut file = File::create(path)?;
    file.write_all(to_string_pretty(&summary)?.as_bytes())?;

    Ok(())
}
