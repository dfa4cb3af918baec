//! Node and edge table loading for similarity graphs

use crate::error::{Error, Result};
use crate::graph::{GraphBuilder, WeightedGraph};
use polars::prelude::*;
use std::path::Path;

/// Lazily scan a CSV or Parquet table, chosen by file extension
fn scan_table(path: &Path) -> Result<LazyFrame> {
    if !path.exists() {
        return Err(Error::InvalidInput(format!("File not found: {}", path.display())));
    }

    let is_parquet = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("parquet"));

    let frame = if is_parquet {
        LazyFrame::scan_parquet(path, Default::default())?
    } else {
        // ids are opaque strings: no inference, so "007" stays "007"
        LazyCsvReader::new(path)
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .finish()?
    };
    Ok(frame)
}

/// Load the similarity graph from an edge table and an optional node table
///
/// The edge table needs `source`, `target` and `weight` columns; the node
/// table needs a `user_id` column and may carry any other attributes,
/// which are ignored. Nodes listed only in the node table stay isolated.
pub fn load_similarity_graph(edge_path: &Path, node_path: Option<&Path>) -> Result<WeightedGraph> {
    log::info!("Reading edge table: {}", edge_path.display());

    let edges = scan_table(edge_path)?
        .select([
            col("source").cast(DataType::String),
            col("target").cast(DataType::String),
            col("weight").cast(DataType::Float64),
        ])
        .collect()?;
    log::info!("Loaded {} edges", edges.height());

    let nodes = match node_path {
        Some(path) => {
            log::info!("Reading node table: {}", path.display());
            let df = scan_table(path)?
                .select([col("user_id").cast(DataType::String)])
                .collect()?;
            Some(df)
        }
        None => None,
    };

    let node_capacity = nodes.as_ref().map_or(edges.height(), |df| df.height());
    let mut builder = GraphBuilder::with_capacity(node_capacity, edges.height());

    if let Some(df) = &nodes {
        let user_col = df.column("user_id")?.str()?;
        for i in 0..df.height() {
            let user = user_col
                .get(i)
                .ok_or_else(|| Error::InvalidInput(format!("node row {} has no user_id", i)))?;
            builder.add_node(user);
        }
    }

    let source_col = edges.column("source")?.str()?;
    let target_col = edges.column("target")?.str()?;
    let weight_col = edges.column("weight")?.f64()?;

    for i in 0..edges.height() {
        let (Some(src), Some(dst)) = (source_col.get(i), target_col.get(i)) else {
            return Err(Error::InvalidInput(format!("edge row {} is missing an endpoint", i)));
        };
        // non-numeric weights become null after the cast
        let weight = weight_col.get(i).ok_or_else(|| {
            Error::InvalidInput(format!(
                "edge row {} ({} - {}) has a missing or non-numeric weight",
                i, src, dst
            ))
        })?;
        builder.add_edge(src, dst, weight)?;
    }

    let graph = builder.build()?;
    log::info!(
        "Built similarity graph with {} nodes and {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    Ok(graph)
}
