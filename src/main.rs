use anyhow::Result;
use clap::Parser;
use coordinated_groups::cluster::oracle::Louvain;
use coordinated_groups::cluster::tracking::track_records;
use coordinated_groups::cluster::{flatten_partition, lineage, metrics, SweepRecord};
use coordinated_groups::config::TrackingConfig;
use coordinated_groups::data::{seed, table};
use coordinated_groups::pipeline::{run_tracking, TrackingRun};
use coordinated_groups::storage::{self, JsonlWriter};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

#[derive(Parser, Debug)]
#[clap(
    name = "coordinated-groups",
    about = "Track coordinated groups across a similarity threshold sweep"
)]
struct Cli {
    /// Edge table (CSV or Parquet) with source, target and weight columns
    #[clap(long)]
    edges: PathBuf,

    /// Node table with a user_id column
    #[clap(long)]
    nodes: Option<PathBuf>,

    /// Seed partition (JSON object of label to member ids)
    #[clap(long)]
    seed_communities: Option<PathBuf>,

    /// Compute the seed partition on the unfiltered graph first
    #[clap(long, conflicts_with = "seed_communities")]
    compute_seed: bool,

    /// Re-track a persisted partition stream instead of sweeping
    #[clap(long)]
    partitions: Option<PathBuf>,

    /// Output directory for results
    #[clap(long, default_value = "coordination_results")]
    output_dir: PathBuf,

    #[clap(long, default_value = "1.0")]
    resolution: f64,

    /// Smallest community that may found a coordinated group
    #[clap(long, default_value = "2")]
    min_cardinality: usize,

    #[clap(long, default_value = "0.0")]
    quantile_start: f64,

    #[clap(long, default_value = "1.0")]
    quantile_stop: f64,

    #[clap(long, default_value = "101")]
    quantile_steps: usize,

    #[clap(long, default_value = "0")]
    random_state: u64,

    /// Also write the statistics table as Parquet
    #[clap(long)]
    parquet: bool,

    /// Number of worker threads (0 = use all available cores)
    #[clap(long, default_value = "0")]
    threads: usize,

    /// Verbose logging
    #[clap(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Cli::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp_millis()
        .init();

    let num_threads = if args.threads > 0 {
        args.threads
    } else {
        num_cpus::get()
    };

    log::info!("Using {} worker threads", num_threads);
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()?;

    let config = TrackingConfig::new(
        args.resolution,
        args.min_cardinality,
        args.quantile_start,
        args.quantile_stop,
        args.quantile_steps,
        args.random_state,
    );
    config.validate()?;

    // 1. Load the similarity graph
    let graph = table::load_similarity_graph(&args.edges, args.nodes.as_deref())?;

    let run_dir = args.output_dir.join(config.output_dir_name());
    std::fs::create_dir_all(&run_dir)?;
    log::info!("Output: {}", run_dir.display());

    let oracle = Louvain::new();

    // 2. Sweep and track, persisting every step as it completes
    let run = match &args.partitions {
        Some(path) => {
            log::info!("Re-tracking persisted partitions from {}", path.display());
            let partitions: Vec<SweepRecord> = storage::read_jsonl(path)?;
            let (records, already_found) = track_records(partitions, config.min_cardinality)?;

            let mut groups_out = JsonlWriter::create(&run_dir.join("coordinated_groups.jsonl"))?;
            for record in &records {
                groups_out.write(record)?;
            }
            TrackingRun {
                records,
                already_found,
                cancelled: false,
            }
        }
        None => {
            let seed = if let Some(path) = &args.seed_communities {
                Some(seed::load_seed_communities(path)?)
            } else if args.compute_seed {
                let communities = seed::compute_seed_communities(
                    &graph,
                    &oracle,
                    config.resolution,
                    config.random_state,
                )?;
                seed::save_seed_communities(&communities, &run_dir.join("seed_communities.json"))?;
                Some(flatten_partition(&communities))
            } else {
                None
            };

            let mut partitions_out =
                JsonlWriter::create(&run_dir.join("louvain_partitions.jsonl"))?;
            let mut groups_out = JsonlWriter::create(&run_dir.join("coordinated_groups.jsonl"))?;
            let cancel = AtomicBool::new(false);

            run_tracking(&graph, &config, &oracle, seed, &cancel, |raw, tracked| {
                partitions_out.write(raw)?;
                groups_out.write(tracked)
            })?
        }
    };

    // 3. Per-group statistics along each lineage
    let rows = metrics::aggregate_statistics(&graph, &run.records);
    storage::save_statistics_csv(&rows, &run_dir.join("coordinated_groups_stats.csv"))?;
    if args.parquet {
        storage::save_statistics_parquet(&rows, &run_dir.join("coordinated_groups_stats.parquet"))?;
    }

    let scores = metrics::coordination_scores(&rows);
    storage::save_coordination_scores(&scores, &run_dir.join("coordination_scores.json"))?;

    // 4. Entity assignment and summary
    let survivals = lineage::last_surviving(&run.records);
    storage::save_node_coordination(&graph, &survivals, &run_dir.join("node_coordination.csv"))?;
    storage::save_summary(&graph, &config, &run, &run_dir.join("summary.json"))?;

    log::info!("Analysis complete. Results saved to {}", run_dir.display());

    Ok(())
}
