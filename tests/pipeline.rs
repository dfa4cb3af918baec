use coordinated_groups::cluster::metrics::{aggregate_statistics, coordination_scores};
use coordinated_groups::cluster::oracle::Louvain;
use coordinated_groups::cluster::tracking::track_records;
use coordinated_groups::cluster::{lineage, SweepRecord, TrackedRecord};
use coordinated_groups::config::TrackingConfig;
use coordinated_groups::data::table::load_similarity_graph;
use coordinated_groups::pipeline::run_tracking;
use coordinated_groups::storage::{self, JsonlWriter};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;

fn write_scenario(dir: &Path) -> std::path::PathBuf {
    let edges = dir.join("edges.csv");
    fs::write(&edges, "source,target,weight\nA,B,0.9\nC,D,0.1\n").unwrap();
    edges
}

/// Three weighted cliques joined by weak bridges
fn write_cliques(dir: &Path) -> std::path::PathBuf {
    let mut csv = String::from("source,target,weight\n");
    let cliques: [(&str, f64); 3] = [("x", 0.9), ("y", 0.6), ("z", 0.3)];
    for (prefix, weight) in cliques {
        for i in 0..5 {
            for j in (i + 1)..5 {
                let w = weight + 0.01 * (i + j) as f64;
                csv.push_str(&format!("{prefix}{i},{prefix}{j},{w}\n"));
            }
        }
    }
    csv.push_str("x0,y0,0.05\ny0,z0,0.05\nx4,z4,0.02\n");

    let edges = dir.join("cliques.csv");
    fs::write(&edges, csv).unwrap();
    edges
}

#[test]
fn scenario_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let edges = write_scenario(dir.path());
    let graph = load_similarity_graph(&edges, None).unwrap();
    let config = TrackingConfig::new(1.0, 2, 0.0, 1.0, 2, 0);

    let partitions_path = dir.path().join("louvain_partitions.jsonl");
    let groups_path = dir.path().join("coordinated_groups.jsonl");
    let mut partitions_out = JsonlWriter::create(&partitions_path).unwrap();
    let mut groups_out = JsonlWriter::create(&groups_path).unwrap();
    let cancel = AtomicBool::new(false);

    let run = run_tracking(&graph, &config, &Louvain::new(), None, &cancel, |raw, tracked| {
        partitions_out.write(raw)?;
        groups_out.write(tracked)
    })
    .unwrap();
    drop(partitions_out);
    drop(groups_out);

    assert_eq!(run.records.len(), 2);
    assert_eq!(run.already_found, 2);
    assert!((run.records[0].threshold - 0.1).abs() < 1e-12);
    assert!((run.records[1].threshold - 0.9).abs() < 1e-12);

    let persisted: Vec<TrackedRecord> = storage::read_jsonl(&groups_path).unwrap();
    assert_eq!(persisted, run.records);

    let rows = aggregate_statistics(&graph, &run.records);
    assert_eq!(rows.len(), 4);

    let group0_last = rows.iter().find(|r| r.step == 1 && r.group == 0).unwrap();
    assert_eq!(group0_last.size, 2);
    assert_eq!(group0_last.density, Some(1.0));
    assert_eq!(group0_last.size_fraction_of_initial, 1.0);

    let group1_last = rows.iter().find(|r| r.step == 1 && r.group == 1).unwrap();
    assert_eq!(group1_last.size, 0);
    assert_eq!(group1_last.density, None);
    assert_eq!(group1_last.size_fraction_of_initial, 0.0);

    // the persisted partition stream re-tracks to the same groups
    let partitions: Vec<SweepRecord> = storage::read_jsonl(&partitions_path).unwrap();
    let (retracked, found) = track_records(partitions, config.min_cardinality).unwrap();
    assert_eq!(found, run.already_found);
    assert_eq!(retracked, run.records);

    let scores = coordination_scores(&rows);
    assert_eq!(scores.len(), 2);
    assert!(scores[0].coordination > scores[1].coordination);

    let survivals = lineage::last_surviving(&run.records);
    let node_path = dir.path().join("node_coordination.csv");
    storage::save_node_coordination(&graph, &survivals, &node_path).unwrap();
    let lines = fs::read_to_string(&node_path).unwrap();
    assert_eq!(lines.lines().count(), 5);
    assert!(lines.starts_with("user_id,quantile,threshold,coordinated_group"));

    let stats_path = dir.path().join("stats.csv");
    storage::save_statistics_csv(&rows, &stats_path).unwrap();
    assert_eq!(fs::read_to_string(&stats_path).unwrap().lines().count(), 5);

    let summary_path = dir.path().join("summary.json");
    storage::save_summary(&graph, &config, &run, &summary_path).unwrap();
    let summary: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&summary_path).unwrap()).unwrap();
    assert_eq!(summary["group_stats"]["groups_found"], 2);
    assert_eq!(summary["sweep"]["completed_steps"], 2);
}

#[test]
fn group_ids_are_allocated_monotonically() {
    let dir = tempfile::tempdir().unwrap();
    let edges = write_cliques(dir.path());
    let graph = load_similarity_graph(&edges, None).unwrap();
    let config = TrackingConfig::new(1.0, 2, 0.0, 1.0, 21, 7);
    let cancel = AtomicBool::new(false);

    let run = run_tracking(&graph, &config, &Louvain::new(), None, &cancel, |_, _| Ok(()))
        .unwrap();
    assert_eq!(run.records.len(), 21);

    let mut seen: BTreeSet<u32> = BTreeSet::new();
    for record in &run.records {
        let ids: BTreeSet<u32> = record.coordinated_groups.keys().copied().collect();
        let highest_before = seen.iter().next_back().copied();
        for id in ids.difference(&seen) {
            if let Some(highest) = highest_before {
                assert!(*id > highest, "id {} reissued after {}", id, highest);
            }
        }
        assert!(ids.iter().all(|id| *id < run.already_found));
        seen.extend(ids);

        // no node sits in two groups of one step
        let mut members = BTreeSet::new();
        for group in record.coordinated_groups.values() {
            assert!(!group.is_empty());
            for member in group {
                assert!(members.insert(member.clone()));
            }
        }
    }

    let rows = aggregate_statistics(&graph, &run.records);
    for row in &rows {
        if let Some(density) = row.density {
            assert!((0.0..=1.0).contains(&density));
        }
        if let Some(c) = row.unweighted_clustering {
            assert!((0.0..=1.0 + 1e-12).contains(&c));
        }
        if row.size == 0 {
            assert!(row.density.is_none());
        }
    }
}

#[test]
fn node_table_adds_isolated_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let edges = write_scenario(dir.path());
    let nodes = dir.path().join("nodes.csv");
    fs::write(&nodes, "user_id,screen_name\nA,a\nB,b\nC,c\nD,d\nE,e\n").unwrap();

    let graph = load_similarity_graph(&edges, Some(&nodes)).unwrap();
    assert_eq!(graph.node_count(), 5);

    let config = TrackingConfig::new(1.0, 2, 0.0, 1.0, 2, 0);
    let cancel = AtomicBool::new(false);
    let run = run_tracking(&graph, &config, &Louvain::new(), None, &cancel, |_, _| Ok(()))
        .unwrap();

    let survivals = lineage::last_surviving(&run.records);
    assert!(!survivals.contains_key("E"));
    assert_eq!(survivals["C"].step, 0);
    assert_eq!(survivals["A"].step, 1);
}
