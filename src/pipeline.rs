//! Sweep and tracking connected by a single-slot handoff
//!
//! The sweep produces partitions on a worker thread while the tracker
//! consumes them in order; at most one step is in flight between them.

use crate::cluster::oracle::PartitionOracle;
use crate::cluster::sweep::{SweepStep, ThresholdSweep};
use crate::cluster::tracking::GroupTracker;
use crate::cluster::{Assignment, GroupId, SweepRecord, TrackedRecord};
use crate::config::TrackingConfig;
use crate::error::{Error, Result};
use crate::graph::WeightedGraph;
use crossbeam::channel;
use std::sync::atomic::{AtomicBool, Ordering};

/// Outcome of a tracking run
#[derive(Debug, Clone)]
pub struct TrackingRun {
    /// Tracked steps completed, in sweep order
    pub records: Vec<TrackedRecord>,
    /// Number of group identifiers allocated
    pub already_found: GroupId,
    /// True when the caller stopped the sweep early
    pub cancelled: bool,
}

/// Sweep the graph and track coordinated groups step by step
///
/// `on_step` sees every partition and its tracked form as soon as the step
/// completes, so results can be persisted incrementally. `cancel` is
/// checked between steps only. The first error aborts the run; steps
/// already handed to `on_step` stay valid.
pub fn run_tracking<O, F>(
    graph: &WeightedGraph,
    config: &TrackingConfig,
    oracle: &O,
    seed: Option<Assignment>,
    cancel: &AtomicBool,
    mut on_step: F,
) -> Result<TrackingRun>
where
    O: PartitionOracle + ?Sized,
    F: FnMut(&SweepRecord, &TrackedRecord) -> Result<()>,
{
    let sweep = ThresholdSweep::new(graph, oracle, config, seed)?;
    let total = sweep.len();
    log::info!(
        "Sweeping {} quantiles in [{}, {}]",
        total,
        config.quantile_start,
        config.quantile_stop
    );

    let (sender, receiver) = channel::bounded::<Result<SweepStep>>(1);
    let mut tracker = GroupTracker::new(config.min_cardinality);

    let outcome = crossbeam::thread::scope(|scope| -> Result<Vec<TrackedRecord>> {
        scope.spawn(move |_| {
            let mut sweep = sweep;
            while !cancel.load(Ordering::Relaxed) {
                let Some(step) = sweep.next() else {
                    break;
                };
                let failed = step.is_err();
                // receiver gone: the consumer stopped on an error
                if sender.send(step).is_err() || failed {
                    break;
                }
            }
        });

        // owned here so an early return unblocks the producer
        let mut records = Vec::with_capacity(total);
        for step in receiver {
            let step = step?;
            log::info!("Computed partition {}/{}", step.record.step + 1, total);
            let raw = step.record.clone();
            let tracked = tracker.track(step.record)?;
            on_step(&raw, &tracked)?;
            records.push(tracked);
        }
        Ok(records)
    })
    .map_err(|_| Error::Oracle("sweep worker panicked".to_string()))?;

    let records = outcome?;
    let cancelled = records.len() < total;
    if cancelled {
        log::warn!("Sweep cancelled after {} of {} steps", records.len(), total);
    }
    log::info!("Total groups found = {}", tracker.already_found());

    Ok(TrackingRun {
        records,
        already_found: tracker.already_found(),
        cancelled,
    })
}
