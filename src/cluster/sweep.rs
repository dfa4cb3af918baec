//! Threshold sweep: one oracle partition per edge-weight quantile

use crate::cluster::oracle::PartitionOracle;
use crate::cluster::{reverse_assignment, Assignment, SweepRecord};
use crate::config::TrackingConfig;
use crate::error::{Error, Result};
use crate::graph::WeightedGraph;

/// `steps` evenly spaced quantiles over `[start, stop]`
///
/// The last point is exactly `stop`; a single step yields `[start]`.
pub fn quantile_schedule(start: f64, stop: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let delta = (stop - start) / (steps - 1) as f64;
            (0..steps)
                .map(|i| if i == steps - 1 { stop } else { start + delta * i as f64 })
                .collect()
        }
    }
}

/// One completed sweep step
#[derive(Debug, Clone)]
pub struct SweepStep {
    pub record: SweepRecord,
    /// Oracle assignment of this step, the seed of the next one
    pub assignment: Assignment,
}

/// Lazy sweep over a quantile schedule
///
/// Each call to `next` filters the base graph at the next quantile
/// threshold and partitions it, seeded with the previous step's
/// assignment. The first error ends the sweep.
pub struct ThresholdSweep<'a, O: PartitionOracle + ?Sized> {
    graph: &'a WeightedGraph,
    oracle: &'a O,
    schedule: Vec<f64>,
    resolution: f64,
    random_state: u64,
    next_step: usize,
    previous: Option<Assignment>,
    failed: bool,
}

impl<'a, O: PartitionOracle + ?Sized> ThresholdSweep<'a, O> {
    /// Prepare a sweep; `seed` is the external assignment used at step 0
    pub fn new(
        graph: &'a WeightedGraph,
        oracle: &'a O,
        config: &TrackingConfig,
        seed: Option<Assignment>,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            graph,
            oracle,
            schedule: quantile_schedule(
                config.quantile_start,
                config.quantile_stop,
                config.quantile_steps,
            ),
            resolution: config.resolution,
            random_state: config.random_state,
            next_step: 0,
            previous: seed,
            failed: false,
        })
    }

    pub fn len(&self) -> usize {
        self.schedule.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schedule.is_empty()
    }

    fn run_step(&mut self, step: usize, quantile: f64) -> Result<SweepStep> {
        let threshold = self.graph.weight_quantile(quantile);
        let view = self.graph.filtered(threshold);

        log::debug!(
            "Step {}: quantile {:.4}, threshold {:.6}, {} nodes, {} edges",
            step,
            quantile,
            threshold,
            view.node_count(),
            view.edge_count()
        );

        let labels = self.oracle.partition(
            view.graph(),
            self.previous.as_ref(),
            self.resolution,
            self.random_state,
        )?;

        if labels.len() != view.node_count() {
            return Err(Error::Oracle(format!(
                "step {}: {} labels for {} nodes",
                step,
                labels.len(),
                view.node_count()
            )));
        }

        let graph = view.graph();
        let assignment: Assignment = graph
            .node_indices()
            .map(|idx| (graph[idx].clone(), labels[idx.index()]))
            .collect();
        let communities_raw = reverse_assignment(
            graph
                .node_indices()
                .map(|idx| (graph[idx].as_str(), labels[idx.index()])),
        );

        Ok(SweepStep {
            record: SweepRecord {
                step,
                quantile,
                threshold,
                communities_raw,
            },
            assignment,
        })
    }
}

impl<O: PartitionOracle + ?Sized> Iterator for ThresholdSweep<'_, O> {
    type Item = Result<SweepStep>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let step = self.next_step;
        let quantile = *self.schedule.get(step)?;
        self.next_step += 1;

        match self.run_step(step, quantile) {
            Ok(result) => {
                // single-step lookback: only this step seeds the next
                self.previous = Some(result.assignment.clone());
                Some(Ok(result))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
