//! Configuration management for coordinated group tracking

use crate::error::{Error, Result};

/// Parameters of one threshold sweep and tracking run
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingConfig {
    /// Resolution handed to the partitioning oracle at every step
    pub resolution: f64,

    /// Smallest community allowed to found a new coordinated group
    pub min_cardinality: usize,

    /// First quantile of the edge-weight distribution
    pub quantile_start: f64,

    /// Last quantile of the edge-weight distribution
    pub quantile_stop: f64,

    /// Number of evenly spaced quantiles between start and stop
    pub quantile_steps: usize,

    /// Random state passed to the oracle on every call
    pub random_state: u64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            resolution: 1.0,
            min_cardinality: 2,
            quantile_start: 0.0,
            quantile_stop: 1.0,
            quantile_steps: 101,
            random_state: 0,
        }
    }
}

impl TrackingConfig {
    /// Create a new configuration with custom values
    pub fn new(
        resolution: f64,
        min_cardinality: usize,
        quantile_start: f64,
        quantile_stop: f64,
        quantile_steps: usize,
        random_state: u64,
    ) -> Self {
        Self {
            resolution,
            min_cardinality,
            quantile_start,
            quantile_stop,
            quantile_steps,
            random_state,
        }
    }

    /// Reject parameter combinations the sweep cannot run with
    pub fn validate(&self) -> Result<()> {
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(Error::invalid_parameter(
                "resolution",
                format!("must be a positive number, got {}", self.resolution),
            ));
        }
        if self.min_cardinality == 0 {
            return Err(Error::invalid_parameter("min_cardinality", "must be at least 1"));
        }
        if self.quantile_steps == 0 {
            return Err(Error::invalid_parameter("quantile_steps", "must be at least 1"));
        }
        for (name, q) in [
            ("quantile_start", self.quantile_start),
            ("quantile_stop", self.quantile_stop),
        ] {
            if !(0.0..=1.0).contains(&q) {
                return Err(Error::invalid_parameter(name, format!("{} is outside [0, 1]", q)));
            }
        }
        if self.quantile_start > self.quantile_stop {
            return Err(Error::invalid_parameter(
                "quantile_start",
                format!(
                    "start {} is greater than stop {}",
                    self.quantile_start, self.quantile_stop
                ),
            ));
        }
        Ok(())
    }

    /// Name of the run directory, encoding the sweep parameters
    pub fn output_dir_name(&self) -> String {
        format!(
            "coordinated_communities_quantile({},{},{})_mincardinality{}",
            self.quantile_start, self.quantile_stop, self.quantile_steps, self.min_cardinality
        )
    }
}
