//! Error types for coordinated group tracking

use polars::prelude::PolarsError;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while loading graphs, sweeping thresholds or tracking groups
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed graph or table input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The same undirected edge was listed more than once
    #[error("duplicate edge between '{node_a}' and '{node_b}'")]
    DuplicateEdge { node_a: String, node_b: String },

    /// Negative, NaN or infinite edge weight
    #[error("invalid weight {weight} on edge '{node_a}' - '{node_b}'")]
    InvalidWeight {
        node_a: String,
        node_b: String,
        weight: f64,
    },

    /// Configuration value out of range
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter { name: &'static str, message: String },

    /// A partition listed the same node in more than one community
    #[error("data integrity violation: {0}")]
    DataIntegrity(String),

    /// The partitioning oracle returned an unusable result
    #[error("partitioning oracle failed: {0}")]
    Oracle(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

impl Error {
    pub(crate) fn invalid_parameter(name: &'static str, message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            message: message.into(),
        }
    }
}
