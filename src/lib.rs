//! Coordinated group tracking over weighted similarity graphs

pub mod config;
pub mod error;
pub mod data;
pub mod graph;
pub mod cluster;
pub mod pipeline;
pub mod storage;

pub use error::{Error, Result};
