//! Graph representation and algorithms module

pub mod weighted;
pub mod builder;
pub mod algorithms;

pub use builder::GraphBuilder;
pub use weighted::{FilteredGraph, WeightedGraph};
