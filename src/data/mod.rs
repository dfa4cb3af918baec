//! Input tables and seed communities

pub mod table;
pub mod seed;
