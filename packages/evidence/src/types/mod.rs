//! Data types for the evidence pipeline.

pub mod bundle;
pub mod category;
pub mod claim;
pub mod config;
pub mod page;
pub mod summary;
