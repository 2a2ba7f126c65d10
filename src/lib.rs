//! tally - hierarchical progress aggregation
//!
//! This library keeps stage and project progress in sync with the status and
//! estimated hours of their tasks, and computes portfolio-wide statistics.
//!
//! # Core Concepts
//!
//! - **Contribution**: fraction of a task's hours that count as done
//!   (done 1.0, in progress 0.5, todo 0.25, anything else 0.0)
//! - **Rollups**: derived totals on stages and projects, always recomputed
//!   from the full task set and replaced in one write
//! - **Statistics**: count-based portfolio snapshot with resource utilization
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.tally.toml`
//! - `contribution`: Status contribution and progress percentages
//! - `error`: Error types and result aliases
//! - `mutation`: Post-write hook that triggers rollup recomputation
//! - `rollup`: Stage and project rollup recomputation
//! - `stats`: Portfolio statistics
//! - `storage`: JSON document storage and directory management
//! - `store`: The `AggregateStore` persistence interface and its backends
//! - `lock`: File locking and atomic operations for concurrency safety

pub mod cli;
pub mod config;
pub mod contribution;
pub mod employee;
pub mod error;
pub mod lock;
pub mod mutation;
pub mod output;
pub mod project;
pub mod rollup;
pub mod stats;
pub mod storage;
pub mod store;
pub mod task;

pub use error::{Error, Result};
