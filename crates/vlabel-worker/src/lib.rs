//! Annotation pipeline orchestrator.
//!
//! This crate provides:
//! - Window planning over episode durations
//! - The retry/backoff controller with credential rotation
//! - The bounded episode worker pool with a per-series barrier
//! - Hierarchical aggregation of segment → episode → series records
//! - Manifest publication to the dataset host

pub mod aggregate;
pub mod config;
pub mod error;
pub mod executor;
pub mod ingest;
pub mod planner;
pub mod process;
pub mod publish;
pub mod retry;
pub mod service;
pub mod stats;

pub use config::WorkerConfig;
pub use error::{PipelineError, PipelineResult};
pub use executor::Orchestrator;
pub use planner::{plan_windows, Window};
pub use process::PipelineContext;
pub use retry::{Attempted, RetryController, RetryPolicy};
pub use service::{GeminiAnnotator, QueryService};
pub use stats::{RunStats, StatsSnapshot};
