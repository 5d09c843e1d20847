//! Shared data models for the videolabel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Video assets and the series/episode grouping
//! - Work-unit keys (the stable identity of each generation call)
//! - Checkpoint records and their status
//! - Structured query payloads and their per-level field contracts
//! - Failure classification shared by every pipeline layer

pub mod asset;
pub mod failure;
pub mod payload;
pub mod record;
pub mod unit;

// Re-export common types
pub use asset::Asset;
pub use failure::FailureKind;
pub use payload::{PayloadError, QueryPayload, BLOCKED_PLACEHOLDER, ITEMS_PER_FIELD};
pub use record::{CheckpointRecord, CheckpointStatus, SegmentRef};
pub use unit::{episode_sort_key, sanitize_name, WorkUnitKey, WorkUnitKind};
