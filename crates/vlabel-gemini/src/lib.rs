//! Gemini client for video query generation.
//!
//! This crate owns everything that talks to the generation service: media
//! upload with state polling, structured-output generation per aggregation
//! level, the typed error taxonomy the retry controller classifies on, and
//! the shared API-key rotator.

pub mod client;
pub mod error;
pub mod rotator;
pub mod schema;
pub mod types;

pub use client::GeminiClient;
pub use error::{GeminiError, GeminiResult};
pub use rotator::KeyRotator;
pub use types::FileMeta;
