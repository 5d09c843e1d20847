//! Hugging Face Hub dataset client.
//!
//! The pipeline's entire contract with the dataset host is "upload this file
//! to this logical path" and "replace this manifest with this content", both
//! idempotent and safe to repeat.

pub mod client;
pub mod error;

pub use client::HubClient;
pub use error::{HubError, HubResult};
