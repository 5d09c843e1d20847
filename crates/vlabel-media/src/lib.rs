//! FFmpeg CLI glue for the videolabel pipeline.
//!
//! Everything here is deterministic in its inputs and checks for an existing
//! output before re-invoking the tool, so interrupted runs pick up where they
//! left off without re-encoding anything.

pub mod clip;
pub mod error;
pub mod probe;

pub use clip::{concat_files, cut_window, downsample_fps};
pub use error::{MediaError, MediaResult};
pub use probe::probe_duration;
