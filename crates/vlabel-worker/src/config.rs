//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};
use crate::retry::RetryPolicy;

/// Worker configuration.
///
/// Secrets (`GEMINI_API_KEY`, `HF_TOKEN`) are deliberately not part of this
/// struct; the binary reads them separately so the config can be logged.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Root of the checkpoint store and derived media files.
    pub cache_dir: PathBuf,
    /// JSONL index of source assets.
    pub asset_index: PathBuf,
    /// Parallel episode workers within one series.
    pub episode_workers: usize,
    /// Segment window length in seconds.
    pub window_length: f64,
    /// Overlap between consecutive windows in seconds.
    pub window_overlap: f64,
    /// Process only the first N series of the index.
    pub max_series: Option<usize>,
    /// Generation model name.
    pub model: String,
    /// Whether to upload clips and manifests to the dataset host.
    pub publish: bool,
    /// Dataset repos per level.
    pub segment_repo: String,
    pub episode_repo: String,
    pub series_repo: String,
    /// Retry/backoff policy.
    pub retry: RetryPolicy,
    /// Remote file processing poll cadence.
    pub upload_poll_interval: Duration,
    pub upload_poll_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("./cache"),
            asset_index: PathBuf::from("./assets.jsonl"),
            episode_workers: 4,
            window_length: 60.0,
            window_overlap: 5.0,
            max_series: None,
            model: "gemini-2.5-flash".to_string(),
            publish: true,
            segment_repo: "videolabel/segment-queries".to_string(),
            episode_repo: "videolabel/episode-queries".to_string(),
            series_repo: "videolabel/series-queries".to_string(),
            retry: RetryPolicy::default(),
            upload_poll_interval: Duration::from_secs(5),
            upload_poll_timeout: Duration::from_secs(300),
        }
    }
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_dir: env_parse("VLABEL_CACHE_DIR", defaults.cache_dir),
            asset_index: env_parse("VLABEL_ASSET_INDEX", defaults.asset_index),
            episode_workers: env_parse("VLABEL_EPISODE_WORKERS", defaults.episode_workers),
            window_length: env_parse("VLABEL_WINDOW_SECS", defaults.window_length),
            window_overlap: env_parse("VLABEL_OVERLAP_SECS", defaults.window_overlap),
            max_series: std::env::var("VLABEL_MAX_SERIES")
                .ok()
                .and_then(|s| s.parse().ok()),
            model: env_parse("VLABEL_MODEL", defaults.model),
            publish: env_parse("VLABEL_PUBLISH", defaults.publish),
            segment_repo: env_parse("VLABEL_SEGMENT_REPO", defaults.segment_repo),
            episode_repo: env_parse("VLABEL_EPISODE_REPO", defaults.episode_repo),
            series_repo: env_parse("VLABEL_SERIES_REPO", defaults.series_repo),
            retry: RetryPolicy {
                max_attempts: env_parse("VLABEL_MAX_ATTEMPTS", defaults.retry.max_attempts),
                throttle_base: Duration::from_secs(env_parse(
                    "VLABEL_THROTTLE_BASE_SECS",
                    defaults.retry.throttle_base.as_secs(),
                )),
                throttle_multiplier: env_parse(
                    "VLABEL_THROTTLE_MULTIPLIER",
                    defaults.retry.throttle_multiplier,
                ),
                throttle_cap: Duration::from_secs(env_parse(
                    "VLABEL_THROTTLE_CAP_SECS",
                    defaults.retry.throttle_cap.as_secs(),
                )),
                transient_delay: Duration::from_secs(env_parse(
                    "VLABEL_TRANSIENT_DELAY_SECS",
                    defaults.retry.transient_delay.as_secs(),
                )),
                call_timeout: Duration::from_secs(env_parse(
                    "VLABEL_CALL_TIMEOUT_SECS",
                    defaults.retry.call_timeout.as_secs(),
                )),
            },
            upload_poll_interval: Duration::from_secs(env_parse(
                "VLABEL_UPLOAD_POLL_SECS",
                defaults.upload_poll_interval.as_secs(),
            )),
            upload_poll_timeout: Duration::from_secs(env_parse(
                "VLABEL_UPLOAD_POLL_TIMEOUT_SECS",
                defaults.upload_poll_timeout.as_secs(),
            )),
        }
    }

    /// Reject configurations the planner and retry loop cannot work with.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.window_length <= 0.0 {
            return Err(PipelineError::config("window length must be positive"));
        }
        if self.window_overlap < 0.0 || self.window_overlap >= self.window_length {
            return Err(PipelineError::config(
                "overlap must be non-negative and smaller than the window length",
            ));
        }
        if self.episode_workers == 0 {
            return Err(PipelineError::config("episode workers must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(PipelineError::config("max attempts must be at least 1"));
        }
        if self.retry.throttle_multiplier <= 1.0 {
            return Err(PipelineError::config(
                "throttle multiplier must be greater than 1",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        WorkerConfig::default().validate().unwrap();
    }

    #[test]
    fn overlap_at_least_window_length_is_rejected() {
        let config = WorkerConfig {
            window_overlap: 60.0,
            ..WorkerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_workers_are_rejected() {
        let config = WorkerConfig {
            episode_workers: 0,
            ..WorkerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_growing_multiplier_is_rejected() {
        let mut config = WorkerConfig::default();
        config.retry.throttle_multiplier = 1.0;
        assert!(config.validate().is_err());
    }
}
