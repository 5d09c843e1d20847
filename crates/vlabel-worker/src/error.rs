//! Pipeline error types.

use std::time::Duration;

use thiserror::Error;

use vlabel_gemini::GeminiError;
use vlabel_hub::HubError;
use vlabel_media::MediaError;
use vlabel_models::FailureKind;
use vlabel_store::StoreError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generation service error: {0}")]
    Gemini(#[from] GeminiError),

    #[error("Checkpoint store error: {0}")]
    Store(#[from] StoreError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Dataset host error: {0}")]
    Hub(#[from] HubError),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Deadline exceeded after {0:?}")]
    Deadline(Duration),
}

impl PipelineError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify for the retry controller.
    pub fn kind(&self) -> FailureKind {
        match self {
            PipelineError::Config(_) => FailureKind::Fatal,
            PipelineError::Gemini(e) => e.kind(),
            // A corrupt record cannot be fixed by retrying; an existing one
            // means the unit is already done.
            PipelineError::Store(e) if e.is_corrupt() || e.is_already_exists() => {
                FailureKind::Fatal
            }
            PipelineError::Store(_) => FailureKind::Transient,
            PipelineError::Media(MediaError::FfmpegNotFound)
            | PipelineError::Media(MediaError::FfprobeNotFound) => FailureKind::Fatal,
            PipelineError::Media(_) => FailureKind::Transient,
            PipelineError::Hub(_) => FailureKind::Transient,
            PipelineError::Json(_) => FailureKind::Transient,
            PipelineError::Deadline(_) => FailureKind::Throttled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_deadline_is_classified_as_throttling() {
        let err = PipelineError::Deadline(Duration::from_secs(600));
        assert_eq!(err.kind(), FailureKind::Throttled);
    }

    #[test]
    fn corrupt_store_is_fatal_but_transient_io_is_not() {
        let corrupt = PipelineError::Store(StoreError::Corrupt {
            path: "/tmp/x.json".into(),
            source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        });
        assert_eq!(corrupt.kind(), FailureKind::Fatal);

        let io = PipelineError::Store(StoreError::Io(std::io::Error::other("disk hiccup")));
        assert_eq!(io.kind(), FailureKind::Transient);
    }

    #[test]
    fn missing_ffmpeg_is_fatal() {
        let err = PipelineError::Media(MediaError::FfmpegNotFound);
        assert_eq!(err.kind(), FailureKind::Fatal);
    }
}
