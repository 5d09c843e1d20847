//! Gemini error types and failure classification.
//!
//! The service surfaces typed/coded errors (HTTP status plus a Google RPC
//! status string); classification keys off those. Substring matching exists
//! only as a last-resort fallback inside this adapter and never leaks into
//! the retry controller.

use thiserror::Error;

use vlabel_models::FailureKind;

/// Result type for Gemini operations.
pub type GeminiResult<T> = Result<T, GeminiError>;

/// Errors from the generation service and its client.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A non-2xx service response with its decoded Google error envelope.
    #[error("Service error {status} {rpc_status}: {message}")]
    Service {
        status: u16,
        rpc_status: String,
        message: String,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    /// The uploaded file never became ACTIVE (remote processing failed or
    /// the poll deadline passed).
    #[error("Remote file processing failed: {0}")]
    FileProcessing(String),

    /// The service refused the content. Terminal, but not a failure.
    #[error("Content blocked by the service: {0}")]
    Blocked(String),

    /// The response did not honor the structured-output contract.
    #[error("Invalid service response: {0}")]
    InvalidResponse(String),
}

impl GeminiError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Build a service error from a raw HTTP failure response body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let (rpc_status, message) =
            match serde_json::from_str::<crate::types::GoogleErrorBody>(body) {
                Ok(parsed) => (parsed.error.status, parsed.error.message),
                Err(_) => (String::new(), body.trim().to_string()),
            };
        Self::Service {
            status,
            rpc_status,
            message,
        }
    }

    /// Classify this error for the retry controller.
    pub fn kind(&self) -> FailureKind {
        match self {
            GeminiError::ConfigError(_) => FailureKind::Fatal,
            GeminiError::Blocked(_) => FailureKind::Blocked,
            GeminiError::Service {
                status,
                rpc_status,
                message,
            } => classify_service(*status, rpc_status, message),
            GeminiError::Network(e) if e.is_timeout() => FailureKind::Throttled,
            GeminiError::Network(_) => FailureKind::Transient,
            GeminiError::UploadFailed(_) => FailureKind::Transient,
            GeminiError::FileProcessing(_) => FailureKind::Transient,
            GeminiError::InvalidResponse(_) => FailureKind::Transient,
        }
    }
}

fn classify_service(status: u16, rpc_status: &str, message: &str) -> FailureKind {
    match rpc_status {
        "RESOURCE_EXHAUSTED" | "UNAVAILABLE" | "DEADLINE_EXCEEDED" => {
            return FailureKind::Throttled
        }
        "PERMISSION_DENIED" | "UNAUTHENTICATED" | "INVALID_ARGUMENT"
        | "FAILED_PRECONDITION" | "OUT_OF_RANGE" => return FailureKind::Fatal,
        _ => {}
    }

    match status {
        429 => return FailureKind::Throttled,
        503 | 504 => return FailureKind::Throttled,
        400 | 401 | 403 | 413 => return FailureKind::Fatal,
        500 | 502 => return FailureKind::Transient,
        _ => {}
    }

    // Boundary fallback for responses missing a usable RPC status.
    let lowered = message.to_lowercase();
    if ["quota", "rate limit", "overloaded", "try again later"]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        FailureKind::Throttled
    } else if ["suspended", "permission denied", "api key not valid"]
        .iter()
        .any(|needle| lowered.contains(needle))
    {
        FailureKind::Fatal
    } else {
        FailureKind::Transient
    }
}
