//! Failure classification shared across the pipeline.

/// How a failed work-unit attempt should be handled.
///
/// Classification happens on typed error values at each boundary (service
/// client, store, media glue); the retry controller only ever looks at this
/// enum, never at message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Load-based throttling (rate limit, quota, unavailable, deadline
    /// exceeded). Worth a multiplicatively growing wait before retrying.
    Throttled,
    /// Uncategorized or known-transient failure. Retried after a fixed
    /// short wait.
    Transient,
    /// Retrying cannot succeed (permission denied, suspended key, invalid
    /// request, corrupt checkpoint). Abort the unit immediately.
    Fatal,
    /// The generation service refused the content. A valid terminal outcome,
    /// not a failure: the caller substitutes a placeholder payload.
    Blocked,
}

impl FailureKind {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureKind::Throttled | FailureKind::Transient)
    }
}
