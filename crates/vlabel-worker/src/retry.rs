//! Retry controller with failure classification and credential rotation.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use vlabel_gemini::KeyRotator;
use vlabel_models::FailureKind;
use vlabel_store::ErrorJournal;

use crate::error::PipelineError;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt bound, including the first attempt.
    pub max_attempts: u32,
    /// First wait after a throttling failure; grows multiplicatively.
    pub throttle_base: Duration,
    /// Growth factor for consecutive throttling waits.
    pub throttle_multiplier: f64,
    /// Upper bound on a single throttling wait.
    pub throttle_cap: Duration,
    /// Fixed wait after an uncategorized transient failure.
    pub transient_delay: Duration,
    /// Deadline around each attempt of the wrapped operation.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 6,
            throttle_base: Duration::from_secs(5),
            throttle_multiplier: 2.0,
            throttle_cap: Duration::from_secs(600),
            transient_delay: Duration::from_secs(5),
            call_timeout: Duration::from_secs(600),
        }
    }
}

impl RetryPolicy {
    /// Wait before re-attempting after the `attempt`-th throttling failure
    /// (1-based): `base * multiplier^(attempt-1)`, capped.
    pub fn throttle_delay(&self, attempt: u32) -> Duration {
        let factor = self
            .throttle_multiplier
            .powi(attempt.saturating_sub(1) as i32);
        let millis = (self.throttle_base.as_millis() as f64 * factor) as u64;
        Duration::from_millis(millis).min(self.throttle_cap)
    }
}

/// Outcome of a fully retried operation.
///
/// `Blocked` and `Abandoned` are both terminal but mean different things:
/// a blocked unit is DONE with a placeholder payload, an abandoned unit has
/// been written to the failure journal and produced nothing.
#[derive(Debug)]
pub enum Attempted<T> {
    Completed(T),
    Blocked,
    Abandoned,
}

impl<T> Attempted<T> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Attempted::Completed(_))
    }
}

/// Wraps one unit of work: classifies failures, waits, retries, and records
/// permanent failures in the journal.
///
/// Every attempt draws a fresh credential from the rotator — failed attempts
/// rotate too, so a rate-limited key is not immediately reused.
#[derive(Clone)]
pub struct RetryController {
    policy: RetryPolicy,
    rotator: Arc<KeyRotator>,
    journal: Arc<ErrorJournal>,
}

impl RetryController {
    pub fn new(policy: RetryPolicy, rotator: Arc<KeyRotator>, journal: Arc<ErrorJournal>) -> Self {
        Self {
            policy,
            rotator,
            journal,
        }
    }

    /// Execute `operation` under the retry state machine.
    ///
    /// Never panics and never returns an error: a unit that cannot complete
    /// is journaled and reported as `Abandoned` so the rest of the run
    /// continues.
    pub async fn execute<T, F, Fut>(&self, context: &str, operation: F) -> Attempted<T>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, PipelineError>>,
    {
        let mut last_error = String::new();

        for attempt in 1..=self.policy.max_attempts {
            let api_key = self.rotator.next().to_string();

            let outcome =
                match tokio::time::timeout(self.policy.call_timeout, operation(api_key)).await {
                    Ok(result) => result,
                    Err(_) => Err(PipelineError::Deadline(self.policy.call_timeout)),
                };

            let failure = match outcome {
                Ok(value) => return Attempted::Completed(value),
                Err(e) => e,
            };

            match failure.kind() {
                FailureKind::Blocked => {
                    info!(context, "Content blocked; recording placeholder");
                    return Attempted::Blocked;
                }
                FailureKind::Fatal => {
                    error!(context, error = %failure, "Fatal failure, abandoning unit");
                    self.journal.record(context, &failure.to_string()).await;
                    return Attempted::Abandoned;
                }
                kind => {
                    last_error = failure.to_string();
                    if attempt == self.policy.max_attempts {
                        break;
                    }
                    let delay = match kind {
                        FailureKind::Throttled => self.policy.throttle_delay(attempt),
                        _ => self.policy.transient_delay,
                    };
                    warn!(
                        context,
                        attempt,
                        max_attempts = self.policy.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }

        error!(
            context,
            attempts = self.policy.max_attempts,
            "Retries exhausted, abandoning unit"
        );
        self.journal
            .record(context, &format!("retries exhausted: {last_error}"))
            .await;
        Attempted::Abandoned
    }
}
