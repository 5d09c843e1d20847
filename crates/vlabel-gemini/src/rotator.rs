//! Round-robin API key rotation.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{GeminiError, GeminiResult};

/// Shared round-robin dispenser over a fixed pool of API keys.
///
/// The pool is established at startup and never changes; the cursor is the
/// only shared mutable state and lives in a single atomic, so concurrent
/// workers advance it without locks or lost updates. The cursor is not
/// persisted — a restart resetting rotation order is acceptable.
///
/// Every attempt of a retried operation draws a fresh key, so a key that
/// just got rate-limited is not reused on the very next attempt.
#[derive(Debug)]
pub struct KeyRotator {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyRotator {
    pub fn new(keys: Vec<String>) -> GeminiResult<Self> {
        if keys.is_empty() {
            return Err(GeminiError::ConfigError("empty API key pool".into()));
        }
        Ok(Self {
            keys,
            cursor: AtomicUsize::new(0),
        })
    }

    /// Parse a comma-separated key list, ignoring empty entries.
    pub fn from_env_value(raw: &str) -> GeminiResult<Self> {
        let keys = raw
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();
        Self::new(keys)
    }

    /// Next key in round-robin order.
    pub fn next(&self) -> &str {
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed);
        &self.keys[idx % self.keys.len()]
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// All keys in pool order, for maintenance tools that sweep every key.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn empty_pool_is_a_config_error() {
        assert!(KeyRotator::new(vec![]).is_err());
        assert!(KeyRotator::from_env_value(" , ,").is_err());
    }

    #[test]
    fn parses_comma_separated_pool() {
        let rotator = KeyRotator::from_env_value("alpha, beta ,gamma").unwrap();
        assert_eq!(rotator.len(), 3);
        assert_eq!(rotator.keys(), &["alpha", "beta", "gamma"]);
    }

    #[test]
    fn one_full_cycle_visits_every_key_once_in_pool_order() {
        let rotator = KeyRotator::new(vec!["a".into(), "b".into(), "c".into()]).unwrap();
        let cycle: Vec<&str> = (0..3).map(|_| rotator.next()).collect();
        assert_eq!(cycle, vec!["a", "b", "c"]);
        // And wraps.
        assert_eq!(rotator.next(), "a");
    }

    #[test]
    fn concurrent_callers_spread_evenly_across_the_pool() {
        let rotator = Arc::new(KeyRotator::new(vec!["a".into(), "b".into(), "c".into()]).unwrap());
        let per_thread = 300;

        let counts: HashMap<String, usize> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..3)
                .map(|_| {
                    let rotator = Arc::clone(&rotator);
                    scope.spawn(move || {
                        let mut local: HashMap<String, usize> = HashMap::new();
                        for _ in 0..per_thread {
                            *local.entry(rotator.next().to_string()).or_default() += 1;
                        }
                        local
                    })
                })
                .collect();

            let mut merged: HashMap<String, usize> = HashMap::new();
            for handle in handles {
                for (key, n) in handle.join().unwrap() {
                    *merged.entry(key).or_default() += n;
                }
            }
            merged
        });

        // fetch_add guarantees no lost updates: the total is exact and each
        // key gets exactly a third of the draws.
        assert_eq!(counts.values().sum::<usize>(), 3 * per_thread);
        for key in ["a", "b", "c"] {
            assert_eq!(counts[key], per_thread);
        }
    }
}
