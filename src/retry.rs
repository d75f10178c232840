use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::error::MapperError;

pub const DEFAULT_ATTEMPTS: usize = 10;

/// Call-level retry budget for aggregator batch queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: usize,
    /// Base pause between attempts, multiplied by the attempt number. Zero retries at once.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: usize, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }
}

/// Runs `call` until it succeeds or `policy.attempts` calls have failed.
///
/// Any error counts as transient. After the last failure the whole operation is fatal.
pub fn with_retries<T, F>(policy: RetryPolicy, operation: &str, mut call: F) -> Result<T, MapperError>
where
    F: FnMut() -> Result<T, MapperError>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < attempts => {
                warn!(operation, attempt, max_attempts = attempts, error = %err, "retrying");
                if !policy.delay.is_zero() {
                    thread::sleep(policy.delay * attempt as u32);
                }
            }
            Err(err) => {
                warn!(operation, attempts, error = %err, "max retries reached");
                return Err(MapperError::RetriesExhausted {
                    operation: operation.to_string(),
                    attempts,
                    message: err.to_string(),
                });
            }
        }
    }
}
