//! Backoff policy for transient transport failures.

use std::time::Duration;

use quill_core::TransportError;

/// Bounded exponential backoff.
///
/// Rate-limit errors that carry a server-provided delay use that delay
/// instead of the exponential schedule; both are capped at `max_delay`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total send attempts, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32, error: &TransportError) -> Duration {
        if let TransportError::RateLimited { retry_after_secs } = error {
            return Duration::from_secs(*retry_after_secs).min(self.max_delay);
        }
        self.base_delay
            .saturating_mul(1u32 << attempt.min(10))
            .min(self.max_delay)
    }
}
