//! Retry utilities for transient provider failures.
//!
//! Provides classification of retryable failures and linear backoff.

use crate::error::GatewayError;
use std::time::Duration;

/// Gateway statuses worth retrying.
const RETRYABLE_STATUSES: [u16; 3] = [502, 503, 504];

/// Substrings of transport messages that indicate a transient network fault.
const TRANSIENT_MARKERS: [&str; 7] = [
    "timed out",
    "timeout",
    "etimedout",
    "abort",
    "network",
    "connect",
    "error sending request",
];

/// Whether an HTTP status indicates an overloaded or flapping upstream.
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Determine whether a gateway error is worth retrying.
///
/// Retryable errors: network failures and per-attempt deadlines.
/// Everything else is a definite answer from the provider or a local fault.
pub fn is_retryable(error: &GatewayError) -> bool {
    match error {
        GatewayError::Transport { message } => {
            let message = message.to_ascii_lowercase();
            TRANSIENT_MARKERS.iter().any(|m| message.contains(m))
        }
        _ => false,
    }
}

/// Linear backoff: `base_delay * attempt`, capped at 30 seconds.
///
/// `attempt` is 1-based, so the first retry waits exactly `base_delay`.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(u64::from(attempt.max(1)));
    Duration::from_millis(delay.min(30_000))
}
