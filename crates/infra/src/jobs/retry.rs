//! Per-class retry policy.
//!
//! A pure decision table: identical `(class, kind, attempts)` inputs always
//! yield identical decisions. The queue manager applies the decision; nothing
//! here reads or writes state.

use std::time::Duration;

use super::types::{ErrorKind, JobClass};

/// Backoff ladders, minutes. Attempt N (1-indexed) uses index N-1, clamped.
const DEFAULT_BACKOFF_MIN: [u64; 3] = [1, 5, 15];
const RATE_LIMITED_BACKOFF_MIN: [u64; 3] = [5, 15, 30];

/// Outcome of a failure report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Return the job to pending, eligible again after `delay`.
    Retry { delay: Duration },
    /// Terminal failure.
    Fail,
}

/// Whether this failure kind is transient for the given class.
pub fn is_retryable(class: JobClass, kind: ErrorKind) -> bool {
    match class {
        // Parse is single-shot regardless of kind.
        JobClass::Parse => false,
        JobClass::Fetch => matches!(
            kind,
            ErrorKind::Timeout
                | ErrorKind::ConnectionError
                | ErrorKind::ServerError
                | ErrorKind::RateLimited
                | ErrorKind::WorkerAbandoned
        ),
        JobClass::Analyze => matches!(
            kind,
            ErrorKind::Timeout
                | ErrorKind::RateLimited
                | ErrorKind::ServerError
                | ErrorKind::MalformedResponse
                | ErrorKind::WorkerAbandoned
        ),
    }
}

/// Delay before the Nth retry (`attempts` = failures so far, 1-indexed).
pub fn backoff(class: JobClass, kind: ErrorKind, attempts: u32) -> Duration {
    let ladder = match (class, kind) {
        (JobClass::Analyze, ErrorKind::RateLimited) => &RATE_LIMITED_BACKOFF_MIN,
        _ => &DEFAULT_BACKOFF_MIN,
    };
    let index = (attempts.max(1) as usize - 1).min(ladder.len() - 1);
    Duration::from_secs(ladder[index] * 60)
}

/// The decision table from the failure-handling design:
/// retry iff the kind is transient for the class and budget remains.
pub fn decide(
    class: JobClass,
    kind: ErrorKind,
    attempts: u32,
    max_attempts: u32,
) -> RetryDecision {
    if attempts < max_attempts && is_retryable(class, kind) {
        RetryDecision::Retry {
            delay: backoff(class, kind, attempts),
        }
    } else {
        RetryDecision::Fail
    }
}
