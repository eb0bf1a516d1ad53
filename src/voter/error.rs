use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the voter. None of them are transient; each one is a
/// usage error the caller has to fix.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VoterError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Invalid observation: {0}")]
    InvalidObservation(String),

    #[error("Non-monotonic timestamp: {now:?} is earlier than previous step at {previous:?}")]
    Timing { previous: Duration, now: Duration },
}
