//! Structured error types for kairos.
//!
//! Fallible construction and director APIs return
//! `Result<T, KairosError>`. These are the failures that stop a model:
//! bad configuration, reading an empty queue, or asking to be fired in
//! the past. Recoverable task-level conditions (busy resource, unknown
//! task id) are *not* errors of this kind; see [`crate::task::OsError`].

use thiserror::Error;

use crate::time::ModelTime;

/// The top-level error type for the scheduling core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum KairosError {
    // ── Queue errors ──────────────────────────────────────

    /// `peek` or `take` on an empty event queue.
    #[error("event queue is empty")]
    EmptyQueue,

    // ── Configuration errors ──────────────────────────────

    /// A delay component was configured with a negative delay.
    #[error("cannot have negative delay: {delay}")]
    NegativeDelay { delay: ModelTime },

    /// Any other rejected configuration (duplicate ids, malformed input).
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A value could not be converted to model time.
    #[error("invalid model time: {0}")]
    InvalidTime(String),

    // ── Scheduling errors ─────────────────────────────────

    /// A firing was requested at a time earlier than the current time.
    #[error("cannot fire at {requested} when current time is {current}")]
    NonCausalRequest {
        requested: ModelTime,
        current: ModelTime,
    },
}

/// Convenience alias for `Result<T, KairosError>`.
pub type KairosResult<T> = Result<T, KairosError>;
