//! Queue port - ポーリング契約
//!
//! A queue hands out zero or one serialized envelope per `poll`. Failure modes
//! are variants of [`PollOutcome`], never `Err` or a panic, so the poll loop
//! matches on them exhaustively.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of one bounded poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A serialized envelope is available now.
    Message(Vec<u8>),

    /// Nothing arrived within the timeout. Not an error.
    Empty,

    /// Retryable (backend momentarily unavailable). Keep polling.
    TransientFailure(String),

    /// Not retryable. The poll loop's `FatalFailurePolicy` decides what happens next.
    FatalFailure(String),
}

impl PollOutcome {
    pub fn message(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Message(bytes.into())
    }

    pub fn kind(&self) -> PollKind {
        match self {
            PollOutcome::Message(_) => PollKind::Message,
            PollOutcome::Empty => PollKind::Empty,
            PollOutcome::TransientFailure(_) => PollKind::TransientFailure,
            PollOutcome::FatalFailure(_) => PollKind::FatalFailure,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollKind {
    Message,
    Empty,
    TransientFailure,
    FatalFailure,
}

impl fmt::Display for PollKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PollKind::Message => "message",
            PollKind::Empty => "empty",
            PollKind::TransientFailure => "transient_failure",
            PollKind::FatalFailure => "fatal_failure",
        };
        f.write_str(s)
    }
}

/// Queue port (interface).
///
/// Implementations must return within roughly `timeout`. Each call is
/// independent; the contract carries no state between polls.
#[async_trait]
pub trait Queue: Send + Sync {
    async fn poll(&self, timeout: Duration) -> PollOutcome;
}

#[async_trait]
impl<Q: Queue + ?Sized> Queue for std::sync::Arc<Q> {
    async fn poll(&self, timeout: Duration) -> PollOutcome {
        (**self).poll(timeout).await
    }
}
