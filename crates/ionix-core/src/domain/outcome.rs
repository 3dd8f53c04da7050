//! Dispatch outcome: what happened to one raw message.
//!
//! "Nothing to do" (`NoHandler`) and "something went wrong" (`DecodeError`,
//! `Unroutable`, `HandlerError`) are separate variants, so callers match on
//! them instead of catching errors.

use serde::{Deserialize, Serialize};

use super::envelope::EventType;
use super::errors::HandlerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Handled,
    DecodeError,
    Unroutable,
    NoHandler,
    HandlerError,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The registered handler returned `Ok`.
    Handled { event_type: EventType },

    /// Bytes were not a well-formed envelope. Discarded.
    DecodeError { reason: String },

    /// No (or empty) `event_type`. Discarded.
    Unroutable,

    /// Valid event, no handler registered. Informational.
    NoHandler { event_type: EventType },

    /// The handler failed or panicked. Isolated from other dispatches.
    HandlerError {
        event_type: EventType,
        error: HandlerError,
    },
}

impl DispatchOutcome {
    pub fn kind(&self) -> OutcomeKind {
        match self {
            DispatchOutcome::Handled { .. } => OutcomeKind::Handled,
            DispatchOutcome::DecodeError { .. } => OutcomeKind::DecodeError,
            DispatchOutcome::Unroutable => OutcomeKind::Unroutable,
            DispatchOutcome::NoHandler { .. } => OutcomeKind::NoHandler,
            DispatchOutcome::HandlerError { .. } => OutcomeKind::HandlerError,
        }
    }

    /// `Handled` and `NoHandler` are routine; everything else is reported as an error.
    pub fn is_error(&self) -> bool {
        !matches!(
            self,
            DispatchOutcome::Handled { .. } | DispatchOutcome::NoHandler { .. }
        )
    }

    pub fn event_type(&self) -> Option<&EventType> {
        match self {
            DispatchOutcome::Handled { event_type }
            | DispatchOutcome::NoHandler { event_type }
            | DispatchOutcome::HandlerError { event_type, .. } => Some(event_type),
            DispatchOutcome::DecodeError { .. } | DispatchOutcome::Unroutable => None,
        }
    }
}
