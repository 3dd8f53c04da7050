//! ConsumeReport - 1 回の consume 呼び出しの集計

use serde::Serialize;

use crate::domain::{DispatchOutcome, OutcomeKind};
use crate::ports::PollKind;

/// Which of the consumption modes served a `consume` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsumeMode {
    Direct,
    Stream,
    PollLoop,
    /// Poll-loop mode was selected but no queue is bound.
    Idle,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchCounts {
    pub handled: usize,
    pub decode_errors: usize,
    pub unroutable: usize,
    pub no_handler: usize,
    pub handler_errors: usize,
}

impl DispatchCounts {
    pub fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome.kind() {
            OutcomeKind::Handled => self.handled += 1,
            OutcomeKind::DecodeError => self.decode_errors += 1,
            OutcomeKind::Unroutable => self.unroutable += 1,
            OutcomeKind::NoHandler => self.no_handler += 1,
            OutcomeKind::HandlerError => self.handler_errors += 1,
        }
    }

    /// Raw messages that went through `handle_raw`.
    pub fn total(&self) -> usize {
        self.handled + self.decode_errors + self.unroutable + self.no_handler + self.handler_errors
    }

    pub fn errors(&self) -> usize {
        self.decode_errors + self.unroutable + self.handler_errors
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollCounts {
    pub polls: usize,
    pub messages: usize,
    pub empty: usize,
    pub transient_failures: usize,
    pub fatal_failures: usize,
}

impl PollCounts {
    pub fn record(&mut self, kind: PollKind) {
        self.polls += 1;
        match kind {
            PollKind::Message => self.messages += 1,
            PollKind::Empty => self.empty += 1,
            PollKind::TransientFailure => self.transient_failures += 1,
            PollKind::FatalFailure => self.fatal_failures += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumeReport {
    pub mode: ConsumeMode,
    pub dispatch: DispatchCounts,
    pub poll: PollCounts,
    /// The poll loop stopped early on a fatal failure.
    pub aborted: bool,
    /// Shutdown was requested before the input was exhausted.
    pub cancelled: bool,
}

impl ConsumeReport {
    pub fn new(mode: ConsumeMode) -> Self {
        Self {
            mode,
            dispatch: DispatchCounts::default(),
            poll: PollCounts::default(),
            aborted: false,
            cancelled: false,
        }
    }
}
