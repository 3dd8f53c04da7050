//! ReportSink port - dispatch / poll の結果を外部へ通知
//!
//! The consumer never lets an error unwind past `consume`; instead every
//! outcome is pushed through a `ReportSink`. The default sink writes
//! structured `tracing` events.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use crate::domain::DispatchOutcome;
use crate::ports::queue::PollKind;

/// Receives every observable report a consumer produces.
pub trait ReportSink: Send + Sync {
    fn on_dispatch(&self, consumer: &str, outcome: &DispatchOutcome);

    /// Called for `TransientFailure` and `FatalFailure` polls.
    fn on_source_failure(&self, consumer: &str, kind: PollKind, reason: &str);
}

/// Logs through `tracing`. Used when no sink is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ReportSink for TracingSink {
    fn on_dispatch(&self, consumer: &str, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Handled { event_type } => {
                debug!(consumer, event_type = %event_type, "event handled");
            }
            DispatchOutcome::NoHandler { event_type } => {
                info!(
                    consumer,
                    event_type = %event_type,
                    "no handler registered for event type, message ignored"
                );
            }
            DispatchOutcome::DecodeError { reason } => {
                error!(consumer, reason = %reason, "failed to decode message");
            }
            DispatchOutcome::Unroutable => {
                error!(consumer, "event missing 'event_type', message ignored");
            }
            DispatchOutcome::HandlerError { event_type, error } => {
                error!(consumer, event_type = %event_type, error = %error, "error in handler");
            }
        }
    }

    fn on_source_failure(&self, consumer: &str, kind: PollKind, reason: &str) {
        match kind {
            PollKind::FatalFailure => error!(consumer, kind = %kind, reason, "queue poll failed"),
            _ => warn!(consumer, kind = %kind, reason, "queue poll failed"),
        }
    }
}

/// One entry captured by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Dispatch {
        consumer: String,
        outcome: DispatchOutcome,
    },
    SourceFailure {
        consumer: String,
        kind: PollKind,
        reason: String,
    },
}

/// Keeps every report in memory. Handy for tests and for callers that want
/// to inspect outcomes after a run.
#[derive(Debug, Default, Clone)]
pub struct RecordingSink {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn dispatches(&self) -> Vec<DispatchOutcome> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Dispatch { outcome, .. } => Some(outcome),
                Report::SourceFailure { .. } => None,
            })
            .collect()
    }

    fn push(&self, report: Report) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report);
    }
}

impl ReportSink for RecordingSink {
    fn on_dispatch(&self, consumer: &str, outcome: &DispatchOutcome) {
        self.push(Report::Dispatch {
            consumer: consumer.to_string(),
            outcome: outcome.clone(),
        });
    }

    fn on_source_failure(&self, consumer: &str, kind: PollKind, reason: &str) {
        self.push(Report::SourceFailure {
            consumer: consumer.to_string(),
            kind,
            reason: reason.to_string(),
        });
    }
}
