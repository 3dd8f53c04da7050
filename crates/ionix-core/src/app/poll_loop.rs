//! Poll loop - Queue を最大 poll_times 回ポーリングする共通ループ
//!
//! Shared by [`Consumer`](super::Consumer) and
//! [`FanoutGroup`](super::FanoutGroup); callers decide what a message or a
//! source failure means for them.

use tracing::{debug, warn};

use super::report::PollCounts;
use super::shutdown::ShutdownListener;
use crate::config::{FatalFailurePolicy, PollSettings};
use crate::ports::{PollKind, PollOutcome, Queue};

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct PollLoopSummary {
    pub poll: PollCounts,
    pub aborted: bool,
    pub cancelled: bool,
}

/// Poll `queue` up to `settings.poll_times` times.
///
/// - `Message` → `on_message`
/// - `Empty` → nothing
/// - `TransientFailure` → `on_failure`, keep going
/// - `FatalFailure` → `on_failure`, then `settings.on_fatal` decides
///
/// Shutdown is checked before every poll, never during one.
pub(crate) async fn run_poll_loop<M, F>(
    queue: &dyn Queue,
    settings: PollSettings,
    listener: &ShutdownListener,
    mut on_message: M,
    mut on_failure: F,
) -> PollLoopSummary
where
    M: FnMut(Vec<u8>),
    F: FnMut(PollKind, &str),
{
    let mut summary = PollLoopSummary::default();

    for iteration in 1..=settings.poll_times {
        if listener.is_requested() {
            debug!(iteration, "shutdown requested, poll loop stopping");
            summary.cancelled = true;
            break;
        }

        let outcome = queue.poll(settings.timeout).await;
        let kind = outcome.kind();
        summary.poll.record(kind);

        match outcome {
            PollOutcome::Message(raw) => on_message(raw),
            PollOutcome::Empty => debug!(iteration, "no message available at this poll"),
            PollOutcome::TransientFailure(reason) => on_failure(kind, &reason),
            PollOutcome::FatalFailure(reason) => {
                on_failure(kind, &reason);
                if settings.on_fatal == FatalFailurePolicy::Abort {
                    warn!(iteration, reason = %reason, "fatal queue failure, aborting poll loop");
                    summary.aborted = true;
                    break;
                }
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::shutdown::Shutdown;
    use crate::impls::ScriptedQueue;
    use std::time::Duration;

    fn settings(poll_times: u32, on_fatal: FatalFailurePolicy) -> PollSettings {
        PollSettings {
            poll_times,
            timeout: Duration::from_millis(5),
            on_fatal,
        }
    }

    fn script() -> ScriptedQueue {
        ScriptedQueue::new([
            PollOutcome::message(b"1".to_vec()),
            PollOutcome::TransientFailure("t".into()),
            PollOutcome::FatalFailure("f".into()),
            PollOutcome::message(b"2".to_vec()),
        ])
    }

    #[tokio::test]
    async fn continue_policy_uses_every_slot() {
        let queue = script();
        let shutdown = Shutdown::new();
        let mut messages = Vec::new();
        let mut failures = Vec::new();

        let summary = run_poll_loop(
            &queue,
            settings(6, FatalFailurePolicy::Continue),
            &shutdown.listener(),
            |raw| messages.push(raw),
            |kind, _| failures.push(kind),
        )
        .await;

        assert_eq!(messages, vec![b"1".to_vec(), b"2".to_vec()]);
        assert_eq!(failures, vec![PollKind::TransientFailure, PollKind::FatalFailure]);
        assert_eq!(summary.poll.polls, 6);
        assert_eq!(summary.poll.empty, 2);
        assert!(!summary.aborted);
    }

    #[tokio::test]
    async fn abort_policy_stops_on_fatal() {
        let queue = script();
        let shutdown = Shutdown::new();
        let mut messages = 0;

        let summary = run_poll_loop(
            &queue,
            settings(6, FatalFailurePolicy::Abort),
            &shutdown.listener(),
            |_| messages += 1,
            |_, _| {},
        )
        .await;

        assert!(summary.aborted);
        assert_eq!(summary.poll.polls, 3);
        assert_eq!(messages, 1);
        assert_eq!(queue.polls(), 3);
    }

    #[tokio::test]
    async fn shutdown_before_first_poll_polls_nothing() {
        let queue = script();
        let shutdown = Shutdown::new();
        shutdown.request();

        let summary = run_poll_loop(
            &queue,
            settings(6, FatalFailurePolicy::Continue),
            &shutdown.listener(),
            |_| {},
            |_, _| {},
        )
        .await;

        assert!(summary.cancelled);
        assert_eq!(queue.polls(), 0);
    }
}
