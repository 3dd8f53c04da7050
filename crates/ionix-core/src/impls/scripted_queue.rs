//! ScriptedQueue - 決められた順に PollOutcome を返すテスト用 Queue

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{PollOutcome, Queue};

/// Replays a fixed list of outcomes, then reports `Empty` forever.
#[derive(Debug, Default)]
pub struct ScriptedQueue {
    script: Mutex<VecDeque<PollOutcome>>,
    polls: AtomicUsize,
}

impl ScriptedQueue {
    pub fn new(script: impl IntoIterator<Item = PollOutcome>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            polls: AtomicUsize::new(0),
        }
    }

    /// Number of `poll` calls so far.
    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn remaining(&self) -> usize {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Queue for ScriptedQueue {
    async fn poll(&self, _timeout: Duration) -> PollOutcome {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or(PollOutcome::Empty);
        // 他の task（shutdown 要求など）に実行機会を渡す
        tokio::task::yield_now().await;
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(flavor = "current_thread")]
    async fn poll_yields_to_other_tasks() {
        let queue = Arc::new(ScriptedQueue::new([]));
        let flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let f = flag.clone();
        tokio::spawn(async move { f.store(true, Ordering::SeqCst) });

        let q = queue.clone();
        let polls = async move {
            while !flag.load(Ordering::SeqCst) {
                q.poll(Duration::ZERO).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(1), polls).await.unwrap();
        assert!(queue.polls() >= 1);
    }

    #[tokio::test]
    async fn replays_script_then_empty() {
        let queue = ScriptedQueue::new([
            PollOutcome::message(b"a".to_vec()),
            PollOutcome::TransientFailure("later".into()),
        ]);
        let timeout = Duration::from_millis(1);

        assert_eq!(queue.poll(timeout).await, PollOutcome::Message(b"a".to_vec()));
        assert_eq!(
            queue.poll(timeout).await,
            PollOutcome::TransientFailure("later".into())
        );
        assert_eq!(queue.poll(timeout).await, PollOutcome::Empty);
        assert_eq!(queue.polls(), 3);
        assert_eq!(queue.remaining(), 0);
    }
}
