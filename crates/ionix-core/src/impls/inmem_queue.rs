//! InMemoryQueue - プロセス内の Queue 実装
//!
//! # 学習ポイント
//! - tokio の Mutex + Notify による timeout 付き待機
//! - `Notified::enable` で「確認してから待つ」間の通知取りこぼしを防ぐ

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::ports::{PollOutcome, Queue};

pub const CLOSED_REASON: &str = "queue closed";

#[derive(Debug, thiserror::Error)]
#[error("queue is closed")]
pub struct QueueClosed;

#[derive(Default)]
struct State {
    messages: VecDeque<Vec<u8>>,
    closed: bool,
}

/// In-process FIFO of raw envelopes.
///
/// - `push` で追加、`poll` は timeout まで待機
/// - `close` 後も残っているメッセージは取り出せる。空になると `FatalFailure`
#[derive(Default)]
pub struct InMemoryQueue {
    state: Mutex<State>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push(&self, raw: impl Into<Vec<u8>>) -> Result<(), QueueClosed> {
        let mut state = self.state.lock().await;
        if state.closed {
            return Err(QueueClosed);
        }
        state.messages.push_back(raw.into());
        drop(state);

        self.notify.notify_one();
        Ok(())
    }

    /// Refuse further pushes and wake every waiting poller.
    pub async fn close(&self) {
        self.state.lock().await.closed = true;
        self.notify.notify_waiters();
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.messages.is_empty()
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn poll(&self, timeout: Duration) -> PollOutcome {
        let deadline = Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock().await;
                if let Some(raw) = state.messages.pop_front() {
                    return PollOutcome::Message(raw);
                }
                if state.closed {
                    return PollOutcome::FatalFailure(CLOSED_REASON.to_string());
                }
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return PollOutcome::Empty;
            }
        }
    }
}
