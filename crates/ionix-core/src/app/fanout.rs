//! FanoutGroup - 1 つの Queue から複数の独立した Consumer へ配る
//!
//! Every polled message is handed to each consumer's `handle_raw`, in the
//! order the consumers were added. Consumers share no state: a failing
//! handler in one is invisible to the others.

use std::sync::Arc;

use serde::Serialize;
use tracing::{Instrument, info_span};

use super::consumer::{Consumer, Dispatcher};
use super::poll_loop::run_poll_loop;
use super::report::{DispatchCounts, PollCounts};
use super::shutdown::Shutdown;
use crate::config::PollSettings;
use crate::ports::Queue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FanoutReport {
    pub poll: PollCounts,
    /// `(consumer name, counts)` in consumer order.
    pub consumers: Vec<(String, DispatchCounts)>,
    pub aborted: bool,
    pub cancelled: bool,
}

pub struct FanoutGroup {
    queue: Arc<dyn Queue>,
    consumers: Vec<Consumer>,
    poll: PollSettings,
    shutdown: Shutdown,
}

impl FanoutGroup {
    pub fn new(queue: Arc<dyn Queue>) -> Self {
        Self {
            queue,
            consumers: Vec::new(),
            poll: PollSettings::default(),
            shutdown: Shutdown::new(),
        }
    }

    pub fn with_consumer(mut self, consumer: Consumer) -> Self {
        self.consumers.push(consumer);
        self
    }

    pub fn with_poll_settings(mut self, settings: PollSettings) -> Self {
        self.poll = settings;
        self
    }

    pub fn consumers(&self) -> &[Consumer] {
        &self.consumers
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    /// Poll the shared queue with the group's settings.
    pub async fn run(&mut self) -> FanoutReport {
        self.run_with(self.poll).await
    }

    pub async fn run_with(&mut self, settings: PollSettings) -> FanoutReport {
        let consumers: Vec<&Dispatcher> = self.consumers.iter().map(Consumer::dispatcher).collect();
        let mut counts = vec![DispatchCounts::default(); consumers.len()];
        let listener = self.shutdown.listener();
        let span = info_span!("fanout", consumers = consumers.len());

        let summary = run_poll_loop(
            self.queue.as_ref(),
            settings,
            &listener,
            |raw| {
                for (consumer, counts) in consumers.iter().zip(counts.iter_mut()) {
                    counts.record(&consumer.handle_raw(&raw));
                }
            },
            |kind, reason| {
                for consumer in &consumers {
                    consumer.report_source_failure(kind, reason);
                }
            },
        )
        .instrument(span)
        .await;
        self.shutdown.reset();

        FanoutReport {
            poll: summary.poll,
            consumers: consumers
                .iter()
                .map(|c| c.name.clone())
                .zip(counts)
                .collect(),
            aborted: summary.aborted,
            cancelled: summary.cancelled,
        }
    }

    pub fn into_consumers(self) -> Vec<Consumer> {
        self.consumers
    }
}
