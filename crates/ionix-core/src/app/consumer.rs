//! Consumer - decode → route → handler 実行と 3 つの消費モード
//!
//! `consume` picks exactly one mode per call, in this order:
//!
//! 1. **Direct**: the request carries a raw envelope → `handle_raw` once.
//! 2. **Stream**: an event stream is bound → drain it in order.
//! 3. **Poll loop**: poll the bound queue up to `poll_times` times.
//!
//! Every failure is contained where it happens (decode, handler, poll) and
//! reported through the [`ReportSink`]; `consume` itself always returns a
//! [`ConsumeReport`].

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{BoxStream, Fuse};
use futures::{Stream, StreamExt};
use serde_json::Value;
use tracing::{Instrument, debug, info_span, warn};
use ulid::Ulid;

use super::builder::ConsumerBuilder;
use super::poll_loop::run_poll_loop;
use super::report::{ConsumeMode, ConsumeReport};
use super::shutdown::Shutdown;
use crate::config::{FatalFailurePolicy, PollSettings};
use crate::domain::codec::{DecodeFailure, decode_envelope};
use crate::domain::{DispatchOutcome, EventEnvelope, EventType, HandlerError};
use crate::ports::{PollKind, Queue, ReportSink, TracingSink};
use crate::typed::{Event, Handler, SharedRegistry};

/// A lazily produced sequence of raw envelopes.
pub type EventStream = BoxStream<'static, Vec<u8>>;

/// Inputs of one `consume` call.
///
/// Poll-loop fields left as `None` fall back to the consumer's
/// [`PollSettings`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsumeRequest<'a> {
    raw: Option<&'a [u8]>,
    poll_times: Option<u32>,
    timeout: Option<Duration>,
    on_fatal: Option<FatalFailurePolicy>,
}

impl<'a> ConsumeRequest<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct mode with one raw envelope.
    pub fn raw(raw: &'a [u8]) -> Self {
        Self {
            raw: Some(raw),
            ..Self::default()
        }
    }

    pub fn poll_times(mut self, poll_times: u32) -> Self {
        self.poll_times = Some(poll_times);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn on_fatal(mut self, policy: FatalFailurePolicy) -> Self {
        self.on_fatal = Some(policy);
        self
    }

    /// An empty slice counts as "no raw envelope".
    fn direct_input(&self) -> Option<&'a [u8]> {
        self.raw.filter(|raw| !raw.is_empty())
    }

    fn resolve(&self, defaults: PollSettings) -> PollSettings {
        PollSettings {
            poll_times: self.poll_times.unwrap_or(defaults.poll_times),
            timeout: self.timeout.unwrap_or(defaults.timeout),
            on_fatal: self.on_fatal.unwrap_or(defaults.on_fatal),
        }
    }
}

/// Decode + dispatch. Read-only over the registry.
pub(crate) struct Dispatcher {
    pub(crate) id: Ulid,
    pub(crate) name: String,
    pub(crate) registry: SharedRegistry,
    pub(crate) sink: Arc<dyn ReportSink>,
}

impl Dispatcher {
    pub(crate) fn handle_raw(&self, raw: &[u8]) -> DispatchOutcome {
        let outcome = match decode_envelope(raw) {
            Ok(envelope) => self.invoke(&envelope),
            Err(DecodeFailure::Unroutable) => DispatchOutcome::Unroutable,
            Err(DecodeFailure::Malformed(e)) => DispatchOutcome::DecodeError {
                reason: e.to_string(),
            },
        };
        self.sink.on_dispatch(&self.name, &outcome);
        outcome
    }

    pub(crate) fn dispatch(&self, envelope: &EventEnvelope) -> DispatchOutcome {
        let outcome = self.invoke(envelope);
        self.sink.on_dispatch(&self.name, &outcome);
        outcome
    }

    pub(crate) fn report_source_failure(&self, kind: PollKind, reason: &str) {
        self.sink.on_source_failure(&self.name, kind, reason);
    }

    fn invoke(&self, envelope: &EventEnvelope) -> DispatchOutcome {
        let event_type = envelope.event_type().clone();

        // lookup は read lock 内で Arc を clone するだけ。handler は lock 外で実行
        let Some(handler) = self.registry.lookup(event_type.as_str()) else {
            return DispatchOutcome::NoHandler { event_type };
        };

        let result = catch_unwind(AssertUnwindSafe(|| {
            handler.handle(envelope.payload(), envelope)
        }))
        .unwrap_or_else(|panic| Err(HandlerError::Panicked(panic_message(panic.as_ref()))));

        match result {
            Ok(()) => DispatchOutcome::Handled { event_type },
            Err(error) => DispatchOutcome::HandlerError { event_type, error },
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Routes events to handlers by `event_type`.
///
/// # 使用例
/// ```ignore
/// let mut consumer = Consumer::new("service-a");
/// consumer
///     .register("ACCOUNT_CREATED", |payload, _env| {
///         println!("account {} created", payload["id"]);
///         Ok(())
///     })
///     .set_queue(Arc::new(SimulatedQueue::new()));
///
/// let report = consumer.consume(ConsumeRequest::new().poll_times(10)).await;
/// ```
pub struct Consumer {
    dispatcher: Dispatcher,
    stream: Option<Fuse<EventStream>>,
    queue: Option<Arc<dyn Queue>>,
    poll: PollSettings,
    shutdown: Shutdown,
}

impl Consumer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            dispatcher: Dispatcher {
                id: Ulid::new(),
                name: name.into(),
                registry: SharedRegistry::new(),
                sink: Arc::new(TracingSink),
            },
            stream: None,
            queue: None,
            poll: PollSettings::default(),
            shutdown: Shutdown::new(),
        }
    }

    pub fn builder(name: impl Into<String>) -> ConsumerBuilder {
        ConsumerBuilder::new(name)
    }

    pub fn id(&self) -> Ulid {
        self.dispatcher.id
    }

    pub fn name(&self) -> &str {
        &self.dispatcher.name
    }

    /// The registry this consumer dispatches from. Clones share it, so other
    /// threads can register while the consumer runs.
    pub fn registry(&self) -> &SharedRegistry {
        &self.dispatcher.registry
    }

    pub fn poll_settings(&self) -> PollSettings {
        self.poll
    }

    /// Handle for stopping a running `consume` call from elsewhere.
    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn register<F>(&mut self, event_type: impl Into<EventType>, handler: F) -> &mut Self
    where
        F: Fn(&Value, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.dispatcher.registry.register(event_type, handler);
        self
    }

    pub fn register_handler(
        &mut self,
        event_type: impl Into<EventType>,
        handler: Arc<dyn Handler>,
    ) -> &mut Self {
        self.dispatcher.registry.register_handler(event_type, handler);
        self
    }

    pub fn register_batch<I, K>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, Arc<dyn Handler>)>,
        K: Into<EventType>,
    {
        self.dispatcher.registry.register_batch(entries);
        self
    }

    pub fn register_typed<E, F>(&mut self, handler: F) -> &mut Self
    where
        E: Event,
        F: Fn(E, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.dispatcher.registry.register_typed::<E, F>(handler);
        self
    }

    /// Bind (or replace) the stream used by stream mode.
    pub fn set_event_stream<S>(&mut self, stream: S) -> &mut Self
    where
        S: Stream<Item = Vec<u8>> + Send + 'static,
    {
        self.stream = Some(stream.boxed().fuse());
        self
    }

    /// Unbind the stream; later calls fall through to poll-loop mode.
    pub fn clear_event_stream(&mut self) -> &mut Self {
        self.stream = None;
        self
    }

    pub fn has_event_stream(&self) -> bool {
        self.stream.is_some()
    }

    pub fn set_queue(&mut self, queue: Arc<dyn Queue>) -> &mut Self {
        self.queue = Some(queue);
        self
    }

    pub fn set_poll_settings(&mut self, settings: PollSettings) -> &mut Self {
        self.poll = settings;
        self
    }

    pub fn set_report_sink(&mut self, sink: Arc<dyn ReportSink>) -> &mut Self {
        self.dispatcher.sink = sink;
        self
    }

    pub(crate) fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub(crate) fn set_registry(&mut self, registry: SharedRegistry) -> &mut Self {
        self.dispatcher.registry = registry;
        self
    }

    /// Decode one raw envelope and dispatch it.
    ///
    /// Never fails: decode errors, missing routes and handler failures all
    /// come back as a [`DispatchOutcome`].
    pub fn handle_raw(&self, raw: &[u8]) -> DispatchOutcome {
        self.dispatcher.handle_raw(raw)
    }

    /// Dispatch an already decoded envelope.
    pub fn dispatch(&self, envelope: &EventEnvelope) -> DispatchOutcome {
        self.dispatcher.dispatch(envelope)
    }

    /// Run one consumption pass: direct, stream or poll loop, in that order.
    ///
    /// With no raw envelope, no stream and no queue there is nothing to do:
    /// the report comes back as [`ConsumeMode::Idle`] and a warning is
    /// logged. Bind a queue with `set_queue` to poll.
    ///
    /// A shutdown request stops the run and is cleared when the run returns.
    /// One made while no run is active stops the next stream or poll-loop run.
    pub async fn consume(&mut self, request: ConsumeRequest<'_>) -> ConsumeReport {
        let mode = if request.direct_input().is_some() {
            ConsumeMode::Direct
        } else if self.stream.is_some() {
            ConsumeMode::Stream
        } else if self.queue.is_some() {
            ConsumeMode::PollLoop
        } else {
            ConsumeMode::Idle
        };

        let span = info_span!(
            "consume",
            consumer = %self.dispatcher.name,
            consumer_id = %self.dispatcher.id,
            mode = ?mode,
        );

        async {
            let mut report = ConsumeReport::new(mode);
            match mode {
                ConsumeMode::Direct => {
                    if let Some(raw) = request.direct_input() {
                        report.dispatch.record(&self.dispatcher.handle_raw(raw));
                    }
                }
                ConsumeMode::Stream => {
                    self.drain_stream(&mut report).await;
                    self.shutdown.reset();
                }
                ConsumeMode::PollLoop => {
                    let settings = request.resolve(self.poll);
                    self.poll_queue(settings, &mut report).await;
                    self.shutdown.reset();
                }
                ConsumeMode::Idle => {
                    warn!("no raw event, event stream or queue to consume from");
                }
            }
            debug!(
                dispatched = report.dispatch.total(),
                errors = report.dispatch.errors(),
                "consume finished"
            );
            report
        }
        .instrument(span)
        .await
    }

    async fn drain_stream(&mut self, report: &mut ConsumeReport) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        let mut listener = self.shutdown.listener();

        loop {
            if listener.is_requested() {
                report.cancelled = true;
                break;
            }

            let next = tokio::select! {
                biased;
                _ = listener.requested() => {
                    report.cancelled = true;
                    break;
                }
                next = stream.next() => next,
            };

            // Fuse のため、枯渇後の再呼び出しでも None を返し続ける
            let Some(raw) = next else {
                break;
            };
            report.dispatch.record(&self.dispatcher.handle_raw(&raw));
        }
    }

    async fn poll_queue(&mut self, settings: PollSettings, report: &mut ConsumeReport) {
        let Some(queue) = self.queue.as_deref() else {
            return;
        };
        let listener = self.shutdown.listener();
        let dispatcher = &self.dispatcher;
        let dispatch = &mut report.dispatch;

        let summary = run_poll_loop(
            queue,
            settings,
            &listener,
            |raw| dispatch.record(&dispatcher.handle_raw(&raw)),
            |kind, reason| dispatcher.report_source_failure(kind, reason),
        )
        .await;

        report.poll = summary.poll;
        report.aborted = summary.aborted;
        report.cancelled = summary.cancelled;
    }
}

impl std::fmt::Debug for Consumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Consumer")
            .field("id", &self.dispatcher.id)
            .field("name", &self.dispatcher.name)
            .field("registry", &self.dispatcher.registry)
            .field("has_stream", &self.stream.is_some())
            .field("has_queue", &self.queue.is_some())
            .field("poll", &self.poll)
            .finish()
    }
}
