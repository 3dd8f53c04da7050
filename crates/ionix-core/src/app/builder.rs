//! ConsumerBuilder - Consumer の構築とワイヤリング
//!
//! # 学習ポイント
//! - 値渡しの Builder パターン（`mut self` → `Self`）
//! - 起動時検証（Fail-fast 設計）

use std::sync::Arc;

use futures::Stream;
use serde_json::Value;

use super::consumer::Consumer;
use crate::config::{ConsumerConfig, PollSettings};
use crate::domain::{EventEnvelope, EventType, HandlerError};
use crate::ports::{Queue, ReportSink};
use crate::typed::{Event, Handler, HandlerRegistry, SharedRegistry};

/// Builds a [`Consumer`].
///
/// # 使用例
/// ```ignore
/// let consumer = ConsumerBuilder::new("service-a")
///     .register_typed::<AccountCreated, _>(|event, _env| {
///         println!("account {} created", event.id);
///         Ok(())
///     })
///     .queue(Arc::new(SimulatedQueue::new()))
///     .expect_events(&[AccountCreated::TYPE])
///     .build()?;
/// ```
///
/// # Fail-fast 設計
/// - `expect_events()` で期待される event_type を宣言
/// - `build()` 時に「期待集合 ⊆ 登録済み集合」をチェック
pub struct ConsumerBuilder {
    name: String,
    registry: HandlerRegistry,
    shared: Option<SharedRegistry>,
    stream: Option<futures::stream::BoxStream<'static, Vec<u8>>>,
    queue: Option<Arc<dyn Queue>>,
    poll: PollSettings,
    sink: Option<Arc<dyn ReportSink>>,
    expected: Option<Vec<EventType>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing event types: {0:?}. These events were expected but have no handler.")]
    MissingEventTypes(Vec<String>),
}

impl ConsumerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            registry: HandlerRegistry::new(),
            shared: None,
            stream: None,
            queue: None,
            poll: PollSettings::default(),
            sink: None,
            expected: None,
        }
    }

    /// Name and poll settings from a loaded config.
    pub fn from_config(config: &ConsumerConfig) -> Self {
        Self::new(config.name.clone()).poll_settings(config.poll_settings())
    }

    pub fn register<F>(mut self, event_type: impl Into<EventType>, handler: F) -> Self
    where
        F: Fn(&Value, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.registry.register(event_type, handler);
        self
    }

    pub fn register_handler(mut self, event_type: impl Into<EventType>, handler: Arc<dyn Handler>) -> Self {
        self.registry.register_handler(event_type, handler);
        self
    }

    pub fn register_batch<I, K>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Arc<dyn Handler>)>,
        K: Into<EventType>,
    {
        self.registry.register_batch(entries);
        self
    }

    pub fn register_typed<E, F>(mut self, handler: F) -> Self
    where
        E: Event,
        F: Fn(E, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.registry.register_typed::<E, F>(handler);
        self
    }

    /// Dispatch from an existing shared registry. Handlers registered on this
    /// builder are added to it at `build()`.
    pub fn registry(mut self, registry: SharedRegistry) -> Self {
        self.shared = Some(registry);
        self
    }

    pub fn event_stream<S>(mut self, stream: S) -> Self
    where
        S: Stream<Item = Vec<u8>> + Send + 'static,
    {
        use futures::StreamExt;
        self.stream = Some(stream.boxed());
        self
    }

    pub fn queue(mut self, queue: Arc<dyn Queue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn poll_settings(mut self, settings: PollSettings) -> Self {
        self.poll = settings;
        self
    }

    pub fn report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn expect_events(mut self, event_types: &[&str]) -> Self {
        self.expected = Some(event_types.iter().map(|t| EventType::new(*t)).collect());
        self
    }

    /// # 検証
    /// - `expect_events()` の event_type が全て登録されているかチェック
    /// - 不足があれば `BuildError::MissingEventTypes`
    pub fn build(self) -> Result<Consumer, BuildError> {
        let registry = match self.shared {
            Some(shared) => {
                let own = self.registry;
                shared.register_batch(
                    own.registered_types()
                        .into_iter()
                        .filter_map(|t| own.lookup(t.as_str()).map(|h| (t, h))),
                );
                shared
            }
            None => SharedRegistry::from(self.registry),
        };

        if let Some(expected) = &self.expected {
            let missing: Vec<String> = expected
                .iter()
                .filter(|t| !registry.contains(t.as_str()))
                .map(|t| t.to_string())
                .collect();
            if !missing.is_empty() {
                return Err(BuildError::MissingEventTypes(missing));
            }
        }

        let mut consumer = Consumer::new(self.name);
        consumer.set_registry(registry).set_poll_settings(self.poll);
        if let Some(stream) = self.stream {
            consumer.set_event_stream(stream);
        }
        if let Some(queue) = self.queue {
            consumer.set_queue(queue);
        }
        if let Some(sink) = self.sink {
            consumer.set_report_sink(sink);
        }
        Ok(consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ConsumeRequest;
    use crate::config::FatalFailurePolicy;
    use crate::domain::DispatchOutcome;
    use crate::impls::ScriptedQueue;
    use crate::ports::PollOutcome;
    use crate::typed::event::{AccountCreated, UserAdded, UserDeleted};
    use std::time::Duration;

    #[test]
    fn build_success() {
        let consumer = ConsumerBuilder::new("svc")
            .register_typed::<AccountCreated, _>(|_, _| Ok(()))
            .expect_events(&[AccountCreated::TYPE])
            .build();
        assert!(consumer.is_ok());
    }

    #[test]
    fn build_missing_event_types() {
        let consumer = ConsumerBuilder::new("svc")
            .register_typed::<AccountCreated, _>(|_, _| Ok(()))
            .expect_events(&[AccountCreated::TYPE, UserAdded::TYPE])
            .build();
        assert!(matches!(
            consumer,
            Err(BuildError::MissingEventTypes(missing)) if missing == vec![UserAdded::TYPE.to_string()]
        ));
    }

    #[test]
    fn build_without_expectations() {
        let consumer = ConsumerBuilder::new("svc").build().unwrap();
        assert!(consumer.registry().is_empty());
        assert_eq!(consumer.name(), "svc");
    }

    #[test]
    fn shared_registry_is_extended_not_replaced() {
        let shared = SharedRegistry::new();
        shared.register_typed::<UserDeleted, _>(|_, _| Ok(()));

        let consumer = ConsumerBuilder::new("svc")
            .registry(shared.clone())
            .register_typed::<UserAdded, _>(|_, _| Ok(()))
            .expect_events(&[UserAdded::TYPE, UserDeleted::TYPE])
            .build()
            .unwrap();

        assert_eq!(shared.len(), 2);
        assert_eq!(consumer.registry().len(), 2);

        // registrations after build are visible to the consumer
        shared.register("LATE", |_, _| Ok(()));
        assert!(matches!(
            consumer.handle_raw(br#"{"event_type":"LATE"}"#),
            DispatchOutcome::Handled { .. }
        ));
    }

    #[tokio::test]
    async fn built_consumer_uses_configured_queue_and_settings() {
        let queue = Arc::new(ScriptedQueue::new([
            PollOutcome::FatalFailure("down".into()),
            PollOutcome::Empty,
        ]));
        let mut consumer = ConsumerBuilder::new("svc")
            .queue(queue.clone())
            .poll_settings(PollSettings {
                poll_times: 4,
                timeout: Duration::from_millis(1),
                on_fatal: FatalFailurePolicy::Abort,
            })
            .build()
            .unwrap();

        let report = consumer.consume(ConsumeRequest::new()).await;
        assert!(report.aborted);
        assert_eq!(queue.polls(), 1);
    }

    #[test]
    fn from_config_takes_name_and_poll_settings() {
        let config = ConsumerConfig::from_toml_str("name = \"service-b\"\n[poll]\npoll_times = 2\n").unwrap();
        let consumer = ConsumerBuilder::from_config(&config).build().unwrap();
        assert_eq!(consumer.name(), "service-b");
        assert_eq!(consumer.poll_settings().poll_times, 2);
    }
}
