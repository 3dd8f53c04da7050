//! ionix-core
//!
//! Event consumption for the Ionix messaging system: decode raw envelopes,
//! route them by `event_type` to registered handlers, and drive consumption
//! from a single message, a stream, or a polled queue.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（envelope, codec, outcome, errors）
//! - **ports**: 抽象化レイヤー（Queue, ReportSink）
//! - **typed**: Handler trait, Event trait, HandlerRegistry
//! - **app**: Consumer, ConsumerBuilder, FanoutGroup, BackgroundConsumer
//! - **impls**: SimulatedQueue, InMemoryQueue, ScriptedQueue
//! - **config**: TOML + 環境変数による設定

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod typed;

pub use app::{ConsumeReport, ConsumeRequest, Consumer, ConsumerBuilder};
pub use domain::{DispatchOutcome, EventEnvelope, EventType, HandlerError};
pub use ports::{PollOutcome, Queue};
