use std::error::Error;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ionix_core::app::{BackgroundConsumer, ConsumeRequest, Consumer, FanoutGroup};
use ionix_core::config::ConsumerConfig;
use ionix_core::domain::HandlerError;
use ionix_core::ports::{PollOutcome, Queue};
use ionix_core::typed::Event;
use ionix_core::typed::event::{AccountCreated, UserAdded, UserDeleted};

/// ServiceA: アカウント作成とユーザー追加を処理
fn service_a() -> Consumer {
    let mut consumer = Consumer::new("ServiceA");
    consumer
        .register_typed::<AccountCreated, _>(|event, env| {
            println!("[ServiceA] account {} created at {}", event.id, env.timestamp());
            Ok(())
        })
        .register_typed::<UserAdded, _>(|event, _| {
            println!("[ServiceA] user {} added", event.username);
            Ok(())
        });
    consumer
}

/// ServiceB: 生の payload を受け取るハンドラ（typed を使わない例）
fn service_b() -> Consumer {
    let mut consumer = Consumer::new("ServiceB");
    consumer
        .register(AccountCreated::TYPE, |payload, _| {
            let id = payload
                .get("id")
                .and_then(serde_json::Value::as_i64)
                .ok_or_else(|| HandlerError::Payload("missing numeric id".into()))?;
            println!("[ServiceB] welcome mail queued for account {id}");
            Ok(())
        })
        .register(UserDeleted::TYPE, |payload, env| {
            println!("[ServiceB] {} -> {payload}", env.event_type());
            Ok(())
        });
    consumer
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ConsumerConfig::from_env()?;
    let settings = config.poll_settings();
    let queue = Arc::new(config.simulated.build()?);
    info!(name = %config.name, poll_times = settings.poll_times, "ionix demo starting");

    // (A) direct: 1 件の生メッセージを処理
    let mut direct = service_a();
    let raw = br#"{"version":"1.0","event_type":"USER_ADDED","timestamp":"2025-02-25T12:35:56Z","payload":{"username":"user_7"}}"#;
    let report = direct.consume(ConsumeRequest::raw(raw)).await;
    println!("direct: {}", serde_json::to_string(&report)?);

    // (B) fanout: 同じメッセージを ServiceA と ServiceB の両方へ
    let mut group = FanoutGroup::new(queue.clone())
        .with_consumer(service_a())
        .with_consumer(service_b())
        .with_poll_settings(settings);
    let report = group.run().await;
    println!("fanout: {}", serde_json::to_string(&report)?);

    // (C) stream: Queue をジェネレータとして包み、Message だけを流す
    let polls = settings.poll_times;
    let timeout = settings.timeout;
    let source = queue.clone();
    let events = stream::iter(0..polls)
        .then(move |_| {
            let source = source.clone();
            async move { source.poll(timeout).await }
        })
        .filter_map(|outcome| async move {
            match outcome {
                PollOutcome::Message(raw) => Some(raw),
                _ => None,
            }
        });
    let mut streaming = service_b();
    streaming.set_event_stream(events);
    let report = streaming.consume(ConsumeRequest::new()).await;
    println!("stream: {}", serde_json::to_string(&report)?);

    // (D) poll loop をバックグラウンドで実行し、Ctrl-C で停止
    let mut background = Consumer::builder(config.name.clone())
        .register_typed::<AccountCreated, _>(|event, _| {
            info!(id = event.id, "account created");
            Ok(())
        })
        .queue(queue)
        .poll_settings(settings)
        .build()?;
    background.register_typed::<UserAdded, _>(|event, _| {
        info!(username = %event.username, "user added");
        Ok(())
    });
    let worker = BackgroundConsumer::spawn(background, ConsumeRequest::new());

    let stop = worker.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("ctrl-c received, stopping after the current poll");
            stop.request();
        }
    });
    let (_, report) = worker.join().await?;
    println!("poll loop: {}", serde_json::to_string(&report)?);

    Ok(())
}
