//! BackgroundConsumer - consume を tokio task 上で実行する
//!
//! - `request_shutdown()` で停止要求（次の poll / 次の stream 要素の前で止まる）
//! - `join()` で Consumer と ConsumeReport を取り戻す

use tokio::task::{JoinError, JoinHandle};

use super::consumer::{ConsumeRequest, Consumer};
use super::report::ConsumeReport;
use super::shutdown::Shutdown;

pub struct BackgroundConsumer {
    shutdown: Shutdown,
    join: JoinHandle<(Consumer, ConsumeReport)>,
}

impl BackgroundConsumer {
    /// Spawn one `consume` call. Direct mode needs a borrowed envelope, so
    /// only stream and poll-loop consumption run in the background.
    pub fn spawn(mut consumer: Consumer, request: ConsumeRequest<'static>) -> Self {
        let shutdown = consumer.shutdown();
        let join = tokio::spawn(async move {
            let report = consumer.consume(request).await;
            (consumer, report)
        });
        Self { shutdown, join }
    }

    /// Stop before the next poll. A dispatch in progress finishes first.
    pub fn request_shutdown(&self) {
        self.shutdown.request();
    }

    /// A handle that can request shutdown after this value has been joined away.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    pub async fn join(self) -> Result<(Consumer, ConsumeReport), JoinError> {
        self.join.await
    }

    pub async fn shutdown_and_join(self) -> Result<(Consumer, ConsumeReport), JoinError> {
        self.request_shutdown();
        self.join().await
    }
}
