//! App - アプリケーション層
//!
//! ports と typed を組み合わせて消費ロジックを実装します。
//!
//! # 主要コンポーネント
//! - **Consumer**: decode → route → handler 実行、direct / stream / poll-loop の 3 モード
//! - **ConsumerBuilder**: Consumer の構築とワイヤリング
//! - **FanoutGroup**: 1 つの Queue を複数の Consumer に配る
//! - **BackgroundConsumer**: consume を tokio task で実行し、停止要求を送る

pub mod background;
pub mod builder;
pub mod consumer;
pub mod fanout;
mod poll_loop;
pub mod report;
pub mod shutdown;

// 主要な型を再エクスポート
pub use self::background::BackgroundConsumer;
pub use self::builder::{BuildError, ConsumerBuilder};
pub use self::consumer::{ConsumeRequest, Consumer, EventStream};
pub use self::fanout::{FanoutGroup, FanoutReport};
pub use self::report::{ConsumeMode, ConsumeReport, DispatchCounts, PollCounts};
pub use self::shutdown::{Shutdown, ShutdownListener};
