//! Ports - 抽象化レイヤー
//!
//! - **Queue**: メッセージの取得元（成功 / 空 / 一時障害 / 致命障害 の 4 通り）
//! - **ReportSink**: dispatch 結果と取得障害の報告先

pub mod queue;
pub mod report_sink;

pub use self::queue::{PollKind, PollOutcome, Queue};
pub use self::report_sink::{RecordingSink, Report, ReportSink, TracingSink};
