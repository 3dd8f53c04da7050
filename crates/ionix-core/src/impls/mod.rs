//! Impls - Queue の実装（開発用・テスト用）
//!
//! - **SimulatedQueue**: ランダムな遅延と結果を返すデモ用 Queue
//! - **InMemoryQueue**: push したメッセージを FIFO で返す
//! - **ScriptedQueue**: 決められた PollOutcome を順に返す

pub mod inmem_queue;
pub mod scripted_queue;
pub mod simulated_queue;

pub use self::inmem_queue::{InMemoryQueue, QueueClosed};
pub use self::scripted_queue::ScriptedQueue;
pub use self::simulated_queue::{OutcomeWeights, SimulatedQueue, SimulationError};
