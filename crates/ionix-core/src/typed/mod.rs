//! Typed - Handler と登録
//!
//! # 二層構造
//! - **表層（Typed）**: `Event` trait + `register_typed` - payload を型で受け取る
//! - **内部（Dyn）**: `Handler` trait - object-safe、registry はこちらだけを保持

pub mod event;
pub mod handler;
pub mod registry;

pub use self::event::Event;
pub use self::handler::{Handler, TypedHandler, handler_fn};
pub use self::registry::{HandlerRegistry, SharedRegistry};
