//! Handler trait - event を処理する Handler の定義
//!
//! # 二層構造
//! - **Dyn**: [`Handler`] は object-safe。`Arc<dyn Handler>` として registry に格納
//! - **Typed**: [`TypedHandler`] が payload を `E: Event` にデコードしてから呼ぶ
//!
//! Plain closures `Fn(&Value, &EventEnvelope) -> Result<(), HandlerError>` are
//! handlers too, so the signature is checked when the handler is registered,
//! not when an event arrives.

use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use super::event::Event;
use crate::domain::{EventEnvelope, HandlerError};

pub trait Handler: Send + Sync {
    /// Handle one event. `payload` is `envelope.payload()`, passed separately
    /// because most handlers only look at it.
    fn handle(&self, payload: &Value, envelope: &EventEnvelope) -> Result<(), HandlerError>;
}

impl<F> Handler for F
where
    F: Fn(&Value, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, payload: &Value, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        self(payload, envelope)
    }
}

/// Wrap a closure as a shareable handler.
///
/// Needed where a collection of handlers is built up front, e.g. for
/// `register_batch`, since each closure has its own type.
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: Fn(&Value, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Decodes the payload into `E` before calling the inner function.
pub struct TypedHandler<E, F> {
    f: F,
    _marker: PhantomData<fn() -> E>,
}

impl<E, F> TypedHandler<E, F>
where
    E: Event,
    F: Fn(E, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self {
            f,
            _marker: PhantomData,
        }
    }
}

impl<E, F> Handler for TypedHandler<E, F>
where
    E: Event,
    F: Fn(E, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync,
{
    fn handle(&self, payload: &Value, envelope: &EventEnvelope) -> Result<(), HandlerError> {
        let event: E = E::deserialize(payload).map_err(|e| HandlerError::Payload(e.to_string()))?;
        (self.f)(event, envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::event::AccountCreated;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn closure_is_a_handler() {
        let h = handler_fn(|payload, _env| {
            if payload["ok"] == true {
                Ok(())
            } else {
                Err(HandlerError::failed("not ok"))
            }
        });
        let env = EventEnvelope::new("T", json!({"ok": true}));

        assert!(h.handle(env.payload(), &env).is_ok());
        assert!(h.handle(&json!({"ok": false}), &env).is_err());
    }

    #[test]
    fn typed_handler_decodes_payload() {
        let seen = Mutex::new(Vec::new());
        let h = TypedHandler::new(|event: AccountCreated, _env: &EventEnvelope| {
            seen.lock().unwrap().push(event.id);
            Ok(())
        });
        let env = EventEnvelope::new(AccountCreated::TYPE, json!({"id": 42}));

        h.handle(env.payload(), &env).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![42]);
    }

    #[test]
    fn typed_handler_reports_payload_mismatch() {
        let h = TypedHandler::new(|_event: AccountCreated, _env: &EventEnvelope| Ok(()));
        let env = EventEnvelope::new(AccountCreated::TYPE, json!({"id": "not-a-number"}));

        let err = h.handle(env.payload(), &env).unwrap_err();
        assert!(matches!(err, HandlerError::Payload(_)));
    }
}
