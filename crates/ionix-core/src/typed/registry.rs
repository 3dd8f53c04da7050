//! HandlerRegistry - event_type → Handler の登録と管理
//!
//! - 登録は明示的な `register*` 呼び出しのみ（dispatch 中に変更しない）
//! - 同じ event_type への再登録は上書き（last wins）
//! - `SharedRegistry` は複数スレッドから登録・参照する場合の RwLock ラッパー

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;

use super::event::Event;
use super::handler::{Handler, TypedHandler};
use crate::domain::{EventEnvelope, EventType, HandlerError};

/// Registry of handlers (event_type -> handler).
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<EventType, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a closure for an event type. Overwrites any previous handler.
    pub fn register<F>(&mut self, event_type: impl Into<EventType>, handler: F) -> &mut Self
    where
        F: Fn(&Value, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register_handler(event_type, Arc::new(handler))
    }

    pub fn register_handler(
        &mut self,
        event_type: impl Into<EventType>,
        handler: Arc<dyn Handler>,
    ) -> &mut Self {
        self.handlers.insert(event_type.into(), handler);
        self
    }

    /// Register many handlers at once. Later entries win over earlier ones
    /// with the same key.
    pub fn register_batch<I, K>(&mut self, entries: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, Arc<dyn Handler>)>,
        K: Into<EventType>,
    {
        for (event_type, handler) in entries {
            self.register_handler(event_type, handler);
        }
        self
    }

    /// Register a handler that receives the payload decoded as `E`, keyed by `E::TYPE`.
    pub fn register_typed<E, F>(&mut self, handler: F) -> &mut Self
    where
        E: Event,
        F: Fn(E, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.register_handler(E::TYPE, Arc::new(TypedHandler::new(handler)))
    }

    pub fn lookup(&self, event_type: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(event_type).cloned()
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.handlers.contains_key(event_type)
    }

    /// Registered event types, sorted.
    pub fn registered_types(&self) -> Vec<EventType> {
        let mut types: Vec<EventType> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("event_types", &self.registered_types())
            .finish()
    }
}

/// A registry that can be registered into and dispatched from concurrently.
///
/// Registration takes the write lock; lookup takes the read lock only long
/// enough to clone the handler `Arc`, so a handler never runs under the lock.
#[derive(Default, Clone, Debug)]
pub struct SharedRegistry {
    inner: Arc<RwLock<HandlerRegistry>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, event_type: impl Into<EventType>, handler: F) -> &Self
    where
        F: Fn(&Value, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.write(|reg| {
            reg.register(event_type, handler);
        });
        self
    }

    pub fn register_handler(
        &self,
        event_type: impl Into<EventType>,
        handler: Arc<dyn Handler>,
    ) -> &Self {
        self.write(|reg| {
            reg.register_handler(event_type, handler);
        });
        self
    }

    pub fn register_batch<I, K>(&self, entries: I) -> &Self
    where
        I: IntoIterator<Item = (K, Arc<dyn Handler>)>,
        K: Into<EventType>,
    {
        self.write(|reg| {
            reg.register_batch(entries);
        });
        self
    }

    pub fn register_typed<E, F>(&self, handler: F) -> &Self
    where
        E: Event,
        F: Fn(E, &EventEnvelope) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.write(|reg| {
            reg.register_typed::<E, F>(handler);
        });
        self
    }

    pub fn lookup(&self, event_type: &str) -> Option<Arc<dyn Handler>> {
        self.read(|reg| reg.lookup(event_type))
    }

    pub fn contains(&self, event_type: &str) -> bool {
        self.read(|reg| reg.contains(event_type))
    }

    pub fn registered_types(&self) -> Vec<EventType> {
        self.read(|reg| reg.registered_types())
    }

    pub fn len(&self) -> usize {
        self.read(|reg| reg.len())
    }

    pub fn is_empty(&self) -> bool {
        self.read(|reg| reg.is_empty())
    }

    /// Copy of the current registry contents.
    pub fn snapshot(&self) -> HandlerRegistry {
        self.read(|reg| reg.clone())
    }

    // Handlers never run under the lock, so a poisoned lock still holds a
    // consistent map.
    fn read<T>(&self, f: impl FnOnce(&HandlerRegistry) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut HandlerRegistry)) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard);
    }
}

impl From<HandlerRegistry> for SharedRegistry {
    fn from(registry: HandlerRegistry) -> Self {
        Self {
            inner: Arc::new(RwLock::new(registry)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::event::{AccountCreated, UserAdded};
    use crate::typed::handler::handler_fn;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop(_: &Value, _: &EventEnvelope) -> Result<(), HandlerError> {
        Ok(())
    }

    fn tagging(tag: &'static str, log: Arc<std::sync::Mutex<Vec<&'static str>>>) -> Arc<dyn Handler> {
        handler_fn(move |_, _| {
            log.lock().unwrap().push(tag);
            Ok(())
        })
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = HandlerRegistry::new();
        registry.register("ACCOUNT_CREATED", noop);

        assert!(registry.lookup("ACCOUNT_CREATED").is_some());
        assert!(registry.lookup("USER_ADDED").is_none());
    }

    #[test]
    fn registration_is_chainable() {
        let mut registry = HandlerRegistry::new();
        registry
            .register("ACCOUNT_CREATED", noop)
            .register("USER_ADDED", noop)
            .register("USER_DELETED", noop);

        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn registering_twice_is_idempotent() {
        let handler = handler_fn(noop);
        let mut once = HandlerRegistry::new();
        once.register_handler("A", handler.clone());

        let mut twice = HandlerRegistry::new();
        twice
            .register_handler("A", handler.clone())
            .register_handler("A", handler.clone());

        assert_eq!(once.registered_types(), twice.registered_types());
        let looked_up = twice.lookup("A").unwrap();
        assert!(Arc::ptr_eq(&looked_up, &handler));
    }

    #[test]
    fn last_registration_wins() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry
            .register_handler("T", tagging("h1", log.clone()))
            .register_handler("T", tagging("h2", log.clone()));

        let env = EventEnvelope::new("T", json!({}));
        registry.lookup("T").unwrap().handle(env.payload(), &env).unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["h2"]);
    }

    #[test]
    fn batch_later_entries_override_earlier_ones() {
        let log = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut registry = HandlerRegistry::new();
        registry.register_batch([
            ("T", tagging("first", log.clone())),
            ("U", tagging("u", log.clone())),
            ("T", tagging("second", log.clone())),
        ]);

        let env = EventEnvelope::new("T", json!({}));
        registry.lookup("T").unwrap().handle(env.payload(), &env).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(*log.lock().unwrap(), vec!["second"]);
    }

    #[test]
    fn typed_registration_uses_event_type_constant() {
        let mut registry = HandlerRegistry::new();
        registry
            .register_typed::<AccountCreated, _>(|_, _| Ok(()))
            .register_typed::<UserAdded, _>(|_, _| Ok(()));

        assert_eq!(
            registry.registered_types(),
            vec![EventType::new("ACCOUNT_CREATED"), EventType::new("USER_ADDED")]
        );
    }

    #[test]
    fn lookup_does_not_mutate() {
        let mut registry = HandlerRegistry::new();
        registry.register("A", noop);
        let _ = registry.lookup("B");
        let _ = registry.lookup("A");
        assert_eq!(registry.registered_types(), vec![EventType::new("A")]);
    }

    #[test]
    fn shared_registry_sees_registrations_from_other_threads() {
        let shared = SharedRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let writer = {
            let shared = shared.clone();
            let calls = calls.clone();
            std::thread::spawn(move || {
                shared.register("A", move |_, _| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
            })
        };
        writer.join().unwrap();

        let env = EventEnvelope::new("A", json!({}));
        shared.lookup("A").unwrap().handle(env.payload(), &env).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(shared.snapshot().len(), 1);
    }
}
