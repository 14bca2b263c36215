// File: src/telemetry.rs
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::warn;

pub const EVENT_INPUT: &str = "voice.input";
pub const EVENT_WAKE: &str = "voice.wake.fuzzy";
pub const EVENT_LOCALE_DETECTED: &str = "voice.locale.detected";
pub const EVENT_INTENTS_DERIVED: &str = "voice.intents.derived";
pub const EVENT_INTENT_SELECTED: &str = "voice.intent.selected";
pub const EVENT_INTENT_REJECTED: &str = "voice.intent.rejected";
pub const EVENT_RANK_DEBUG: &str = "voice.intent.rank.debug";
pub const EVENT_CONFIRM_REQUESTED: &str = "voice.intent.confirm";
pub const EVENT_LEXICON_LEARNED: &str = "lexicon.learned";

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;
type Handler = Arc<dyn Fn(&str, &Value) -> Result<(), HandlerError> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

struct Registration {
    id: HandlerId,
    /// `None` for wildcard handlers.
    event: Option<String>,
    handler: Handler,
}

/// Fire-and-forget event hub. Handlers for the exact event run first, then
/// wildcard handlers, which also see the event name under `"event"`.
#[derive(Default)]
pub struct Telemetry {
    handlers: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.handlers.read().map(|h| h.len()).unwrap_or_default();
        f.debug_struct("Telemetry").field("handlers", &count).finish()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self::default()
    }

    fn add(&self, event: Option<String>, handler: Handler) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.push(Registration { id, event, handler });
        id
    }

    pub fn on<F>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&str, &Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        if event == "*" {
            return self.on_any(handler);
        }
        self.add(Some(event.to_string()), Arc::new(handler))
    }

    pub fn on_any<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&str, &Value) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.add(None, Arc::new(handler))
    }

    pub fn off(&self, id: HandlerId) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let before = handlers.len();
        handlers.retain(|r| r.id != id);
        handlers.len() != before
    }

    /// Never fails: handler errors and panics are logged and swallowed.
    pub fn emit(&self, event: &str, payload: Value) {
        let (direct, wildcard): (Vec<Handler>, Vec<Handler>) = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            let direct = handlers
                .iter()
                .filter(|r| r.event.as_deref() == Some(event))
                .map(|r| r.handler.clone())
                .collect();
            let wildcard = handlers
                .iter()
                .filter(|r| r.event.is_none())
                .map(|r| r.handler.clone())
                .collect();
            (direct, wildcard)
        };

        for handler in &direct {
            invoke(handler, event, &payload);
        }
        if wildcard.is_empty() {
            return;
        }
        let tagged = match payload {
            Value::Object(mut map) => {
                map.insert("event".to_string(), Value::String(event.to_string()));
                Value::Object(map)
            }
            Value::Null => serde_json::json!({ "event": event }),
            other => serde_json::json!({ "event": event, "value": other }),
        };
        for handler in &wildcard {
            invoke(handler, event, &tagged);
        }
    }
}

fn invoke(handler: &Handler, event: &str, payload: &Value) {
    match catch_unwind(AssertUnwindSafe(|| handler(event, payload))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => warn!(event, error = %err, "telemetry handler failed"),
        Err(_) => warn!(event, "telemetry handler panicked"),
    }
}
