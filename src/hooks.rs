//! Activity hooks
//!
//! Services announce timer lifecycle events ("timer started", "entry deleted",
//! ...) through a [`HookManager`]. Handlers are plain callbacks ordered by
//! priority; they observe the event payload and cannot veto the operation.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Hook callback type
pub type HookCallback = Arc<dyn Fn(&str, &Value) + Send + Sync>;

/// Hook priority (lower = earlier)
pub const PRIORITY_DEFAULT: i32 = 0;
pub const PRIORITY_LATE: i32 = 100;

struct HookHandler {
    callback: HookCallback,
    priority: i32,
}

/// Registry of event handlers keyed by hook name
pub struct HookManager {
    hooks: RwLock<HashMap<String, Vec<HookHandler>>>,
}

impl Default for HookManager {
    fn default() -> Self {
        Self::new()
    }
}

impl HookManager {
    pub fn new() -> Self {
        Self {
            hooks: RwLock::new(HashMap::new()),
        }
    }

    /// Register a hook handler
    pub fn register<F>(&self, name: &str, callback: F, priority: i32)
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        let mut hooks = self.hooks.write().unwrap_or_else(|e| e.into_inner());
        let handlers = hooks.entry(name.to_string()).or_default();

        handlers.push(HookHandler {
            callback: Arc::new(callback),
            priority,
        });
        // stable: equal priorities keep registration order
        handlers.sort_by_key(|h| h.priority);

        debug!("Registered hook handler for '{}' with priority {}", name, priority);
    }

    /// Deliver an event to every handler of `name`
    pub fn trigger(&self, name: &str, data: &Value) {
        let handlers: Vec<HookCallback> = {
            let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
            match hooks.get(name) {
                Some(handlers) => handlers.iter().map(|h| h.callback.clone()).collect(),
                None => return,
            }
        };

        // lock released so handlers may register further hooks
        for callback in handlers {
            callback(name, data);
        }
    }

    /// Check if a hook has any handlers, so callers can skip building a payload
    pub fn has_handlers(&self, name: &str) -> bool {
        let hooks = self.hooks.read().unwrap_or_else(|e| e.into_inner());
        hooks.get(name).is_some_and(|h| !h.is_empty())
    }
}

/// Events fired by the timer and time entry services
pub mod hook_names {
    pub const TIMER_STARTED: &str = "timer_started";
    pub const TIMER_STOPPED: &str = "timer_stopped";
    pub const TIME_ENTRY_CREATED: &str = "time_entry_created";
    pub const TIME_ENTRY_UPDATED: &str = "time_entry_updated";
    pub const TIME_ENTRY_DELETED: &str = "time_entry_deleted";

    pub const ALL: &[&str] = &[
        TIMER_STARTED,
        TIMER_STOPPED,
        TIME_ENTRY_CREATED,
        TIME_ENTRY_UPDATED,
        TIME_ENTRY_DELETED,
    ];
}

/// Log every activity event under the `activity` tracing target
pub fn register_activity_log(manager: &HookManager) {
    for name in hook_names::ALL {
        manager.register(
            name,
            |event, data| {
                let user_id = data.get("user_id").and_then(Value::as_i64);
                let entry_id = data.get("id").and_then(Value::as_i64);
                let project_id = data.get("project_id").and_then(Value::as_i64);
                tracing::info!(target: "activity", event, user_id, entry_id, project_id, "{}", data);
            },
            PRIORITY_LATE,
        );
    }
}
