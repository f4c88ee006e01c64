// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Uncaught-error observers.
//!
//! Handlers are kept in an explicit registry and invoked newest first, so a
//! handler registered later runs before the ones it was layered on. The
//! process-wide registry is bridged to the panic hook: the first
//! time [`ErrorHooks::global`] is called, a panic hook is installed that
//! dispatches to the registry and then calls whichever panic hook was in place
//! before it, so existing panic reporting keeps working.

use std::panic::{self, PanicHookInfo};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use crate::value::Value;

/// An error nobody caught, as reported to the hooks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UncaughtError {
    pub message: String,
    pub line: Option<u32>,
    pub url: Option<String>,
}

impl UncaughtError {
    /// Converts a panic into an [`UncaughtError`]; the source file stands in
    /// for the URL.
    #[must_use]
    pub fn from_panic(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Box<dyn Any>".to_string()
        };

        UncaughtError {
            message,
            line: info.location().map(|l| l.line()),
            url: info.location().map(|l| l.file().to_string()),
        }
    }

    /// The event logged for this error: `{error, line, url}`.
    #[must_use]
    pub fn to_event(&self) -> Value {
        Value::object([
            ("error", Value::from(self.message.as_str())),
            ("line", Value::from(self.line)),
            ("url", Value::from(self.url.clone())),
        ])
    }
}

pub type ErrorHandler = Arc<dyn Fn(&UncaughtError) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(usize);

#[derive(Default)]
pub struct ErrorHooks {
    handlers: Mutex<Vec<(HookId, ErrorHandler)>>,
    next_id: AtomicUsize,
}

impl ErrorHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry, bridged to the panic hook.
    pub fn global() -> Arc<ErrorHooks> {
        static GLOBAL: OnceLock<Arc<ErrorHooks>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| {
            let hooks = Arc::new(ErrorHooks::new());
            install_panic_hook(Arc::clone(&hooks));
            hooks
        }))
    }

    /// Adds `handler`; it runs before every handler registered so far.
    pub fn register(&self, handler: ErrorHandler) -> HookId {
        let id = HookId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        id
    }

    /// Returns whether a handler was removed.
    pub fn unregister(&self, id: HookId) -> bool {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        let before = handlers.len();
        handlers.retain(|(hook_id, _)| *hook_id != id);
        handlers.len() != before
    }

    /// Invokes every handler, most recently registered first.
    pub fn dispatch(&self, error: &UncaughtError) {
        // Handlers may register or log, so call them without holding the lock
        let handlers: Vec<ErrorHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        for handler in handlers {
            handler(error);
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn install_panic_hook(hooks: Arc<ErrorHooks>) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        hooks.dispatch(&UncaughtError::from_panic(info));
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_to_event() {
        let error = UncaughtError {
            message: "boom".to_string(),
            line: Some(12),
            url: Some("src/main.rs".to_string()),
        };
        assert_eq!(
            crate::normalizer::sanitize(error.to_event()),
            serde_json::json!({"error": "boom", "line": 12, "url": "src/main.rs"})
        );
    }

    #[test]
    fn test_to_event_missing_location() {
        let error = UncaughtError {
            message: "boom".to_string(),
            line: None,
            url: None,
        };
        assert_eq!(
            crate::normalizer::sanitize(error.to_event()),
            serde_json::json!({"error": "boom", "line": "undefined", "url": "undefined"})
        );
    }

    #[test]
    fn test_dispatch_newest_first() {
        let hooks = ErrorHooks::new();
        let calls = Arc::new(Mutex::new(Vec::new()));

        for name in ["old", "middle", "new"] {
            let calls = Arc::clone(&calls);
            hooks.register(Arc::new(move |_: &UncaughtError| calls.lock().unwrap().push(name)));
        }

        hooks.dispatch(&UncaughtError {
            message: "x".to_string(),
            line: None,
            url: None,
        });
        assert_eq!(*calls.lock().unwrap(), vec!["new", "middle", "old"]);
    }

    #[test]
    fn test_unregister() {
        let hooks = ErrorHooks::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let id = hooks.register(Arc::new(move |_: &UncaughtError| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(hooks.len(), 1);

        assert!(hooks.unregister(id));
        assert!(!hooks.unregister(id));
        assert!(hooks.is_empty());

        hooks.dispatch(&UncaughtError {
            message: "x".to_string(),
            line: None,
            url: None,
        });
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[serial]
    fn test_global_hooks_see_panics() {
        let hooks = ErrorHooks::global();
        let seen = Arc::new(Mutex::new(None));
        let captured = Arc::clone(&seen);
        let test_thread = std::thread::current().id();
        let id = hooks.register(Arc::new(move |error: &UncaughtError| {
            // Other tests may panic on their own threads meanwhile
            if std::thread::current().id() == test_thread {
                *captured.lock().unwrap() = Some(error.clone());
            }
        }));

        let result = std::panic::catch_unwind(|| panic!("kaboom"));
        assert!(result.is_err());
        hooks.unregister(id);

        let error = seen.lock().unwrap().clone().expect("hook was called");
        assert_eq!(error.message, "kaboom");
        assert!(error.line.is_some());
        assert!(error.url.unwrap().ends_with("hooks.rs"));
    }
}
