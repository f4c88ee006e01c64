// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Runs in its own binary so nothing else touches the panic hook before the
//! process-wide registry is created.

use logstream::hooks::{ErrorHooks, UncaughtError};
use std::sync::{Arc, Mutex};

#[test]
fn global_hooks_chain_to_the_previous_panic_hook() {
    let calls = Arc::new(Mutex::new(Vec::new()));

    let earlier = Arc::clone(&calls);
    std::panic::set_hook(Box::new(move |info| {
        let message = info
            .payload()
            .downcast_ref::<&str>()
            .copied()
            .unwrap_or("?");
        earlier.lock().unwrap().push(format!("previous: {message}"));
    }));

    let hooks = ErrorHooks::global();
    let registry = Arc::clone(&calls);
    let id = hooks.register(Arc::new(move |error: &UncaughtError| {
        registry
            .lock()
            .unwrap()
            .push(format!("registry: {}", error.message));
    }));

    let result = std::panic::catch_unwind(|| panic!("chained"));
    assert!(result.is_err());
    hooks.unregister(id);

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["registry: chained".to_string(), "previous: chained".to_string()]
    );
}
