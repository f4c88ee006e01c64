// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A logging session: configuration, enrichment state and the delivery loop.

use std::fmt;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tracing::{debug, warn};

use crate::config::{Config, Options};
use crate::delivery::{DeliveryLoop, Phase};
use crate::enricher::{generate_trace_code, Enricher};
use crate::environment::{EnvironmentDescriptor, HostEnvironment};
use crate::error::LogError;
use crate::hooks::{ErrorHooks, HookId, UncaughtError};
use crate::normalizer::normalize;
use crate::transport::{HttpTransport, Transport};
use crate::value::Value;

/// Injects the collaborators of a [`Session`]. Anything not set falls back to
/// the production implementation.
pub struct SessionBuilder {
    options: Options,
    transport: Option<Arc<dyn Transport>>,
    environment: Option<Arc<dyn EnvironmentDescriptor>>,
    hooks: Option<Arc<ErrorHooks>>,
    runtime: Option<Handle>,
}

impl SessionBuilder {
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn environment(mut self, environment: Arc<dyn EnvironmentDescriptor>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Registry the catch-all handler is added to. Defaults to
    /// [`ErrorHooks::global`].
    #[must_use]
    pub fn error_hooks(mut self, hooks: Arc<ErrorHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Runtime deliveries are spawned on. Defaults to the current runtime.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// # Errors
    ///
    /// Returns [`LogError::Configuration`] when the token is missing, the
    /// options are invalid, or there is no runtime to deliver events on.
    pub fn build(self) -> Result<Session, LogError> {
        let config = self.options.into_config()?;
        let destination = config.destination()?;

        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                LogError::Configuration(format!("no tokio runtime to deliver events on: {e}"))
            })?,
        };

        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new(&config)));
        let environment = self
            .environment
            .unwrap_or_else(|| Arc::new(HostEnvironment));

        let trace_code = generate_trace_code();
        let enricher = Enricher::new(
            config.page_info,
            config.trace.then(|| trace_code.clone()),
            environment,
        );
        let delivery = DeliveryLoop::new(transport, destination, runtime);

        let hooks = if config.catchall {
            Some(self.hooks.unwrap_or_else(ErrorHooks::global))
        } else {
            None
        };

        let inner = Arc::new_cyclic(|weak: &Weak<SessionInner>| {
            let catchall = hooks.map(|hooks| {
                let id = hooks.register(catchall_handler(weak.clone()));
                (hooks, id)
            });
            SessionInner {
                config,
                trace_code,
                enricher,
                delivery,
                catchall,
            }
        });

        debug!(
            "Session initialized: destination={} trace={} page_info={} catchall={}",
            inner.delivery.destination(),
            inner.config.trace,
            inner.config.page_info,
            inner.config.catchall
        );

        Ok(Session { inner })
    }
}

fn catchall_handler(session: Weak<SessionInner>) -> crate::hooks::ErrorHandler {
    Arc::new(move |error: &UncaughtError| {
        let Some(session) = session.upgrade() else {
            return;
        };
        if let Err(e) = session.log(vec![error.to_event()]) {
            warn!("Failed to log uncaught error: {}", e);
        }
    })
}

struct SessionInner {
    config: Config,
    trace_code: String,
    enricher: Enricher,
    delivery: DeliveryLoop,
    catchall: Option<(Arc<ErrorHooks>, HookId)>,
}

impl SessionInner {
    fn log(&self, values: Vec<Value>) -> Result<(), LogError> {
        let event = normalize(values)?;
        let serialized = self.enricher.enrich(event).to_json()?;
        self.delivery.submit(serialized);
        Ok(())
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some((hooks, id)) = self.catchall.take() {
            hooks.unregister(id);
        }
    }
}

/// Handle to a logging session. Clones share the same session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Starts a session with the production transport and environment.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(options: impl Into<Options>) -> Result<Self, LogError> {
        Self::builder(options).build()
    }

    pub fn builder(options: impl Into<Options>) -> SessionBuilder {
        SessionBuilder {
            options: options.into(),
            transport: None,
            environment: None,
            hooks: None,
            runtime: None,
        }
    }

    /// Normalizes, enriches and submits one event. Never waits for the
    /// network.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidArgument`] when `values` is empty.
    pub fn log(&self, values: Vec<Value>) -> Result<(), LogError> {
        self.inner.log(values)
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The session trace code. Only sent when tracing is enabled.
    #[must_use]
    pub fn trace_code(&self) -> &str {
        &self.inner.trace_code
    }

    #[must_use]
    pub fn destination(&self) -> &str {
        self.inner.delivery.destination()
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.inner.delivery.phase()
    }

    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.inner.delivery.backlog_len()
    }

    #[must_use]
    pub fn sent_environment_info(&self) -> bool {
        self.inner.enricher.sent_environment_info()
    }

    /// Resolves once no delivery is in flight.
    pub async fn wait_settled(&self) -> Phase {
        self.inner.delivery.wait_settled().await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("destination", &self.destination())
            .field("phase", &self.phase())
            .field("backlog_len", &self.backlog_len())
            .finish_non_exhaustive()
    }
}
