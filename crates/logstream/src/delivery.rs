// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Single-flight delivery of serialized envelopes.
//!
//! At most one request is outstanding per session. Envelopes submitted while a
//! request is in flight wait in the [`Backlog`] and are sent, in order, by the
//! same task once the current request completes.
//!
//! # States
//!
//! ```text
//!              submit                 Failed
//!   ┌──────┐ ─────────> ┌──────────┐ ───────> ┌────────────┐
//!   │ Idle │            │ InFlight │          │ Suppressed │
//!   └──────┘ <───────── └──────────┘          └────────────┘
//!           Delivered,      │   ^
//!           backlog empty   └───┘ Delivered, next from backlog
//! ```
//!
//! `Suppressed` is terminal: a failed delivery is never retried and nothing
//! else is sent for the session. Envelopes submitted afterwards are still
//! appended to the backlog, which is never drained again. A drain task that
//! ends without an outcome (the transport panicked, or the runtime shut down
//! under it) counts as a failed delivery.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::{debug, warn, Instrument};

use crate::backlog::Backlog;
use crate::transport::{DeliveryOutcome, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    InFlight,
    Suppressed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Idle => "idle",
            Phase::InFlight => "in-flight",
            Phase::Suppressed => "suppressed",
        })
    }
}

struct LoopState {
    phase: Phase,
    backlog: Backlog,
}

struct Shared {
    state: Mutex<LoopState>,
    phase_tx: watch::Sender<Phase>,
    transport: Arc<dyn Transport>,
    destination: String,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, LoopState> {
        // Critical sections never panic, a poisoned lock still holds valid state
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_phase(&self, state: &mut LoopState, phase: Phase) {
        state.phase = phase;
        self.phase_tx.send_replace(phase);
    }

    /// Sends `first`, then everything the backlog accumulates meanwhile.
    ///
    /// The guard is moved into the future when it is created, so it runs even
    /// if the task is dropped before its first poll.
    async fn drain(mut guard: DrainGuard, first: String) {
        let shared = Arc::clone(&guard.shared);
        let mut next = first;
        loop {
            let outcome = shared
                .transport
                .send(&shared.destination, next.into_bytes())
                .await;
            match shared.complete(outcome) {
                Some(serialized) => next = serialized,
                None => break,
            }
        }
        guard.settled = true;
    }

    /// Applies a completed attempt. Returns the next envelope to send, if any.
    fn complete(&self, outcome: DeliveryOutcome) -> Option<String> {
        let mut state = self.lock();
        match outcome {
            DeliveryOutcome::Delivered => {
                let next = state.backlog.dequeue();
                if next.is_none() {
                    self.set_phase(&mut state, Phase::Idle);
                }
                next
            }
            DeliveryOutcome::Failed(reason) => {
                warn!(
                    "Couldn't submit events: {}. Suppressing further deliveries ({} pending)",
                    reason,
                    state.backlog.len()
                );
                self.set_phase(&mut state, Phase::Suppressed);
                None
            }
        }
    }
}

/// Suppresses the loop if a drain task goes away while still in flight.
struct DrainGuard {
    shared: Arc<Shared>,
    settled: bool,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.shared.lock();
        if state.phase == Phase::InFlight {
            warn!(
                "Couldn't submit events: delivery task ended without a response. \
                 Suppressing further deliveries ({} pending)",
                state.backlog.len()
            );
            self.shared.set_phase(&mut state, Phase::Suppressed);
        }
    }
}

/// Drives deliveries for one session.
#[derive(Clone)]
pub struct DeliveryLoop {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl DeliveryLoop {
    /// Deliveries are spawned on `runtime`.
    pub fn new(
        transport: Arc<dyn Transport>,
        destination: impl Into<String>,
        runtime: Handle,
    ) -> Self {
        let (phase_tx, _) = watch::channel(Phase::Idle);
        DeliveryLoop {
            shared: Arc::new(Shared {
                state: Mutex::new(LoopState {
                    phase: Phase::Idle,
                    backlog: Backlog::new(),
                }),
                phase_tx,
                transport,
                destination: destination.into(),
            }),
            runtime,
        }
    }

    /// Hands a serialized envelope to the loop without waiting for delivery.
    pub fn submit(&self, serialized: String) {
        let mut state = self.shared.lock();
        match state.phase {
            Phase::Idle => {
                self.shared.set_phase(&mut state, Phase::InFlight);
                drop(state);
                // Deliveries inherit the span of the first caller
                let guard = DrainGuard {
                    shared: Arc::clone(&self.shared),
                    settled: false,
                };
                self.runtime
                    .spawn(Shared::drain(guard, serialized).in_current_span());
            }
            Phase::InFlight => state.backlog.enqueue(serialized),
            Phase::Suppressed => {
                state.backlog.enqueue(serialized);
                debug!(
                    "Delivery suppressed, holding event ({} pending)",
                    state.backlog.len()
                );
            }
        }
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.shared.lock().phase
    }

    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.shared.lock().backlog.len()
    }

    #[must_use]
    pub fn destination(&self) -> &str {
        &self.shared.destination
    }

    /// Resolves once nothing is in flight: the loop is idle or suppressed.
    pub async fn wait_settled(&self) -> Phase {
        let mut rx = self.shared.phase_tx.subscribe();
        let settled = match rx.wait_for(|phase| *phase != Phase::InFlight).await {
            Ok(phase) => *phase,
            // The sender lives as long as `self`
            Err(_) => self.phase(),
        };
        settled
    }
}
