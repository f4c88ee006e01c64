// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock collaborators for integration tests

use async_trait::async_trait;
use logstream::environment::{AgentInfo, Dimension, EnvironmentDescriptor};
use logstream::transport::{DeliveryOutcome, Transport};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Transport that records payloads, takes `delay` per send, and fails the
/// send with index `fail_at` (0-based) if set.
#[allow(dead_code)]
pub struct ScriptedTransport {
    sent: Mutex<Vec<String>>,
    outstanding: AtomicUsize,
    max_outstanding: AtomicUsize,
    delay: Duration,
    fail_at: Option<usize>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new(delay: Duration, fail_at: Option<usize>) -> Self {
        ScriptedTransport {
            sent: Mutex::new(Vec::new()),
            outstanding: AtomicUsize::new(0),
            max_outstanding: AtomicUsize::new(0),
            delay,
            fail_at,
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    /// Events of every recorded envelope, in send order.
    pub fn events(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .map(|body| {
                let envelope: serde_json::Value =
                    serde_json::from_str(body).expect("envelope is JSON");
                envelope["event"].clone()
            })
            .collect()
    }

    pub fn max_outstanding(&self) -> usize {
        self.max_outstanding.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _destination: &str, payload: Vec<u8>) -> DeliveryOutcome {
        let now = self.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_outstanding.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let index = {
            let mut sent = self.sent.lock().unwrap();
            sent.push(String::from_utf8(payload).expect("utf8 payload"));
            sent.len() - 1
        };

        self.outstanding.fetch_sub(1, Ordering::SeqCst);
        if self.fail_at == Some(index) {
            DeliveryOutcome::Failed("500 Internal Server Error".to_string())
        } else {
            DeliveryOutcome::Delivered
        }
    }
}

/// Environment with a fixed, recognizable descriptor
#[allow(dead_code)]
pub struct FixedEnvironment;

impl EnvironmentDescriptor for FixedEnvironment {
    fn describe(&self) -> AgentInfo {
        AgentInfo {
            name: "integration-agent".to_string(),
            screen_width: Dimension::Known(1024),
            screen_height: Dimension::Unknown,
        }
    }
}
