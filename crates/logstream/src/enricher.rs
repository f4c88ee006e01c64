// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Wraps normalized events into envelopes.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::PageInfo;
use crate::environment::{AgentInfo, EnvironmentDescriptor};
use crate::error::LogError;

const TRACE_CODE_LEN: usize = 8;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// The unit of delivery. Serializes to the request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub event: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracecode: Option<String>,
}

impl Envelope {
    pub fn to_json(&self) -> Result<String, LogError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Generates a session trace code: 8 lowercase base-36 characters.
#[must_use]
pub fn generate_trace_code() -> String {
    (0..TRACE_CODE_LEN)
        .map(|_| char::from(BASE36[fastrand::usize(..BASE36.len())]))
        .collect()
}

/// Per-session enrichment state and policy.
pub struct Enricher {
    page_info: PageInfo,
    trace_code: Option<String>,
    environment: Arc<dyn EnvironmentDescriptor>,
    sent_environment_info: AtomicBool,
}

impl Enricher {
    /// `trace_code` is attached to every envelope when present.
    pub fn new(
        page_info: PageInfo,
        trace_code: Option<String>,
        environment: Arc<dyn EnvironmentDescriptor>,
    ) -> Self {
        Enricher {
            page_info,
            trace_code,
            environment,
            sent_environment_info: AtomicBool::new(false),
        }
    }

    pub fn enrich(&self, event: serde_json::Value) -> Envelope {
        let agent = if self.should_attach_agent() {
            Some(self.environment.describe())
        } else {
            None
        };

        Envelope {
            event,
            agent,
            tracecode: self.trace_code.clone(),
        }
    }

    #[must_use]
    pub fn sent_environment_info(&self) -> bool {
        self.sent_environment_info.load(Ordering::Acquire)
    }

    fn should_attach_agent(&self) -> bool {
        match self.page_info {
            PageInfo::Never => false,
            PageInfo::PerEntry => {
                self.sent_environment_info.store(true, Ordering::Release);
                true
            }
            // Only the first caller to flip the flag attaches
            PageInfo::Once => !self.sent_environment_info.swap(true, Ordering::AcqRel),
        }
    }
}
