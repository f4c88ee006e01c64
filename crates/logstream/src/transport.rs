// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sending serialized envelopes to the intake.
//!
//! The delivery loop only sees the [`Transport`] trait, so tests can swap the
//! HTTP client for an in-memory implementation.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::Config;

pub const CONTENT_TYPE_JSON: &str = "text/json";
pub const REQUESTED_WITH_HEADER: &str = "X-Requested-With";
pub const REQUESTED_WITH: &str = "XMLHttpRequest";

/// How a single delivery attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    Failed(String),
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Delivered => f.write_str("delivered"),
            DeliveryOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one payload. Timeouts are the implementation's concern.
    async fn send(&self, destination: &str, payload: Vec<u8>) -> DeliveryOutcome;
}

/// Posts envelopes over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    headers: HeaderMap,
}

impl HttpTransport {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        HttpTransport {
            client: get_client(config),
            headers: default_headers(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, destination: &str, payload: Vec<u8>) -> DeliveryOutcome {
        let resp = self
            .client
            .post(destination)
            .headers(self.headers.clone())
            .body(payload)
            .send()
            .await;

        match resp {
            Ok(resp) => {
                let status = resp.status();
                if status.as_u16() >= 400 {
                    // Don't read the body unless we have to report it
                    let body = resp.text().await.unwrap_or_default();
                    DeliveryOutcome::Failed(format!("{status}: {body}"))
                } else {
                    debug!("Delivered event to intake: {status}");
                    DeliveryOutcome::Delivered
                }
            }
            Err(e) => DeliveryOutcome::Failed(format!("request error: {e}")),
        }
    }
}

fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
    headers.insert(REQUESTED_WITH_HEADER, HeaderValue::from_static(REQUESTED_WITH));
    headers
}

/// Builds the HTTP client for `config`.
///
/// A proxy setting that cannot be parsed is logged and ignored rather than
/// failing session setup.
#[must_use]
pub fn get_client(config: &Config) -> reqwest::Client {
    match build_client(config, true) {
        Ok(client) => client,
        Err(e) => {
            error!(
                "Unable to parse proxy configuration: {}, falling back to direct connection",
                e
            );
            match build_client(config, false) {
                Ok(client) => client,
                Err(inner) => {
                    error!(
                        "Failed to build HTTP client without proxy: {}, using reqwest defaults",
                        inner
                    );
                    reqwest::Client::new()
                }
            }
        }
    }
}

fn build_client(config: &Config, allow_proxy: bool) -> Result<reqwest::Client, Box<dyn Error>> {
    let mut client = reqwest::Client::builder()
        .timeout(config.timeout())
        .pool_idle_timeout(Some(Duration::from_secs(270)))
        .tcp_keepalive(Some(Duration::from_secs(120)));

    if allow_proxy {
        if let Some(proxy) = &config.https_proxy {
            client = client.proxy(reqwest::Proxy::https(proxy.as_str())?);
        }
    }

    Ok(client.build()?)
}
