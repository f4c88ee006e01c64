// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::env;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use logstream::{logger::Formatter, Config, Phase, Session, Value};

const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 5;

#[tokio::main]
pub async fn main() {
    let log_level = env::var("LOGSTREAM_LOG_LEVEL")
        .map(|val| val.to_lowercase())
        .unwrap_or("info".to_string());

    let env_filter = format!("h2=off,hyper=off,rustls=off,{}", log_level);

    #[allow(clippy::expect_used)]
    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_new(env_filter).expect("could not parse log level in configuration"),
        )
        .event_format(Formatter)
        .with_writer(std::io::stderr)
        .finish();

    #[allow(clippy::expect_used)]
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    debug!("Logging subsystem enabled");

    let parse_json = env::var("LOGSTREAM_PARSE_JSON")
        .map(|val| val.to_lowercase() == "true")
        .unwrap_or(false);
    let drain_timeout = env::var("LOGSTREAM_DRAIN_TIMEOUT_SECS")
        .ok()
        .and_then(|secs| secs.parse::<u64>().ok())
        .unwrap_or(DEFAULT_DRAIN_TIMEOUT_SECS);

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("Error creating config on forwarder startup: {e}");
            return;
        }
    };

    let session = match Session::init(config) {
        Ok(session) => session,
        Err(e) => {
            error!("Error starting logging session: {e}");
            return;
        }
    };
    info!("Forwarding stdin to {}", session.destination());

    let cancel_token = CancellationToken::new();
    let signal_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Received interrupt, shutting down");
            signal_token.cancel();
        }
    });

    let forwarded = forward_stdin(&session, parse_json, &cancel_token).await;
    info!("Read {forwarded} lines from stdin");

    match timeout(Duration::from_secs(drain_timeout), session.wait_settled()).await {
        Ok(Phase::Suppressed) => warn!(
            "Delivery suppressed after an intake error, {} events were not sent",
            session.backlog_len()
        ),
        Ok(_) => debug!("All events delivered"),
        Err(_) => warn!(
            "Timed out after {drain_timeout}s waiting for delivery, {} events still queued",
            session.backlog_len()
        ),
    }
}

async fn forward_stdin(session: &Session, parse_json: bool, cancel_token: &CancellationToken) -> usize {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut forwarded = 0;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line,
            _ = cancel_token.cancelled() => break,
        };

        match line {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                if let Err(e) = session.log(vec![to_value(line, parse_json)]) {
                    error!("Failed to log line: {e}");
                    continue;
                }
                forwarded += 1;
            }
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read from stdin: {e}");
                break;
            }
        }
    }

    forwarded
}

fn to_value(line: String, parse_json: bool) -> Value {
    if parse_json {
        if let Ok(json) = serde_json::from_str::<serde_json::Value>(&line) {
            return Value::from(json);
        }
    }
    Value::from(line)
}
