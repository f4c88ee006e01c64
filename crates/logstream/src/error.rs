// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Errors surfaced synchronously to callers of `init` and `log`.
///
/// Transport failures are deliberately absent: they are absorbed by the
/// delivery loop, which suppresses the session and reports a warning.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("You must call init(...) first")]
    Uninitialized,

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Failed to serialize event: {0}")]
    Serialization(#[from] serde_json::Error),
}
