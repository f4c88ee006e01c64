// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Process-wide session for callers that don't want to carry a [`Session`]
//! around.
//!
//! ```rust,ignore
//! logstream::global::init("my-token")?;
//! logstream::global_log!("cache miss", key)?;
//! ```

use std::sync::{PoisonError, RwLock};

use crate::config::Options;
use crate::error::LogError;
use crate::session::Session;
use crate::value::Value;

static SESSION: RwLock<Option<Session>> = RwLock::new(None);

/// Starts the process-wide session, replacing any previous one.
///
/// Must be called from within a tokio runtime.
pub fn init(options: impl Into<Options>) -> Result<bool, LogError> {
    let session = Session::init(options)?;
    *SESSION.write().unwrap_or_else(PoisonError::into_inner) = Some(session);
    Ok(true)
}

/// Logs through the process-wide session.
///
/// # Errors
///
/// Returns [`LogError::Uninitialized`] before [`init`], or
/// [`LogError::InvalidArgument`] when `values` is empty.
pub fn log(values: Vec<Value>) -> Result<(), LogError> {
    let session = session().ok_or(LogError::Uninitialized)?;
    session.log(values)
}

/// The process-wide session, if [`init`] succeeded.
#[must_use]
pub fn session() -> Option<Session> {
    SESSION
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Drops the process-wide session.
pub fn reset() {
    SESSION
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
}
