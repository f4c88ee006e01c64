// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client-side log shipping.
//!
//! Application events are normalized into JSON, wrapped in an envelope that may
//! carry a session trace code and a description of the host environment, and
//! delivered to a log intake over HTTP one request at a time.
//!
//! # Pipeline
//!
//! ```text
//!   log(values)
//!       │
//!       v
//!   ┌────────────┐
//!   │ Normalizer │  (sanitize, join variadic calls)
//!   └─────┬──────┘
//!         v
//!   ┌────────────┐
//!   │  Enricher  │  (agent info, trace code)
//!   └─────┬──────┘
//!         v
//!   ┌────────────┐      in flight      ┌─────────┐
//!   │  Delivery  │ ──────────────────> │ Backlog │
//!   │    Loop    │ <────────────────── │ (FIFO)  │
//!   └─────┬──────┘   on completion     └─────────┘
//!         v
//!   ┌────────────┐
//!   │ Transport  │  (HTTP POST, one at a time)
//!   └────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use logstream::{log, Session};
//!
//! let session = Session::init("my-token")?;
//! log!(session, "user signed in", 42)?;
//! session.wait_settled().await;
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod backlog;
pub mod config;
pub mod delivery;
pub mod enricher;
pub mod environment;
pub mod error;
pub mod global;
pub mod hooks;
pub mod logger;
pub mod normalizer;
pub mod session;
pub mod transport;
pub mod value;

pub use config::{Config, Options, PageInfo};
pub use delivery::Phase;
pub use error::LogError;
pub use session::Session;
pub use value::Value;

/// Logs the given values through a [`Session`].
///
/// Every argument is converted with [`Value::from`], so mixed argument types
/// are accepted the same way a variadic call would be.
///
/// ```rust,ignore
/// logstream::log!(session, "x=", 5, " ok")?;
/// ```
#[macro_export]
macro_rules! log {
    ($session:expr $(, $value:expr)* $(,)?) => {
        $session.log(vec![$($crate::Value::from($value)),*])
    };
}

/// Logs the given values through the process-wide session set up by
/// [`global::init`].
#[macro_export]
macro_rules! global_log {
    ($($value:expr),* $(,)?) => {
        $crate::global::log(vec![$($crate::Value::from($value)),*])
    };
}
