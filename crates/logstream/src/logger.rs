// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tracing formatter for the shipper's own diagnostics.
//!
//! Lines are prefixed with `LOGSTREAM` so they can be told apart from the
//! application output the shipper is forwarding:
//!
//! ```text
//! LOGSTREAM | LEVEL | [span_name{span_fields}:] message {event_fields}
//! ```
//!
//! Events from other crates (the HTTP client, mostly) carry their target in
//! brackets after the level, since they show up under the same prefix.
//!
//! ```rust,ignore
//! let subscriber = tracing_subscriber::fmt::Subscriber::builder()
//!     .event_format(logstream::logger::Formatter)
//!     .finish();
//! tracing::subscriber::set_global_default(subscriber)?;
//! ```

use std::fmt;
use tracing_core::{Event, Subscriber};
use tracing_subscriber::fmt::{
    format::{self, FormatEvent, FormatFields},
    FmtContext, FormattedFields,
};
use tracing_subscriber::registry::LookupSpan;

pub const PREFIX: &str = "LOGSTREAM";

const OWN_TARGETS: [&str; 2] = ["logstream", "logstream_forwarder"];

fn is_own_target(target: &str) -> bool {
    OWN_TARGETS.iter().any(|own| {
        target
            .strip_prefix(own)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

#[derive(Debug, Clone, Copy)]
pub struct Formatter;

impl<S, N> FormatEvent<S, N> for Formatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: format::Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let metadata = event.metadata();
        write!(&mut writer, "{PREFIX} | {} | ", metadata.level())?;
        if !is_own_target(metadata.target()) {
            write!(&mut writer, "[{}] ", metadata.target())?;
        }

        if let Some(scope) = ctx.event_scope() {
            for span in scope.from_root() {
                write!(writer, "{}", span.name())?;

                // Populated by the fmt layer when the span was created
                let ext = span.extensions();
                if let Some(fields) = ext.get::<FormattedFields<N>>() {
                    if !fields.is_empty() {
                        write!(writer, "{{{fields}}}")?;
                    }
                }
                write!(writer, ": ")?;
            }
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for Buffer {
        type Writer = Buffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[test]
    fn test_format_with_span() {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_ansi(false)
            .event_format(Formatter)
            .with_writer(buffer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("delivery", pending = 2);
            let _guard = span.enter();
            tracing::warn!(status = 503, "Couldn't submit events");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(
            output,
            "LOGSTREAM | WARN | delivery{pending=2}: Couldn't submit events status=503\n"
        );
    }

    #[test]
    fn test_format_without_span() {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_ansi(false)
            .event_format(Formatter)
            .with_writer(buffer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("Session initialized");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output, "LOGSTREAM | INFO | Session initialized\n");
    }

    #[test]
    fn test_format_foreign_target() {
        let buffer = Buffer::default();
        let subscriber = tracing_subscriber::fmt::Subscriber::builder()
            .with_ansi(false)
            .event_format(Formatter)
            .with_writer(buffer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(target: "reqwest::connect", "starting new connection");
            tracing::info!(target: "logstream_forwarder", "Logging subsystem enabled");
        });

        let output = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        assert_eq!(
            output,
            "LOGSTREAM | INFO | [reqwest::connect] starting new connection
             LOGSTREAM | INFO | Logging subsystem enabled
"
        );
    }

    #[test]
    fn test_is_own_target() {
        assert!(is_own_target("logstream"));
        assert!(is_own_target("logstream::delivery"));
        assert!(is_own_target("logstream_forwarder"));
        assert!(!is_own_target("logstreamer"));
        assert!(!is_own_target("hyper_util::client"));
    }
}
