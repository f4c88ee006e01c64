// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Turns the arguments of a `log` call into a single JSON payload.
//!
//! A single argument is kept as-is. Several arguments are rendered to text and
//! joined with one space, so `("x=", 5, " ok")` becomes `"x= 5  ok"`.
//! Either way every `undefined`/`null` is replaced by its printable name.

use serde_json::Value as Json;

use crate::error::LogError;
use crate::value::Value;

pub const UNDEFINED: &str = "undefined";
pub const NULL: &str = "null";

/// Normalizes the positional arguments of one `log` call.
///
/// # Errors
///
/// Returns [`LogError::InvalidArgument`] when `args` is empty.
pub fn normalize(args: Vec<Value>) -> Result<Json, LogError> {
    let mut args = args.into_iter();
    match (args.next(), args.next()) {
        (None, _) => Err(LogError::InvalidArgument("no event payload provided")),
        (Some(only), None) => Ok(sanitize(only)),
        (Some(first), Some(second)) => {
            let parts: Vec<String> = [first, second]
                .into_iter()
                .chain(args)
                .map(|arg| render(&sanitize(arg)))
                .collect();
            Ok(Json::String(parts.join(" ")))
        }
    }
}

/// Recursively replaces non-representable values with placeholders.
///
/// Arrays and objects keep their shape; only the scalars inside them change.
#[must_use]
pub fn sanitize(value: Value) -> Json {
    match value {
        Value::Undefined => Json::String(UNDEFINED.to_string()),
        Value::Null => Json::String(NULL.to_string()),
        Value::Bool(b) => Json::Bool(b),
        Value::Number(n) => Json::Number(n),
        Value::String(s) => Json::String(s),
        Value::Array(items) => Json::Array(items.into_iter().map(sanitize).collect()),
        Value::Object(members) => Json::Object(
            members
                .into_iter()
                .map(|(k, v)| (k, sanitize(v)))
                .collect(),
        ),
    }
}

// Strings are joined verbatim, everything else in its compact JSON form.
fn render(part: &Json) -> String {
    match part {
        Json::String(s) => s.clone(),
        other => other.to_string(),
    }
}
