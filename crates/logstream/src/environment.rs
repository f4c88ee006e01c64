// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Description of the host environment attached to envelopes as `agent`.

use serde::Serialize;
use std::env;
use std::fmt;

pub const AGENT_NAME_ENV: &str = "LOGSTREAM_AGENT_NAME";
const UNKNOWN: &str = "unknown";

/// A screen dimension, or `"unknown"` when the host cannot tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Known(u32),
    Unknown,
}

impl Serialize for Dimension {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Dimension::Known(n) => serializer.serialize_u32(*n),
            Dimension::Unknown => serializer.serialize_str(UNKNOWN),
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Known(n) => write!(f, "{n}"),
            Dimension::Unknown => f.write_str(UNKNOWN),
        }
    }
}

impl From<Option<u32>> for Dimension {
    fn from(value: Option<u32>) -> Self {
        value.map_or(Dimension::Unknown, Dimension::Known)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub name: String,
    pub screen_width: Dimension,
    pub screen_height: Dimension,
}

impl AgentInfo {
    #[must_use]
    pub fn unknown() -> Self {
        AgentInfo {
            name: UNKNOWN.to_string(),
            screen_width: Dimension::Unknown,
            screen_height: Dimension::Unknown,
        }
    }
}

/// Produces an [`AgentInfo`] on demand.
pub trait EnvironmentDescriptor: Send + Sync {
    fn describe(&self) -> AgentInfo;
}

/// Reads the descriptor from the running process.
///
/// The name defaults to `logstream/<version> (<os>; <arch>)` and can be
/// overridden with `LOGSTREAM_AGENT_NAME`. Dimensions come from the terminal
/// size variables `COLUMNS` and `LINES`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostEnvironment;

impl EnvironmentDescriptor for HostEnvironment {
    fn describe(&self) -> AgentInfo {
        let name = env::var(AGENT_NAME_ENV)
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| {
                format!(
                    "{}/{} ({}; {})",
                    env!("CARGO_PKG_NAME"),
                    env!("CARGO_PKG_VERSION"),
                    env::consts::OS,
                    env::consts::ARCH
                )
            });

        AgentInfo {
            name,
            screen_width: read_dimension("COLUMNS"),
            screen_height: read_dimension("LINES"),
        }
    }
}

fn read_dimension(var: &str) -> Dimension {
    env::var(var)
        .ok()
        .and_then(|value| value.trim().parse::<u32>().ok())
        .into()
}

/// Always describes the same record.
#[derive(Debug, Clone)]
pub struct StaticEnvironment(pub AgentInfo);

impl EnvironmentDescriptor for StaticEnvironment {
    fn describe(&self) -> AgentInfo {
        self.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    #[test]
    fn test_agent_info_serializes_camel_case() {
        let info = AgentInfo {
            name: "test-agent".to_string(),
            screen_width: Dimension::Known(1280),
            screen_height: Dimension::Unknown,
        };
        assert_eq!(
            serde_json::to_value(&info).unwrap(),
            json!({"name": "test-agent", "screenWidth": 1280, "screenHeight": "unknown"})
        );
    }

    #[test]
    fn test_unknown_agent_info() {
        let info = AgentInfo::unknown();
        assert_eq!(info.name, "unknown");
        assert_eq!(info.screen_width.to_string(), "unknown");
    }

    #[test]
    #[serial]
    fn test_host_environment_reads_terminal_size() {
        env::set_var("COLUMNS", "120");
        env::set_var("LINES", "40");
        env::set_var(AGENT_NAME_ENV, "custom-agent");

        let info = HostEnvironment.describe();
        assert_eq!(info.name, "custom-agent");
        assert_eq!(info.screen_width, Dimension::Known(120));
        assert_eq!(info.screen_height, Dimension::Known(40));

        env::remove_var("COLUMNS");
        env::remove_var("LINES");
        env::remove_var(AGENT_NAME_ENV);
    }

    #[test]
    #[serial]
    fn test_host_environment_falls_back_to_unknown() {
        env::remove_var("COLUMNS");
        env::set_var("LINES", "not-a-number");
        env::remove_var(AGENT_NAME_ENV);

        let info = HostEnvironment.describe();
        assert!(info.name.starts_with("logstream/"));
        assert_eq!(info.screen_width, Dimension::Unknown);
        assert_eq!(info.screen_height, Dimension::Unknown);

        env::remove_var("LINES");
    }

    #[test]
    fn test_static_environment() {
        let env = StaticEnvironment(AgentInfo::unknown());
        assert_eq!(env.describe(), AgentInfo::unknown());
    }
}
