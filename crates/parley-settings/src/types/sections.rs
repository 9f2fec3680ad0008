//! API, cache, gateway and logging sections.

use parley_core::DEFAULT_API_BASE;
use serde::{Deserialize, Serialize};

/// REST API location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Base URL every REST endpoint hangs off.
    pub base_url: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// Local state cache sizing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CacheSettings {
    /// Message history capacity. Absent or below the minimum means the
    /// store's default.
    pub max_messages: Option<usize>,
}

/// Client identity sent in the streaming handshake.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Reported operating system.
    pub os: String,
    /// Reported browser / library name.
    pub browser: String,
    /// Reported device name.
    pub device: String,
    /// Gateway protocol version.
    pub version: u8,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            browser: "parley".to_string(),
            device: "parley".to_string(),
            version: 3,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
