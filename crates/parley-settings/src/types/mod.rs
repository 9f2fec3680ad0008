//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` for the JSON file
//! format and `#[serde(default)]` so partial files parse; missing fields get
//! their default value.

mod sections;

pub use sections::*;

use serde::{Deserialize, Serialize};

/// Root settings type.
///
/// # JSON Format
///
/// ```json
/// {
///   "api": { "baseUrl": "http://127.0.0.1:8080/api" },
///   "cache": { "maxMessages": 10000 }
/// }
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ParleySettings {
    /// REST API location.
    pub api: ApiSettings,
    /// Local state cache sizing.
    pub cache: CacheSettings,
    /// Streaming handshake identity.
    pub gateway: GatewaySettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camel_case_round_trip() {
        let settings = ParleySettings::default();
        let value = serde_json::to_value(&settings).unwrap();
        assert!(value["api"].get("baseUrl").is_some());
        assert!(value["cache"].get("maxMessages").is_some());
        let back: ParleySettings = serde_json::from_value(value).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: ParleySettings =
            serde_json::from_str(r#"{"cache": {"maxMessages": 250}}"#).unwrap();
        assert_eq!(settings.cache.max_messages, Some(250));
        assert_eq!(settings.api, ApiSettings::default());
    }
}
