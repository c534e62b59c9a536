use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Tag of the inbound that exposes the core's control API
pub const API_INBOUND_TAG: &str = "api";

/// In-memory copy of the core's JSON configuration
///
/// Only the parts the supervisor reads are typed; every other key is kept
/// verbatim so that serialising writes back exactly what was supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inbounds: Vec<InboundConfig>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundConfig {
    #[serde(default)]
    pub tag: String,

    #[serde(default)]
    pub port: u16,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CoreConfig {
    pub fn from_json(contents: &str) -> serde_json::Result<Self> {
        serde_json::from_str(contents)
    }

    /// Indented JSON, as written to the core's config path
    pub fn to_pretty_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    /// Port of the inbound tagged `api`, if any
    pub fn api_port(&self) -> Option<u16> {
        self.inbounds
            .iter()
            .find(|inbound| inbound.tag == API_INBOUND_TAG)
            .map(|inbound| inbound.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "log": { "access": "./access.log", "loglevel": "warning" },
        "api": { "tag": "api", "services": ["StatsService"] },
        "inbounds": [
            { "tag": "api", "listen": "127.0.0.1", "port": 62789, "protocol": "dokodemo-door" },
            { "tag": "inbound-443", "port": 443, "protocol": "vless" }
        ],
        "outbounds": [{ "protocol": "freedom" }]
    }"#;

    #[test]
    fn test_api_port_from_tagged_inbound() {
        let config = CoreConfig::from_json(SAMPLE).unwrap();
        assert_eq!(config.api_port(), Some(62789));
    }

    #[test]
    fn test_api_port_missing() {
        let config = CoreConfig::from_json(r#"{"inbounds":[{"tag":"in","port":80}]}"#).unwrap();
        assert_eq!(config.api_port(), None);
        assert_eq!(CoreConfig::default().api_port(), None);
    }

    #[test]
    fn test_unknown_keys_are_preserved() {
        let config = CoreConfig::from_json(SAMPLE).unwrap();
        let written = config.to_pretty_json().unwrap();

        let original: Value = serde_json::from_str(SAMPLE).unwrap();
        let reparsed: Value = serde_json::from_slice(&written).unwrap();
        assert_eq!(original, reparsed);
    }

    #[test]
    fn test_output_is_indented() {
        let config = CoreConfig::from_json(SAMPLE).unwrap();
        let written = String::from_utf8(config.to_pretty_json().unwrap()).unwrap();
        assert!(written.contains("\n  \""));
    }
}
