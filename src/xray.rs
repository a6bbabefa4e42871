//! Aggregate relay settings
//!
//! The whole relay configuration as edited on the panel's xray page. Only the
//! sections this crate manipulates are typed; everything else rides along in
//! `extra` so an update never drops configuration it did not understand.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{envelope::unwrap_obj, outbound::OutboundConfig, CodecResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XraySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<XrayLog>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<XrayApi>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inbounds: Vec<XrayInbound>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outbounds: Vec<OutboundConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<XrayPolicy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub routing: Option<XrayRouting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<Map<String, Value>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl XraySettings {
    pub fn outbound(&self, tag: &str) -> Option<&OutboundConfig> {
        self.outbounds.iter().find(|o| o.tag == tag)
    }

    /// Replaces the outbound with the same tag in place, or appends it.
    /// Returns the replaced outbound.
    pub fn upsert_outbound(&mut self, outbound: OutboundConfig) -> Option<OutboundConfig> {
        match self.outbounds.iter_mut().find(|o| o.tag == outbound.tag) {
            Some(slot) => {
                tracing::debug!("replacing outbound {}", outbound.tag);
                Some(std::mem::replace(slot, outbound))
            }
            None => {
                tracing::debug!("appending outbound {}", outbound.tag);
                self.outbounds.push(outbound);
                None
            }
        }
    }

    pub fn remove_outbound(&mut self, tag: &str) -> Option<OutboundConfig> {
        let pos = self.outbounds.iter().position(|o| o.tag == tag)?;
        Some(self.outbounds.remove(pos))
    }

    /// Routing rules sending traffic to `tag`.
    pub fn rules_for(&self, tag: &str) -> Vec<&XrayRule> {
        self.routing
            .iter()
            .flat_map(|r| r.rules.iter())
            .filter(|r| r.outbound_tag == tag)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct XrayLog {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub access: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dns_log: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(rename = "loglevel", skip_serializing_if = "String::is_empty")]
    pub log_level: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub mask_address: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrayApi {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<String>,
}

/// Inbound as it appears in the relay config. Not the panel's [`crate::Inbound`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrayInbound {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub listen: String,
    #[serde(skip_serializing_if = "is_zero")]
    pub port: u16,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub settings: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrayPolicy {
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub levels: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub system: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct XrayRouting {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub domain_strategy: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<XrayRule>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct XrayRule {
    #[serde(rename = "type")]
    pub typ: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub inbound_tag: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub outbound_tag: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ip: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub protocol: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `obj` of the relay settings fetch: the config plus the panel's inbound tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XraySettingsWrapper {
    #[serde(default)]
    pub xray_setting: XraySettings,
    #[serde(default)]
    pub inbound_tags: Vec<String>,
}

impl XraySettingsWrapper {
    /// Decodes the raw response body, whose `obj` is the wrapper as JSON text.
    pub fn decode_response(data: &[u8]) -> CodecResult<Self> {
        unwrap_obj(data)
    }
}

fn is_zero(port: &u16) -> bool {
    *port == 0
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{CodecError, OutboundSettings};

    fn settings() -> XraySettings {
        XraySettings {
            log: Some(XrayLog {
                access: "none".to_owned(),
                log_level: "warning".to_owned(),
                ..Default::default()
            }),
            api: Some(XrayApi {
                tag: "api".to_owned(),
                services: vec![
                    "HandlerService".to_owned(),
                    "LoggerService".to_owned(),
                    "StatsService".to_owned(),
                ],
            }),
            inbounds: vec![XrayInbound {
                tag: "api".to_owned(),
                listen: "127.0.0.1".to_owned(),
                port: 62789,
                protocol: "dokodemo-door".to_owned(),
                settings: json!({ "address": "127.0.0.1" })
                    .as_object()
                    .cloned()
                    .unwrap(),
                ..Default::default()
            }],
            outbounds: vec![OutboundConfig::freedom("direct", "UseIP")],
            stats: Some(Map::new()),
            ..Default::default()
        }
    }

    #[test]
    fn test_settings_round_trip() {
        let data = serde_json::to_vec(&settings()).unwrap();
        let decoded: XraySettings = serde_json::from_slice(&data).unwrap();

        assert_eq!(decoded.log.as_ref().unwrap().log_level, "warning");
        assert_eq!(decoded.api.as_ref().unwrap().services.len(), 3);
        assert_eq!(decoded.outbound("direct").unwrap().protocol(), "freedom");
        assert_eq!(decoded, settings());
    }

    #[test]
    fn test_unknown_sections_preserved() {
        let wire = json!({
            "log": { "loglevel": "warning" },
            "dns": { "servers": ["1.1.1.1"] },
            "routing": {
                "domainStrategy": "AsIs",
                "balancers": [],
                "rules": [
                    { "type": "field", "outboundTag": "blocked", "ip": ["geoip:private"] },
                    { "type": "field", "outboundTag": "blocked", "domain": ["geosite:ads"] }
                ]
            }
        });

        let decoded: XraySettings = serde_json::from_value(wire.clone()).unwrap();
        assert!(decoded.extra.contains_key("dns"));
        assert_eq!(decoded.rules_for("blocked").len(), 2);
        assert_eq!(serde_json::to_value(&decoded).unwrap(), wire);
    }

    #[test]
    fn test_upsert_and_remove_outbound() {
        let mut settings = settings();

        assert!(settings
            .upsert_outbound(OutboundConfig::blackhole("blocked"))
            .is_none());
        assert_eq!(settings.outbounds.len(), 2);

        let old = settings
            .upsert_outbound(OutboundConfig::freedom("direct", "AsIs"))
            .unwrap();
        assert_eq!(settings.outbounds.len(), 2);
        let OutboundSettings::Freedom(old) = old.settings else {
            panic!("expected freedom settings");
        };
        assert_eq!(old.domain_strategy, "UseIP");
        assert_eq!(settings.outbounds[0].tag, "direct");

        assert!(settings.remove_outbound("blocked").is_some());
        assert!(settings.remove_outbound("blocked").is_none());
        assert_eq!(settings.outbounds.len(), 1);
    }

    #[test]
    fn test_wrapper_parsing() {
        let wrapper: XraySettingsWrapper = serde_json::from_value(json!({
            "xraySetting": {
                "log": {
                    "access": "none",
                    "dnsLog": false,
                    "error": "",
                    "loglevel": "warning",
                    "maskAddress": ""
                },
                "api": {
                    "tag": "api",
                    "services": ["HandlerService", "LoggerService", "StatsService"]
                },
                "stats": {}
            },
            "inboundTags": ["inbound-14509", "inbound-44488"]
        }))
        .unwrap();

        assert_eq!(wrapper.inbound_tags.len(), 2);
        assert_eq!(wrapper.xray_setting.api.unwrap().tag, "api");
    }

    #[test]
    fn test_decode_response_two_stage() {
        let inner = json!({
            "xraySetting": { "outbounds": [{ "tag": "direct", "protocol": "freedom" }] },
            "inboundTags": ["inbound-443"]
        });
        let body = json!({ "success": true, "msg": "", "obj": inner.to_string() });

        let wrapper =
            XraySettingsWrapper::decode_response(body.to_string().as_bytes()).unwrap();
        assert_eq!(wrapper.inbound_tags, vec!["inbound-443"]);
        assert!(wrapper.xray_setting.outbound("direct").is_some());

        let rejected = json!({ "success": false, "msg": "login expired", "obj": null });
        let err = XraySettingsWrapper::decode_response(rejected.to_string().as_bytes())
            .unwrap_err();
        assert!(matches!(err, CodecError::Rejected(msg) if msg == "login expired"));

        let broken = json!({ "success": true, "msg": "", "obj": "{not json" });
        let err =
            XraySettingsWrapper::decode_response(broken.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
