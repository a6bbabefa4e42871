//! Inbound records
//!
//! The panel returns inbounds with `settings`, `streamSettings` and `sniffing`
//! as JSON text. [`Inbound`] unwraps them on decode and wraps them again on
//! encode. Which shape `settings` has depends on the sibling `protocol`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::{
    envelope::{json_string, unwrap_str, wrap_field},
    transport::InboundStreamSettings,
    vless::VlessSettings,
    CodecError, CodecResult,
};

pub const PROTOCOL_VLESS: &str = "vless";
pub const PROTOCOL_VMESS: &str = "vmess";

/// One user of an inbound. `email` is unique within the inbound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundClient {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub enable: bool,
    /// Unix milliseconds, `0` never expires.
    #[serde(default)]
    pub expiry_time: i64,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub flow: Option<String>,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub limit_ip: u32,
    #[serde(default, rename = "reset")]
    pub reset_days: u32,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub sub_id: Option<String>,
    /// Quota in bytes despite the wire name, `0` is unlimited.
    #[serde(default, rename = "totalGB")]
    pub total_bytes: u64,
    /// Client keys the codec does not model (`tgId`, `comment`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl InboundClient {
    /// Enabled client with a fresh random identity and no limits.
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            enable: true,
            id: Uuid::new_v4().to_string(),
            ..Default::default()
        }
    }

    pub fn with_flow(mut self, flow: impl Into<String>) -> Self {
        self.flow = Some(flow.into());
        self
    }

    pub fn uuid(&self) -> Result<Uuid, uuid::Error> {
        Uuid::parse_str(&self.id)
    }

    pub fn never_expires(&self) -> bool {
        self.expiry_time == 0
    }

    pub fn is_unlimited(&self) -> bool {
        self.total_bytes == 0
    }
}

/// Traffic counters for one client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ClientStat {
    pub id: u32,
    pub inbound_id: u32,
    pub enable: bool,
    pub email: String,
    pub up: u64,
    pub down: u64,
    pub expiry_time: i64,
    pub total: u64,
    pub reset: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SniffingSettings {
    pub enabled: bool,
    pub dest_override: Vec<String>,
    pub metadata_only: bool,
    pub route_only: bool,
}

impl SniffingSettings {
    pub fn enabled(dest_override: &[&str]) -> Self {
        Self {
            enabled: true,
            dest_override: dest_override.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmessSettings {
    #[serde(default)]
    pub clients: Vec<InboundClient>,
}

/// Per-protocol `settings` of an inbound.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundSettings {
    Vless(VlessSettings),
    Vmess(VmessSettings),
    Other {
        protocol: String,
        settings: Map<String, Value>,
    },
}

impl InboundSettings {
    /// Parses the JSON text of `settings` for the given `protocol`.
    pub fn from_wire(protocol: &str, text: &str) -> CodecResult<Self> {
        let settings = match protocol {
            PROTOCOL_VLESS => Self::Vless(unwrap_str(text)?),
            PROTOCOL_VMESS => Self::Vmess(unwrap_str(text)?),
            other => {
                tracing::debug!("keeping {} inbound settings opaque", other);
                Self::Other {
                    protocol: other.to_owned(),
                    settings: unwrap_str(text)?,
                }
            }
        };
        Ok(settings)
    }

    pub fn protocol(&self) -> &str {
        match self {
            Self::Vless(_) => PROTOCOL_VLESS,
            Self::Vmess(_) => PROTOCOL_VMESS,
            Self::Other { protocol, .. } => protocol,
        }
    }

    pub fn clients(&self) -> &[InboundClient] {
        match self {
            Self::Vless(s) => &s.clients,
            Self::Vmess(s) => &s.clients,
            Self::Other { .. } => &[],
        }
    }
}

impl Serialize for InboundSettings {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Vless(s) => s.serialize(serializer),
            Self::Vmess(s) => s.serialize(serializer),
            Self::Other { settings, .. } => settings.serialize(serializer),
        }
    }
}

impl From<VlessSettings> for InboundSettings {
    fn from(value: VlessSettings) -> Self {
        Self::Vless(value)
    }
}

impl From<VmessSettings> for InboundSettings {
    fn from(value: VmessSettings) -> Self {
        Self::Vmess(value)
    }
}

/// An inbound as listed by the panel.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "WireInbound")]
pub struct Inbound {
    pub id: u32,
    pub up: u64,
    pub down: u64,
    pub total: u64,
    pub remark: String,
    pub enable: bool,
    pub expiry_time: i64,
    pub client_stats: Vec<ClientStat>,
    pub listen: String,
    pub port: u16,
    pub settings: InboundSettings,
    pub stream_settings: InboundStreamSettings,
    pub tag: String,
    pub sniffing: SniffingSettings,
}

impl Inbound {
    pub fn protocol(&self) -> &str {
        self.settings.protocol()
    }

    pub fn client(&self, email: &str) -> Option<&InboundClient> {
        self.settings.clients().iter().find(|c| c.email == email)
    }

    pub fn client_stat(&self, email: &str) -> Option<&ClientStat> {
        self.client_stats.iter().find(|c| c.email == email)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireInbound {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    up: u64,
    #[serde(default)]
    down: u64,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    remark: String,
    #[serde(default)]
    enable: bool,
    #[serde(default)]
    expiry_time: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    client_stats: Vec<ClientStat>,
    #[serde(default)]
    listen: String,
    #[serde(default)]
    port: u16,
    protocol: String,
    #[serde(default)]
    settings: String,
    #[serde(default, with = "json_string")]
    stream_settings: InboundStreamSettings,
    #[serde(default)]
    tag: String,
    #[serde(default, with = "json_string")]
    sniffing: SniffingSettings,
}

impl TryFrom<WireInbound> for Inbound {
    type Error = CodecError;

    fn try_from(wire: WireInbound) -> Result<Self, Self::Error> {
        let settings = InboundSettings::from_wire(&wire.protocol, &wire.settings)?;

        Ok(Self {
            id: wire.id,
            up: wire.up,
            down: wire.down,
            total: wire.total,
            remark: wire.remark,
            enable: wire.enable,
            expiry_time: wire.expiry_time,
            client_stats: wire.client_stats,
            listen: wire.listen,
            port: wire.port,
            settings,
            stream_settings: wire.stream_settings,
            tag: wire.tag,
            sniffing: wire.sniffing,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WireInboundRef<'a> {
    id: u32,
    up: u64,
    down: u64,
    total: u64,
    remark: &'a str,
    enable: bool,
    expiry_time: i64,
    client_stats: &'a [ClientStat],
    listen: &'a str,
    port: u16,
    protocol: &'a str,
    settings: String,
    #[serde(with = "json_string")]
    stream_settings: &'a InboundStreamSettings,
    tag: &'a str,
    #[serde(with = "json_string")]
    sniffing: &'a SniffingSettings,
}

impl Serialize for Inbound {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let settings = wrap_field(&self.settings).map_err(serde::ser::Error::custom)?;

        WireInboundRef {
            id: self.id,
            up: self.up,
            down: self.down,
            total: self.total,
            remark: &self.remark,
            enable: self.enable,
            expiry_time: self.expiry_time,
            client_stats: &self.client_stats,
            listen: &self.listen,
            port: self.port,
            protocol: self.protocol(),
            settings,
            stream_settings: &self.stream_settings,
            tag: &self.tag,
            sniffing: &self.sniffing,
        }
        .serialize(serializer)
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{transport::Security, ApiResponse};

    fn inbound_list() -> Value {
        let settings = json!({
            "clients": [{
                "email": "alice",
                "enable": true,
                "expiryTime": 0,
                "flow": "xtls-rprx-vision",
                "id": "8e72473d-7c5b-4b1e-9d4b-8f0b6f1e2a3c",
                "limitIp": 2,
                "reset": 30,
                "subId": "",
                "totalGB": 10737418240u64
            }],
            "decryption": "none",
            "fallbacks": []
        });
        let stream = json!({
            "network": "tcp",
            "security": "reality",
            "externalProxy": [],
            "tcpSettings": { "acceptProxyProtocol": false, "header": { "type": "none" } },
            "realitySettings": {
                "show": false,
                "xver": 0,
                "dest": "yahoo.com:443",
                "serverNames": ["yahoo.com"],
                "privateKey": "SK",
                "minClient": "",
                "maxClient": "",
                "maxTimediff": 0,
                "shortIds": ["82c54a0dbca8"],
                "settings": { "publicKey": "PK", "fingerprint": "chrome", "serverName": "", "spiderX": "/" }
            }
        });

        json!({
            "success": true,
            "msg": "",
            "obj": [{
                "id": 3,
                "up": 1024,
                "down": 4096,
                "total": 0,
                "remark": "edge",
                "enable": true,
                "expiryTime": 0,
                "clientStats": null,
                "listen": "",
                "port": 36989,
                "protocol": "vless",
                "settings": settings.to_string(),
                "streamSettings": stream.to_string(),
                "tag": "inbound-36989",
                "sniffing": "{\"enabled\":true,\"destOverride\":[\"http\",\"tls\"],\"metadataOnly\":false,\"routeOnly\":false}"
            }]
        })
    }

    #[test]
    fn test_inbound_list_decode() {
        let response = inbound_list().to_string();
        let inbounds = ApiResponse::<Vec<Inbound>>::decode(response.as_bytes())
            .unwrap()
            .into_obj()
            .unwrap();

        assert_eq!(inbounds.len(), 1);
        let inbound = &inbounds[0];
        assert_eq!(inbound.protocol(), "vless");
        assert!(inbound.client_stats.is_empty());
        assert!(inbound.sniffing.enabled);
        assert_eq!(inbound.stream_settings.security, Security::Reality);
        assert_eq!(
            inbound.stream_settings.reality().unwrap().settings.public_key,
            "PK"
        );

        let alice = inbound.client("alice").unwrap();
        assert_eq!(alice.flow.as_deref(), Some("xtls-rprx-vision"));
        assert_eq!(alice.sub_id, None);
        assert_eq!(alice.limit_ip, 2);
        assert!(alice.never_expires());
        assert!(!alice.is_unlimited());
        assert!(alice.uuid().is_ok());
    }

    #[test]
    fn test_inbound_encode_wraps_fields() {
        let response = inbound_list().to_string();
        let inbounds = ApiResponse::<Vec<Inbound>>::decode(response.as_bytes())
            .unwrap()
            .into_obj()
            .unwrap();

        let encoded = serde_json::to_value(&inbounds[0]).unwrap();
        assert!(encoded["settings"].is_string());
        assert!(encoded["streamSettings"].is_string());
        assert!(encoded["sniffing"].is_string());

        let again: Inbound = serde_json::from_value(encoded).unwrap();
        assert_eq!(again, inbounds[0]);
    }

    #[test]
    fn test_inbound_empty_fields() {
        let inbound: Inbound = serde_json::from_value(json!({
            "id": 1,
            "protocol": "vmess",
            "settings": "",
            "streamSettings": "",
            "sniffing": ""
        }))
        .unwrap();

        assert_eq!(inbound.settings, InboundSettings::Vmess(VmessSettings::default()));
        assert_eq!(inbound.sniffing, SniffingSettings::default());
        assert_eq!(inbound.stream_settings.network(), "tcp");
    }

    #[test]
    fn test_inbound_unknown_protocol_kept() {
        let inbound: Inbound = serde_json::from_value(json!({
            "protocol": "dokodemo-door",
            "settings": "{\"address\":\"127.0.0.1\"}"
        }))
        .unwrap();

        assert_eq!(inbound.protocol(), "dokodemo-door");
        assert!(inbound.settings.clients().is_empty());
        let InboundSettings::Other { settings, .. } = &inbound.settings else {
            panic!("expected opaque settings");
        };
        assert_eq!(settings["address"], "127.0.0.1");
    }

    #[test]
    fn test_inbound_malformed_settings() {
        let result = serde_json::from_value::<Inbound>(json!({
            "protocol": "vless",
            "settings": "{\"clients\": 1}"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_new_client() {
        let client = InboundClient::new("bob").with_flow("xtls-rprx-vision");
        assert!(client.enable);
        assert!(client.uuid().is_ok());

        let wire = serde_json::to_value(&client).unwrap();
        assert_eq!(wire["email"], "bob");
        assert_eq!(wire["totalGB"], 0);
        assert!(wire.get("subId").is_none());
    }

    #[test]
    fn test_client_unknown_keys_kept() {
        let wire = json!({
            "email": "carol",
            "enable": true,
            "expiryTime": 0,
            "id": "8e72473d-7c5b-4b1e-9d4b-8f0b6f1e2a3c",
            "limitIp": 0,
            "reset": 0,
            "totalGB": 0,
            "tgId": 42,
            "comment": "vip"
        });

        let client: InboundClient = serde_json::from_value(wire.clone()).unwrap();
        assert_eq!(client.extra["tgId"], 42);
        assert_eq!(serde_json::to_value(&client).unwrap(), wire);
    }
}
