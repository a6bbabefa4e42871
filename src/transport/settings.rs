//! Stream settings codec
//!
//! Wire shape:
//!
//! ```text
//! { "network": "tcp", "security": "reality",
//!   "tcpSettings": {..}, "realitySettings": {..}, ... }
//! ```
//!
//! The security parameter object is present iff the `security` tag names a
//! scheme that takes parameters (`reality` → `realitySettings`, `tls` →
//! `tlsSettings`). The decoder never trusts the wire to respect that: a
//! parameter object for any other scheme is dropped (or rejected in strict
//! mode). The encoder applies the same rule to whatever the caller put in the
//! record.

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{CodecError, CodecOption, CodecResult, WireCodec};

use super::{
    security::{REALITY_SETTINGS_KEY, SECURITY_SETTINGS_KEYS, TLS_SETTINGS_KEY},
    RealityClientSettings, RealitySettings, Security, TlsSettings, Transport,
};

/// Stream settings of an inbound (server side reality parameters).
pub type InboundStreamSettings = StreamSettings<RealitySettings>;

/// Stream settings of an outbound (client side reality parameters).
pub type OutboundStreamSettings = StreamSettings<RealityClientSettings>;

#[derive(Debug, Clone, PartialEq)]
pub struct StreamSettings<R = RealitySettings> {
    pub transport: Transport,
    pub security: Security,
    /// Only meaningful while `security` is [`Security::Reality`].
    pub reality_settings: Option<R>,
    /// Only meaningful while `security` is [`Security::Tls`].
    pub tls_settings: Option<TlsSettings>,
    /// Top-level keys the codec does not model (`externalProxy`, `sockopt`, ...).
    pub extra: Map<String, Value>,
}

impl<R> Default for StreamSettings<R> {
    fn default() -> Self {
        Self::new(Transport::default(), Security::None)
    }
}

impl<R> StreamSettings<R> {
    pub fn new(transport: Transport, security: Security) -> Self {
        Self {
            transport,
            security,
            reality_settings: None,
            tls_settings: None,
            extra: Map::new(),
        }
    }

    pub fn with_reality(mut self, reality: R) -> Self {
        self.security = Security::Reality;
        self.reality_settings = Some(reality);
        self
    }

    pub fn with_tls(mut self, tls: TlsSettings) -> Self {
        self.security = Security::Tls;
        self.tls_settings = Some(tls);
        self
    }

    pub fn network(&self) -> &str {
        self.transport.network()
    }

    /// Reality parameters, if the record actually uses reality.
    pub fn reality(&self) -> Option<&R> {
        match self.security {
            Security::Reality => self.reality_settings.as_ref(),
            _ => None,
        }
    }

    /// TLS parameters, if the record actually uses tls.
    pub fn tls(&self) -> Option<&TlsSettings> {
        match self.security {
            Security::Tls => self.tls_settings.as_ref(),
            _ => None,
        }
    }
}

impl<R> WireCodec for StreamSettings<R>
where
    R: Serialize + DeserializeOwned,
{
    fn from_wire(value: Value, option: &CodecOption) -> CodecResult<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(CodecError::Decode(serde::de::Error::custom(format!(
                    "stream settings must be an object, got {}",
                    other
                ))))
            }
        };

        let network = take_string(&mut map, "network")?.unwrap_or_else(|| "tcp".to_owned());
        let security = Security::from(take_string(&mut map, "security")?.unwrap_or_default());

        let transport_settings = map.remove(&format!("{}Settings", network));
        let transport = Transport::from_wire(&network, transport_settings)?;

        let reality_settings =
            take_security_settings(&mut map, REALITY_SETTINGS_KEY, &security, option)?
                .map(serde_json::from_value::<R>)
                .transpose()
                .map_err(CodecError::invalid_field(REALITY_SETTINGS_KEY))?;
        let tls_settings = take_security_settings(&mut map, TLS_SETTINGS_KEY, &security, option)?
            .map(serde_json::from_value::<TlsSettings>)
            .transpose()
            .map_err(CodecError::invalid_field(TLS_SETTINGS_KEY))?;

        Ok(Self {
            transport,
            security,
            reality_settings,
            tls_settings,
            extra: map,
        })
    }

    fn to_wire(&self) -> CodecResult<Value> {
        let mut map = self.extra.clone();
        for key in SECURITY_SETTINGS_KEYS {
            map.remove(key);
        }

        map.insert(
            "network".to_owned(),
            Value::String(self.network().to_owned()),
        );
        map.insert(
            "security".to_owned(),
            Value::String(self.security.to_string()),
        );

        if let Some(settings) = self.transport.to_wire()? {
            map.insert(self.transport.settings_key(), settings);
        }

        if let Some(reality) = self.reality() {
            map.insert(
                REALITY_SETTINGS_KEY.to_owned(),
                serde_json::to_value(reality)?,
            );
        } else if self.reality_settings.is_some() {
            tracing::debug!("not encoding realitySettings for security {}", self.security);
        }

        if let Some(tls) = self.tls() {
            map.insert(TLS_SETTINGS_KEY.to_owned(), serde_json::to_value(tls)?);
        } else if self.tls_settings.is_some() {
            tracing::debug!("not encoding tlsSettings for security {}", self.security);
        }

        Ok(Value::Object(map))
    }
}

impl<R> Serialize for StreamSettings<R>
where
    R: Serialize + DeserializeOwned,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_wire()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de, R> Deserialize<'de> for StreamSettings<R>
where
    R: Serialize + DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_wire(value, &CodecOption::default()).map_err(serde::de::Error::custom)
    }
}

/// Removes `key` from the wire object and returns it only if `security`
/// is the scheme that owns it.
fn take_security_settings(
    map: &mut Map<String, Value>,
    key: &'static str,
    security: &Security,
    option: &CodecOption,
) -> CodecResult<Option<Value>> {
    let raw = match map.remove(key) {
        None | Some(Value::Null) => return Ok(None),
        Some(raw) => raw,
    };

    if security.settings_key() == Some(key) {
        return Ok(Some(raw));
    }

    if option.is_strict() {
        return Err(CodecError::StraySecurity {
            key: key.to_owned(),
            security: security.to_string(),
        });
    }

    tracing::warn!("discarding stray {} for security {}", key, security);
    Ok(None)
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> CodecResult<Option<String>> {
    match map.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::transport::{HeaderSettings, TcpSettings};

    fn reality_wire() -> Value {
        json!({
            "network": "tcp",
            "security": "reality",
            "externalProxy": [],
            "tcpSettings": {
                "acceptProxyProtocol": true,
                "header": { "type": "none" }
            },
            "realitySettings": {
                "show": false,
                "xver": 0,
                "dest": "yahoo.com:443",
                "serverNames": ["yahoo.com", "www.yahoo.com"],
                "privateKey": "wIc7zBUiTXBGxM7S7wl0nCZ663OAvzTDNqS7-bsxV3A",
                "minClient": "",
                "maxClient": "",
                "maxTimediff": 0,
                "shortIds": ["47595474", "7a5e30", "810c1efd750030e8"],
                "settings": {
                    "publicKey": "9h4ak-1b7xeC1bUJb2LDBlM1qM-0SOSNl3JsW5LMHhk",
                    "fingerprint": "firefox",
                    "serverName": "",
                    "spiderX": "/",
                    "mldsa65Verify": "mldsa-verify-key"
                }
            }
        })
    }

    #[test]
    fn test_reality_round_trip() {
        let wire = reality_wire();
        let settings = InboundStreamSettings::decode(wire.to_string().as_bytes()).unwrap();

        assert_eq!(settings.security, Security::Reality);
        assert_eq!(settings.network(), "tcp");
        let reality = settings.reality().unwrap();
        assert_eq!(reality.short_ids.len(), 3);
        assert_eq!(reality.settings.fingerprint, "firefox");
        assert_eq!(
            reality.settings.extra["mldsa65Verify"],
            "mldsa-verify-key"
        );

        let encoded: Value = serde_json::from_slice(&settings.encode().unwrap()).unwrap();
        assert_eq!(encoded, wire);
    }

    #[test]
    fn test_stray_reality_discarded_on_decode() {
        let mut wire = reality_wire();
        wire["security"] = json!("none");

        let settings = InboundStreamSettings::decode(wire.to_string().as_bytes()).unwrap();
        assert_eq!(settings.security, Security::None);
        assert!(settings.reality_settings.is_none());

        let encoded = settings.to_wire().unwrap();
        assert!(encoded.get("realitySettings").is_none());
    }

    #[test]
    fn test_stray_malformed_object_ignored() {
        let wire = json!({
            "network": "tcp",
            "security": "tls",
            "realitySettings": "definitely not an object",
            "tlsSettings": { "serverName": "example.com", "alpn": ["h2"] }
        });

        let settings = OutboundStreamSettings::decode(wire.to_string().as_bytes()).unwrap();
        assert!(settings.reality_settings.is_none());
        assert_eq!(settings.tls().unwrap().server_name, "example.com");
    }

    #[test]
    fn test_stray_rejected_in_strict_mode() {
        let mut wire = reality_wire();
        wire["security"] = json!("tls");

        let err =
            InboundStreamSettings::decode_with(wire.to_string().as_bytes(), &CodecOption::strict())
                .unwrap_err();
        assert!(matches!(
            err,
            CodecError::StraySecurity { ref key, ref security }
                if key == "realitySettings" && security == "tls"
        ));
    }

    #[test]
    fn test_malformed_reality_is_error() {
        let mut wire = reality_wire();
        wire["realitySettings"]["serverNames"] = json!("yahoo.com");

        let err = InboundStreamSettings::decode(wire.to_string().as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidField {
                field: "realitySettings",
                ..
            }
        ));
    }

    #[test]
    fn test_encoder_drops_caller_stray_data() {
        let mut settings = OutboundStreamSettings::new(
            Transport::Tcp(TcpSettings::default()),
            Security::None,
        );
        settings.reality_settings = Some(RealityClientSettings {
            public_key: "PK".into(),
            ..Default::default()
        });
        settings.tls_settings = Some(TlsSettings::default());
        settings
            .extra
            .insert("realitySettings".into(), json!({ "publicKey": "PK" }));

        let encoded = settings.to_wire().unwrap();
        assert!(encoded.get("realitySettings").is_none());
        assert!(encoded.get("tlsSettings").is_none());
        assert_eq!(encoded["security"], "none");
    }

    #[test]
    fn test_unknown_network_and_security_preserved() {
        let wire = json!({
            "network": "xhttp",
            "security": "xtls",
            "xhttpSettings": { "path": "/up", "mode": "auto" },
            "xtlsSettings": { "serverName": "example.com" },
            "sockopt": { "tcpFastOpen": true }
        });

        let settings = OutboundStreamSettings::decode(wire.to_string().as_bytes()).unwrap();
        assert_eq!(settings.network(), "xhttp");
        assert_eq!(settings.security, Security::Other("xtls".into()));
        assert_eq!(settings.to_wire().unwrap(), wire);
    }

    #[test]
    fn test_missing_tags_default() {
        let settings = OutboundStreamSettings::decode(b"{}").unwrap();
        assert_eq!(settings.network(), "tcp");
        assert_eq!(settings.security, Security::None);
        assert_eq!(
            settings.transport.tcp().unwrap().header,
            HeaderSettings::default()
        );
    }

    #[test]
    fn test_serde_impls() {
        let settings: InboundStreamSettings = serde_json::from_value(reality_wire()).unwrap();
        assert_eq!(serde_json::to_value(&settings).unwrap(), reality_wire());

        let err = serde_json::from_value::<InboundStreamSettings>(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("must be an object"));
    }
}
