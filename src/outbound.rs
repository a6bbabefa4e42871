//! Outbound records

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{
    transport::OutboundStreamSettings, vless::VlessOutboundSettings, CodecError, CodecOption,
    CodecResult, WireCodec,
};

pub const PROTOCOL_FREEDOM: &str = "freedom";
pub const PROTOCOL_BLACKHOLE: &str = "blackhole";
pub const PROTOCOL_VLESS: &str = "vless";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FreedomSettings {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain_strategy: String,
    #[serde(default)]
    pub redirect: String,
    #[serde(default)]
    pub noises: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackholeSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<BlackholeResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlackholeResponse {
    #[serde(rename = "type")]
    pub typ: String,
}

/// Per-protocol `settings` of an outbound.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundSettings {
    Freedom(FreedomSettings),
    Blackhole(BlackholeSettings),
    Vless(VlessOutboundSettings),
    Other {
        protocol: String,
        settings: Option<Value>,
    },
}

impl OutboundSettings {
    pub fn protocol(&self) -> &str {
        match self {
            Self::Freedom(_) => PROTOCOL_FREEDOM,
            Self::Blackhole(_) => PROTOCOL_BLACKHOLE,
            Self::Vless(_) => PROTOCOL_VLESS,
            Self::Other { protocol, .. } => protocol,
        }
    }

    /// Decodes `settings` for `protocol`. A missing object is the protocol's
    /// default; unknown protocols keep it untouched.
    pub fn from_wire(protocol: &str, settings: Option<Value>) -> CodecResult<Self> {
        let settings = settings.filter(|v| !v.is_null());

        fn known<T>(settings: Option<Value>) -> CodecResult<T>
        where
            T: serde::de::DeserializeOwned + Default,
        {
            match settings {
                Some(v) => serde_json::from_value(v).map_err(CodecError::invalid_field("settings")),
                None => Ok(T::default()),
            }
        }

        Ok(match protocol {
            PROTOCOL_FREEDOM => Self::Freedom(known(settings)?),
            PROTOCOL_BLACKHOLE => Self::Blackhole(known(settings)?),
            PROTOCOL_VLESS => Self::Vless(known(settings)?),
            other => {
                tracing::debug!("keeping {} outbound settings opaque", other);
                Self::Other {
                    protocol: other.to_owned(),
                    settings,
                }
            }
        })
    }

    pub fn to_wire(&self) -> CodecResult<Option<Value>> {
        Ok(match self {
            Self::Freedom(s) => Some(serde_json::to_value(s)?),
            Self::Blackhole(s) => Some(serde_json::to_value(s)?),
            Self::Vless(s) => Some(serde_json::to_value(s)?),
            Self::Other { settings, .. } => settings.clone(),
        })
    }
}

/// A relay outbound. `tag` is the routing target and unique per config.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundConfig {
    pub tag: String,
    pub settings: OutboundSettings,
    pub stream_settings: Option<OutboundStreamSettings>,
    /// Keys the codec does not model (`mux`, `sendThrough`, `proxySettings`, ...).
    pub extra: Map<String, Value>,
}

impl OutboundConfig {
    pub fn new(tag: impl Into<String>, settings: OutboundSettings) -> Self {
        Self {
            tag: tag.into(),
            settings,
            stream_settings: None,
            extra: Map::new(),
        }
    }

    /// Direct passthrough.
    pub fn freedom(tag: impl Into<String>, domain_strategy: impl Into<String>) -> Self {
        Self::new(
            tag,
            OutboundSettings::Freedom(FreedomSettings {
                domain_strategy: domain_strategy.into(),
                ..Default::default()
            }),
        )
    }

    /// Drop everything.
    pub fn blackhole(tag: impl Into<String>) -> Self {
        Self::new(tag, OutboundSettings::Blackhole(BlackholeSettings::default()))
    }

    pub fn vless(
        tag: impl Into<String>,
        settings: VlessOutboundSettings,
        stream_settings: Option<OutboundStreamSettings>,
    ) -> Self {
        Self {
            stream_settings,
            ..Self::new(tag, OutboundSettings::Vless(settings))
        }
    }

    pub fn protocol(&self) -> &str {
        self.settings.protocol()
    }
}

impl WireCodec for OutboundConfig {
    fn from_wire(value: Value, option: &CodecOption) -> CodecResult<Self> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(CodecError::Decode(serde::de::Error::custom(format!(
                    "outbound must be an object, got {}",
                    other
                ))))
            }
        };

        let tag = match map.remove("tag") {
            None | Some(Value::Null) => String::new(),
            Some(v) => serde_json::from_value(v)?,
        };
        let protocol: String = match map.remove("protocol") {
            Some(v) => serde_json::from_value(v)?,
            None => {
                return Err(CodecError::Decode(serde::de::Error::missing_field(
                    "protocol",
                )))
            }
        };

        let settings = OutboundSettings::from_wire(&protocol, map.remove("settings"))?;
        let stream_settings = match map.remove("streamSettings") {
            None | Some(Value::Null) => None,
            Some(v) => Some(OutboundStreamSettings::from_wire(v, option)?),
        };

        Ok(Self {
            tag,
            settings,
            stream_settings,
            extra: map,
        })
    }

    fn to_wire(&self) -> CodecResult<Value> {
        let mut map = self.extra.clone();
        map.insert("tag".to_owned(), Value::String(self.tag.clone()));
        map.insert(
            "protocol".to_owned(),
            Value::String(self.protocol().to_owned()),
        );

        match self.settings.to_wire()? {
            Some(settings) => map.insert("settings".to_owned(), settings),
            None => map.remove("settings"),
        };

        match &self.stream_settings {
            Some(stream) => map.insert("streamSettings".to_owned(), stream.to_wire()?),
            None => map.remove("streamSettings"),
        };

        Ok(Value::Object(map))
    }
}

impl Serialize for OutboundConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_wire()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for OutboundConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_wire(value, &CodecOption::default()).map_err(serde::de::Error::custom)
    }
}
