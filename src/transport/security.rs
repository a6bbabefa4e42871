//! Security schemes and their parameter records

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const REALITY_SETTINGS_KEY: &str = "realitySettings";
pub const TLS_SETTINGS_KEY: &str = "tlsSettings";

/// Sub-object keys whose presence is tied to the `security` tag.
pub const SECURITY_SETTINGS_KEYS: [&str; 2] = [REALITY_SETTINGS_KEY, TLS_SETTINGS_KEY];

/// The `security` tag of a stream. Unknown schemes are kept verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Security {
    #[default]
    None,
    Tls,
    Reality,
    Other(String),
}

impl Security {
    pub fn as_str(&self) -> &str {
        match self {
            Self::None => "none",
            Self::Tls => "tls",
            Self::Reality => "reality",
            Self::Other(s) => s,
        }
    }

    /// Key of the parameter object this scheme requires, if it requires one.
    pub fn settings_key(&self) -> Option<&'static str> {
        match self {
            Self::Tls => Some(TLS_SETTINGS_KEY),
            Self::Reality => Some(REALITY_SETTINGS_KEY),
            Self::None | Self::Other(_) => None,
        }
    }
}

impl From<&str> for Security {
    fn from(value: &str) -> Self {
        match value {
            "" | "none" => Self::None,
            "tls" => Self::Tls,
            "reality" => Self::Reality,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for Security {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Security> for String {
    fn from(value: Security) -> Self {
        value.as_str().to_owned()
    }
}

impl Display for Security {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Server side reality parameters, as stored on an inbound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RealitySettings {
    pub show: bool,
    pub xver: u32,
    pub dest: String,
    pub server_names: Vec<String>,
    pub private_key: String,
    pub min_client: String,
    pub max_client: String,
    #[serde(rename = "maxTimediff")]
    pub max_time_diff: u64,
    pub short_ids: Vec<String>,
    pub settings: RealityPublicSettings,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The half of the reality parameters handed out to clients.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RealityPublicSettings {
    pub public_key: String,
    pub fingerprint: String,
    pub server_name: String,
    #[serde(rename = "spiderX")]
    pub spider_x: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Client side reality parameters, as used by an outbound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RealityClientSettings {
    pub public_key: String,
    pub fingerprint: String,
    pub server_name: String,
    pub short_id: String,
    #[serde(rename = "spiderX")]
    pub spider_x: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RealitySettings {
    /// Client view of these parameters for one of the configured short ids.
    pub fn client_view(&self, short_id: usize) -> RealityClientSettings {
        let server_name = match self.settings.server_name.as_str() {
            "" => self.server_names.first().cloned().unwrap_or_default(),
            name => name.to_owned(),
        };

        RealityClientSettings {
            public_key: self.settings.public_key.clone(),
            fingerprint: self.settings.fingerprint.clone(),
            server_name,
            short_id: self.short_ids.get(short_id).cloned().unwrap_or_default(),
            spider_x: self.settings.spider_x.clone(),
            extra: self.settings.extra.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TlsSettings {
    pub server_name: String,
    pub alpn: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
