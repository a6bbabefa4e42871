//! Network transports

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CodecError, CodecResult};

pub const NETWORK_TCP: &str = "tcp";
pub const NETWORK_QUIC: &str = "quic";

pub const HEADER_NONE: &str = "none";
pub const HEADER_HTTP: &str = "http";

/// Transport parameters, one variant per network the codec models.
///
/// Networks it does not model keep their `<network>Settings` object as is.
#[derive(Debug, Clone, PartialEq)]
pub enum Transport {
    Tcp(TcpSettings),
    Quic(QuicSettings),
    Other {
        network: String,
        settings: Option<Value>,
    },
}

impl Default for Transport {
    fn default() -> Self {
        Self::Tcp(TcpSettings::default())
    }
}

impl Transport {
    /// Default parameters for a network name.
    pub fn from_network(network: &str) -> Self {
        match network {
            NETWORK_TCP => Self::Tcp(TcpSettings::default()),
            NETWORK_QUIC => Self::Quic(QuicSettings::default()),
            other => Self::Other {
                network: other.to_owned(),
                settings: None,
            },
        }
    }

    pub fn network(&self) -> &str {
        match self {
            Self::Tcp(_) => NETWORK_TCP,
            Self::Quic(_) => NETWORK_QUIC,
            Self::Other { network, .. } => network,
        }
    }

    /// Wire key of the parameter object, e.g. `tcpSettings`.
    pub fn settings_key(&self) -> String {
        format!("{}Settings", self.network())
    }

    pub(crate) fn from_wire(network: &str, settings: Option<Value>) -> CodecResult<Self> {
        let settings = settings.filter(|v| !v.is_null());
        let transport = match network {
            NETWORK_TCP => Self::Tcp(match settings {
                Some(v) => {
                    serde_json::from_value(v).map_err(CodecError::invalid_field("tcpSettings"))?
                }
                None => TcpSettings::default(),
            }),
            NETWORK_QUIC => Self::Quic(match settings {
                Some(v) => {
                    serde_json::from_value(v).map_err(CodecError::invalid_field("quicSettings"))?
                }
                None => QuicSettings::default(),
            }),
            other => Self::Other {
                network: other.to_owned(),
                settings,
            },
        };
        Ok(transport)
    }

    pub(crate) fn to_wire(&self) -> CodecResult<Option<Value>> {
        Ok(match self {
            Self::Tcp(s) => Some(serde_json::to_value(s)?),
            Self::Quic(s) => Some(serde_json::to_value(s)?),
            Self::Other { settings, .. } => settings.clone(),
        })
    }

    pub fn tcp(&self) -> Option<&TcpSettings> {
        match self {
            Self::Tcp(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpSettings {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub accept_proxy_protocol: bool,
    #[serde(default)]
    pub header: HeaderSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuicSettings {
    #[serde(default = "default_header_type")]
    pub security: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub header: HeaderSettings,
}

impl Default for QuicSettings {
    fn default() -> Self {
        Self {
            security: default_header_type(),
            key: String::new(),
            header: HeaderSettings::default(),
        }
    }
}

/// Obfuscation header of a TCP or QUIC transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderSettings {
    #[serde(rename = "type", default = "default_header_type")]
    pub typ: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<HttpRequestHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
}

impl Default for HeaderSettings {
    fn default() -> Self {
        Self {
            typ: default_header_type(),
            request: None,
            response: None,
        }
    }
}

impl HeaderSettings {
    /// HTTP header camouflage; an empty host list leaves `request` out.
    pub fn http(hosts: Vec<String>) -> Self {
        let request = (!hosts.is_empty()).then(|| {
            let mut request = HttpRequestHeader::default();
            request.set_hosts(hosts);
            request
        });

        Self {
            typ: HEADER_HTTP.to_owned(),
            request,
            response: None,
        }
    }

    pub fn is_http(&self) -> bool {
        self.typ == HEADER_HTTP
    }

    pub fn hosts(&self) -> Vec<String> {
        self.request
            .as_ref()
            .map(HttpRequestHeader::hosts)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpRequestHeader {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<String>,
    #[serde(default)]
    pub headers: Map<String, Value>,
}

impl HttpRequestHeader {
    /// `Host` values; a bare string is read as a one-element list.
    pub fn hosts(&self) -> Vec<String> {
        match self.headers.get("Host") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            Some(Value::String(host)) => vec![host.clone()],
            _ => Vec::new(),
        }
    }

    pub fn set_hosts(&mut self, hosts: Vec<String>) {
        self.headers.insert(
            "Host".to_owned(),
            Value::Array(hosts.into_iter().map(Value::String).collect()),
        );
    }
}

fn default_header_type() -> String {
    HEADER_NONE.to_owned()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_tcp_defaults() {
        let tcp: TcpSettings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(tcp.header.typ, HEADER_NONE);
        assert_eq!(
            serde_json::to_value(&tcp).unwrap(),
            json!({ "header": { "type": "none" } })
        );
    }

    #[test]
    fn test_http_header_hosts() {
        let header = HeaderSettings::http(vec!["a.com".into(), "b.com".into()]);
        assert!(header.is_http());
        assert_eq!(header.hosts(), vec!["a.com", "b.com"]);
        assert_eq!(
            serde_json::to_value(&header).unwrap(),
            json!({ "type": "http", "request": { "headers": { "Host": ["a.com", "b.com"] } } })
        );

        let bare: HeaderSettings = serde_json::from_value(
            json!({ "type": "http", "request": { "headers": { "Host": "c.com" } } }),
        )
        .unwrap();
        assert_eq!(bare.hosts(), vec!["c.com"]);
    }

    #[test]
    fn test_unknown_network_passthrough() {
        let settings = json!({ "path": "/ws", "headers": {} });
        let transport = Transport::from_wire("ws", Some(settings.clone())).unwrap();
        assert_eq!(transport.network(), "ws");
        assert_eq!(transport.settings_key(), "wsSettings");
        assert_eq!(transport.to_wire().unwrap(), Some(settings));
    }

    #[test]
    fn test_malformed_tcp_settings() {
        let err = Transport::from_wire("tcp", Some(json!({ "header": 5 }))).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidField {
                field: "tcpSettings",
                ..
            }
        ));
    }
}
