//! `vless://` share links
//!
//! ```text
//! vless://<id>@<host>:<port>?type=tcp&security=reality&pbk=..&fp=..&sni=..&sid=..&spx=..#<tag>
//! ```
//!
//! A share link carries only the essentials of one outbound, so going through
//! a link loses information: multi-valued fields (`alpn`, `host`) travel as
//! comma-joined strings and anything without a query parameter is dropped.

use std::{fmt::Display, str::FromStr};

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde_json::Map;
use url::{form_urlencoded, Host, Url};

use crate::{
    outbound::{OutboundConfig, OutboundSettings},
    transport::{
        network::{HEADER_HTTP, HEADER_NONE},
        HeaderSettings, OutboundStreamSettings, RealityClientSettings, Security, TlsSettings,
        Transport,
    },
    Address, CodecOption, ServiceAddress, ShareLinkResult,
};

use super::{ShareLinkError, VlessOutboundSettings, VlessUser};

pub const SCHEME: &str = "vless";

const USERINFO: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'`');

/// One outbound's connection essentials, as carried by a share link.
///
/// Query parameters are kept as the link spells them; an empty parameter is
/// the same as an absent one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub id: String,
    pub server: ServiceAddress,
    pub tag: String,
    /// `type`
    pub network: Option<String>,
    pub security: Option<String>,
    pub flow: Option<String>,
    pub encryption: Option<String>,
    /// `pbk`
    pub public_key: Option<String>,
    /// `fp`
    pub fingerprint: Option<String>,
    /// `sni`
    pub server_name: Option<String>,
    /// `sid`
    pub short_id: Option<String>,
    /// `spx`
    pub spider_x: Option<String>,
    /// Comma-joined.
    pub alpn: Option<String>,
    /// `headerType`
    pub header_type: Option<String>,
    /// Comma-joined.
    pub host: Option<String>,
}

impl ShareLink {
    pub fn new(id: impl Into<String>, server: ServiceAddress) -> Self {
        Self {
            id: id.into(),
            server,
            tag: String::new(),
            network: None,
            security: None,
            flow: None,
            encryption: None,
            public_key: None,
            fingerprint: None,
            server_name: None,
            short_id: None,
            spider_x: None,
            alpn: None,
            header_type: None,
            host: None,
        }
    }

    pub fn parse_with(uri: &str, option: &CodecOption) -> ShareLinkResult<Self> {
        let url = Url::parse(uri.trim())?;

        if url.scheme() != SCHEME {
            return Err(ShareLinkError::InvalidScheme(url.scheme().to_owned()));
        }

        let id = percent_decode_str(url.username()).decode_utf8()?;
        if id.is_empty() {
            return Err(ShareLinkError::MissingIdentity);
        }

        // Non-special schemes keep IPv4 hosts opaque, Address sorts them out.
        let addr = match url.host() {
            Some(Host::Domain(host)) if !host.is_empty() => {
                Address::from(percent_decode_str(host).decode_utf8()?)
            }
            Some(Host::Ipv4(ip)) => Address::Socket(ip.into()),
            Some(Host::Ipv6(ip)) => Address::Socket(ip.into()),
            _ => return Err(ShareLinkError::MissingHost),
        };
        let port = url.port().unwrap_or(option.default_port);

        let mut link = ShareLink::new(id.into_owned(), ServiceAddress::new(addr, port));

        for (key, value) in url.query_pairs() {
            let slot = match &*key {
                "type" => &mut link.network,
                "security" => &mut link.security,
                "flow" => &mut link.flow,
                "encryption" => &mut link.encryption,
                "pbk" => &mut link.public_key,
                "fp" => &mut link.fingerprint,
                "sni" => &mut link.server_name,
                "sid" => &mut link.short_id,
                "spx" => &mut link.spider_x,
                "alpn" => &mut link.alpn,
                "headerType" => &mut link.header_type,
                "host" => &mut link.host,
                other => {
                    tracing::debug!("ignoring share link parameter {}", other);
                    continue;
                }
            };
            if slot.is_none() && !value.is_empty() {
                *slot = Some(value.into_owned());
            }
        }

        if let Some(fragment) = url.fragment() {
            link.tag = percent_decode_str(fragment).decode_utf8()?.into_owned();
        }

        Ok(link)
    }

    /// Structured outbound for this link.
    pub fn into_outbound(self) -> OutboundConfig {
        let network = self.network.as_deref().unwrap_or("tcp");
        let mut transport = Transport::from_network(network);

        if let Transport::Tcp(tcp) = &mut transport {
            let header_type = self.header_type.as_deref().unwrap_or(HEADER_NONE);
            tcp.header = if header_type == HEADER_HTTP {
                HeaderSettings::http(split_csv(self.host.as_deref()))
            } else {
                if let Some(host) = &self.host {
                    tracing::debug!("ignoring host {} for header type {}", host, header_type);
                }
                HeaderSettings {
                    typ: header_type.to_owned(),
                    ..Default::default()
                }
            };
        }

        let security = Security::from(self.security.as_deref().unwrap_or_default());
        let mut stream = OutboundStreamSettings::new(transport, security.clone());

        match security {
            Security::Reality => {
                stream.reality_settings = Some(RealityClientSettings {
                    public_key: self.public_key.unwrap_or_default(),
                    fingerprint: self.fingerprint.unwrap_or_default(),
                    server_name: self.server_name.unwrap_or_default(),
                    short_id: self.short_id.unwrap_or_default(),
                    spider_x: self.spider_x.unwrap_or_default(),
                    extra: Map::new(),
                })
            }
            Security::Tls => {
                stream.tls_settings = Some(TlsSettings {
                    server_name: self.server_name.unwrap_or_default(),
                    alpn: split_csv(self.alpn.as_deref()),
                    fingerprint: self.fingerprint.unwrap_or_default(),
                    extra: Map::new(),
                })
            }
            _ => {}
        }

        let user = VlessUser {
            id: self.id,
            flow: self.flow.unwrap_or_default(),
            encryption: self.encryption.unwrap_or_else(|| "none".to_owned()),
        };

        OutboundConfig::vless(
            self.tag,
            VlessOutboundSettings::single(self.server, user),
            Some(stream),
        )
    }

    fn query(&self) -> Vec<(&'static str, &str)> {
        [
            ("type", &self.network),
            ("security", &self.security),
            ("pbk", &self.public_key),
            ("fp", &self.fingerprint),
            ("sni", &self.server_name),
            ("sid", &self.short_id),
            ("spx", &self.spider_x),
            ("alpn", &self.alpn),
            ("flow", &self.flow),
            ("encryption", &self.encryption),
            ("headerType", &self.header_type),
            ("host", &self.host),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
        .filter(|(_, v)| !v.is_empty())
        .collect()
    }
}

impl FromStr for ShareLink {
    type Err = ShareLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_with(s, &CodecOption::default())
    }
}

impl Display for ShareLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{}@{}",
            SCHEME,
            utf8_percent_encode(&self.id, USERINFO),
            self.server
        )?;

        let query = self.query();
        if !query.is_empty() {
            let mut serializer = form_urlencoded::Serializer::new(String::new());
            for (key, value) in query {
                serializer.append_pair(key, value);
            }
            write!(f, "?{}", serializer.finish())?;
        }

        if !self.tag.is_empty() {
            write!(f, "#{}", utf8_percent_encode(&self.tag, FRAGMENT))?;
        }

        Ok(())
    }
}

impl TryFrom<&OutboundConfig> for ShareLink {
    type Error = ShareLinkError;

    fn try_from(outbound: &OutboundConfig) -> Result<Self, Self::Error> {
        let OutboundSettings::Vless(settings) = &outbound.settings else {
            return Err(ShareLinkError::Unsupported(outbound.protocol().to_owned()));
        };
        let server = settings
            .first_server()
            .ok_or_else(|| ShareLinkError::Unsupported("vless without vnext".to_owned()))?;
        let user = server
            .users
            .first()
            .ok_or_else(|| ShareLinkError::Unsupported("vless without users".to_owned()))?;
        if user.id.is_empty() {
            return Err(ShareLinkError::MissingIdentity);
        }

        let mut link = ShareLink::new(user.id.clone(), server.service_address());
        link.tag = outbound.tag.clone();
        link.flow = non_empty(&user.flow);
        link.encryption = non_empty(&user.encryption);

        let Some(stream) = &outbound.stream_settings else {
            return Ok(link);
        };

        link.network = Some(stream.network().to_owned());
        if stream.security != Security::None {
            link.security = Some(stream.security.to_string());
        }

        if let Some(reality) = stream.reality() {
            link.public_key = non_empty(&reality.public_key);
            link.fingerprint = non_empty(&reality.fingerprint);
            link.server_name = non_empty(&reality.server_name);
            link.short_id = non_empty(&reality.short_id);
            link.spider_x = non_empty(&reality.spider_x);
        }

        if let Some(tls) = stream.tls() {
            link.server_name = non_empty(&tls.server_name);
            link.fingerprint = non_empty(&tls.fingerprint);
            link.alpn = non_empty(&tls.alpn.join(","));
        }

        if let Some(tcp) = stream.transport.tcp() {
            if tcp.header.typ != HEADER_NONE {
                link.header_type = non_empty(&tcp.header.typ);
            }
            if tcp.header.is_http() {
                link.host = non_empty(&tcp.header.hosts().join(","));
            }
        }

        Ok(link)
    }
}

/// Parses a `vless://` link into an outbound.
pub fn parse_share_link(uri: &str) -> ShareLinkResult<OutboundConfig> {
    parse_share_link_with(uri, &CodecOption::default())
}

pub fn parse_share_link_with(uri: &str, option: &CodecOption) -> ShareLinkResult<OutboundConfig> {
    Ok(ShareLink::parse_with(uri, option)?.into_outbound())
}

/// Renders a vless outbound as a share link.
pub fn build_share_link(outbound: &OutboundConfig) -> ShareLinkResult<String> {
    Ok(ShareLink::try_from(outbound)?.to_string())
}

fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}
