//! Panel endpoints
//!
//! [`PanelRequest`] describes one call to the panel: method, path and the
//! form body. Nothing here talks to the network; callers render a request
//! with [`PanelRequest::into_http`] and hand it to whatever client they use.
//! Responses decode through [`crate::ApiResponse`].

use base64::{prelude::BASE64_URL_SAFE_NO_PAD, Engine};
use http::{header, Method, Request};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;

use crate::{
    envelope::wrap_field,
    inbound::{Inbound, InboundClient, InboundSettings, SniffingSettings},
    transport::{InboundStreamSettings, RealityPublicSettings, RealitySettings},
    xray::XraySettings,
    ApiResponse, CodecError, CodecResult, WireCodec,
};

pub const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelRequest {
    pub method: Method,
    pub path: String,
    pub form: Option<Vec<(String, String)>>,
}

impl PanelRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            form: None,
        }
    }

    fn with_form(mut self, form: Vec<(&str, String)>) -> Self {
        self.form = Some(form.into_iter().map(|(k, v)| (k.to_owned(), v)).collect());
        self
    }

    pub fn list_inbounds() -> Self {
        Self::new(Method::POST, "/panel/inbound/list")
    }

    pub fn add_inbound(
        base: &InboundBase,
        settings: &InboundSettings,
        stream_settings: &InboundStreamSettings,
        sniffing: &SniffingSettings,
    ) -> CodecResult<Self> {
        let form = vec![
            ("settings", wrap_field(settings)?),
            ("streamSettings", wrap_field(&stream_settings.to_wire()?)?),
            ("sniffing", wrap_field(sniffing)?),
            ("up", base.up.to_string()),
            ("down", base.down.to_string()),
            ("total", base.total.to_string()),
            ("remark", base.remark.clone()),
            ("enable", base.enable.to_string()),
            ("expiryTime", base.expiry_time.to_string()),
            ("listen", base.listen.clone()),
            ("port", base.port.to_string()),
            ("protocol", settings.protocol().to_owned()),
        ];

        Ok(Self::new(Method::POST, "/panel/inbound/add").with_form(form))
    }

    /// Re-adds an inbound record as listed by the panel.
    pub fn add(inbound: &Inbound) -> CodecResult<Self> {
        Self::add_inbound(
            &InboundBase::from(inbound),
            &inbound.settings,
            &inbound.stream_settings,
            &inbound.sniffing,
        )
    }

    /// Replaces the client with `client.id` on inbound `inbound_id`.
    pub fn update_client(inbound_id: u32, client: &InboundClient) -> CodecResult<Self> {
        let settings = wrap_field(&ClientsForm { clients: [client] })?;
        let path = format!(
            "/panel/inbound/updateClient/{}",
            utf8_percent_encode(&client.id, PATH_SEGMENT)
        );

        Ok(Self::new(Method::POST, path)
            .with_form(vec![("id", inbound_id.to_string()), ("settings", settings)]))
    }

    pub fn delete_client(inbound_id: u32, client_id: &str) -> Self {
        Self::new(
            Method::POST,
            format!(
                "/panel/api/inbounds/{}/delClient/{}",
                inbound_id,
                utf8_percent_encode(client_id, PATH_SEGMENT)
            ),
        )
    }

    pub fn client_traffics(email: &str) -> Self {
        Self::new(
            Method::GET,
            format!(
                "/panel/api/inbounds/getClientTraffics/{}",
                utf8_percent_encode(email, PATH_SEGMENT)
            ),
        )
    }

    pub fn new_x25519_cert() -> Self {
        Self::new(Method::POST, "/server/getNewX25519Cert")
    }

    /// Response decodes with [`crate::XraySettingsWrapper::decode_response`].
    pub fn xray_settings() -> Self {
        Self::new(Method::POST, "/panel/xray/")
    }

    pub fn update_xray_settings(settings: &XraySettings) -> CodecResult<Self> {
        Ok(Self::new(Method::POST, "/panel/xray/update")
            .with_form(vec![("xraySetting", wrap_field(settings)?)]))
    }

    pub fn xray_result() -> Self {
        Self::new(Method::GET, "/panel/xray/getXrayResult")
    }

    pub fn restart_xray() -> Self {
        Self::new(Method::POST, "/server/restartXrayService")
    }

    /// Url-encoded form body, `None` for requests without one.
    pub fn form_body(&self) -> Option<String> {
        self.form.as_ref().map(|form| {
            form_urlencoded::Serializer::new(String::new())
                .extend_pairs(form.iter())
                .finish()
        })
    }

    /// Renders against the panel root, e.g. `https://panel.example.com:2053/secret`.
    pub fn into_http(self, base_url: &str) -> CodecResult<Request<Vec<u8>>> {
        let uri = format!("{}{}", base_url.trim_end_matches('/'), self.path);
        tracing::debug!("{} {}", self.method, uri);

        let mut builder = Request::builder()
            .method(self.method.clone())
            .uri(uri)
            .header(header::ACCEPT, "application/json");

        let body = match self.form_body() {
            Some(body) => {
                builder = builder.header(header::CONTENT_TYPE, FORM_CONTENT_TYPE);
                body.into_bytes()
            }
            None => Vec::new(),
        };

        Ok(builder.body(body)?)
    }
}

#[derive(Serialize)]
struct ClientsForm<'a> {
    clients: [&'a InboundClient; 1],
}

/// The plain columns of an inbound, sent as form fields on add.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InboundBase {
    pub up: u64,
    pub down: u64,
    pub total: u64,
    pub remark: String,
    pub enable: bool,
    pub expiry_time: i64,
    pub listen: String,
    pub port: u16,
}

impl From<&Inbound> for InboundBase {
    fn from(inbound: &Inbound) -> Self {
        Self {
            up: inbound.up,
            down: inbound.down,
            total: inbound.total,
            remark: inbound.remark.clone(),
            enable: inbound.enable,
            expiry_time: inbound.expiry_time,
            listen: inbound.listen.clone(),
            port: inbound.port,
        }
    }
}

/// Reality key pair as generated by the panel. Keys are unpadded base64url.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X25519Cert {
    pub private_key: String,
    pub public_key: String,
}

impl X25519Cert {
    pub fn decode_response(data: &[u8]) -> CodecResult<Self> {
        ApiResponse::<Self>::decode(data)?.into_obj()
    }

    pub fn private_key_bytes(&self) -> CodecResult<[u8; 32]> {
        decode_key(&self.private_key)
    }

    pub fn public_key_bytes(&self) -> CodecResult<[u8; 32]> {
        decode_key(&self.public_key)
    }

    /// Server side reality parameters using this key pair.
    pub fn reality_settings(
        &self,
        dest: impl Into<String>,
        server_names: Vec<String>,
        short_ids: Vec<String>,
    ) -> CodecResult<RealitySettings> {
        self.private_key_bytes()?;
        self.public_key_bytes()?;

        let server_name = server_names.first().cloned().unwrap_or_default();
        Ok(RealitySettings {
            dest: dest.into(),
            server_names,
            private_key: self.private_key.clone(),
            short_ids,
            settings: RealityPublicSettings {
                public_key: self.public_key.clone(),
                fingerprint: "chrome".to_owned(),
                server_name,
                spider_x: "/".to_owned(),
                ..Default::default()
            },
            ..Default::default()
        })
    }
}

fn decode_key(key: &str) -> CodecResult<[u8; 32]> {
    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(key.trim_end_matches('='))
        .map_err(|e| CodecError::InvalidKey(e.to_string()))?;

    <[u8; 32]>::try_from(bytes.as_slice())
        .map_err(|_| CodecError::InvalidKey(format!("expected 32 bytes, got {}", bytes.len())))
}
