//! Kapibara panel library
//!
//! Typed records and codecs for the proxy panel's settings API: stream
//! settings with conditional security blocks, envelopes that carry JSON as
//! strings, and `vless://` share links.

use serde_json::Value;

pub mod error;
pub use error::CodecError;

pub mod option;
pub use option::{CodecOption, Normalization};

pub mod address;
pub use address::{Address, ServiceAddress};

pub mod envelope;
pub use envelope::{unwrap_field, unwrap_obj, unwrap_str, wrap_field, ApiResponse};

pub mod transport;
pub use transport::{
    InboundStreamSettings, OutboundStreamSettings, RealityClientSettings, RealitySettings,
    Security, StreamSettings, TlsSettings, Transport,
};

pub mod inbound;
pub use inbound::{ClientStat, Inbound, InboundClient, InboundSettings, SniffingSettings};

pub mod outbound;
pub use outbound::{BlackholeSettings, FreedomSettings, OutboundConfig, OutboundSettings};

pub mod vless;
pub use vless::{build_share_link, parse_share_link, ShareLink, ShareLinkError};

pub mod xray;
pub use xray::{XraySettings, XraySettingsWrapper};

pub mod panel;
pub use panel::{InboundBase, PanelRequest, X25519Cert};

pub type CodecResult<T> = std::result::Result<T, CodecError>;
pub type ShareLinkResult<T> = std::result::Result<T, ShareLinkError>;

/// Records whose wire form is not a plain derive of their fields.
pub trait WireCodec: Sized {
    fn from_wire(value: Value, option: &CodecOption) -> CodecResult<Self>;

    fn to_wire(&self) -> CodecResult<Value>;

    fn decode(data: &[u8]) -> CodecResult<Self> {
        Self::decode_with(data, &CodecOption::default())
    }

    fn decode_with(data: &[u8], option: &CodecOption) -> CodecResult<Self> {
        let value: Value = serde_json::from_slice(data)?;
        Self::from_wire(value, option)
    }

    fn encode(&self) -> CodecResult<Vec<u8>> {
        Ok(serde_json::to_vec(&self.to_wire()?)?)
    }
}
