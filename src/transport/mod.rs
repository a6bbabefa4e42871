//! Stream settings: the network transport and the security layer wrapped around it

pub mod network;
pub use network::{HeaderSettings, HttpRequestHeader, QuicSettings, TcpSettings, Transport};

pub mod security;
pub use security::{
    RealityClientSettings, RealityPublicSettings, RealitySettings, Security, TlsSettings,
};

pub mod settings;
pub use settings::{InboundStreamSettings, OutboundStreamSettings, StreamSettings};
