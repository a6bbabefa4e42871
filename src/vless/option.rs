use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{inbound::InboundClient, Address, ServiceAddress};

/// `settings` of a vless inbound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlessSettings {
    #[serde(default)]
    pub clients: Vec<InboundClient>,
    #[serde(default = "default_encryption")]
    pub decryption: String,
    #[serde(default)]
    pub fallbacks: Vec<Fallback>,
}

impl Default for VlessSettings {
    fn default() -> Self {
        Self {
            clients: Vec::new(),
            decryption: default_encryption(),
            fallbacks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fallback {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub alpn: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub path: String,
    /// Port number or `host:port`, the panel sends either.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub dest: Value,
    pub xver: u32,
}

/// `settings` of a vless outbound.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlessOutboundSettings {
    #[serde(default)]
    pub vnext: Vec<VlessServer>,
}

impl VlessOutboundSettings {
    pub fn single(server: ServiceAddress, user: VlessUser) -> Self {
        Self {
            vnext: vec![VlessServer {
                address: server.addr,
                port: server.port,
                users: vec![user],
            }],
        }
    }

    pub fn first_server(&self) -> Option<&VlessServer> {
        self.vnext.first()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlessServer {
    pub address: Address,
    pub port: u16,
    #[serde(default)]
    pub users: Vec<VlessUser>,
}

impl VlessServer {
    pub fn service_address(&self) -> ServiceAddress {
        ServiceAddress::new(self.address.clone(), self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlessUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub flow: String,
    #[serde(default = "default_encryption")]
    pub encryption: String,
}

impl VlessUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            flow: String::new(),
            encryption: default_encryption(),
        }
    }
}

fn default_encryption() -> String {
    "none".to_owned()
}
