//! Address

use std::{fmt::Display, net::IpAddr, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Address {
    Socket(IpAddr),
    Domain(String),
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Address::Domain(s) => write!(f, "{}", s),
            Address::Socket(s) => write!(f, "{}", s),
        }
    }
}

impl Address {
    pub fn is_ip(&self) -> bool {
        matches!(self, Self::Socket(_))
    }

    /// Host form usable inside a URI authority, IPv6 literals bracketed.
    pub fn to_authority(&self) -> String {
        match self {
            Address::Socket(IpAddr::V6(ip)) => format!("[{}]", ip),
            other => other.to_string(),
        }
    }
}

impl FromStr for Address {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl<T: AsRef<str> + ToString> From<T> for Address {
    fn from(s: T) -> Self {
        let trimmed = s.as_ref().trim_start_matches('[').trim_end_matches(']');
        match IpAddr::from_str(trimmed) {
            Ok(ip) => Self::Socket(ip),
            Err(_) => Self::Domain(s.to_string()),
        }
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceAddress {
    pub addr: Address,
    pub port: u16,
}

impl ServiceAddress {
    pub fn new(addr: Address, port: u16) -> Self {
        Self { addr, port }
    }
}

impl Display for ServiceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.addr.to_authority(), self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_parse() {
        assert!(Address::from("89.169.53.31").is_ip());
        assert_eq!(
            Address::from("example.com"),
            Address::Domain("example.com".into())
        );

        let v6 = Address::from("[2001:db8::1]");
        assert!(v6.is_ip());
        assert_eq!(v6.to_string(), "2001:db8::1");
        assert_eq!(
            ServiceAddress::new(v6, 443).to_string(),
            "[2001:db8::1]:443"
        );
    }

    #[test]
    fn test_address_serde_as_string() {
        let addr: Address = serde_json::from_str(r#""10.0.0.1""#).unwrap();
        assert!(addr.is_ip());
        assert_eq!(serde_json::to_string(&addr).unwrap(), r#""10.0.0.1""#);
    }
}
