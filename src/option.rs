//! Codec Option

use serde::{Deserialize, Serialize};

/// How the decoders treat wire data that breaks a conditional-presence rule
/// without being malformed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Drop the offending sub-object and keep going.
    #[default]
    Lenient,
    /// Report the offending sub-object as an error.
    Strict,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodecOption {
    #[serde(default)]
    pub normalization: Normalization,
    #[serde(default = "default_port")]
    pub default_port: u16,
}

impl Default for CodecOption {
    fn default() -> Self {
        Self {
            normalization: Normalization::default(),
            default_port: default_port(),
        }
    }
}

impl CodecOption {
    pub fn strict() -> Self {
        Self {
            normalization: Normalization::Strict,
            ..Self::default()
        }
    }

    pub fn is_strict(&self) -> bool {
        self.normalization == Normalization::Strict
    }
}

fn default_port() -> u16 {
    443
}
