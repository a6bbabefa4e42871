//! Share Link Error

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShareLinkError {
    #[error("{0}")]
    Url(#[from] url::ParseError),
    #[error("{0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("invalid scheme: expected vless, got {0}")]
    InvalidScheme(String),
    #[error("missing identity")]
    MissingIdentity,
    #[error("missing host")]
    MissingHost,
    #[error("unsupported outbound: {0}")]
    Unsupported(String),
}
