//! Kapibara Panel Error

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("decode error ({0})")]
    Decode(#[from] serde_json::Error),
    #[error("invalid {field} ({source})")]
    InvalidField {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("stray {key} for security {security}")]
    StraySecurity { key: String, security: String },
    #[error("panel rejected request ({0})")]
    Rejected(String),
    #[error("response carries no obj")]
    MissingObject,
    #[error("invalid key ({0})")]
    InvalidKey(String),
    #[error("request error ({0})")]
    Request(#[from] http::Error),
}

impl CodecError {
    pub(crate) fn invalid_field(field: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| Self::InvalidField { field, source }
    }
}
