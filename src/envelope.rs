//! Panel response envelope and the JSON-inside-a-string boundary.
//!
//! The panel re-serializes several nested configuration objects before it
//! sends them, so they arrive as JSON text in a string field rather than as
//! native JSON. [`unwrap_field`] / [`wrap_field`] undo and redo that at the
//! edge so the record types never see the string form. The aggregate settings
//! fetch nests the pattern one level deeper in `obj`, see [`unwrap_obj`].

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{CodecError, CodecResult};

/// Outer `{ success, msg, obj }` envelope shared by every panel endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub success: bool,
    #[serde(default)]
    pub msg: String,
    pub obj: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Turns `success == false` into [`CodecError::Rejected`].
    ///
    /// List endpoints send `"obj": null` for an empty list, so read them
    /// through this rather than [`ApiResponse::into_obj`].
    pub fn into_result(self) -> CodecResult<Option<T>> {
        if !self.success {
            return Err(CodecError::Rejected(self.msg));
        }
        Ok(self.obj)
    }

    /// Like [`ApiResponse::into_result`] but requires `obj` to be present.
    pub fn into_obj(self) -> CodecResult<T> {
        self.into_result()?.ok_or(CodecError::MissingObject)
    }
}

impl<T: DeserializeOwned> ApiResponse<T> {
    pub fn decode(data: &[u8]) -> CodecResult<Self> {
        Ok(serde_json::from_slice(data)?)
    }
}

/// Parses JSON text carried in a string field. An empty string is the
/// shape's zero value.
pub fn unwrap_str<T>(text: &str) -> CodecResult<T>
where
    T: DeserializeOwned + Default,
{
    if text.trim().is_empty() {
        return Ok(T::default());
    }
    Ok(serde_json::from_str(text)?)
}

/// Reads `field` from an envelope object and parses it into `T`.
///
/// The field is expected to hold JSON text. A native object is accepted as
/// well, and an absent or `null` field is treated like an empty string.
pub fn unwrap_field<T>(envelope: &Map<String, Value>, field: &str) -> CodecResult<T>
where
    T: DeserializeOwned + Default,
{
    match envelope.get(field) {
        None | Some(Value::Null) => Ok(T::default()),
        Some(Value::String(text)) => unwrap_str(text),
        Some(other) => Ok(T::deserialize(other)?),
    }
}

/// Serializes a record to JSON text for re-embedding in a string field.
pub fn wrap_field<T>(value: &T) -> CodecResult<String>
where
    T: Serialize + ?Sized,
{
    Ok(serde_json::to_string(value)?)
}

/// Two-stage decode for responses whose `obj` is itself JSON text holding
/// the real payload: parse the envelope, check `success`, then parse `obj`.
pub fn unwrap_obj<T>(data: &[u8]) -> CodecResult<T>
where
    T: DeserializeOwned,
{
    let obj = ApiResponse::<Value>::decode(data)?.into_obj()?;
    match obj {
        Value::String(text) => Ok(serde_json::from_str(&text)?),
        other => Ok(T::deserialize(other)?),
    }
}

/// `#[serde(with = "json_string")]` adapter for fields that travel as JSON text.
pub mod json_string {
    use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        let text = serde_json::to_string(value).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: DeserializeOwned + Default,
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        match value {
            serde_json::Value::Null => Ok(T::default()),
            serde_json::Value::String(text) => {
                super::unwrap_str(&text).map_err(serde::de::Error::custom)
            }
            other => T::deserialize(other).map_err(serde::de::Error::custom),
        }
    }
}
