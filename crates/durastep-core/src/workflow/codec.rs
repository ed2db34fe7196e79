//! Serialization capability for step results.
//!
//! The store treats payloads as opaque text; a `Codec` decides how a typed
//! step result becomes that text and back.

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Encodes step results for persistence and decodes replayed payloads.
pub trait Codec: Send + Sync {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, CodecError>;

    fn decode<T: DeserializeOwned>(&self, payload: &str) -> Result<T, CodecError>;
}

/// JSON text codec. The default for `execute` and `run_parallel`.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, CodecError> {
        serde_json::to_string(value).map_err(|e| CodecError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, payload: &str) -> Result<T, CodecError> {
        serde_json::from_str(payload).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Errors from encoding or decoding a step payload.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to encode step output: {0}")]
    Encode(String),

    #[error("failed to decode stored step output: {0}")]
    Decode(String),
}
