//! Codec trait and implementations for serializing monitoring records.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! Sinks only see bytes; how records become bytes is the codec's business.
//! That keeps the wire format swappable without touching any sink.

use serde::{Serialize, de::DeserializeOwned};

use crate::MonitorError;

/// Encodes records to bytes and decodes them back.
///
/// - `Send + Sync + 'static` → one codec is shared by every stream.
/// - `encode`/`decode` are generic over any serde type, so the same codec
///   handles status, uplink, and any future record type.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `MonitorError::Encode` if the value can't be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, MonitorError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `MonitorError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, MonitorError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Readable in any log or debugging tool, which is what a monitoring feed
/// mostly needs.
///
/// ## Example
///
/// ```rust
/// use lorahub_monitor::{Codec, JsonCodec, StatusRecord, Component};
///
/// let codec = JsonCodec;
/// let record = StatusRecord::new(Component::Handler).with("uplinks", 3);
///
/// let bytes = codec.encode(&record).unwrap();
/// let decoded: StatusRecord = codec.decode(&bytes).unwrap();
/// assert_eq!(record, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, MonitorError> {
        serde_json::to_vec(value).map_err(MonitorError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, MonitorError> {
        serde_json::from_slice(data).map_err(MonitorError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;

    #[test]
    fn test_json_codec_decode_garbage_returns_decode_error() {
        let result: Result<u32, _> = JsonCodec.decode(b"{not json");
        assert!(matches!(result, Err(MonitorError::Decode(_))));
    }

    #[test]
    fn test_json_codec_encode_is_plain_json() {
        let bytes = JsonCodec.encode(&vec![1u8, 2]).unwrap();
        assert_eq!(bytes, b"[1,2]");
    }
}
