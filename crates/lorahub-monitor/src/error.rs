//! Error types for the monitoring layer.

use crate::StreamKind;

/// Errors that can occur while talking to a monitoring sink.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Serializing a record failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserializing a record failed.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The sink is gone (its collector stopped or was never started).
    #[error("monitor sink unavailable")]
    Unavailable,

    /// The stream was closed by the other side before we finished.
    #[error("{0} stream closed")]
    StreamClosed(StreamKind),
}
