//! Error types for the packet layer.
//!
//! Each crate in Lorahub defines its own error enum. When you see a
//! `PacketError`, you know the problem is in the radio frame itself, not
//! in storage or monitoring.

use crate::MType;

/// Errors that can occur while reading a radio frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    /// The frame is shorter than its structure requires.
    ///
    /// `needed` is the minimum number of bytes for the part being read,
    /// `actual` is what the frame holds.
    #[error("frame truncated: need {needed} bytes, got {actual}")]
    Truncated { needed: usize, actual: usize },

    /// The frame is longer than a LoRa radio can carry.
    #[error("frame too long: at most {max} bytes, got {actual}")]
    TooLong { max: usize, actual: usize },

    /// The frame is a join or proprietary frame. These carry no device
    /// address and no frame counter, so they can't be matched to a session.
    #[error("{0} frame carries no device address")]
    NotADataFrame(MType),

    /// The crypto backend rejected a key. Keys are fixed-width, so this
    /// points at a bug rather than bad input.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}
