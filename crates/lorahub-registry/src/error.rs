//! Error types for the registry layer.

use crate::StorageError;

/// Errors that can occur while storing, looking up, or partitioning.
///
/// A caller sees exactly one of these per failed call. The registry
/// never retries; whoever called decides.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Malformed input: a stored entry that doesn't decode, a packet
    /// without a usable address, or an argument that contradicts itself.
    #[error("invalid structure: {0}")]
    InvalidStructure(String),

    /// A partitioning run matched no packet of the batch to any session.
    #[error("no session matched any packet in the batch")]
    NotFound,

    /// The storage engine failed. The engine's own error is kept as-is
    /// so callers can decide whether it's worth retrying.
    #[error(transparent)]
    Storage(#[from] StorageError),
}
