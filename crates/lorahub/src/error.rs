//! Unified error type for Lorahub.

use lorahub_monitor::MonitorError;
use lorahub_packet::PacketError;
use lorahub_registry::{RegistryError, StorageError};

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `lorahub` meta-crate, you deal with this single error
/// type instead of importing errors from each sub-crate. The `#[from]`
/// attribute on each variant generates the `From` impls, so `?` converts
/// sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A frame couldn't be parsed or decrypted.
    #[error(transparent)]
    Packet(#[from] PacketError),

    /// Session lookup, storage, or partitioning failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Talking to the monitoring sink failed.
    #[error(transparent)]
    Monitor(#[from] MonitorError),

    /// A blocking registry task panicked or was cancelled.
    #[error("registry task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<StorageError> for HubError {
    fn from(err: StorageError) -> Self {
        Self::Registry(err.into())
    }
}
