//! The session registry: durable, append-only storage of session entries
//! keyed by short device address.
//!
//! Short addresses collide, so one key can hold several entries. The
//! stored value for an address is a sequence of frames, each a big-endian
//! `u16` length followed by one encoded [`SessionEntry`]:
//!
//! ```text
//! | len | entry | len | entry | ...
//! ```
//!
//! New entries are appended at the end, which keeps lookups in insertion
//! order.

use bytes::{Buf, BufMut};
use lorahub_packet::DevAddr;

use crate::{
    KvStore, RedbStore, RegistryConfig, RegistryError, SessionEntry,
};

/// Stores sessions and looks them up by short address.
///
/// The registry owns its storage handle for its whole life: it's handed
/// one at construction and releases it in [`Registry::close`]. Nothing is
/// global, so tests can run any number of registries side by side, each
/// over its own in-memory engine.
///
/// ## Lifecycle
///
/// ```text
/// new()/open() ──→ store() / lookup() / partition() ... ──→ close()
///                        │
///                        └── reset() wipes every entry (tests, bootstrap)
/// ```
pub struct Registry<S: KvStore = RedbStore> {
    pub(crate) store: S,
    bucket: String,
}

impl<S: KvStore> Registry<S> {
    /// Wraps an already-open storage engine. Creates `bucket` if needed.
    pub fn new(store: S, bucket: impl Into<String>) -> Result<Self, RegistryError> {
        let bucket = bucket.into();
        store.ensure_bucket(&bucket)?;
        Ok(Self { store, bucket })
    }

    /// The name of the bucket holding the entries.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Returns every entry stored under `dev_addr`, oldest first.
    ///
    /// An address nobody registered yields an empty list, not an error.
    ///
    /// # Errors
    /// - [`RegistryError::Storage`] if the engine fails.
    /// - [`RegistryError::InvalidStructure`] if a stored entry doesn't
    ///   decode.
    pub fn lookup(
        &self,
        dev_addr: DevAddr,
    ) -> Result<Vec<SessionEntry>, RegistryError> {
        match self.store.get(&self.bucket, dev_addr.as_bytes())? {
            Some(value) => decode_frames(&value),
            None => Ok(Vec::new()),
        }
    }

    /// Appends `entry` to the entries stored under `dev_addr`.
    ///
    /// Existing entries are never overwritten: a second device that
    /// landed on the same address is stored next to the first. The entry
    /// is committed before this returns.
    ///
    /// # Errors
    /// - [`RegistryError::InvalidStructure`] if `entry.dev_addr` is not
    ///   `dev_addr`.
    /// - [`RegistryError::Storage`] if the engine fails.
    pub fn store(
        &self,
        dev_addr: DevAddr,
        entry: SessionEntry,
    ) -> Result<(), RegistryError> {
        if entry.dev_addr != dev_addr {
            return Err(RegistryError::InvalidStructure(format!(
                "entry for {} stored under {dev_addr}",
                entry.dev_addr
            )));
        }

        let encoded = entry.encode();
        self.store
            .update(&self.bucket, dev_addr.as_bytes(), |current| {
                append_frame(current, &encoded)
            })?;

        tracing::info!(%dev_addr, app_eui = %entry.app_eui, "session stored");
        Ok(())
    }

    /// Deletes every stored entry.
    pub fn reset(&self) -> Result<(), RegistryError> {
        self.store.delete_all(&self.bucket)?;
        tracing::info!(bucket = %self.bucket, "registry reset");
        Ok(())
    }

    /// Releases the storage engine.
    pub fn close(self) -> Result<(), RegistryError> {
        self.store.close()?;
        Ok(())
    }
}

impl Registry<RedbStore> {
    /// Opens a file-backed registry as described by `config`.
    pub fn open(config: &RegistryConfig) -> Result<Self, RegistryError> {
        let store = RedbStore::open(&config.path, config.open_timeout)?;
        Self::new(store, config.bucket.clone())
    }

    /// Creates a registry that keeps everything in memory.
    pub fn in_memory() -> Result<Self, RegistryError> {
        Self::new(RedbStore::in_memory()?, RegistryConfig::default().bucket)
    }
}

fn append_frame(current: Option<&[u8]>, encoded: &[u8]) -> Vec<u8> {
    let current = current.unwrap_or_default();
    let mut value = Vec::with_capacity(current.len() + 2 + encoded.len());
    value.put_slice(current);
    // An encoded entry is a few dozen bytes; the cast can't truncate.
    value.put_u16(encoded.len() as u16);
    value.put_slice(encoded);
    value
}

fn decode_frames(mut value: &[u8]) -> Result<Vec<SessionEntry>, RegistryError> {
    let mut entries = Vec::new();
    while value.has_remaining() {
        if value.remaining() < 2 {
            return Err(RegistryError::InvalidStructure(
                "truncated frame header".into(),
            ));
        }
        let len = usize::from(value.get_u16());
        if value.remaining() < len {
            return Err(RegistryError::InvalidStructure(format!(
                "frame announces {len} bytes, {} left",
                value.remaining()
            )));
        }
        let (frame, rest) = value.split_at(len);
        entries.push(SessionEntry::decode(frame)?);
        value = rest;
    }
    Ok(entries)
}

// =========================================================================
// Tests
// =========================================================================
