//! Device session registry for Lorahub.
//!
//! This crate answers the handler's central question: *which device sent
//! this packet?*
//!
//! 1. **Session entries** — the keys binding a device to its application
//!    ([`SessionEntry`], [`SessionKeys`]), with a fixed binary encoding.
//! 2. **Storage** — a durable, transactional key-value engine behind the
//!    [`KvStore`] trait ([`RedbStore`] in production).
//! 3. **Registry** — append-only session storage keyed by short address
//!    ([`Registry`]). Colliding addresses are stored side by side.
//! 4. **Partitioning** — resolving a batch of packets to devices by trying
//!    each candidate's network session key against the packet's MIC
//!    ([`Registry::partition`], [`Partition`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Handler (above)      ← hands over uplink batches, receives partitions
//!     ↕
//! Registry (this crate) ← stores sessions, resolves address collisions
//!     ↕
//! Packet layer (below)  ← provides DevAddr, keys, and MIC checks
//! ```
//!
//! Everything here is synchronous. Each registry call is one storage
//! transaction and runs to completion on the caller's thread.

mod config;
mod entry;
mod error;
mod keys;
mod partition;
mod registry;
mod store;

pub use config::RegistryConfig;
pub use entry::SessionEntry;
pub use error::RegistryError;
pub use keys::SessionKeys;
pub use partition::{Partition, PartitionId};
pub use registry::Registry;
pub use store::{KvStore, RedbStore, StorageError};
