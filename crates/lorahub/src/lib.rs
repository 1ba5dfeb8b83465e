//! # Lorahub
//!
//! The handler stage of a LoRaWAN network back end.
//!
//! LoRaWAN devices are identified on the air by a 4-byte short address,
//! and the address space is small enough that several devices can end up
//! sharing one. Lorahub keeps every session registered under an address
//! and tells colliding devices apart by checking each uplink's MIC
//! against the candidate network session keys.
//!
//! The work is split across crates:
//!
//! - `lorahub-packet`: frame parsing, MIC, and payload crypto.
//! - `lorahub-registry`: the session store and the partitioner.
//! - `lorahub-monitor`: the monitoring side channel.
//! - `lorahub` (this crate): the async [`Handler`] that ties them
//!   together, plus [`HubError`] and logging setup.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use lorahub::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), HubError> {
//! lorahub::init_logging("info");
//!
//! let registry = Registry::open(&RegistryConfig::default())?;
//! let handler = HandlerBuilder::new(registry).build();
//!
//! let frames: Vec<PhyPayload> = Vec::new(); // from the broker
//! for device in handler.handle_uplinks(frames).await? {
//!     println!("{}: {} frames", device.id, device.frames.len());
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod handler;
mod uplink;

pub use error::HubError;
pub use handler::{Handler, HandlerBuilder};
pub use uplink::{AppFrame, DeviceUplink, HandlerStats};

pub use lorahub_monitor as monitor;
pub use lorahub_packet as packet;
pub use lorahub_registry as registry;

use tracing_subscriber::EnvFilter;

/// Installs a `fmt` subscriber filtered by `RUST_LOG`.
///
/// Falls back to `default_directive` (e.g. `"info"` or
/// `"lorahub_registry=debug"`) when `RUST_LOG` is unset or invalid. Does
/// nothing if a global subscriber is already installed.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// Common imports for working with Lorahub.
///
/// ```rust
/// use lorahub::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{AppFrame, DeviceUplink, Handler, HandlerBuilder, HandlerStats, HubError};

    pub use lorahub_monitor::{
        ChannelSink, Codec, Component, DiscardSink, JsonCodec, MonitorError, MonitorSink,
        RecordStream, StatusRecord, StreamKind, UplinkRecord,
    };
    pub use lorahub_packet::{
        Aes128Key, AppEui, DataFrameBuilder, DevAddr, MType, Packet, PacketError, PhyPayload,
    };
    pub use lorahub_registry::{
        KvStore, Partition, PartitionId, RedbStore, Registry, RegistryConfig, RegistryError,
        SessionEntry, SessionKeys,
    };
}
