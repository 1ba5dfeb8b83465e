//! Radio packet layer for Lorahub.
//!
//! This crate defines what the handler knows about an uplink before it
//! knows which device sent it:
//!
//! - **Identifiers** ([`DevAddr`], [`AppEui`], [`Aes128Key`]) — the
//!   fixed-width values that identify devices, applications, and keys.
//! - **Packets** ([`Packet`] trait, [`PhyPayload`]) — a radio frame that
//!   can report its short address and check its integrity code against a
//!   candidate key.
//! - **Crypto** — LoRaWAN 1.0 MIC computation and FRMPayload decryption.
//! - **Errors** ([`PacketError`]) — what can go wrong while reading a frame.
//!
//! # Architecture
//!
//! The packet layer sits below the session registry. It doesn't know
//! about storage or applications; it only knows how to read frames.
//!
//! ```text
//! Gateway (bytes) → Packet (PhyPayload) → Registry (which device sent it?)
//! ```

mod crypto;
mod error;
mod phy;
mod types;

pub use error::PacketError;
pub use phy::{DataFrame, DataFrameBuilder, MType, PhyPayload};
pub use types::{Aes128Key, AppEui, DevAddr, Direction};

/// A radio packet whose sender is not yet known.
///
/// The registry only needs two things from a packet: the short address it
/// claims to come from, and a way to check whether a given network session
/// key produced its integrity code. Anything that can answer those two
/// questions can be partitioned: the real [`PhyPayload`], or a fake in
/// tests.
pub trait Packet {
    /// Returns the short device address carried by this packet.
    ///
    /// # Errors
    /// Returns a [`PacketError`] when the packet has no address field
    /// (join frames, proprietary frames) or is too short to hold one.
    fn dev_addr(&self) -> Result<DevAddr, PacketError>;

    /// Checks the packet's integrity code against `nwk_skey`.
    ///
    /// A mismatch is `Ok(false)`, not an error: trying the wrong key is
    /// the normal way of finding the right one.
    ///
    /// # Errors
    /// Returns a [`PacketError`] only when the packet is malformed.
    fn validate_mic(&self, nwk_skey: &Aes128Key) -> Result<bool, PacketError>;
}

/// References to packets are packets too, so callers can partition
/// borrowed batches without cloning the frames.
impl<P: Packet + ?Sized> Packet for &P {
    fn dev_addr(&self) -> Result<DevAddr, PacketError> {
        (**self).dev_addr()
    }

    fn validate_mic(&self, nwk_skey: &Aes128Key) -> Result<bool, PacketError> {
        (**self).validate_mic(nwk_skey)
    }
}
