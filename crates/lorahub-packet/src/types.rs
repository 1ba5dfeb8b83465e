//! Fixed-width identifiers used across the handler.
//!
//! Every value here is a "newtype wrapper" around a byte array. The
//! wrappers stop a 4-byte device address from being passed where an
//! 8-byte application identifier is expected, and they give each value a
//! readable `Display` form for logs.

use serde::{Deserialize, Serialize};

use std::fmt;

/// Writes bytes as uppercase hex with no separator (`26011BDA`).
fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for b in bytes {
        write!(f, "{b:02X}")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// DevAddr
// ---------------------------------------------------------------------------

/// A 32-bit short device address assigned by the network.
///
/// Bytes are kept in display order (most significant first), the way
/// addresses are written in consoles and logs. On the radio the address
/// travels little-endian; [`DevAddr::from_wire`] and [`DevAddr::to_wire`]
/// do the flip.
///
/// Short addresses are NOT unique. The address space is far smaller than
/// the device population and addresses get reassigned, so several
/// sessions can legitimately share one `DevAddr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DevAddr(pub [u8; 4]);

impl DevAddr {
    /// Builds an address from its little-endian radio representation.
    pub fn from_wire(wire: [u8; 4]) -> Self {
        Self([wire[3], wire[2], wire[1], wire[0]])
    }

    /// Returns the little-endian radio representation.
    pub fn to_wire(self) -> [u8; 4] {
        let b = self.0;
        [b[3], b[2], b[1], b[0]]
    }

    /// Returns the address bytes in display order.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl fmt::Display for DevAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

// ---------------------------------------------------------------------------
// AppEui
// ---------------------------------------------------------------------------

/// A 64-bit identifier of the application that owns a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppEui(pub [u8; 8]);

impl AppEui {
    /// Returns the identifier bytes.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for AppEui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.0)
    }
}

// ---------------------------------------------------------------------------
// Aes128Key
// ---------------------------------------------------------------------------

/// A 128-bit AES session key (network or application session key).
///
/// `Debug` prints a redacted placeholder so keys never end up in logs by
/// accident. Use [`Aes128Key::as_bytes`] when the raw key is really needed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Aes128Key([u8; 16]);

impl Aes128Key {
    /// Wraps raw key bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl From<[u8; 16]> for Aes128Key {
    fn from(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Aes128Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Aes128Key(..)")
    }
}

// ---------------------------------------------------------------------------
// Direction
// ---------------------------------------------------------------------------

/// Which way a data frame travels. Part of every MIC and keystream block,
/// so an uplink can never be replayed as a downlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Device → network.
    Uplink,
    /// Network → device.
    Downlink,
}

impl Direction {
    /// The byte used for this direction inside B0 / A_i blocks.
    pub(crate) fn as_byte(self) -> u8 {
        match self {
            Self::Uplink => 0x00,
            Self::Downlink => 0x01,
        }
    }
}
