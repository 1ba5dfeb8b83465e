//! Session entries and their on-disk encoding.
//!
//! The encoding is private to the registry: four fields in a fixed order,
//! each written as a big-endian `u16` length followed by the raw bytes.
//!
//! ```text
//! | len | AppEUI (8) | len | AppSKey (16) | len | DevAddr (4) | len | NwkSKey (16) |
//! ```
//!
//! There is one version of this format and no migration path.

use bytes::{Buf, BufMut};
use lorahub_packet::{Aes128Key, AppEui, DevAddr};
use serde::{Deserialize, Serialize};

use crate::{RegistryError, SessionKeys};

/// Bytes taken by one length prefix.
const PREFIX_LEN: usize = 2;

/// Size of a fully encoded entry.
pub(crate) const ENCODED_LEN: usize = 4 * PREFIX_LEN + 8 + 16 + 4 + 16;

/// Anything shorter can't even hold the first length prefix and a byte of
/// data, so it's rejected before any field is read.
const MIN_DECODE_LEN: usize = 4;

/// One device's session with one application.
///
/// Entries are immutable once stored. There is no partial update: a new
/// session for the same device is a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionEntry {
    /// The application that owns the device.
    pub app_eui: AppEui,
    /// Encrypts application payloads (FPort > 0).
    pub app_skey: Aes128Key,
    /// The short address the device currently uses. Not unique.
    pub dev_addr: DevAddr,
    /// Signs frames and encrypts MAC commands (FPort 0).
    pub nwk_skey: Aes128Key,
}

impl SessionEntry {
    /// Builds an entry from an address, an application, and session keys.
    pub fn new(app_eui: AppEui, dev_addr: DevAddr, keys: SessionKeys) -> Self {
        Self {
            app_eui,
            app_skey: keys.app_skey,
            dev_addr,
            nwk_skey: keys.nwk_skey,
        }
    }

    /// The key that decrypts a frame's payload on `fport`: the network
    /// session key for MAC commands on port 0, the application session key
    /// otherwise.
    pub fn payload_key(&self, fport: Option<u8>) -> &Aes128Key {
        match fport {
            Some(0) => &self.nwk_skey,
            _ => &self.app_skey,
        }
    }

    /// Encodes the entry into its fixed binary layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ENCODED_LEN);
        put_field(&mut buf, self.app_eui.as_bytes());
        put_field(&mut buf, self.app_skey.as_bytes());
        put_field(&mut buf, self.dev_addr.as_bytes());
        put_field(&mut buf, self.nwk_skey.as_bytes());
        buf
    }

    /// Decodes an entry produced by [`SessionEntry::encode`].
    ///
    /// # Errors
    /// Returns [`RegistryError::InvalidStructure`] when the input is
    /// shorter than 4 bytes, when a field is truncated or has the wrong
    /// width, or when bytes are left over after the last field.
    pub fn decode(data: &[u8]) -> Result<Self, RegistryError> {
        if data.len() < MIN_DECODE_LEN {
            return Err(RegistryError::InvalidStructure(format!(
                "session entry too short: {} bytes",
                data.len()
            )));
        }

        // `&[u8]` implements `Buf`: every `get_*` advances the slice.
        let mut buf = data;
        let app_eui = AppEui(read_field(&mut buf, "app_eui")?);
        let app_skey = Aes128Key::new(read_field(&mut buf, "app_skey")?);
        let dev_addr = DevAddr(read_field(&mut buf, "dev_addr")?);
        let nwk_skey = Aes128Key::new(read_field(&mut buf, "nwk_skey")?);

        if buf.has_remaining() {
            return Err(RegistryError::InvalidStructure(format!(
                "{} trailing bytes after session entry",
                buf.remaining()
            )));
        }

        Ok(Self {
            app_eui,
            app_skey,
            dev_addr,
            nwk_skey,
        })
    }
}

fn put_field(buf: &mut Vec<u8>, field: &[u8]) {
    // Fields are at most 16 bytes; the cast can't truncate.
    buf.put_u16(field.len() as u16);
    buf.put_slice(field);
}

/// Reads one length-prefixed field of exactly `N` bytes.
fn read_field<const N: usize>(
    buf: &mut &[u8],
    name: &str,
) -> Result<[u8; N], RegistryError> {
    // `get_u16` and `copy_to_slice` panic on short input, so every read
    // is guarded by a `remaining()` check first.
    if buf.remaining() < PREFIX_LEN {
        return Err(RegistryError::InvalidStructure(format!(
            "{name}: missing length prefix"
        )));
    }
    let len = usize::from(buf.get_u16());
    if len != N {
        return Err(RegistryError::InvalidStructure(format!(
            "{name}: expected {N} bytes, prefix says {len}"
        )));
    }
    if buf.remaining() < N {
        return Err(RegistryError::InvalidStructure(format!(
            "{name}: truncated, {} of {N} bytes present",
            buf.remaining()
        )));
    }
    let mut out = [0u8; N];
    buf.copy_to_slice(&mut out);
    Ok(out)
}
