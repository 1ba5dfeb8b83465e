//! LoRaWAN 1.0 frame crypto: MIC and FRMPayload keystream.
//!
//! Both primitives build a 16-byte block that binds the frame to its
//! context (direction, device address, frame counter) and run it through
//! AES-128. The MIC is a CMAC over `B0 ‖ msg`; the payload cipher XORs the
//! FRMPayload with `AES(key, A_i)` for i = 1, 2, ...

use aes::Aes128;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockEncrypt, KeyInit};
use cmac::{Cmac, Mac};

use crate::{Aes128Key, DevAddr, Direction, PacketError};

/// Builds the shared 16-byte block layout used by B0 and A_i.
///
/// ```text
/// | tag | 0x00 x4 | dir | DevAddr (LE) | FCnt (LE, 32) | 0x00 | last |
/// ```
fn context_block(
    tag: u8,
    dir: Direction,
    dev_addr: DevAddr,
    fcnt: u32,
    last: u8,
) -> [u8; 16] {
    let mut block = [0u8; 16];
    block[0] = tag;
    block[5] = dir.as_byte();
    block[6..10].copy_from_slice(&dev_addr.to_wire());
    block[10..14].copy_from_slice(&fcnt.to_le_bytes());
    block[15] = last;
    block
}

/// Computes the 4-byte MIC of a data frame.
///
/// `msg` is everything before the MIC: `MHDR ‖ FHDR ‖ FPort ‖ FRMPayload`.
pub(crate) fn compute_mic(
    key: &Aes128Key,
    dir: Direction,
    dev_addr: DevAddr,
    fcnt: u32,
    msg: &[u8],
) -> Result<[u8; 4], PacketError> {
    // The length byte in B0 is a u8. Callers bound frames to 255 bytes.
    let b0 = context_block(0x49, dir, dev_addr, fcnt, msg.len() as u8);

    let mut mac = <Cmac<Aes128> as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| PacketError::InvalidKey(e.to_string()))?;
    mac.update(&b0);
    mac.update(msg);
    let tag = mac.finalize().into_bytes();

    let mut mic = [0u8; 4];
    mic.copy_from_slice(&tag[..4]);
    Ok(mic)
}

/// Encrypts or decrypts an FRMPayload in place. The operation is its own
/// inverse: applying it twice with the same context restores the input.
pub(crate) fn apply_keystream(
    key: &Aes128Key,
    dir: Direction,
    dev_addr: DevAddr,
    fcnt: u32,
    data: &mut [u8],
) {
    let cipher = Aes128::new(GenericArray::from_slice(key.as_bytes()));

    for (i, chunk) in data.chunks_mut(16).enumerate() {
        // Block counters start at 1.
        let a_i = context_block(0x01, dir, dev_addr, fcnt, (i + 1) as u8);
        let mut keystream = GenericArray::from(a_i);
        cipher.encrypt_block(&mut keystream);
        for (byte, k) in chunk.iter_mut().zip(keystream.iter()) {
            *byte ^= k;
        }
    }
}
