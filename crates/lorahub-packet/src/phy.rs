//! LoRaWAN PHY payloads: parsing data frames and building signed ones.
//!
//! A PHY payload is what a gateway hands us:
//!
//! ```text
//! | MHDR | MACPayload ........................................ | MIC  |
//! |  1   | DevAddr(4) FCtrl(1) FCnt(2) FOpts(0..15) [FPort FRMPayload] | 4 |
//! ```
//!
//! Only data frames carry a device address. Join and proprietary frames
//! are valid payloads but can't be attributed to a session, so every
//! address-related accessor rejects them with
//! [`PacketError::NotADataFrame`].

use serde::{Deserialize, Serialize};

use std::fmt;

use crate::crypto::{apply_keystream, compute_mic};
use crate::{Aes128Key, DevAddr, Direction, Packet, PacketError};

/// MHDR + DevAddr + FCtrl + FCnt + MIC: the smallest possible data frame.
const MIN_DATA_FRAME_LEN: usize = 12;

/// Offset of the first FOpts byte (right after MHDR, DevAddr, FCtrl, FCnt).
const FHDR_END: usize = 8;

const MIC_LEN: usize = 4;

/// The largest PHY payload a LoRa radio carries. The MIC block encodes
/// the message length in one byte, so nothing longer can be signed.
const MAX_PHY_PAYLOAD_LEN: usize = 255;

/// FOpts can hold at most 15 bytes: its length lives in a 4-bit field.
const MAX_FOPTS_LEN: usize = 15;

// ---------------------------------------------------------------------------
// MType
// ---------------------------------------------------------------------------

/// The message type, taken from the top three bits of MHDR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MType {
    JoinRequest = 0,
    JoinAccept = 1,
    UnconfirmedDataUp = 2,
    UnconfirmedDataDown = 3,
    ConfirmedDataUp = 4,
    ConfirmedDataDown = 5,
    RejoinRequest = 6,
    Proprietary = 7,
}

impl MType {
    /// Decodes the message type from an MHDR byte.
    pub fn from_mhdr(mhdr: u8) -> Self {
        match mhdr >> 5 {
            0 => Self::JoinRequest,
            1 => Self::JoinAccept,
            2 => Self::UnconfirmedDataUp,
            3 => Self::UnconfirmedDataDown,
            4 => Self::ConfirmedDataUp,
            5 => Self::ConfirmedDataDown,
            6 => Self::RejoinRequest,
            _ => Self::Proprietary,
        }
    }

    /// Encodes this message type into an MHDR byte (LoRaWAN R1 major).
    pub fn to_mhdr(self) -> u8 {
        (self as u8) << 5
    }

    /// The direction of a data frame, or `None` for join/proprietary types.
    pub fn direction(self) -> Option<Direction> {
        match self {
            Self::UnconfirmedDataUp | Self::ConfirmedDataUp => {
                Some(Direction::Uplink)
            }
            Self::UnconfirmedDataDown | Self::ConfirmedDataDown => {
                Some(Direction::Downlink)
            }
            _ => None,
        }
    }

    /// Returns `true` for the four data frame types.
    pub fn is_data(self) -> bool {
        self.direction().is_some()
    }
}

impl fmt::Display for MType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::JoinRequest => "JoinRequest",
            Self::JoinAccept => "JoinAccept",
            Self::UnconfirmedDataUp => "UnconfirmedDataUp",
            Self::UnconfirmedDataDown => "UnconfirmedDataDown",
            Self::ConfirmedDataUp => "ConfirmedDataUp",
            Self::ConfirmedDataDown => "ConfirmedDataDown",
            Self::RejoinRequest => "RejoinRequest",
            Self::Proprietary => "Proprietary",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// DataFrame
// ---------------------------------------------------------------------------

/// A parsed view over a data frame. Borrows from the [`PhyPayload`] it
/// came from, so parsing never copies the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFrame<'a> {
    pub mtype: MType,
    pub dev_addr: DevAddr,
    pub fctrl: u8,
    /// The 16 low bits of the frame counter, as transmitted.
    pub fcnt: u16,
    pub fopts: &'a [u8],
    /// `None` when the frame carries no FPort (and therefore no payload).
    pub fport: Option<u8>,
    /// Still encrypted.
    pub frm_payload: &'a [u8],
    pub mic: [u8; 4],
    /// Everything the MIC covers: MHDR through the end of FRMPayload.
    msg: &'a [u8],
}

impl DataFrame<'_> {
    pub fn direction(&self) -> Direction {
        // `data_frame()` only builds DataFrames for data mtypes.
        self.mtype.direction().unwrap_or(Direction::Uplink)
    }
}

// ---------------------------------------------------------------------------
// PhyPayload
// ---------------------------------------------------------------------------

/// A raw LoRaWAN PHY payload as received from a gateway.
///
/// Construction never fails: a gateway may forward anything, and the
/// decision about what to do with a malformed frame belongs to whoever
/// reads it. Parsing happens on demand in [`PhyPayload::data_frame`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhyPayload {
    bytes: Vec<u8>,
}

impl PhyPayload {
    /// Wraps raw frame bytes.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Returns the message type.
    ///
    /// # Errors
    /// [`PacketError::Truncated`] if the payload is empty.
    pub fn mtype(&self) -> Result<MType, PacketError> {
        self.bytes
            .first()
            .map(|mhdr| MType::from_mhdr(*mhdr))
            .ok_or(PacketError::Truncated {
                needed: 1,
                actual: 0,
            })
    }

    /// Parses the payload as a data frame.
    ///
    /// # Errors
    /// - [`PacketError::NotADataFrame`] for join and proprietary frames.
    /// - [`PacketError::Truncated`] if the frame is shorter than its
    ///   header (including the FOpts length it announces) plus MIC.
    /// - [`PacketError::TooLong`] if the frame exceeds 255 bytes.
    pub fn data_frame(&self) -> Result<DataFrame<'_>, PacketError> {
        let mtype = self.mtype()?;
        if !mtype.is_data() {
            return Err(PacketError::NotADataFrame(mtype));
        }

        let b = &self.bytes;
        if b.len() < MIN_DATA_FRAME_LEN {
            return Err(PacketError::Truncated {
                needed: MIN_DATA_FRAME_LEN,
                actual: b.len(),
            });
        }
        if b.len() > MAX_PHY_PAYLOAD_LEN {
            return Err(PacketError::TooLong {
                max: MAX_PHY_PAYLOAD_LEN,
                actual: b.len(),
            });
        }

        let dev_addr = DevAddr::from_wire([b[1], b[2], b[3], b[4]]);
        let fctrl = b[5];
        let fcnt = u16::from_le_bytes([b[6], b[7]]);

        let fopts_end = FHDR_END + usize::from(fctrl & 0x0F);
        if b.len() < fopts_end + MIC_LEN {
            return Err(PacketError::Truncated {
                needed: fopts_end + MIC_LEN,
                actual: b.len(),
            });
        }

        let mic_start = b.len() - MIC_LEN;
        let (fport, frm_payload) = if mic_start > fopts_end {
            (Some(b[fopts_end]), &b[fopts_end + 1..mic_start])
        } else {
            (None, &b[mic_start..mic_start])
        };

        let mut mic = [0u8; 4];
        mic.copy_from_slice(&b[mic_start..]);

        Ok(DataFrame {
            mtype,
            dev_addr,
            fctrl,
            fcnt,
            fopts: &b[FHDR_END..fopts_end],
            fport,
            frm_payload,
            mic,
            msg: &b[..mic_start],
        })
    }

    /// Decrypts the FRMPayload with `key`.
    ///
    /// Which key is right depends on the FPort: port 0 carries MAC
    /// commands encrypted with the network session key, every other port
    /// carries application data encrypted with the application session
    /// key. The caller picks.
    pub fn decrypt_payload(
        &self,
        key: &Aes128Key,
    ) -> Result<Vec<u8>, PacketError> {
        let frame = self.data_frame()?;
        let mut data = frame.frm_payload.to_vec();
        apply_keystream(
            key,
            frame.direction(),
            frame.dev_addr,
            u32::from(frame.fcnt),
            &mut data,
        );
        Ok(data)
    }
}

impl Packet for PhyPayload {
    fn dev_addr(&self) -> Result<DevAddr, PacketError> {
        self.data_frame().map(|frame| frame.dev_addr)
    }

    fn validate_mic(&self, nwk_skey: &Aes128Key) -> Result<bool, PacketError> {
        let frame = self.data_frame()?;
        // TODO: the transmitted FCnt is 16 bits; validating frames past a
        // 16-bit rollover needs the session's 32-bit counter.
        let expected = compute_mic(
            nwk_skey,
            frame.direction(),
            frame.dev_addr,
            u32::from(frame.fcnt),
            frame.msg,
        )?;
        Ok(expected == frame.mic)
    }
}

// ---------------------------------------------------------------------------
// DataFrameBuilder
// ---------------------------------------------------------------------------

/// Builds encrypted, MIC-signed data frames, the device side of the
/// protocol. Used by simulators and tests.
///
/// ## Example
///
/// ```rust
/// use lorahub_packet::{Aes128Key, DataFrameBuilder, DevAddr, Packet};
///
/// let nwk_skey = Aes128Key::new([1; 16]);
/// let app_skey = Aes128Key::new([2; 16]);
///
/// let frame = DataFrameBuilder::uplink(DevAddr([0x26, 0, 0, 1]), 7)
///     .payload(1, b"hello")
///     .build(&nwk_skey, &app_skey)
///     .unwrap();
///
/// assert!(frame.validate_mic(&nwk_skey).unwrap());
/// assert_eq!(frame.decrypt_payload(&app_skey).unwrap(), b"hello");
/// ```
#[derive(Debug, Clone)]
pub struct DataFrameBuilder {
    mtype: MType,
    dev_addr: DevAddr,
    fctrl: u8,
    fcnt: u16,
    fopts: Vec<u8>,
    port_payload: Option<(u8, Vec<u8>)>,
}

impl DataFrameBuilder {
    /// Starts an unconfirmed uplink from `dev_addr`.
    pub fn uplink(dev_addr: DevAddr, fcnt: u16) -> Self {
        Self::with_mtype(MType::UnconfirmedDataUp, dev_addr, fcnt)
    }

    /// Starts an unconfirmed downlink to `dev_addr`.
    pub fn downlink(dev_addr: DevAddr, fcnt: u16) -> Self {
        Self::with_mtype(MType::UnconfirmedDataDown, dev_addr, fcnt)
    }

    fn with_mtype(mtype: MType, dev_addr: DevAddr, fcnt: u16) -> Self {
        Self {
            mtype,
            dev_addr,
            fctrl: 0,
            fcnt,
            fopts: Vec::new(),
            port_payload: None,
        }
    }

    /// Switches to the confirmed variant of the current direction.
    pub fn confirmed(mut self) -> Self {
        self.mtype = match self.mtype {
            MType::UnconfirmedDataUp => MType::ConfirmedDataUp,
            MType::UnconfirmedDataDown => MType::ConfirmedDataDown,
            other => other,
        };
        self
    }

    /// Sets the upper FCtrl bits (ADR, ACK, ...). The low nibble is the
    /// FOpts length and is always computed.
    pub fn fctrl(mut self, flags: u8) -> Self {
        self.fctrl = flags & 0xF0;
        self
    }

    /// Piggybacks MAC commands in FOpts. Bytes past the 15th are dropped.
    pub fn fopts(mut self, opts: &[u8]) -> Self {
        self.fopts = opts.iter().copied().take(MAX_FOPTS_LEN).collect();
        self
    }

    /// Sets the FPort and the plaintext payload.
    pub fn payload(mut self, fport: u8, plaintext: &[u8]) -> Self {
        self.port_payload = Some((fport, plaintext.to_vec()));
        self
    }

    /// Encrypts the payload and appends the MIC.
    ///
    /// Port 0 payloads are encrypted with `nwk_skey`, all others with
    /// `app_skey`.
    pub fn build(
        self,
        nwk_skey: &Aes128Key,
        app_skey: &Aes128Key,
    ) -> Result<PhyPayload, PacketError> {
        let dir = self.mtype.direction().unwrap_or(Direction::Uplink);
        let fcnt = u32::from(self.fcnt);

        let mut msg = Vec::with_capacity(
            MIN_DATA_FRAME_LEN + self.fopts.len() + 1 + 64,
        );
        msg.push(self.mtype.to_mhdr());
        msg.extend_from_slice(&self.dev_addr.to_wire());
        msg.push(self.fctrl | self.fopts.len() as u8);
        msg.extend_from_slice(&self.fcnt.to_le_bytes());
        msg.extend_from_slice(&self.fopts);

        if let Some((fport, mut data)) = self.port_payload {
            let key = if fport == 0 { nwk_skey } else { app_skey };
            apply_keystream(key, dir, self.dev_addr, fcnt, &mut data);
            msg.push(fport);
            msg.extend_from_slice(&data);
        }

        if msg.len() + MIC_LEN > MAX_PHY_PAYLOAD_LEN {
            return Err(PacketError::TooLong {
                max: MAX_PHY_PAYLOAD_LEN,
                actual: msg.len() + MIC_LEN,
            });
        }

        let mic = compute_mic(nwk_skey, dir, self.dev_addr, fcnt, &msg)?;
        msg.extend_from_slice(&mic);
        Ok(PhyPayload::new(msg))
    }
}
