//! What the handler hands back for a batch, and its running counters.

use std::sync::atomic::{AtomicU64, Ordering};

use lorahub_packet::{AppEui, DevAddr};
use lorahub_registry::PartitionId;
use serde::{Deserialize, Serialize};

/// One decrypted application frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppFrame {
    pub fcnt: u16,
    /// `None` when the frame carried no payload.
    pub fport: Option<u8>,
    /// Plaintext. For port 0 these are MAC commands.
    pub payload: Vec<u8>,
}

/// All frames of one batch that belong to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceUplink {
    pub id: PartitionId,
    /// In the order the frames were received.
    pub frames: Vec<AppFrame>,
}

impl DeviceUplink {
    pub fn app_eui(&self) -> AppEui {
        self.id.app_eui()
    }

    pub fn dev_addr(&self) -> DevAddr {
        self.id.dev_addr()
    }
}

/// A snapshot of the handler's cumulative counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HandlerStats {
    /// Calls to `handle_uplinks`.
    pub batches: u64,
    /// Frames offered across all batches.
    pub uplinks: u64,
    /// Frames that matched a session.
    pub matched: u64,
    /// Frames no session validated.
    pub dropped: u64,
    /// Batches that failed as a whole (malformed frame or storage error).
    pub rejected_batches: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    batches: AtomicU64,
    uplinks: AtomicU64,
    matched: AtomicU64,
    dropped: AtomicU64,
    rejected_batches: AtomicU64,
}

impl Counters {
    pub(crate) fn batch(&self, size: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.uplinks.fetch_add(size as u64, Ordering::Relaxed);
    }

    pub(crate) fn resolved(&self, matched: u64, dropped: u64) {
        self.matched.fetch_add(matched, Ordering::Relaxed);
        self.dropped.fetch_add(dropped, Ordering::Relaxed);
    }

    pub(crate) fn rejected(&self) {
        self.rejected_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> HandlerStats {
        HandlerStats {
            batches: self.batches.load(Ordering::Relaxed),
            uplinks: self.uplinks.load(Ordering::Relaxed),
            matched: self.matched.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            rejected_batches: self.rejected_batches.load(Ordering::Relaxed),
        }
    }
}
