//! Record types pushed onto monitoring streams.

use std::collections::BTreeMap;

use lorahub_packet::{AppEui, DevAddr};
use serde::{Deserialize, Serialize};

use crate::Component;

/// A status snapshot: named counters for one component.
///
/// Counters are kept in a `BTreeMap` so the serialized record lists them
/// in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub component: Component,
    pub counters: BTreeMap<String, u64>,
}

impl StatusRecord {
    pub fn new(component: Component) -> Self {
        Self {
            component,
            counters: BTreeMap::new(),
        }
    }

    /// Adds (or replaces) a counter. Chainable.
    pub fn with(mut self, name: &str, value: u64) -> Self {
        self.counters.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<u64> {
        self.counters.get(name).copied()
    }
}

/// One uplink frame as seen by a pipeline stage.
///
/// Stages before the handler don't know the application yet, so `app_eui`
/// is optional. At the handler it is always set and `payload` is the
/// decrypted application payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UplinkRecord {
    pub app_eui: Option<AppEui>,
    pub dev_addr: DevAddr,
    pub fcnt: u16,
    pub fport: Option<u8>,
    pub payload: Vec<u8>,
}
