//! Resolving packets to devices when short addresses collide.
//!
//! A short address narrows a packet down to a handful of candidate
//! sessions; the MIC decides which one. For each packet we try the
//! candidates' network session keys in lookup order, and the first key
//! that validates the MIC identifies the device. Packets are then grouped
//! per device.

use std::collections::HashMap;
use std::fmt;

use lorahub_packet::{AppEui, DevAddr, Packet};
use serde::{Deserialize, Serialize};

use crate::{KvStore, Registry, RegistryError, SessionEntry};

// ---------------------------------------------------------------------------
// PartitionId
// ---------------------------------------------------------------------------

/// Identifies one device within one application: `AppEUI ‖ DevAddr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionId([u8; 12]);

impl PartitionId {
    pub fn new(app_eui: AppEui, dev_addr: DevAddr) -> Self {
        let mut id = [0u8; 12];
        id[..8].copy_from_slice(app_eui.as_bytes());
        id[8..].copy_from_slice(dev_addr.as_bytes());
        Self(id)
    }

    pub fn app_eui(&self) -> AppEui {
        let mut eui = [0u8; 8];
        eui.copy_from_slice(&self.0[..8]);
        AppEui(eui)
    }

    pub fn dev_addr(&self) -> DevAddr {
        let mut addr = [0u8; 4];
        addr.copy_from_slice(&self.0[8..]);
        DevAddr(addr)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.app_eui(), self.dev_addr())
    }
}

// ---------------------------------------------------------------------------
// Partition
// ---------------------------------------------------------------------------

/// The packets of one batch that belong to one device.
///
/// A partition is a plain value: it's built fresh by every
/// [`Registry::partition`] call, handed to the caller, and holds no
/// reference back to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition<P> {
    pub id: PartitionId,
    /// The session the packets were matched against, as it was when the
    /// partition was built.
    pub session: SessionEntry,
    /// In the order they were offered to the partitioner.
    pub packets: Vec<P>,
    /// The entry each packet validated under, index-aligned with
    /// `packets`. A re-activated device has several entries with the same
    /// id, so this can differ from `session` for some packets.
    pub matched_by: Vec<SessionEntry>,
}

impl<P> Partition<P> {
    fn new(session: SessionEntry) -> Self {
        Self {
            id: PartitionId::new(session.app_eui, session.dev_addr),
            session,
            packets: Vec::new(),
            matched_by: Vec::new(),
        }
    }

    fn push(&mut self, packet: P, session: SessionEntry) {
        self.packets.push(packet);
        self.matched_by.push(session);
    }

    /// Each packet paired with the entry whose network key validated it.
    /// Decrypt with that entry's keys, not with `session`.
    pub fn matches(&self) -> impl Iterator<Item = (&P, &SessionEntry)> {
        self.packets.iter().zip(&self.matched_by)
    }
}

// ---------------------------------------------------------------------------
// Registry::partition
// ---------------------------------------------------------------------------

impl<S: KvStore> Registry<S> {
    /// Splits a batch of packets into per-device partitions.
    ///
    /// For every packet, in order:
    ///
    /// 1. Read its short address. A packet without one poisons the whole
    ///    batch: the call fails with [`RegistryError::InvalidStructure`].
    /// 2. Look up the sessions registered under that address.
    /// 3. Try each session's network session key against the packet's MIC.
    ///    The **first** key that validates wins and the search stops.
    ///    There's no better criterion than lookup order, so if two keys
    ///    ever validated the same packet, the older session gets it.
    /// 4. Append the packet to that session's partition.
    ///
    /// A packet no session validates is left out of the result. It isn't
    /// an error on its own. If *no* packet of the batch matched, the
    /// call fails with [`RegistryError::NotFound`].
    ///
    /// Each lookup is its own transaction. A session stored for the same
    /// address while this runs may or may not be seen; callers that can't
    /// tolerate that must not store and partition concurrently.
    ///
    /// The order of the returned partitions is unspecified.
    pub fn partition<P, I>(
        &self,
        packets: I,
    ) -> Result<Vec<Partition<P>>, RegistryError>
    where
        P: Packet,
        I: IntoIterator<Item = P>,
    {
        let mut partitions: HashMap<PartitionId, Partition<P>> = HashMap::new();

        for packet in packets {
            let dev_addr = packet.dev_addr().map_err(|e| {
                RegistryError::InvalidStructure(format!(
                    "packet without usable address: {e}"
                ))
            })?;

            let candidates = self.lookup(dev_addr)?;

            let matched = candidates.into_iter().find(|candidate| {
                match packet.validate_mic(&candidate.nwk_skey) {
                    Ok(valid) => valid,
                    Err(e) => {
                        tracing::trace!(
                            %dev_addr,
                            app_eui = %candidate.app_eui,
                            error = %e,
                            "MIC check failed, skipping candidate"
                        );
                        false
                    }
                }
            });

            match matched {
                Some(session) => {
                    let id = PartitionId::new(session.app_eui, session.dev_addr);
                    partitions
                        .entry(id)
                        .or_insert_with(|| Partition::new(session))
                        .push(packet, session);
                }
                None => {
                    tracing::debug!(%dev_addr, "no session validated packet, dropping it");
                }
            }
        }

        if partitions.is_empty() {
            return Err(RegistryError::NotFound);
        }

        tracing::debug!(partitions = partitions.len(), "batch partitioned");
        Ok(partitions.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    //! Partitioning against fake packets.
    //!
    //! `FakePacket` lets each test say exactly which key a packet
    //! validates under, without building real frames. Real LoRaWAN frames
    //! are covered in `tests/partition.rs`.

    use lorahub_packet::{Aes128Key, PacketError};

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct FakePacket {
        name: &'static str,
        addr: Option<DevAddr>,
        valid_under: Option<Aes128Key>,
        /// A key under which the MIC check itself fails.
        errors_under: Option<Aes128Key>,
    }

    impl Packet for FakePacket {
        fn dev_addr(&self) -> Result<DevAddr, PacketError> {
            self.addr.ok_or(PacketError::Truncated {
                needed: 12,
                actual: 0,
            })
        }

        fn validate_mic(&self, key: &Aes128Key) -> Result<bool, PacketError> {
            if self.errors_under.as_ref() == Some(key) {
                return Err(PacketError::InvalidKey("rejected by backend".into()));
            }
            Ok(self.valid_under.as_ref() == Some(key))
        }
    }

    // -- Helpers ----------------------------------------------------------

    fn key(n: u8) -> Aes128Key {
        Aes128Key::new([n; 16])
    }

    fn addr(last: u8) -> DevAddr {
        DevAddr([0x26, 0x01, 0x00, last])
    }

    fn entry(app: u8, dev_addr: DevAddr, nwk: u8) -> SessionEntry {
        SessionEntry {
            app_eui: AppEui([app; 8]),
            app_skey: key(nwk.wrapping_add(100)),
            dev_addr,
            nwk_skey: key(nwk),
        }
    }

    fn packet(name: &'static str, dev_addr: DevAddr, valid: u8) -> FakePacket {
        FakePacket {
            name,
            addr: Some(dev_addr),
            valid_under: Some(key(valid)),
            errors_under: None,
        }
    }

    fn registry_with(entries: &[SessionEntry]) -> Registry {
        let registry = Registry::in_memory().expect("registry");
        for e in entries {
            registry.store(e.dev_addr, *e).expect("store");
        }
        registry
    }

    fn find(
        partitions: &[Partition<FakePacket>],
        id: PartitionId,
    ) -> &Partition<FakePacket> {
        partitions
            .iter()
            .find(|p| p.id == id)
            .unwrap_or_else(|| panic!("no partition {id}"))
    }

    fn names(partition: &Partition<FakePacket>) -> Vec<&'static str> {
        partition.packets.iter().map(|p| p.name).collect()
    }

    // =====================================================================
    // PartitionId
    // =====================================================================

    #[test]
    fn test_partition_id_layout_is_app_eui_then_dev_addr() {
        let id = PartitionId::new(AppEui([1; 8]), DevAddr([2, 3, 4, 5]));

        assert_eq!(&id.as_bytes()[..8], &[1; 8]);
        assert_eq!(&id.as_bytes()[8..], &[2, 3, 4, 5]);
        assert_eq!(id.app_eui(), AppEui([1; 8]));
        assert_eq!(id.dev_addr(), DevAddr([2, 3, 4, 5]));
        assert_eq!(id.to_string(), "0101010101010101/02030405");
    }

    // =====================================================================
    // partition()
    // =====================================================================

    #[test]
    fn test_partition_collision_picks_validating_session() {
        let e1 = entry(1, addr(1), 10);
        let e2 = entry(2, addr(1), 20);
        let registry = registry_with(&[e1, e2]);

        let partitions = registry
            .partition(vec![packet("p", addr(1), 20)])
            .expect("should partition");

        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].session, e2);
        assert_eq!(partitions[0].id, PartitionId::new(e2.app_eui, addr(1)));
    }

    #[test]
    fn test_partition_first_match_wins() {
        // Two sessions with the same network key: only lookup order can
        // decide, and the older one wins.
        let older = entry(1, addr(1), 10);
        let newer = entry(2, addr(1), 10);
        let registry = registry_with(&[older, newer]);

        let partitions = registry.partition(vec![packet("p", addr(1), 10)]).unwrap();

        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].session, older);
    }

    #[test]
    fn test_partition_preserves_input_order_within_partition() {
        let e1 = entry(1, addr(1), 10);
        let e2 = entry(2, addr(1), 20);
        let registry = registry_with(&[e1, e2]);

        let batch = vec![
            packet("a1", addr(1), 10),
            packet("b1", addr(1), 20),
            packet("a2", addr(1), 10),
            packet("a3", addr(1), 10),
            packet("b2", addr(1), 20),
        ];
        let partitions = registry.partition(batch).unwrap();

        assert_eq!(partitions.len(), 2);
        let a = find(&partitions, PartitionId::new(e1.app_eui, addr(1)));
        let b = find(&partitions, PartitionId::new(e2.app_eui, addr(1)));
        assert_eq!(names(a), vec!["a1", "a2", "a3"]);
        assert_eq!(names(b), vec!["b1", "b2"]);
    }

    #[test]
    fn test_partition_drops_unmatched_packets_silently() {
        let e1 = entry(1, addr(1), 10);
        let registry = registry_with(&[e1]);

        let partitions = registry
            .partition(vec![
                packet("good", addr(1), 10),
                packet("bad-key", addr(1), 99),
                packet("unknown-addr", addr(7), 10),
            ])
            .unwrap();

        assert_eq!(partitions.len(), 1);
        assert_eq!(names(&partitions[0]), vec!["good"]);
    }

    #[test]
    fn test_partition_unknown_address_returns_not_found() {
        let registry = registry_with(&[entry(1, addr(1), 10)]);

        let result = registry.partition(vec![packet("p", addr(2), 10)]);

        assert!(matches!(result, Err(RegistryError::NotFound)));
    }

    #[test]
    fn test_partition_no_key_validates_returns_not_found() {
        let registry =
            registry_with(&[entry(1, addr(1), 10), entry(2, addr(1), 20)]);

        let result = registry.partition(vec![
            packet("p1", addr(1), 30),
            packet("p2", addr(1), 40),
        ]);

        assert!(matches!(result, Err(RegistryError::NotFound)));
    }

    #[test]
    fn test_partition_empty_batch_returns_not_found() {
        let registry = registry_with(&[entry(1, addr(1), 10)]);

        let result = registry.partition(Vec::<FakePacket>::new());

        assert!(matches!(result, Err(RegistryError::NotFound)));
    }

    #[test]
    fn test_partition_address_less_packet_aborts_batch() {
        // The first packet would match, but one bad packet invalidates
        // the whole call. No partial result.
        let registry = registry_with(&[entry(1, addr(1), 10)]);
        let broken = FakePacket {
            name: "broken",
            addr: None,
            valid_under: None,
            errors_under: None,
        };

        let result = registry.partition(vec![
            packet("good", addr(1), 10),
            broken,
            packet("good2", addr(1), 10),
        ]);

        assert!(matches!(result, Err(RegistryError::InvalidStructure(_))));
    }

    #[test]
    fn test_partition_mic_error_skips_to_next_candidate() {
        let first = entry(1, addr(1), 10);
        let second = entry(2, addr(1), 20);
        let registry = registry_with(&[first, second]);
        let flaky = FakePacket {
            name: "flaky",
            addr: Some(addr(1)),
            valid_under: Some(key(20)),
            errors_under: Some(key(10)),
        };

        let partitions = registry.partition(vec![flaky]).unwrap();

        assert_eq!(partitions.len(), 1);
        assert_eq!(partitions[0].session, second);
        assert_eq!(names(&partitions[0]), vec!["flaky"]);
    }

    #[test]
    fn test_partition_mic_error_on_only_candidate_drops_packet() {
        let registry = registry_with(&[entry(1, addr(1), 10)]);
        let flaky = FakePacket {
            name: "flaky",
            addr: Some(addr(1)),
            valid_under: None,
            errors_under: Some(key(10)),
        };

        let result = registry.partition(vec![flaky]);

        assert!(matches!(result, Err(RegistryError::NotFound)));
    }

    #[test]
    fn test_partition_corrupt_stored_value_aborts_batch() {
        // The first packet matches; the second address holds garbage.
        let registry = registry_with(&[entry(1, addr(1), 10)]);
        registry
            .store
            .update(registry.bucket(), addr(2).as_bytes(), |_| vec![0x00, 0x34, 0x01])
            .unwrap();

        let result = registry.partition(vec![
            packet("good", addr(1), 10),
            packet("victim", addr(2), 10),
        ]);

        assert!(matches!(result, Err(RegistryError::InvalidStructure(_))));
    }

    #[test]
    fn test_partition_reactivated_device_records_matching_entry_per_packet() {
        // Same app and address twice: one partition, two key sets.
        let old = entry(1, addr(1), 10);
        let new = entry(1, addr(1), 20);
        let registry = registry_with(&[old, new]);

        let partitions = registry
            .partition(vec![
                packet("old-keys", addr(1), 10),
                packet("new-keys", addr(1), 20),
            ])
            .unwrap();

        assert_eq!(partitions.len(), 1);
        let matched: Vec<_> = partitions[0]
            .matches()
            .map(|(p, e)| (p.name, e.nwk_skey))
            .collect();
        assert_eq!(matched, vec![("old-keys", key(10)), ("new-keys", key(20))]);
    }

    #[test]
    fn test_partition_same_app_different_addresses_are_separate() {
        let e1 = entry(1, addr(1), 10);
        let e2 = entry(1, addr(2), 20);
        let registry = registry_with(&[e1, e2]);

        let partitions = registry
            .partition(vec![packet("x", addr(1), 10), packet("y", addr(2), 20)])
            .unwrap();

        assert_eq!(partitions.len(), 2);
        assert_eq!(names(find(&partitions, PartitionId::new(e1.app_eui, addr(1)))), vec!["x"]);
        assert_eq!(names(find(&partitions, PartitionId::new(e2.app_eui, addr(2)))), vec!["y"]);
    }

    #[test]
    fn test_partition_accepts_borrowed_packets() {
        let registry = registry_with(&[entry(1, addr(1), 10)]);
        let batch = vec![packet("p", addr(1), 10)];

        let partitions = registry.partition(batch.iter()).unwrap();

        assert_eq!(partitions[0].packets, vec![&batch[0]]);
    }
}
