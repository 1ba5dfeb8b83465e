//! The async handler facade and its builder.
//!
//! The registry is synchronous and does blocking I/O, so every call into
//! it runs on Tokio's blocking pool. Monitoring runs on the async side,
//! after the registry has answered.

use std::sync::Arc;

use lorahub_monitor::{
    Codec, Component, DiscardSink, JsonCodec, MonitorClient, MonitorSink, StatusRecord,
    StreamKind, UplinkRecord,
};
use lorahub_packet::{AppEui, DevAddr, PacketError, PhyPayload};
use lorahub_registry::{
    KvStore, RedbStore, Registry, RegistryError, SessionEntry, SessionKeys,
};
use serde::Serialize;

use crate::HubError;
use crate::uplink::{AppFrame, Counters, DeviceUplink, HandlerStats};

/// Builder for a [`Handler`].
///
/// Without further configuration the handler reports to a
/// [`DiscardSink`] using [`JsonCodec`].
///
/// # Example
///
/// ```rust
/// use lorahub::prelude::*;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), HubError> {
/// let monitor = ChannelSink::spawn(64);
/// let handler = HandlerBuilder::new(Registry::in_memory()?)
///     .monitor(monitor)
///     .build();
///
/// let session = handler
///     .activate(AppEui([1; 8]), DevAddr([0x26, 0x01, 0x02, 0x03]))
///     .await?;
/// assert_eq!(session.dev_addr, DevAddr([0x26, 0x01, 0x02, 0x03]));
/// # Ok(())
/// # }
/// ```
pub struct HandlerBuilder<S: KvStore, M = DiscardSink, C = JsonCodec> {
    registry: Registry<S>,
    sink: M,
    codec: C,
}

impl<S: KvStore + 'static> HandlerBuilder<S> {
    /// Starts a builder around an open registry.
    pub fn new(registry: Registry<S>) -> Self {
        Self {
            registry,
            sink: DiscardSink,
            codec: JsonCodec,
        }
    }
}

impl<S, M, C> HandlerBuilder<S, M, C>
where
    S: KvStore + 'static,
    M: MonitorSink,
    C: Codec + Clone,
{
    /// Sets the monitoring sink.
    pub fn monitor<M2: MonitorSink>(self, sink: M2) -> HandlerBuilder<S, M2, C> {
        HandlerBuilder {
            registry: self.registry,
            sink,
            codec: self.codec,
        }
    }

    /// Sets the codec used to serialize monitoring records.
    pub fn codec<C2: Codec + Clone>(self, codec: C2) -> HandlerBuilder<S, M, C2> {
        HandlerBuilder {
            registry: self.registry,
            sink: self.sink,
            codec,
        }
    }

    /// Finishes the handler. The registry is shared from here on.
    pub fn build(self) -> Handler<S, M, C> {
        tracing::info!(bucket = %self.registry.bucket(), "handler ready");
        Handler {
            registry: Arc::new(self.registry),
            monitor: MonitorClient::new(self.sink, self.codec),
            stats: Counters::default(),
        }
    }
}

/// Resolves uplink batches to devices and decrypts them.
///
/// All methods take `&self`; share a handler across tasks with an `Arc`.
pub struct Handler<S: KvStore = RedbStore, M = DiscardSink, C = JsonCodec> {
    registry: Arc<Registry<S>>,
    monitor: MonitorClient<M, C>,
    stats: Counters,
}

impl<S, M, C> Handler<S, M, C>
where
    S: KvStore + 'static,
    M: MonitorSink,
    C: Codec + Clone,
{
    /// Creates a session with fresh keys for a device and stores it.
    ///
    /// The address may already be in use by another device; both sessions
    /// are kept and uplinks are told apart by their MIC.
    pub async fn activate(
        &self,
        app_eui: AppEui,
        dev_addr: DevAddr,
    ) -> Result<SessionEntry, HubError> {
        let entry = SessionEntry::new(app_eui, dev_addr, SessionKeys::generate());
        self.register(entry).await?;
        Ok(entry)
    }

    /// Stores an existing session under its own address.
    pub async fn register(&self, entry: SessionEntry) -> Result<(), HubError> {
        self.blocking(move |registry| registry.store(entry.dev_addr, entry))
            .await
    }

    /// Every session registered under `dev_addr`, oldest first.
    pub async fn sessions(&self, dev_addr: DevAddr) -> Result<Vec<SessionEntry>, HubError> {
        self.blocking(move |registry| registry.lookup(dev_addr)).await
    }

    /// Resolves a batch of uplinks to devices and decrypts their payloads.
    ///
    /// Frames no session validates are dropped from the result and
    /// counted in the status record. Each frame is decrypted with the keys
    /// of the session that validated it (application session key, or the
    /// network session key on port 0).
    ///
    /// Publishes one `HandlerUplink` record per matched frame and one
    /// `HandlerStatus` record per batch. A failing monitor is logged and
    /// otherwise ignored.
    ///
    /// # Errors
    /// - [`RegistryError::NotFound`] (wrapped) if no frame matched.
    /// - [`RegistryError::InvalidStructure`] (wrapped) if any frame has no
    ///   device address; nothing of the batch is returned then.
    /// - Storage and task failures.
    pub async fn handle_uplinks(
        &self,
        packets: Vec<PhyPayload>,
    ) -> Result<Vec<DeviceUplink>, HubError> {
        let batch = packets.len();
        self.stats.batch(batch);

        let partitions = match self
            .blocking(move |registry| registry.partition(packets))
            .await
        {
            Ok(partitions) => partitions,
            Err(HubError::Registry(RegistryError::NotFound)) => {
                tracing::debug!(batch, "no session matched the batch");
                self.stats.resolved(0, batch as u64);
                self.publish_status(batch, 0, 0).await;
                return Err(RegistryError::NotFound.into());
            }
            Err(e) => {
                tracing::debug!(batch, error = %e, "uplink batch rejected");
                self.stats.rejected();
                return Err(e);
            }
        };

        let partition_count = partitions.len();
        let mut uplinks = Vec::with_capacity(partition_count);
        let mut records = Vec::new();

        for partition in partitions {
            let mut frames = Vec::with_capacity(partition.packets.len());
            for (packet, session) in partition.matches() {
                let frame = decrypt(packet, session)?;
                records.push(UplinkRecord {
                    app_eui: Some(session.app_eui),
                    dev_addr: session.dev_addr,
                    fcnt: frame.fcnt,
                    fport: frame.fport,
                    payload: frame.payload.clone(),
                });
                frames.push(frame);
            }
            uplinks.push(DeviceUplink {
                id: partition.id,
                frames,
            });
        }

        let matched = records.len();
        let dropped = batch - matched;
        self.stats.resolved(matched as u64, dropped as u64);
        tracing::debug!(
            batch,
            matched,
            dropped,
            partitions = partition_count,
            "uplink batch resolved"
        );

        self.publish(StreamKind::HandlerUplink, &records).await;
        self.publish_status(batch, matched, partition_count).await;

        Ok(uplinks)
    }

    /// Deletes every stored session.
    pub async fn reset(&self) -> Result<(), HubError> {
        self.blocking(|registry| registry.reset()).await
    }

    /// Cumulative counters since the handler was built.
    pub fn stats(&self) -> HandlerStats {
        self.stats.snapshot()
    }

    /// The registry, for synchronous lookups outside the blocking pool.
    pub fn registry(&self) -> &Registry<S> {
        &self.registry
    }

    /// The monitoring sink records are published to.
    pub fn monitor(&self) -> &M {
        self.monitor.sink()
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Runs `f` against the registry on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, HubError>
    where
        T: Send + 'static,
        F: FnOnce(&Registry<S>) -> Result<T, RegistryError> + Send + 'static,
    {
        let registry = Arc::clone(&self.registry);
        let result = tokio::task::spawn_blocking(move || f(&registry)).await?;
        Ok(result?)
    }

    async fn publish_status(&self, batch: usize, matched: usize, partitions: usize) {
        let status = StatusRecord::new(Component::Handler)
            .with("batch", batch as u64)
            .with("matched", matched as u64)
            .with("dropped", (batch - matched) as u64)
            .with("partitions", partitions as u64);
        self.publish(StreamKind::HandlerStatus, &[status]).await;
    }

    async fn publish<T: Serialize + Sync>(&self, kind: StreamKind, records: &[T]) {
        if records.is_empty() {
            return;
        }
        if let Err(e) = self.monitor.publish(kind, records).await {
            tracing::warn!(%kind, error = %e, "monitor publish failed");
        }
    }
}

fn decrypt(packet: &PhyPayload, session: &SessionEntry) -> Result<AppFrame, PacketError> {
    let frame = packet.data_frame()?;
    let payload = packet.decrypt_payload(session.payload_key(frame.fport))?;
    Ok(AppFrame {
        fcnt: frame.fcnt,
        fport: frame.fport,
        payload,
    })
}
