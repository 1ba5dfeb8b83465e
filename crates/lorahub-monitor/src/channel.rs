//! In-process monitoring sink, run as an actor.
//!
//! A single Tokio task owns everything the sink has received. Streams and
//! the [`ChannelSink`] handle talk to it over an mpsc channel, and requests
//! that need an answer carry a oneshot reply channel.

use std::collections::HashMap;

use tokio::sync::{mpsc, oneshot};

use crate::{Ack, MonitorError, MonitorSink, RecordStream, StreamKind};

/// Commands sent to the collector task.
enum SinkCommand {
    Record {
        kind: StreamKind,
        data: Vec<u8>,
    },
    Close {
        kind: StreamKind,
        sent: u64,
        reply: oneshot::Sender<Ack>,
    },
    Records {
        kind: StreamKind,
        reply: oneshot::Sender<Vec<Vec<u8>>>,
    },
    ClosedStreams {
        kind: StreamKind,
        reply: oneshot::Sender<u64>,
    },
    Shutdown,
}

/// Handle to a running collector. Cheap to clone.
///
/// Useful in tests and demos, where the "monitoring service" is just
/// something to read records back from.
#[derive(Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<SinkCommand>,
}

impl ChannelSink {
    /// Spawns the collector task and returns a handle to it.
    ///
    /// `capacity` bounds the command channel; when it fills up, senders
    /// wait. Must be called from within a Tokio runtime.
    pub fn spawn(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);

        let collector = Collector {
            records: HashMap::new(),
            closed: HashMap::new(),
            receiver: rx,
        };
        tokio::spawn(collector.run());

        Self { sender: tx }
    }

    /// Every record received on streams of `kind`, in arrival order.
    pub async fn records(&self, kind: StreamKind) -> Result<Vec<Vec<u8>>, MonitorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SinkCommand::Records {
                kind,
                reply: reply_tx,
            })
            .await
            .map_err(|_| MonitorError::Unavailable)?;
        reply_rx.await.map_err(|_| MonitorError::Unavailable)
    }

    /// How many streams of `kind` have been closed so far.
    pub async fn closed_streams(&self, kind: StreamKind) -> Result<u64, MonitorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SinkCommand::ClosedStreams {
                kind,
                reply: reply_tx,
            })
            .await
            .map_err(|_| MonitorError::Unavailable)?;
        reply_rx.await.map_err(|_| MonitorError::Unavailable)
    }

    /// Stops the collector. Later calls on any handle or stream fail with
    /// [`MonitorError::Unavailable`].
    pub async fn shutdown(&self) -> Result<(), MonitorError> {
        self.sender
            .send(SinkCommand::Shutdown)
            .await
            .map_err(|_| MonitorError::Unavailable)
    }
}

impl MonitorSink for ChannelSink {
    type Stream = ChannelStream;

    async fn open(&self, kind: StreamKind) -> Result<ChannelStream, MonitorError> {
        if self.sender.is_closed() {
            return Err(MonitorError::Unavailable);
        }
        Ok(ChannelStream {
            kind,
            sent: 0,
            sender: self.sender.clone(),
        })
    }
}

/// One open stream into a [`ChannelSink`].
pub struct ChannelStream {
    kind: StreamKind,
    sent: u64,
    sender: mpsc::Sender<SinkCommand>,
}

impl RecordStream for ChannelStream {
    fn kind(&self) -> StreamKind {
        self.kind
    }

    async fn send(&mut self, record: &[u8]) -> Result<(), MonitorError> {
        self.sender
            .send(SinkCommand::Record {
                kind: self.kind,
                data: record.to_vec(),
            })
            .await
            .map_err(|_| MonitorError::StreamClosed(self.kind))?;
        self.sent += 1;
        Ok(())
    }

    async fn close_and_recv(self) -> Result<Ack, MonitorError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(SinkCommand::Close {
                kind: self.kind,
                sent: self.sent,
                reply: reply_tx,
            })
            .await
            .map_err(|_| MonitorError::StreamClosed(self.kind))?;
        reply_rx
            .await
            .map_err(|_| MonitorError::StreamClosed(self.kind))
    }
}

/// The collector task's state.
struct Collector {
    records: HashMap<StreamKind, Vec<Vec<u8>>>,
    closed: HashMap<StreamKind, u64>,
    receiver: mpsc::Receiver<SinkCommand>,
}

impl Collector {
    async fn run(mut self) {
        tracing::debug!("monitor collector started");

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                SinkCommand::Record { kind, data } => {
                    self.records.entry(kind).or_default().push(data);
                }
                SinkCommand::Close { kind, sent, reply } => {
                    *self.closed.entry(kind).or_default() += 1;
                    tracing::debug!(%kind, records = sent, "monitor stream closed");
                    let _ = reply.send(Ack);
                }
                SinkCommand::Records { kind, reply } => {
                    let records = self.records.get(&kind).cloned().unwrap_or_default();
                    let _ = reply.send(records);
                }
                SinkCommand::ClosedStreams { kind, reply } => {
                    let count = self.closed.get(&kind).copied().unwrap_or(0);
                    let _ = reply.send(count);
                }
                SinkCommand::Shutdown => break,
            }
        }

        tracing::debug!("monitor collector stopped");
    }
}
