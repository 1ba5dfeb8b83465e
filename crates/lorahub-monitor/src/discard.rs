use crate::{Ack, MonitorError, MonitorSink, RecordStream, StreamKind};

/// A sink that accepts every record and keeps none of them.
///
/// The default when no monitoring service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardSink;

impl MonitorSink for DiscardSink {
    type Stream = DiscardStream;

    async fn open(&self, kind: StreamKind) -> Result<DiscardStream, MonitorError> {
        Ok(DiscardStream { kind })
    }
}

#[derive(Debug)]
pub struct DiscardStream {
    kind: StreamKind,
}

impl RecordStream for DiscardStream {
    fn kind(&self) -> StreamKind {
        self.kind
    }

    async fn send(&mut self, _record: &[u8]) -> Result<(), MonitorError> {
        Ok(())
    }

    async fn close_and_recv(self) -> Result<Ack, MonitorError> {
        Ok(Ack)
    }
}
