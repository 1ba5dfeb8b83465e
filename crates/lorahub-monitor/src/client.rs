//! Typed access to a monitoring sink.

use std::marker::PhantomData;

use serde::Serialize;

use crate::{Ack, Codec, MonitorError, MonitorSink, RecordStream, StreamKind};

/// A sink paired with the codec used to serialize records for it.
///
/// ## Example
///
/// ```rust
/// use lorahub_monitor::{
///     Component, DiscardSink, JsonCodec, MonitorClient, StatusRecord, StreamKind,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let client = MonitorClient::new(DiscardSink, JsonCodec);
/// let status = StatusRecord::new(Component::Handler).with("uplinks", 2);
///
/// client.publish(StreamKind::HandlerStatus, &[status]).await.unwrap();
/// # }
/// ```
pub struct MonitorClient<S, C> {
    sink: S,
    codec: C,
}

impl<S: MonitorSink, C: Codec + Clone> MonitorClient<S, C> {
    pub fn new(sink: S, codec: C) -> Self {
        Self { sink, codec }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Opens a stream that accepts records of type `T`.
    pub async fn open<T: Serialize>(
        &self,
        kind: StreamKind,
    ) -> Result<TypedStream<S::Stream, C, T>, MonitorError> {
        let inner = self.sink.open(kind).await?;
        Ok(TypedStream {
            inner,
            codec: self.codec.clone(),
            _record: PhantomData,
        })
    }

    /// Opens a stream, sends every record, and closes it.
    ///
    /// The service acknowledges once for the whole batch.
    pub async fn publish<T: Serialize>(
        &self,
        kind: StreamKind,
        records: &[T],
    ) -> Result<Ack, MonitorError> {
        let mut stream = self.open::<T>(kind).await?;
        for record in records {
            stream.send(record).await?;
        }
        stream.close_and_recv().await
    }
}

/// A [`RecordStream`] that serializes `T` before sending.
pub struct TypedStream<R, C, T> {
    inner: R,
    codec: C,
    // fn(&T) keeps the stream Send + Sync regardless of T.
    _record: PhantomData<fn(&T)>,
}

impl<R: RecordStream, C: Codec, T: Serialize> TypedStream<R, C, T> {
    pub fn kind(&self) -> StreamKind {
        self.inner.kind()
    }

    pub async fn send(&mut self, record: &T) -> Result<(), MonitorError> {
        let bytes = self.codec.encode(record)?;
        self.inner.send(&bytes).await
    }

    pub async fn close_and_recv(self) -> Result<Ack, MonitorError> {
        self.inner.close_and_recv().await
    }
}
