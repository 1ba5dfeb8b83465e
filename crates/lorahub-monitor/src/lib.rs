//! Monitoring side channel for Lorahub.
//!
//! Every stage of the pipeline (gateway → router → broker → handler →
//! network server) streams status and traffic records to a monitoring
//! service. This crate provides:
//!
//! - The [`MonitorSink`] and [`RecordStream`] traits: open a long-lived
//!   stream of one [`StreamKind`], push serialized records, close it and
//!   get a single [`Ack`] back.
//! - A [`Codec`] that turns typed records into bytes ([`JsonCodec`]).
//! - Record types ([`StatusRecord`], [`UplinkRecord`]).
//! - Sinks: [`ChannelSink`] (in-process collector actor) and
//!   [`DiscardSink`] (accepts and forgets).
//! - [`MonitorClient`], which ties a sink and a codec together.
//!
//! Monitoring is observability only. Nothing here influences how packets
//! are resolved to devices.
//!
//! # Feature Flags
//!
//! - `json` (default) — [`JsonCodec`] via `serde_json`

mod channel;
mod client;
mod codec;
mod discard;
mod error;
mod records;

pub use channel::{ChannelSink, ChannelStream};
pub use client::{MonitorClient, TypedStream};
pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use discard::{DiscardSink, DiscardStream};
pub use error::MonitorError;
pub use records::{StatusRecord, UplinkRecord};

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// StreamKind
// ---------------------------------------------------------------------------

/// A pipeline component that reports to the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    Router,
    Gateway,
    Broker,
    Handler,
    NetworkServer,
}

/// What a stream carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feed {
    Status,
    Uplink,
    Downlink,
}

/// One of the monitor's streams: a component paired with a feed.
///
/// Routers and network servers only report status, so not every pair
/// exists. The valid pairs are listed explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    RouterStatus,
    GatewayStatus,
    GatewayUplink,
    GatewayDownlink,
    BrokerStatus,
    BrokerUplink,
    BrokerDownlink,
    HandlerStatus,
    HandlerUplink,
    HandlerDownlink,
    NetworkServerStatus,
}

impl StreamKind {
    /// Every stream the monitor accepts.
    pub const ALL: [StreamKind; 11] = [
        Self::RouterStatus,
        Self::GatewayStatus,
        Self::GatewayUplink,
        Self::GatewayDownlink,
        Self::BrokerStatus,
        Self::BrokerUplink,
        Self::BrokerDownlink,
        Self::HandlerStatus,
        Self::HandlerUplink,
        Self::HandlerDownlink,
        Self::NetworkServerStatus,
    ];

    pub fn component(self) -> Component {
        match self {
            Self::RouterStatus => Component::Router,
            Self::GatewayStatus | Self::GatewayUplink | Self::GatewayDownlink => {
                Component::Gateway
            }
            Self::BrokerStatus | Self::BrokerUplink | Self::BrokerDownlink => {
                Component::Broker
            }
            Self::HandlerStatus | Self::HandlerUplink | Self::HandlerDownlink => {
                Component::Handler
            }
            Self::NetworkServerStatus => Component::NetworkServer,
        }
    }

    pub fn feed(self) -> Feed {
        match self {
            Self::RouterStatus
            | Self::GatewayStatus
            | Self::BrokerStatus
            | Self::HandlerStatus
            | Self::NetworkServerStatus => Feed::Status,
            Self::GatewayUplink | Self::BrokerUplink | Self::HandlerUplink => {
                Feed::Uplink
            }
            Self::GatewayDownlink | Self::BrokerDownlink | Self::HandlerDownlink => {
                Feed::Downlink
            }
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}", self.component(), self.feed())
    }
}

// ---------------------------------------------------------------------------
// Sink traits
// ---------------------------------------------------------------------------

/// The empty acknowledgement a stream returns when it's closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ack;

/// Opens record streams to a monitoring service.
///
/// # Trait bounds
///
/// - `Send + Sync + 'static` → one sink is shared by every task of the
///   handler for its whole life.
/// - The returned futures are `Send` so callers can drive them from
///   spawned tasks.
pub trait MonitorSink: Send + Sync + 'static {
    /// The stream type produced by this sink.
    type Stream: RecordStream;

    /// Opens a new stream of the given kind.
    fn open(
        &self,
        kind: StreamKind,
    ) -> impl Future<Output = Result<Self::Stream, MonitorError>> + Send;
}

/// A client-side stream of serialized records.
///
/// Records go out one by one with [`send`](RecordStream::send); the
/// service answers once, when the stream is closed.
pub trait RecordStream: Send + 'static {
    /// Which stream this is.
    fn kind(&self) -> StreamKind;

    /// Pushes one serialized record.
    fn send(
        &mut self,
        record: &[u8],
    ) -> impl Future<Output = Result<(), MonitorError>> + Send;

    /// Ends the stream and waits for the service's acknowledgement.
    fn close_and_recv(
        self,
    ) -> impl Future<Output = Result<Ack, MonitorError>> + Send;
}
