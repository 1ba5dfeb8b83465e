//! Integration tests for the in-process sinks and the typed client.

use lorahub_monitor::{
    Ack, ChannelSink, Codec, Component, DiscardSink, JsonCodec, MonitorClient,
    MonitorError, MonitorSink, RecordStream, StatusRecord, StreamKind, UplinkRecord,
};
use lorahub_packet::{AppEui, DevAddr};

fn uplink(fcnt: u16) -> UplinkRecord {
    UplinkRecord {
        app_eui: Some(AppEui([0xAA; 8])),
        dev_addr: DevAddr([0x26, 0x01, 0x02, 0x03]),
        fcnt,
        fport: Some(1),
        payload: vec![fcnt as u8],
    }
}

// =========================================================================
// ChannelSink
// =========================================================================

#[tokio::test]
async fn test_channel_sink_close_returns_ack() {
    let sink = ChannelSink::spawn(16);
    let mut stream = sink.open(StreamKind::GatewayStatus).await.unwrap();
    stream.send(b"up").await.unwrap();

    let ack = stream.close_and_recv().await.unwrap();

    assert_eq!(ack, Ack);
    assert_eq!(sink.closed_streams(StreamKind::GatewayStatus).await.unwrap(), 1);
}

#[tokio::test]
async fn test_channel_sink_keeps_records_per_kind_in_send_order() {
    let sink = ChannelSink::spawn(16);
    let mut uplinks = sink.open(StreamKind::HandlerUplink).await.unwrap();
    let mut status = sink.open(StreamKind::HandlerStatus).await.unwrap();

    uplinks.send(b"one").await.unwrap();
    status.send(b"status").await.unwrap();
    uplinks.send(b"two").await.unwrap();
    uplinks.close_and_recv().await.unwrap();
    status.close_and_recv().await.unwrap();

    assert_eq!(
        sink.records(StreamKind::HandlerUplink).await.unwrap(),
        vec![b"one".to_vec(), b"two".to_vec()]
    );
    assert_eq!(
        sink.records(StreamKind::HandlerStatus).await.unwrap(),
        vec![b"status".to_vec()]
    );
    assert!(sink.records(StreamKind::RouterStatus).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_channel_sink_closing_empty_stream_still_acks() {
    let sink = ChannelSink::spawn(4);
    let stream = sink.open(StreamKind::NetworkServerStatus).await.unwrap();

    assert_eq!(stream.kind(), StreamKind::NetworkServerStatus);
    assert_eq!(stream.close_and_recv().await.unwrap(), Ack);
    assert!(
        sink.records(StreamKind::NetworkServerStatus)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_channel_sink_after_shutdown_is_unavailable() {
    let sink = ChannelSink::spawn(4);
    let mut stream = sink.open(StreamKind::BrokerUplink).await.unwrap();

    sink.shutdown().await.unwrap();
    // Commands are handled in order, so this query lands after the shutdown.
    assert!(matches!(
        sink.records(StreamKind::BrokerUplink).await,
        Err(MonitorError::Unavailable)
    ));

    let result = stream.send(b"late").await;
    assert!(matches!(
        result,
        Err(MonitorError::StreamClosed(StreamKind::BrokerUplink))
    ));
    assert!(matches!(
        sink.open(StreamKind::BrokerUplink).await,
        Err(MonitorError::Unavailable)
    ));
}

// =========================================================================
// DiscardSink
// =========================================================================

#[tokio::test]
async fn test_discard_sink_accepts_every_kind() {
    for kind in StreamKind::ALL {
        let mut stream = DiscardSink.open(kind).await.unwrap();
        stream.send(b"ignored").await.unwrap();
        assert_eq!(stream.close_and_recv().await.unwrap(), Ack);
    }
}

// =========================================================================
// MonitorClient
// =========================================================================

#[tokio::test]
async fn test_client_publish_encodes_with_codec() {
    let sink = ChannelSink::spawn(16);
    let client = MonitorClient::new(sink.clone(), JsonCodec);
    let records = vec![uplink(1), uplink(2)];

    client
        .publish(StreamKind::HandlerUplink, &records)
        .await
        .unwrap();

    let raw = sink.records(StreamKind::HandlerUplink).await.unwrap();
    let decoded: Vec<UplinkRecord> = raw
        .iter()
        .map(|bytes| JsonCodec.decode(bytes).unwrap())
        .collect();
    assert_eq!(decoded, records);
    assert_eq!(sink.closed_streams(StreamKind::HandlerUplink).await.unwrap(), 1);
}

#[tokio::test]
async fn test_client_typed_stream_sends_one_record_at_a_time() {
    let sink = ChannelSink::spawn(16);
    let client = MonitorClient::new(sink.clone(), JsonCodec);

    let mut stream = client
        .open::<StatusRecord>(StreamKind::HandlerStatus)
        .await
        .unwrap();
    assert_eq!(stream.kind(), StreamKind::HandlerStatus);
    stream
        .send(&StatusRecord::new(Component::Handler).with("uplinks", 4))
        .await
        .unwrap();
    stream.close_and_recv().await.unwrap();

    let raw = sink.records(StreamKind::HandlerStatus).await.unwrap();
    assert_eq!(raw.len(), 1);
    let status: StatusRecord = JsonCodec.decode(&raw[0]).unwrap();
    assert_eq!(status.get("uplinks"), Some(4));
}
