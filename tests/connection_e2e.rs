//! End-to-end runs of the connection driver over an in-memory socket.

use beats_input::protocol::compress_frames;
use beats_input::types::Frame;
use beats_input::{BeatsConfig, ChannelSink, ConnectionHandler, FrameDecoder};
use bytes::BytesMut;
use futures::StreamExt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::codec::Encoder;
use tokio_util::sync::CancellationToken;

const FILEBEAT: &str = include_str!("fixtures/filebeat.json");
const PACKETBEAT_DNS: &str = include_str!("fixtures/packetbeat-dns.json");
const TOPBEAT_SYSTEM: &str = include_str!("fixtures/topbeat-system.json");

fn encode(frames: Vec<Frame>) -> Vec<u8> {
    let mut encoder = FrameDecoder::default();
    let mut out = BytesMut::new();
    for frame in frames {
        encoder.encode(frame, &mut out).unwrap();
    }
    out.to_vec()
}

fn batch() -> Vec<Frame> {
    vec![
        Frame::WindowSize { count: 3 },
        Frame::json(1, FILEBEAT),
        Frame::json(2, PACKETBEAT_DNS),
        Frame::json(3, TOPBEAT_SYSTEM),
    ]
}

async fn exchange(input: Vec<u8>) -> (Vec<String>, Vec<u8>) {
    let _ = tracing_subscriber::fmt::try_init();
    let (mut peer, server) = tokio::io::duplex(64 * 1024);
    let (sink, messages) = ChannelSink::new(16);

    let handler = ConnectionHandler::new("e2e", &BeatsConfig::default());
    let server_task =
        tokio::spawn(async move { handler.run(server, &sink, CancellationToken::new()).await });

    peer.write_all(&input).await.unwrap();
    let mut ack = vec![0u8; 6];
    tokio::time::timeout(Duration::from_secs(2), peer.read_exact(&mut ack))
        .await
        .expect("ack within timeout")
        .unwrap();
    drop(peer);

    let stats = server_task.await.unwrap().unwrap();
    assert_eq!(stats.acks, 1);

    let facilities: Vec<String> = messages.map(|m| m.facility().to_string()).collect().await;
    (facilities, ack)
}

#[tokio::test]
async fn plain_batch_is_normalized_and_acked() {
    let (facilities, ack) = exchange(encode(batch())).await;
    assert_eq!(facilities, ["filebeat", "packetbeat", "topbeat"]);
    assert_eq!(ack, b"2A\0\0\0\x03");
}

#[tokio::test]
async fn compressed_batch_matches_plain_batch() {
    let compressed = compress_frames(&batch(), 6).unwrap();
    let (facilities, ack) = exchange(encode(vec![compressed])).await;
    assert_eq!(facilities, ["filebeat", "packetbeat", "topbeat"]);
    assert_eq!(ack, b"2A\0\0\0\x03");
}
