#![allow(dead_code)]

use std::ffi::OsString;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use tftp_client::{ClientConfig, Packet, BLOCK_SIZE};

pub const CLIENT_TIMEOUT: Duration = Duration::from_millis(100);
pub const CLIENT_RETRIES: u8 = 3;

/// A socket on 127.0.0.1 with an ephemeral port.
pub async fn bind() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.unwrap()
}

pub fn config(server: &UdpSocket) -> ClientConfig {
    ClientConfig::new(server.local_addr().unwrap())
        .with_timeout(CLIENT_TIMEOUT)
        .with_max_retries(CLIENT_RETRIES)
}

/// Next datagram, panicking if nothing shows up within two seconds.
pub async fn recv(socket: &UdpSocket) -> (Packet, SocketAddr) {
    recv_within(socket, Duration::from_secs(2))
        .await
        .expect("no datagram from client")
}

pub async fn recv_within(socket: &UdpSocket, wait: Duration) -> Option<(Packet, SocketAddr)> {
    let mut buf = [0u8; 1024];
    let (n, from) = timeout(wait, socket.recv_from(&mut buf)).await.ok()?.unwrap();
    Some((Packet::deserialize(&buf[..n]).unwrap(), from))
}

pub async fn send(socket: &UdpSocket, packet: &Packet, to: SocketAddr) {
    socket.send_to(&packet.serialize(), to).await.unwrap();
}

pub async fn send_raw(socket: &UdpSocket, bytes: &[u8], to: SocketAddr) {
    socket.send_to(bytes, to).await.unwrap();
}

/// Where `get_file` stages a download before renaming it into place.
pub fn part_path(local: &Path) -> PathBuf {
    let mut name = OsString::from(local.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

/// Deterministic test content.
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}

/// Serves one RRQ for `data` from a fresh TID, acking nothing twice.
/// Returns the ACK block numbers seen.
pub async fn serve_rrq(listen: UdpSocket, data: Vec<u8>) -> Vec<u16> {
    let (request, client) = recv(&listen).await;
    assert!(matches!(request, Packet::RRQ { .. }), "{request:?}");

    let tid = bind().await;
    let mut acks = Vec::new();
    let mut chunks = data.chunks(BLOCK_SIZE).map(<[u8]>::to_vec).collect::<Vec<_>>();
    if data.len() % BLOCK_SIZE == 0 {
        chunks.push(Vec::new());
    }
    for (i, chunk) in chunks.into_iter().enumerate() {
        // Truncation is the 16-bit wrap.
        let block = (i + 1) as u16;
        send(&tid, &Packet::DATA { block, data: chunk }, client).await;
        match recv(&tid).await.0 {
            Packet::ACK(ack) => {
                assert_eq!(ack, block);
                acks.push(ack);
            }
            other => panic!("expected ACK, got {other:?}"),
        }
    }
    acks
}

/// Accepts one WRQ from a fresh TID and acks every block.
/// Returns the DATA payloads in order.
pub async fn serve_wrq(listen: UdpSocket) -> Vec<Vec<u8>> {
    serve_wrq_numbered(listen)
        .await
        .into_iter()
        .map(|(_, data)| data)
        .collect()
}

/// Like [`serve_wrq`], keeping each payload's block number. Block numbers
/// must follow the 16-bit counter, wrapping from 65535 to 0.
pub async fn serve_wrq_numbered(listen: UdpSocket) -> Vec<(u16, Vec<u8>)> {
    let (request, client) = recv(&listen).await;
    assert!(matches!(request, Packet::WRQ { .. }), "{request:?}");

    let tid = bind().await;
    send(&tid, &Packet::ACK(0), client).await;

    let mut blocks = Vec::new();
    let mut expected: u16 = 1;
    loop {
        match recv(&tid).await.0 {
            Packet::DATA { block, data } => {
                assert_eq!(block, expected);
                send(&tid, &Packet::ACK(block), client).await;
                let last = data.len() < BLOCK_SIZE;
                blocks.push((block, data));
                if last {
                    return blocks;
                }
                expected = expected.wrapping_add(1);
            }
            other => panic!("expected DATA, got {other:?}"),
        }
    }
}
