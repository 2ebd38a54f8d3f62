//! The lock-step transfer engine.
//!
//! Both directions take over a [`Session`] right after the request
//! exchange, starting from the server's first reply.

use std::io;
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::packet::{describe, Packet};
use crate::session::Session;
use crate::BLOCK_SIZE;

/// Summary of a completed transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    /// DATA blocks exchanged, including the short final one
    pub blocks: u64,
    pub bytes: u64,
    pub elapsed: Duration,
}

impl Transfer {
    /// Bytes per second.
    pub fn rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Sends everything `reader` yields, one acknowledged block at a time.
///
/// `first_reply` is the server's answer to the WRQ and must be ACK 0. A
/// source whose length is a multiple of 512 ends with an empty block.
pub async fn upload<R>(
    session: &mut Session,
    first_reply: Packet,
    reader: &mut R,
) -> Result<Transfer>
where
    R: AsyncRead + Unpin,
{
    let start = Instant::now();
    let result = match first_reply {
        Packet::ACK(0) => send_blocks(session, reader).await,
        other => Err(unexpected(other, "ACK #0")),
    };
    finish(session, start, result).await
}

/// Writes the file the server sends into `writer`, starting from
/// `first_reply`, the server's answer to the RRQ.
pub async fn download<W>(
    session: &mut Session,
    first_reply: Packet,
    writer: &mut W,
) -> Result<Transfer>
where
    W: AsyncWrite + Unpin,
{
    let start = Instant::now();
    let result = receive_blocks(session, first_reply, writer).await;
    finish(session, start, result).await
}

async fn finish(
    session: &Session,
    start: Instant,
    result: Result<(u64, u64)>,
) -> Result<Transfer> {
    match result {
        Ok((blocks, bytes)) => Ok(Transfer {
            blocks,
            bytes,
            elapsed: start.elapsed(),
        }),
        Err(err) => {
            session.abort(&err).await;
            Err(err)
        }
    }
}

async fn send_blocks<R>(session: &mut Session, reader: &mut R) -> Result<(u64, u64)>
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut block: u16 = 1;
    let mut blocks: u64 = 0;
    let mut bytes: u64 = 0;

    loop {
        let size = read_block(reader, &mut buf).await?;
        let pkt = Packet::DATA {
            block,
            data: buf[..size].to_vec(),
        };
        send_data(session, &pkt, block).await?;
        debug!("block #{block} acked, {size} bytes");

        blocks += 1;
        bytes += size as u64;
        if size < BLOCK_SIZE {
            return Ok((blocks, bytes));
        }
        block = block.wrapping_add(1);
    }
}

// Sends one DATA block and waits for its ACK, retransmitting on timeout.
async fn send_data(session: &mut Session, pkt: &Packet, block: u16) -> Result<()> {
    let timeout = session.config().timeout;
    let max_retries = session.config().max_retries;
    let mut retries: u8 = 0;

    session.send(pkt).await?;
    let mut deadline = Instant::now() + timeout;
    loop {
        match session.recv(deadline).await? {
            Some(Packet::ACK(ack)) if ack == block => return Ok(()),
            // Stray ACKs leave the deadline alone.
            Some(Packet::ACK(ack)) => debug!("ignore ACK #{ack}, waiting for #{block}"),
            Some(other) => return Err(unexpected(other, "ACK")),
            None => {
                if retries == max_retries {
                    return Err(Error::Unresponsive {
                        addr: session.peer(),
                        block,
                        attempts: u32::from(retries) + 1,
                    });
                }
                retries += 1;
                warn!("timeout on block #{block}, retransmit {retries}/{max_retries}");
                session.send(pkt).await?;
                deadline = Instant::now() + timeout;
            }
        }
    }
}

async fn receive_blocks<W>(
    session: &mut Session,
    first_reply: Packet,
    writer: &mut W,
) -> Result<(u64, u64)>
where
    W: AsyncWrite + Unpin,
{
    let timeout = session.config().timeout;
    let max_retries = session.config().max_retries;
    let mut expected: u16 = 1;
    let mut last_ack: Option<Packet> = None;
    let mut retries: u8 = 0;
    let mut blocks: u64 = 0;
    let mut bytes: u64 = 0;

    let mut packet = first_reply;
    let mut deadline = Instant::now() + timeout;
    loop {
        match packet {
            Packet::DATA { block, data } if block == expected => {
                writer.write_all(&data).await?;
                let ack = Packet::ACK(block);
                session.send(&ack).await?;
                debug!("block #{block} received, {} bytes", data.len());

                blocks += 1;
                bytes += data.len() as u64;
                if data.len() < BLOCK_SIZE {
                    writer.flush().await?;
                    return Ok((blocks, bytes));
                }
                last_ack = Some(ack);
                retries = 0;
                expected = expected.wrapping_add(1);
                deadline = Instant::now() + timeout;
            }
            Packet::DATA { block, .. } => {
                // Duplicate or out of order: re-ACK the last good block only.
                warn!("unexpected block #{block}, expected #{expected}");
                if let Some(ack) = &last_ack {
                    session.send(ack).await?;
                }
            }
            other => return Err(unexpected(other, "DATA")),
        }

        packet = loop {
            if let Some(next) = session.recv(deadline).await? {
                break next;
            }
            if retries == max_retries {
                return Err(Error::Unresponsive {
                    addr: session.peer(),
                    block: expected,
                    attempts: u32::from(retries) + 1,
                });
            }
            retries += 1;
            warn!("timeout waiting for block #{expected}, retry {retries}/{max_retries}");
            if let Some(ack) = &last_ack {
                session.send(ack).await?;
            }
            deadline = Instant::now() + timeout;
        };
    }
}

// Fills `buf` unless the reader runs dry first.
async fn read_block<R>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

fn unexpected(packet: Packet, expected: &'static str) -> Error {
    match packet {
        Packet::ERROR { code, msg } => Error::Remote {
            code,
            description: describe(code),
            message: msg,
        },
        Packet::DATA { block, .. } => Error::Unexpected {
            expected,
            got: format!("DATA #{block}"),
        },
        Packet::ACK(block) => Error::Unexpected {
            expected,
            got: format!("ACK #{block}"),
        },
        other => Error::Unexpected {
            expected,
            got: other.kind().to_string(),
        },
    }
}
