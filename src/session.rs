use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use log::{debug, warn};
use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::packet::{ErrorCode, Packet};
use crate::MAX_PACKET_SIZE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Get,
    Put,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Get => f.write_str("get"),
            Direction::Put => f.write_str("put"),
        }
    }
}

/// One transfer in progress.
///
/// Owns the UDP socket and the peer address. The peer starts out as the
/// well-known server address and becomes the server's transfer ID (TID)
/// once the first reply arrives; from then on datagrams from anywhere else
/// are refused. Dropping the session releases the socket.
pub struct Session {
    socket: UdpSocket,
    peer: SocketAddr,
    tid_known: bool,
    config: ClientConfig,
}

impl Session {
    /// Binds an ephemeral local port in the server's address family.
    pub async fn bind(config: ClientConfig) -> Result<Self> {
        let local: SocketAddr = if config.server.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await.map_err(Error::Socket)?;
        debug!(
            "bound {} for server {}",
            socket.local_addr().map_err(Error::Socket)?,
            config.server
        );

        Ok(Self {
            socket,
            peer: config.server,
            tid_known: false,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Current peer: the server's TID once learned, the well-known address before.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(Error::Socket)
    }

    /// Sends RRQ (get) or WRQ (put) and waits for the server's first reply.
    ///
    /// The request is resent on every timeout, up to `max_retries` times.
    /// Returns the reply together with the server's TID, which becomes the
    /// session peer.
    pub async fn initiate(
        &mut self,
        direction: Direction,
        filename: &str,
    ) -> Result<(Packet, SocketAddr)> {
        let mode = self.config.mode;
        let request = match direction {
            Direction::Get => Packet::RRQ {
                filename: filename.to_string(),
                mode,
            },
            Direction::Put => Packet::WRQ {
                filename: filename.to_string(),
                mode,
            },
        };
        let server = self.config.server;
        let max_retries = self.config.max_retries;

        let mut retries: u8 = 0;
        loop {
            debug!(
                "{direction} {filename:?}: send {} from {} to {server}",
                request.kind(),
                self.local_addr()?
            );
            self.send(&request).await?;
            let deadline = Instant::now() + self.config.timeout;
            if let Some(reply) = self.recv(deadline).await? {
                return Ok((reply, self.peer));
            }
            if retries == max_retries {
                return Err(Error::NoResponse {
                    addr: server,
                    attempts: u32::from(retries) + 1,
                });
            }
            retries += 1;
            warn!(
                "no reply to {} from {server}, retry {retries}/{max_retries}",
                request.kind()
            );
        }
    }

    pub async fn send(&self, packet: &Packet) -> Result<()> {
        self.socket
            .send_to(&packet.serialize(), self.peer)
            .await
            .map_err(Error::Socket)?;
        Ok(())
    }

    /// Waits until `deadline` for the next datagram from the peer.
    ///
    /// `Ok(None)` means the deadline passed; what to do about it is up to
    /// the caller. Datagrams from foreign sources are refused and do not
    /// count as a reply.
    pub async fn recv(&mut self, deadline: Instant) -> Result<Option<Packet>> {
        // One spare byte so oversized datagrams are caught by the codec.
        let mut buf = [0u8; MAX_PACKET_SIZE + 1];
        loop {
            let (n, from) = match timeout_at(deadline, self.socket.recv_from(&mut buf)).await {
                Ok(res) => res.map_err(Error::Socket)?,
                Err(_) => return Ok(None),
            };

            if !self.accepts(from) {
                self.refuse(from).await;
                continue;
            }

            let packet = Packet::deserialize(&buf[..n])?;
            if !self.tid_known {
                self.peer = from;
                self.tid_known = true;
            }
            return Ok(Some(packet));
        }
    }

    /// Best-effort ERROR to the peer when the session dies on our side.
    /// Remote errors and timeouts are not answered.
    pub async fn abort(&self, err: &Error) {
        if !self.tid_known {
            return;
        }
        let packet = match err {
            Error::Io(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::StorageFull | io::ErrorKind::QuotaExceeded
                ) =>
            {
                Packet::error(ErrorCode::DiskFull)
            }
            Error::Io(e) => Packet::ERROR {
                code: ErrorCode::NotDefined as u16,
                msg: e.to_string(),
            },
            Error::Malformed(_) | Error::Unexpected { .. } => {
                Packet::error(ErrorCode::IllegalOperation)
            }
            _ => return,
        };
        if let Err(e) = self.send(&packet).await {
            debug!("could not notify {}: {e}", self.peer);
        }
    }

    fn accepts(&self, from: SocketAddr) -> bool {
        if self.tid_known {
            from == self.peer
        } else {
            from.ip() == self.config.server.ip()
        }
    }

    async fn refuse(&self, from: SocketAddr) {
        warn!("datagram from unknown source {from}, expected {}", self.peer);
        if !self.tid_known {
            return;
        }
        let error = Packet::error(ErrorCode::UnknownTransferId).serialize();
        if let Err(e) = self.socket.send_to(&error, from).await {
            debug!("could not refuse {from}: {e}");
        }
    }
}
