use std::io;
use std::net::SocketAddr;

use thiserror::Error;

/// Everything that can end a transfer session.
#[derive(Debug, Error)]
pub enum Error {
    /// Local file could not be read, created or written.
    #[error("local I/O error: {0}")]
    Io(#[from] io::Error),

    /// The UDP socket failed to bind, send or receive.
    #[error("socket error: {0}")]
    Socket(#[source] io::Error),

    /// The server sent an ERROR datagram.
    #[error("server error {code}: {description}{}", fmt_msg(.message))]
    Remote {
        code: u16,
        description: &'static str,
        message: String,
    },

    /// A datagram that could not be decoded.
    #[error("malformed datagram: {0}")]
    Malformed(String),

    /// A well-formed datagram of the wrong kind for the current state.
    #[error("unexpected datagram: expected {expected}, got {got}")]
    Unexpected { expected: &'static str, got: String },

    /// The request was never answered.
    #[error("no response from {addr} after {attempts} attempts")]
    NoResponse { addr: SocketAddr, attempts: u32 },

    /// The peer stopped answering in the middle of a transfer.
    #[error("peer {addr} unresponsive at block {block} after {attempts} attempts")]
    Unresponsive {
        addr: SocketAddr,
        block: u16,
        attempts: u32,
    },
}

/// Coarse failure class, used for process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Protocol,
    LocalIo,
    Network,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::LocalIo,
            Error::Remote { .. } | Error::Malformed(_) | Error::Unexpected { .. } => {
                ErrorKind::Protocol
            }
            Error::Socket(_) | Error::NoResponse { .. } | Error::Unresponsive { .. } => {
                ErrorKind::Network
            }
        }
    }
}

fn fmt_msg(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(" ({message})")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
