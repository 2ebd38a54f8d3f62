//! A TFTP (RFC 1350) client over UDP.
//!
//! One file per session, transferred lock-step: every DATA block waits for
//! its ACK before the next one leaves.

mod cli;
mod client;
mod config;
mod error;
mod packet;
mod session;
mod transfer;

pub use crate::cli::{Cli, Operation};
pub use crate::client::Client;
pub use crate::config::ClientConfig;
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::packet::{describe, ErrorCode, Mode, Packet};
pub use crate::session::{Direction, Session};
pub use crate::transfer::{download, upload, Transfer};

pub const BLOCK_SIZE: usize = 512; // RFC 1350
pub const MAX_PACKET_SIZE: usize = BLOCK_SIZE + 4;
pub const DEFAULT_PORT: u16 = 69;

pub const DEF_TIMEOUT_SEC: u64 = 5;
pub const MAX_RETRY_COUNT: u8 = 5;
