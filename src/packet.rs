use std::fmt;
use std::str::{self, FromStr};

use crate::error::{Error, Result};
use crate::BLOCK_SIZE;

const OP_RRQ: u16 = 1;
const OP_WRQ: u16 = 2;
const OP_DATA: u16 = 3;
const OP_ACK: u16 = 4;
const OP_ERROR: u16 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    RRQ { filename: String, mode: Mode },
    WRQ { filename: String, mode: Mode },
    DATA { block: u16, data: Vec<u8> },
    ACK(u16),
    ERROR { code: u16, msg: String },
}

impl Packet {
    /// Builds an ERROR datagram carrying the fixed description of `code`.
    pub fn error(code: ErrorCode) -> Self {
        Packet::ERROR {
            code: code as u16,
            msg: code.description().to_string(),
        }
    }

    /// Short name of the datagram kind, for logs and diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Packet::RRQ { .. } => "RRQ",
            Packet::WRQ { .. } => "WRQ",
            Packet::DATA { .. } => "DATA",
            Packet::ACK(_) => "ACK",
            Packet::ERROR { .. } => "ERROR",
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes: Vec<u8> = Vec::with_capacity(4);

        match self {
            Packet::RRQ { filename, mode } | Packet::WRQ { filename, mode } => {
                let opcode = if let Packet::RRQ { .. } = self {
                    OP_RRQ
                } else {
                    OP_WRQ
                };
                bytes.extend_from_slice(&opcode.to_be_bytes());
                bytes.extend_from_slice(filename.as_bytes());
                bytes.push(0);
                bytes.extend_from_slice(mode.as_str().as_bytes());
                bytes.push(0);
            }
            Packet::DATA { block, data } => {
                bytes.extend_from_slice(&OP_DATA.to_be_bytes());
                bytes.extend_from_slice(&block.to_be_bytes());
                bytes.extend_from_slice(data);
            }
            Packet::ACK(block) => {
                bytes.extend_from_slice(&OP_ACK.to_be_bytes());
                bytes.extend_from_slice(&block.to_be_bytes());
            }
            Packet::ERROR { code, msg } => {
                bytes.extend_from_slice(&OP_ERROR.to_be_bytes());
                bytes.extend_from_slice(&code.to_be_bytes());
                bytes.extend_from_slice(msg.as_bytes());
                bytes.push(0);
            }
        }
        bytes
    }

    pub fn deserialize(buf: &[u8]) -> Result<Self> {
        if buf.len() < 2 {
            return Err(Error::Malformed(format!(
                "{} byte datagram has no opcode",
                buf.len()
            )));
        }

        let opcode = u16::from_be_bytes([buf[0], buf[1]]);
        let body = &buf[2..];
        let pkt = match opcode {
            OP_RRQ | OP_WRQ => {
                let (filename, rest) = read_cstr(body)?;
                let (mode, rest) = read_cstr(rest)?;
                if !rest.is_empty() {
                    return Err(Error::Malformed(format!(
                        "{} trailing bytes after request mode",
                        rest.len()
                    )));
                }
                let mode = mode.parse()?;
                if opcode == OP_RRQ {
                    Packet::RRQ { filename, mode }
                } else {
                    Packet::WRQ { filename, mode }
                }
            }
            OP_DATA => {
                let block = read_u16(body, "DATA")?;
                let data = &body[2..];
                if data.len() > BLOCK_SIZE {
                    return Err(Error::Malformed(format!(
                        "DATA payload of {} bytes exceeds {BLOCK_SIZE}",
                        data.len()
                    )));
                }
                Packet::DATA {
                    block,
                    data: data.to_vec(),
                }
            }
            OP_ACK => {
                if body.len() != 2 {
                    return Err(Error::Malformed(format!(
                        "ACK must be 4 bytes, got {}",
                        buf.len()
                    )));
                }
                Packet::ACK(u16::from_be_bytes([body[0], body[1]]))
            }
            OP_ERROR => {
                let code = read_u16(body, "ERROR")?;
                // Some servers omit the terminator; take what is there.
                let msg = &body[2..];
                let end = msg.iter().position(|&b| b == 0).unwrap_or(msg.len());
                Packet::ERROR {
                    code,
                    msg: String::from_utf8_lossy(&msg[..end]).into_owned(),
                }
            }
            _ => {
                return Err(Error::Malformed(format!("invalid opcode: {opcode}")));
            }
        };

        Ok(pkt)
    }
}

fn read_u16(body: &[u8], kind: &str) -> Result<u16> {
    match body {
        [hi, lo, ..] => Ok(u16::from_be_bytes([*hi, *lo])),
        _ => Err(Error::Malformed(format!("{kind} header truncated"))),
    }
}

// Reads a NUL terminated string, returning it with the remaining bytes.
fn read_cstr(buf: &[u8]) -> Result<(String, &[u8])> {
    let pos = buf
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::Malformed("missing string terminator".into()))?;
    let s = str::from_utf8(&buf[..pos])
        .map_err(|_| Error::Malformed("invalid string encoding".into()))?
        .to_string();
    Ok((s, &buf[pos + 1..]))
}

/// Transfer mode named in a request. Only octet semantics are applied to
/// payloads; the others are carried on the wire as-is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    NetAscii,
    #[default]
    Octet,
    Mail,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::NetAscii => "netascii",
            Mode::Octet => "octet",
            Mode::Mail => "mail",
        }
    }
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "netascii" => Ok(Mode::NetAscii),
            "octet" => Ok(Mode::Octet),
            "mail" => Ok(Mode::Mail),
            _ => Err(Error::Malformed(format!("unknown transfer mode '{s}'"))),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error codes defined by RFC 1350.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    NotDefined = 0,
    FileNotFound = 1,
    AccessViolation = 2,
    DiskFull = 3,
    IllegalOperation = 4,
    UnknownTransferId = 5,
    FileExists = 6,
    NoSuchUser = 7,
}

impl ErrorCode {
    pub fn from_u16(code: u16) -> Option<Self> {
        let code = match code {
            0 => ErrorCode::NotDefined,
            1 => ErrorCode::FileNotFound,
            2 => ErrorCode::AccessViolation,
            3 => ErrorCode::DiskFull,
            4 => ErrorCode::IllegalOperation,
            5 => ErrorCode::UnknownTransferId,
            6 => ErrorCode::FileExists,
            7 => ErrorCode::NoSuchUser,
            _ => return None,
        };
        Some(code)
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCode::NotDefined => "Not defined, see error message (if any).",
            ErrorCode::FileNotFound => "File not found.",
            ErrorCode::AccessViolation => "Access violation.",
            ErrorCode::DiskFull => "Disk full or allocation exceeded.",
            ErrorCode::IllegalOperation => "Illegal TFTP operation.",
            ErrorCode::UnknownTransferId => "Unknown transfer ID.",
            ErrorCode::FileExists => "File already exists.",
            ErrorCode::NoSuchUser => "No such user.",
        }
    }
}

/// Fixed description for a wire error code.
pub fn describe(code: u16) -> &'static str {
    ErrorCode::from_u16(code).map_or("Unknown error code", |c| c.description())
}
