//! Ping record wire format.
//!
//! Layout (packed, little-endian, 9 bytes):
//!
//! ```text
//! +-------+-----------------+-----------------+
//! | magic | sequence (u32)  | uptime_ms (u32) |
//! +-------+-----------------+-----------------+
//!   1 B          4 B               4 B
//! ```

use byteorder::{ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use thiserror::Error;

/// Marker byte identifying ping records.
pub const PING_MAGIC: u8 = 0xAA;

/// Size of an encoded ping record on the wire.
pub const PING_RECORD_LEN: usize = 9;

/// Largest datagram the receiver reads; anything longer arrives truncated.
pub const MAX_RECORD_LEN: usize = 512;

const OFF_MAGIC: usize = 0;
const OFF_SEQUENCE: usize = 1;
const OFF_UPTIME: usize = 5;

/// Reasons a received payload is discarded before it reaches the tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
pub enum PingError {
    #[error("invalid message size ({actual} bytes, expected {expected})")]
    MalformedSize { actual: usize, expected: usize },
    #[error("invalid magic byte (0x{actual:02X}, expected 0x{expected:02X})")]
    BadMagic { actual: u8, expected: u8 },
}

/// One decoded ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingRecord {
    pub magic: u8,
    pub sequence: u32,
    /// Transmitter uptime. Informational only.
    pub uptime_ms: u32,
}

impl PingRecord {
    pub fn new(sequence: u32, uptime_ms: u32) -> Self {
        PingRecord {
            magic: PING_MAGIC,
            sequence,
            uptime_ms,
        }
    }

    /// Decode a record, checking length against `expected_len` and the marker
    /// against `expected_magic`. Bytes beyond the 9-byte layout are ignored.
    pub fn parse(buf: &[u8], expected_len: usize, expected_magic: u8) -> Result<Self, PingError> {
        if buf.len() != expected_len || buf.len() < PING_RECORD_LEN {
            return Err(PingError::MalformedSize {
                actual: buf.len(),
                expected: expected_len,
            });
        }

        let magic = buf[OFF_MAGIC];
        if magic != expected_magic {
            return Err(PingError::BadMagic {
                actual: magic,
                expected: expected_magic,
            });
        }

        Ok(PingRecord {
            magic,
            sequence: LittleEndian::read_u32(&buf[OFF_SEQUENCE..OFF_UPTIME]),
            uptime_ms: LittleEndian::read_u32(&buf[OFF_UPTIME..PING_RECORD_LEN]),
        })
    }

    pub fn encode(&self) -> [u8; PING_RECORD_LEN] {
        let mut buf = [0u8; PING_RECORD_LEN];
        buf[OFF_MAGIC] = self.magic;
        LittleEndian::write_u32(&mut buf[OFF_SEQUENCE..OFF_UPTIME], self.sequence);
        LittleEndian::write_u32(&mut buf[OFF_UPTIME..PING_RECORD_LEN], self.uptime_ms);
        buf
    }
}

/// 6-byte transmitter identifier (a MAC address on radio links).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SenderId(pub [u8; 6]);

impl SenderId {
    /// Derive an identifier from a datagram peer.
    ///
    /// IPv4: the four address octets followed by the big-endian port.
    /// IPv6: the last four address octets followed by the port.
    pub fn from_socket_addr(addr: &SocketAddr) -> Self {
        let octets: [u8; 4] = match addr.ip() {
            IpAddr::V4(ip) => ip.octets(),
            IpAddr::V6(ip) => {
                let o = ip.octets();
                [o[12], o[13], o[14], o[15]]
            }
        };
        let port = addr.port().to_be_bytes();
        SenderId([octets[0], octets[1], octets[2], octets[3], port[0], port[1]])
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}
