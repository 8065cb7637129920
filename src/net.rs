use anyhow::{anyhow, Context, Result};
use socket2::{Domain, Protocol, Socket, Type};
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};

use crate::ping::{PingRecord, SenderId, MAX_RECORD_LEN};
use crate::traits::PingTransport;

pub fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .with_context(|| format!("Invalid address {}", addr))?
        .next()
        .ok_or_else(|| anyhow!("Address {} did not resolve", addr))
}

/// Non-blocking UDP socket bound for receiving pings.
pub fn create_ping_socket(bind: SocketAddr, recv_buffer_bytes: Option<usize>) -> Result<UdpSocket> {
    let domain = if bind.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;

    socket.set_reuse_address(true)?;
    if let Some(size) = recv_buffer_bytes {
        if let Err(e) = socket.set_recv_buffer_size(size) {
            log::warn!("Failed to set receive buffer to {} bytes: {}", size, e);
        }
    }

    socket
        .bind(&bind.into())
        .with_context(|| format!("Failed to bind {}", bind))?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}

pub struct UdpPingTransport {
    socket: UdpSocket,
}

impl UdpPingTransport {
    pub fn bind(bind: SocketAddr, recv_buffer_bytes: Option<usize>) -> Result<Self> {
        let socket = create_ping_socket(bind, recv_buffer_bytes)?;
        log::info!("Listening for pings on {}", socket.local_addr()?);
        Ok(UdpPingTransport { socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }
}

impl PingTransport for UdpPingTransport {
    fn recv_packet(&mut self) -> Result<Option<(SenderId, Vec<u8>)>> {
        // Oversized datagrams are delivered truncated and rejected on size
        let mut buf = [0u8; MAX_RECORD_LEN];
        match self.socket.recv_from(&mut buf) {
            Ok((size, peer)) => Ok(Some((SenderId::from_socket_addr(&peer), buf[..size].to_vec()))),
            Err(ref e) if e.kind() == ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Transmitter side: encodes and sends ping records to one target.
pub struct UdpPingSender {
    socket: UdpSocket,
    target: SocketAddr,
    next_sequence: u32,
}

impl UdpPingSender {
    pub fn new(target: SocketAddr, first_sequence: u32) -> Result<Self> {
        let bind: SocketAddr = if target.is_ipv4() {
            "0.0.0.0:0".parse()?
        } else {
            "[::]:0".parse()?
        };
        let socket = UdpSocket::bind(bind).context("Failed to bind sender socket")?;
        Ok(UdpPingSender {
            socket,
            target,
            next_sequence: first_sequence,
        })
    }

    pub fn next_sequence(&self) -> u32 {
        self.next_sequence
    }

    /// Skip `count` sequence numbers without sending, to simulate loss.
    pub fn skip(&mut self, count: u32) {
        self.next_sequence = self.next_sequence.wrapping_add(count);
    }

    /// Send the next ping. Returns the sequence number used and whether the send succeeded.
    pub fn send_next(&mut self, uptime_ms: u32) -> (u32, bool) {
        let seq = self.next_sequence;
        let bytes = PingRecord::new(seq, uptime_ms).encode();
        let ok = match self.socket.send_to(&bytes, self.target) {
            Ok(n) => n == bytes.len(),
            Err(e) => {
                log::debug!("send_to {} failed: {}", self.target, e);
                false
            }
        };
        self.next_sequence = self.next_sequence.wrapping_add(1);
        (seq, ok)
    }
}
