use std::{
    io,
    net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    time::Duration,
};

use tracing::trace;

use super::Transport;

/// The largest payload a UDP datagram can carry.
const MAX_DATAGRAM_SIZE: usize = 65_535;

pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral port and connect it to `peer`, so only datagrams from
    /// the server are received.
    pub fn connect(
        peer: SocketAddr,
        read_timeout: Duration,
        write_timeout: Duration,
    ) -> io::Result<Self> {
        let local: SocketAddr = match peer {
            SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(local)?;
        socket.connect(peer)?;
        socket.set_read_timeout(Some(read_timeout))?;
        socket.set_write_timeout(Some(write_timeout))?;

        Ok(Self { socket, peer })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        let sent = self.socket.send(data)?;
        trace!("sent {sent} bytes to {}", self.peer);
        Ok(())
    }

    fn receive(&mut self) -> io::Result<Vec<u8>> {
        let mut buffer = vec![0; MAX_DATAGRAM_SIZE];
        let received = self.socket.recv(&mut buffer)?;
        buffer.truncate(received);
        trace!("received {received} bytes from {}", self.peer);
        Ok(buffer)
    }
}
