pub mod udp;

use std::io;

pub use udp::UdpTransport;

/// A single bound conversation with one server, one datagram at a time.
///
/// Timeouts are the transport's business; a timed out `receive` shows up as
/// the `io::Error` the transport produced.
pub trait Transport {
    fn send(&mut self, data: &[u8]) -> io::Result<()>;
    fn receive(&mut self) -> io::Result<Vec<u8>>;
}
