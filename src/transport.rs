use std::io;
use tokio::net::UdpSocket;

use crate::packet::HEADER_SIZE;
use crate::MAX_PAYLOAD;

/// A datagram channel bound to a single peer. Datagrams arrive whole but may
/// be lost, duplicated, delayed or reordered.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(&mut self, datagram: &[u8]) -> io::Result<()>;

    /// Wait for the next datagram. Must be cancel safe.
    async fn recv(&mut self) -> io::Result<Vec<u8>>;
}

/// A connected socket: `UdpSocket::connect` must have been called.
impl Transport for UdpSocket {
    async fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        UdpSocket::send(self, datagram).await?;
        Ok(())
    }

    async fn recv(&mut self) -> io::Result<Vec<u8>> {
        let mut buf = vec![0; HEADER_SIZE + MAX_PAYLOAD];
        let n = UdpSocket::recv(self, &mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }
}
