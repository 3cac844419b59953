use std::net::SocketAddr;
use std::path::Path;
use tokio::net::UdpSocket;

use crate::io::ByteSink;
use crate::packet::{encode_ack, Packet, HEADER_SIZE};
use crate::window::ReceiveWindow;
use crate::MAX_PAYLOAD;

/// Receiving end of a connection. Purely reactive: every packet goes through
/// [`ReceiverSession::on_packet`], which returns the u32 to send back, if any.
///
/// `base` carries over from one file to the next, so each SYNC is answered
/// with the sequence number following the previous file's EOF.
#[derive(Debug)]
pub struct ReceiverSession<K> {
    sink: K,
    window: ReceiveWindow,
    open: bool,
    eof: Option<u32>,
}

impl<K: ByteSink> ReceiverSession<K> {
    pub fn new(sink: K, window_size: usize) -> Self {
        Self::with_base(sink, window_size, 0)
    }

    pub fn with_base(sink: K, window_size: usize, base: u32) -> Self {
        Self {
            sink,
            window: ReceiveWindow::new(window_size, base),
            open: false,
            eof: None,
        }
    }

    pub fn base(&self) -> u32 {
        self.window.base()
    }

    /// A file is open and its EOF has not been delivered yet.
    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn on_packet(&mut self, packet: Packet) -> anyhow::Result<Option<u32>> {
        let reply = match packet {
            Packet::Sync { filename } => return self.on_sync(&filename),
            Packet::Data { seq, data } => self.on_data(seq, data)?,
            Packet::Eof { seq } => self.on_eof(seq),
        };
        self.finalize()?;
        Ok(reply)
    }

    fn on_sync(&mut self, filename: &str) -> anyhow::Result<Option<u32>> {
        if !self.open {
            let Some(name) = Path::new(filename).file_name().and_then(|n| n.to_str()) else {
                log::warn!("ignoring SYNC for unusable name {filename:?}");
                return Ok(None);
            };
            self.sink.open(name)?;
            self.open = true;
            log::info!("receiving {name} from seq {}", self.base());
        }
        Ok(Some(self.base()))
    }

    fn on_data(&mut self, seq: u32, data: Vec<u8>) -> anyhow::Result<Option<u32>> {
        if !self.window.accepts(seq) {
            return Ok(self.outside(seq));
        }
        if !self.open {
            log::warn!("DATA {seq} before SYNC");
            return Ok(None);
        }

        let len = data.len();
        if self.window.insert(seq, data) {
            log::debug!("buffered seq {seq} len {len}");
        } else {
            log::debug!("duplicate seq {seq}");
        }
        while let Some(chunk) = self.window.pop() {
            self.sink.write(&chunk)?;
        }
        Ok(Some(seq))
    }

    fn on_eof(&mut self, seq: u32) -> Option<u32> {
        if !self.window.accepts(seq) {
            return self.outside(seq);
        }
        if !self.open {
            log::warn!("EOF {seq} before SYNC");
            return None;
        }
        log::debug!("eof at seq {seq}");
        self.eof = Some(seq);
        Some(seq)
    }

    /// Re-ack sequences already delivered, in case the first ack was lost.
    /// Anything further off is dropped without reply.
    fn outside(&self, seq: u32) -> Option<u32> {
        if self.window.is_behind(seq) {
            log::trace!("re-ack delivered seq {seq}");
            Some(seq)
        } else {
            log::trace!("ignoring seq {seq}, base {}", self.base());
            None
        }
    }

    fn finalize(&mut self) -> anyhow::Result<()> {
        if self.eof == Some(self.window.base()) {
            self.sink.close()?;
            self.open = false;
            self.eof = None;
            self.window.skip();
            log::info!("file complete, next seq {}", self.base());
        }
        Ok(())
    }
}

/// Answer datagrams on `socket` forever. While a file is open only the peer
/// that opened it is served.
pub async fn serve<K: ByteSink>(
    socket: &UdpSocket,
    session: &mut ReceiverSession<K>,
) -> anyhow::Result<()> {
    let mut buf = vec![0u8; HEADER_SIZE + MAX_PAYLOAD];
    let mut peer: Option<SocketAddr> = None;

    loop {
        let (num, addr) = socket.recv_from(&mut buf).await?;
        if session.is_open() && peer.is_some_and(|peer| peer != addr) {
            log::warn!("{addr} ignored, busy with {peer:?}");
            continue;
        }

        let packet = match Packet::deserialize(&buf[..num]) {
            Ok(packet) => packet,
            Err(e) => {
                log::warn!("{addr} malformed datagram: {e}");
                continue;
            }
        };

        let was_open = session.is_open();
        if let Some(reply) = session.on_packet(packet)? {
            socket.send_to(&encode_ack(reply), addr).await?;
        }
        if !was_open && session.is_open() {
            peer = Some(addr);
        }
    }
}
