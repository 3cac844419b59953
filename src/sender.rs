use anyhow::anyhow;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;

use crate::io::ByteSource;
use crate::packet::{decode_ack, Packet};
use crate::timer::RetransmitTimers;
use crate::transport::Transport;
use crate::window::SendWindow;
use crate::{Config, MAX_PAYLOAD};

/// The SYNC is resent on the timer of slot 0; the window is empty until the
/// handshake completes, so the slot is free.
const SYNC_SLOT: usize = 0;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferStats {
    /// File bytes carried by DATA packets, excluding resends.
    pub bytes: u64,
    /// DATA and EOF packets, excluding resends.
    pub packets: u64,
    /// Resends of SYNC, DATA or EOF after a timeout.
    pub retransmissions: u64,
    pub elapsed: Duration,
}

/// The name announced in SYNC: the last component of `path`, which must be
/// UTF-8 and fit in one payload.
pub fn sync_name(path: &str) -> anyhow::Result<&str> {
    let name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or(anyhow!("No file name in {path:?}"))?;
    if name.len() > MAX_PAYLOAD {
        return Err(anyhow!("File name longer than {MAX_PAYLOAD} bytes"));
    }
    Ok(name)
}

enum Event {
    Datagram(Vec<u8>),
    Expired(usize),
}

/// Sending end of a connection. The window and its sequence space persist
/// across transfers; every [`Sender::put`] starts from the base the receiver
/// reports in the SYNC handshake.
pub struct Sender<T> {
    transport: T,
    config: Config,
    window: SendWindow,
    timers: RetransmitTimers,
    stats: TransferStats,
    synced: bool,
}

impl<T: Transport> Sender<T> {
    pub fn new(transport: T, config: Config) -> Self {
        Self {
            transport,
            config,
            window: SendWindow::new(config.window_size),
            timers: RetransmitTimers::new(config.window_size),
            stats: TransferStats::default(),
            synced: false,
        }
    }

    pub fn window(&self) -> &SendWindow {
        &self.window
    }

    /// Transfer everything `source` yields to the receiver, named after the
    /// last component of `path`. Returns once the EOF packet has been
    /// acknowledged.
    pub async fn put<S: ByteSource>(
        &mut self,
        path: &str,
        mut source: S,
    ) -> anyhow::Result<TransferStats> {
        let filename = sync_name(path)?;
        let start = Instant::now();
        self.stats = TransferStats::default();
        self.timers.disarm_all();

        let base = self.handshake(filename).await?;
        self.window.reset(base);
        log::info!("sending {filename} from seq {base}");

        let mut buf = vec![0; self.config.max_payload];
        let mut eof_sent = false;
        self.fill(&mut source, &mut buf, &mut eof_sent).await?;

        while !(eof_sent && self.window.is_empty()) {
            match self.next_event().await? {
                Event::Datagram(datagram) => {
                    let Some(seq) = decode_ack(&datagram) else {
                        log::warn!("dropping {}-byte datagram, not an ack", datagram.len());
                        continue;
                    };
                    match self.window.ack(seq) {
                        Some(slot) => {
                            self.timers.disarm(slot);
                            log::debug!("ack {seq}");
                        }
                        None => log::trace!(
                            "ignoring ack {seq} outside [{}, {})",
                            self.window.base(),
                            self.window.next()
                        ),
                    }
                    if self.window.slide() > 0 {
                        self.fill(&mut source, &mut buf, &mut eof_sent).await?;
                    }
                }
                Event::Expired(slot) => self.retransmit(slot).await?,
            }
        }

        self.stats.elapsed = start.elapsed();
        log::info!(
            "sent {filename}: {} bytes in {} packets, {} retransmissions",
            self.stats.bytes,
            self.stats.packets,
            self.stats.retransmissions
        );
        Ok(self.stats)
    }

    /// Send SYNC until the receiver answers with its current base.
    async fn handshake(&mut self, filename: &str) -> anyhow::Result<u32> {
        let sync = Packet::Sync {
            filename: filename.to_string(),
        }
        .serialize();
        self.transport.send(&sync).await?;
        self.timers.arm(SYNC_SLOT, self.config.timeout);

        let base = loop {
            match self.next_event().await? {
                Event::Datagram(datagram) => match decode_ack(&datagram) {
                    // late ack from the previous file
                    Some(seq) if self.synced && self.window.is_behind(seq) => {
                        log::trace!("ignoring stale ack {seq} during handshake")
                    }
                    Some(base) => break base,
                    None => log::warn!("unexpected {}-byte handshake reply", datagram.len()),
                },
                Event::Expired(_) => {
                    log::debug!("retransmit SYNC {filename}");
                    self.transport.send(&sync).await?;
                    self.timers.arm(SYNC_SLOT, self.config.timeout);
                    self.stats.retransmissions += 1;
                }
            }
        };
        self.timers.disarm(SYNC_SLOT);
        self.synced = true;
        Ok(base)
    }

    /// Send new packets until the window is full or EOF has gone out.
    async fn fill<S: ByteSource>(
        &mut self,
        source: &mut S,
        buf: &mut [u8],
        eof_sent: &mut bool,
    ) -> anyhow::Result<()> {
        while !*eof_sent && self.window.has_room() {
            let n = source.read_chunk(buf)?;
            let pushed = if n == 0 {
                *eof_sent = true;
                self.window.push_eof()
            } else {
                self.window.push_data(buf[..n].to_vec())
            };
            let Some((slot, packet)) = pushed else {
                break;
            };
            let bytes = packet.serialize();
            let seq = self.window.next().wrapping_sub(1);
            log::debug!("send seq {seq} slot {slot} len {n}");

            self.transport.send(&bytes).await?;
            self.timers.arm(slot, self.config.timeout);
            self.stats.packets += 1;
            self.stats.bytes += n as u64;
        }
        Ok(())
    }

    async fn retransmit(&mut self, slot: usize) -> anyhow::Result<()> {
        // acked between expiry and now
        let Some(packet) = self.window.in_flight(slot) else {
            return Ok(());
        };
        let bytes = packet.serialize();
        log::debug!("retransmit seq {} slot {slot}", packet.seq().unwrap_or_default());

        self.transport.send(&bytes).await?;
        self.timers.arm(slot, self.config.timeout);
        self.stats.retransmissions += 1;
        Ok(())
    }

    async fn next_event(&mut self) -> anyhow::Result<Event> {
        tokio::select! {
            datagram = self.transport.recv() => Ok(Event::Datagram(datagram?)),
            Some(slot) = self.timers.expired() => Ok(Event::Expired(slot)),
        }
    }
}
