//! In-memory link between a `Sender` and a `ReceiverSession`, with hooks to
//! drop or duplicate datagrams in either direction.

use std::io;
use std::sync::{Arc, Mutex};

use srftp::{encode_ack, ByteSink, Config, Packet, ReceiverSession, Sender, Transport};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Returns how many copies of a datagram to deliver: 0 drops it.
pub type Forward = Box<dyn FnMut(&Packet) -> usize + Send>;
pub type Backward = Box<dyn FnMut(u32) -> usize + Send>;

pub struct Faults {
    pub forward: Forward,
    pub backward: Backward,
}

impl Default for Faults {
    fn default() -> Self {
        Self {
            forward: Box::new(|_: &Packet| 1),
            backward: Box::new(|_: u32| 1),
        }
    }
}

impl Faults {
    /// Drop the first DATA/EOF carrying `seq`.
    pub fn drop_once(seq: u32) -> Self {
        let mut dropped = false;
        Self {
            forward: Box::new(move |packet: &Packet| {
                if !dropped && packet.seq() == Some(seq) {
                    dropped = true;
                    0
                } else {
                    1
                }
            }),
            ..Self::default()
        }
    }

    /// Drop the first SYNC.
    pub fn drop_first_sync() -> Self {
        let mut dropped = false;
        Self {
            forward: Box::new(move |packet: &Packet| {
                if !dropped && matches!(packet, Packet::Sync { .. }) {
                    dropped = true;
                    0
                } else {
                    1
                }
            }),
            ..Self::default()
        }
    }

    /// Drop the first ack for `seq`.
    pub fn drop_ack_once(seq: u32) -> Self {
        let mut dropped = false;
        Self {
            backward: Box::new(move |ack| {
                if !dropped && ack == seq {
                    dropped = true;
                    0
                } else {
                    1
                }
            }),
            ..Self::default()
        }
    }

    /// Deliver every DATA and EOF twice.
    pub fn duplicate() -> Self {
        Self {
            forward: Box::new(|packet: &Packet| if packet.seq().is_some() { 2 } else { 1 }),
            ..Self::default()
        }
    }
}

pub struct Link {
    to_receiver: mpsc::UnboundedSender<Vec<u8>>,
    from_receiver: mpsc::UnboundedReceiver<Vec<u8>>,
    forward: Forward,
    sent: Arc<Mutex<Vec<Packet>>>,
}

impl Transport for Link {
    async fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        let packet = Packet::deserialize(datagram).expect("sender built a malformed packet");
        let copies = (self.forward)(&packet);
        self.sent.lock().unwrap().push(packet);
        for _ in 0..copies {
            let _ = self.to_receiver.send(datagram.to_vec());
        }
        Ok(())
    }

    async fn recv(&mut self) -> io::Result<Vec<u8>> {
        self.from_receiver
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::BrokenPipe, "receiver gone"))
    }
}

#[derive(Debug, Default)]
pub struct SinkState {
    pub files: Vec<(String, Vec<u8>)>,
    pub open: bool,
}

/// Keeps every received file in memory, shared with the test body.
#[derive(Debug, Clone, Default)]
pub struct SharedSink(pub Arc<Mutex<SinkState>>);

impl SharedSink {
    pub fn files(&self) -> Vec<(String, Vec<u8>)> {
        self.0.lock().unwrap().files.clone()
    }
}

impl ByteSink for SharedSink {
    fn open(&mut self, name: &str) -> anyhow::Result<()> {
        let mut state = self.0.lock().unwrap();
        state.files.push((name.to_string(), Vec::new()));
        state.open = true;
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        let mut state = self.0.lock().unwrap();
        assert!(state.open, "write to closed sink");
        let (_, data) = state.files.last_mut().expect("no file opened");
        data.extend_from_slice(bytes);
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.0.lock().unwrap().open = false;
        Ok(())
    }
}

pub struct Harness {
    pub sender: Sender<Link>,
    pub sink: SharedSink,
    /// Every packet the sender transmitted, drops and resends included.
    pub sent: Arc<Mutex<Vec<Packet>>>,
    /// Extra path into the sender's inbox, for injecting stray acks.
    pub inject: mpsc::UnboundedSender<Vec<u8>>,
    pub receiver: JoinHandle<()>,
}

impl Harness {
    pub fn sent(&self) -> Vec<Packet> {
        self.sent.lock().unwrap().clone()
    }

    /// How many times `seq` went out.
    pub fn transmissions(&self, seq: u32) -> usize {
        self.sent()
            .iter()
            .filter(|packet| packet.seq() == Some(seq))
            .count()
    }
}

pub fn connect(config: Config, base: u32, faults: Faults) -> Harness {
    let (to_receiver, mut inbox) = mpsc::unbounded_channel::<Vec<u8>>();
    let (to_sender, from_receiver) = mpsc::unbounded_channel::<Vec<u8>>();
    let sink = SharedSink::default();
    let sent = Arc::new(Mutex::new(Vec::new()));

    let mut session = ReceiverSession::with_base(sink.clone(), config.window_size, base);
    let replies = to_sender.clone();
    let mut backward = faults.backward;
    let receiver = tokio::spawn(async move {
        while let Some(datagram) = inbox.recv().await {
            let packet = Packet::deserialize(&datagram).unwrap();
            if let Some(ack) = session.on_packet(packet).unwrap() {
                for _ in 0..backward(ack) {
                    let _ = replies.send(encode_ack(ack).to_vec());
                }
            }
        }
    });

    let link = Link {
        to_receiver,
        from_receiver,
        forward: faults.forward,
        sent: sent.clone(),
    };
    Harness {
        sender: Sender::new(link, config),
        sink,
        sent,
        inject: to_sender,
        receiver,
    }
}

/// Deterministic, non-repeating-per-chunk content.
pub fn content(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 31 + i / 1024) % 251) as u8).collect()
}
