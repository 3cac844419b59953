mod cli;
mod io;
mod packet;
mod receiver;
mod sender;
mod seq;
mod timer;
mod transport;
mod window;

use std::time::Duration;

pub use crate::cli::{Cli, Mode};
pub use crate::io::{ByteSink, ByteSource, FileSink};
pub use crate::packet::{decode_ack, encode_ack, Packet, HEADER_SIZE};
pub use crate::receiver::{serve, ReceiverSession};
pub use crate::sender::{sync_name, Sender, TransferStats};
pub use crate::seq::inside;
pub use crate::timer::RetransmitTimers;
pub use crate::transport::Transport;
pub use crate::window::{ReceiveWindow, SendWindow};

pub const MAX_PAYLOAD: usize = 1024;
pub const DEF_WINDOW_SIZE: usize = 1 << 6;
pub const MAX_WINDOW_SIZE: usize = 1 << 15;
pub const DEF_TIMEOUT_MS: u64 = 100; // fixed RTT, no estimation
pub const DEF_PORT: u16 = 9000;

/// Protocol parameters shared by both ends. Sender and receiver must agree on
/// `window_size`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub window_size: usize,
    pub max_payload: usize,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_size: DEF_WINDOW_SIZE,
            max_payload: MAX_PAYLOAD,
            timeout: Duration::from_millis(DEF_TIMEOUT_MS),
        }
    }
}
