//! Per-slot retransmission timers.
//!
//! Each armed slot owns one sleeping tokio task. On expiry the task posts the
//! slot onto a channel that the protocol loop drains with
//! [`RetransmitTimers::expired`], so resends always run on the loop that owns
//! the window. Re-arming aborts the previous task and bumps a generation
//! number; an expiry already sitting in the channel from an older generation
//! is discarded.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug)]
struct Armed {
    generation: u64,
    task: JoinHandle<()>,
}

#[derive(Debug)]
struct Expiry {
    slot: usize,
    generation: u64,
}

#[derive(Debug)]
pub struct RetransmitTimers {
    armed: Box<[Option<Armed>]>,
    generation: u64,
    tx: mpsc::UnboundedSender<Expiry>,
    rx: mpsc::UnboundedReceiver<Expiry>,
}

impl RetransmitTimers {
    pub fn new(slots: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            armed: (0..slots).map(|_| None).collect(),
            generation: 0,
            tx,
            rx,
        }
    }

    /// Start (or restart) the timer of `slot`. Must be called inside a tokio
    /// runtime.
    pub fn arm(&mut self, slot: usize, after: Duration) {
        self.disarm(slot);
        self.generation += 1;

        let generation = self.generation;
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(Expiry { slot, generation });
        });
        self.armed[slot] = Some(Armed { generation, task });
    }

    pub fn disarm(&mut self, slot: usize) {
        if let Some(armed) = self.armed[slot].take() {
            armed.task.abort();
        }
    }

    pub fn disarm_all(&mut self) {
        for slot in 0..self.armed.len() {
            self.disarm(slot);
        }
    }

    pub fn is_armed(&self, slot: usize) -> bool {
        self.armed[slot].is_some()
    }

    /// Wait for the next live expiry and return its slot, which is left
    /// disarmed. Cancel safe.
    pub async fn expired(&mut self) -> Option<usize> {
        while let Some(expiry) = self.rx.recv().await {
            let live = matches!(
                &self.armed[expiry.slot],
                Some(armed) if armed.generation == expiry.generation
            );
            if live {
                self.armed[expiry.slot] = None;
                return Some(expiry.slot);
            }
            log::trace!("stale expiry for slot {}", expiry.slot);
        }
        None
    }
}

impl Drop for RetransmitTimers {
    fn drop(&mut self) {
        self.disarm_all();
    }
}
