use crate::packet::Packet;
use crate::seq::inside;

#[derive(Debug, Default, Clone)]
struct Slot {
    packet: Option<Packet>,
    acked: bool,
}

/// Sender half of the sliding window: `[base, next)` are in flight, each
/// cached in the slot `seq % size` until acknowledged and slid past.
#[derive(Debug)]
pub struct SendWindow {
    size: usize,
    base: u32,
    next: u32,
    slots: Box<[Slot]>,
}

impl SendWindow {
    pub fn new(size: usize) -> Self {
        // seq % size only stays consistent across the u32 wrap when size divides 2^32
        assert!(size.is_power_of_two(), "window size must be a power of two");
        Self {
            size,
            base: 0,
            next: 0,
            slots: vec![Slot::default(); size].into_boxed_slice(),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next(&self) -> u32 {
        self.next
    }

    pub fn slot(&self, seq: u32) -> usize {
        seq as usize % self.size
    }

    /// Start a new session at `base`, forgetting every slot.
    pub fn reset(&mut self, base: u32) {
        self.base = base;
        self.next = base;
        self.slots.fill(Slot::default());
    }

    pub fn outstanding(&self) -> usize {
        self.next.wrapping_sub(self.base) as usize
    }

    pub fn has_room(&self) -> bool {
        self.outstanding() < self.size
    }

    pub fn is_empty(&self) -> bool {
        self.base == self.next
    }

    pub fn push_data(&mut self, data: Vec<u8>) -> Option<(usize, &Packet)> {
        let seq = self.next;
        self.push(Packet::Data { seq, data })
    }

    pub fn push_eof(&mut self) -> Option<(usize, &Packet)> {
        let seq = self.next;
        self.push(Packet::Eof { seq })
    }

    fn push(&mut self, packet: Packet) -> Option<(usize, &Packet)> {
        if !self.has_room() {
            return None;
        }
        let idx = self.slot(self.next);
        self.next = self.next.wrapping_add(1);

        let slot = &mut self.slots[idx];
        debug_assert!(!slot.acked, "slot {idx} reused before retiring");
        let packet = slot.packet.insert(packet);
        Some((idx, packet))
    }

    /// Mark `seq` acknowledged. Returns its slot when the ack is new and falls
    /// in `[base, next - 1]`; stale and duplicate acks yield `None`.
    pub fn ack(&mut self, seq: u32) -> Option<usize> {
        if self.is_empty() || !inside(self.base, self.next.wrapping_sub(1), seq) {
            return None;
        }
        let idx = self.slot(seq);
        let slot = &mut self.slots[idx];
        if slot.acked {
            return None;
        }
        slot.acked = true;
        Some(idx)
    }

    /// Retire the acknowledged prefix of the window. Returns how many slots
    /// were freed.
    pub fn slide(&mut self) -> usize {
        let mut freed = 0;
        while !self.is_empty() {
            let idx = self.slot(self.base);
            let slot = &mut self.slots[idx];
            if !slot.acked {
                break;
            }
            *slot = Slot::default();
            self.base = self.base.wrapping_add(1);
            freed += 1;
        }
        freed
    }

    /// Whether `seq` falls in the window just retired behind `base`.
    pub fn is_behind(&self, seq: u32) -> bool {
        let size = self.size as u32;
        inside(
            self.base.wrapping_sub(size),
            self.base.wrapping_sub(1),
            seq,
        )
    }

    /// The cached packet of an unacknowledged slot, if any.
    pub fn in_flight(&self, idx: usize) -> Option<&Packet> {
        let slot = self.slots.get(idx)?;
        if slot.acked {
            None
        } else {
            slot.packet.as_ref()
        }
    }
}

/// Receiver half: buffers out-of-order payloads in `[base, base + size - 1]`
/// and hands them back strictly in sequence.
#[derive(Debug)]
pub struct ReceiveWindow {
    size: usize,
    base: u32,
    slots: Box<[Option<Vec<u8>>]>,
}

impl ReceiveWindow {
    pub fn new(size: usize, base: u32) -> Self {
        // seq % size only stays consistent across the u32 wrap when size divides 2^32
        assert!(size.is_power_of_two(), "window size must be a power of two");
        Self {
            size,
            base,
            slots: vec![None; size].into_boxed_slice(),
        }
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    fn slot(&self, seq: u32) -> usize {
        seq as usize % self.size
    }

    fn top(&self) -> u32 {
        self.base.wrapping_add(self.size as u32 - 1)
    }

    pub fn accepts(&self, seq: u32) -> bool {
        inside(self.base, self.top(), seq)
    }

    /// Whether `seq` belongs to the window just behind `base`, i.e. was
    /// already delivered.
    pub fn is_behind(&self, seq: u32) -> bool {
        let size = self.size as u32;
        inside(
            self.base.wrapping_sub(size),
            self.base.wrapping_sub(1),
            seq,
        )
    }

    pub fn is_filled(&self, seq: u32) -> bool {
        self.accepts(seq) && self.slots[self.slot(seq)].is_some()
    }

    /// Buffer `data` at `seq`. Returns false when `seq` is outside the window
    /// or already buffered.
    pub fn insert(&mut self, seq: u32, data: Vec<u8>) -> bool {
        if !self.accepts(seq) {
            return false;
        }
        let idx = self.slot(seq);
        if self.slots[idx].is_some() {
            return false;
        }
        self.slots[idx] = Some(data);
        true
    }

    /// Take the payload at `base` if it has arrived, advancing `base`.
    pub fn pop(&mut self) -> Option<Vec<u8>> {
        let idx = self.slot(self.base);
        let data = self.slots[idx].take()?;
        self.base = self.base.wrapping_add(1);
        Some(data)
    }

    /// Step `base` over a sequence number that carries no payload (EOF).
    pub fn skip(&mut self) {
        let idx = self.slot(self.base);
        self.slots[idx] = None;
        self.base = self.base.wrapping_add(1);
    }
}
