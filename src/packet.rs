use anyhow::{anyhow, Ok};
use std::str;

use crate::MAX_PAYLOAD;

const SYNC: u8 = 0;
const DATA: u8 = 1;
const EOF: u8 = 2;

/// type (1) + sequence (4) + payload length (2)
pub const HEADER_SIZE: usize = 7;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Sync { filename: String },
    Data { seq: u32, data: Vec<u8> },
    Eof { seq: u32 },
}

impl Packet {
    /// Sequence number occupied in the window. SYNC sits outside the window.
    pub fn seq(&self) -> Option<u32> {
        match self {
            Packet::Sync { .. } => None,
            Packet::Data { seq, .. } | Packet::Eof { seq } => Some(*seq),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let (opcode, seq, payload): (u8, u32, &[u8]) = match self {
            Packet::Sync { filename } => (SYNC, 0, filename.as_bytes()),
            Packet::Data { seq, data } => (DATA, *seq, data.as_slice()),
            Packet::Eof { seq } => (EOF, *seq, &[][..]),
        };

        let mut bytes: Vec<u8> = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.push(opcode);
        bytes.extend_from_slice(&seq.to_be_bytes());
        bytes.extend_from_slice(&(payload.len() as u16).to_be_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    pub fn deserialize(buf: &[u8]) -> anyhow::Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(anyhow!("Packet length too short"));
        }

        let opcode = buf[0];
        let seq = u32::from_be_bytes(buf[1..5].try_into()?);
        let len = usize::from(u16::from_be_bytes([buf[5], buf[6]]));
        if len > MAX_PAYLOAD {
            return Err(anyhow!("Payload length {len} exceeds {MAX_PAYLOAD}"));
        }
        let payload = &buf[HEADER_SIZE..];
        if payload.len() != len {
            return Err(anyhow!(
                "Payload length mismatch: header says {len}, got {}",
                payload.len()
            ));
        }

        let pkt = match opcode {
            SYNC => {
                let filename = str::from_utf8(payload)
                    .map_err(|_| anyhow!("Invalid filename encoding"))?
                    .to_string();
                Packet::Sync { filename }
            }
            DATA => Packet::Data {
                seq,
                data: payload.to_vec(),
            },
            EOF => Packet::Eof { seq },
            _ => {
                return Err(anyhow!("Invalid opcode: {}", opcode));
            }
        };

        Ok(pkt)
    }
}

/// Acks and the handshake response are a bare big-endian u32.
pub fn encode_ack(seq: u32) -> [u8; 4] {
    seq.to_be_bytes()
}

pub fn decode_ack(buf: &[u8]) -> Option<u32> {
    let bytes: [u8; 4] = buf.try_into().ok()?;
    Some(u32::from_be_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_layout() {
        let pkt = Packet::Data {
            seq: 0x0102_0304,
            data: b"abc".to_vec(),
        };
        let bytes = pkt.serialize();
        assert_eq!(bytes, [1, 1, 2, 3, 4, 0, 3, b'a', b'b', b'c']);
        assert_eq!(bytes.len(), HEADER_SIZE + 3);
        assert_eq!(Packet::deserialize(&bytes).unwrap(), pkt);
    }

    #[test]
    fn sync_carries_filename() {
        let pkt = Packet::Sync {
            filename: "notes.txt".to_string(),
        };
        let bytes = pkt.serialize();
        assert_eq!(bytes[0], SYNC);
        assert_eq!(pkt.seq(), None);
        assert_eq!(Packet::deserialize(&bytes).unwrap(), pkt);
    }

    #[test]
    fn eof_is_header_only() {
        let pkt = Packet::Eof { seq: u32::MAX };
        let bytes = pkt.serialize();
        assert_eq!(bytes.len(), HEADER_SIZE);
        assert_eq!(Packet::deserialize(&bytes).unwrap().seq(), Some(u32::MAX));
    }

    #[test]
    fn rejects_malformed() {
        assert!(Packet::deserialize(&[1, 0, 0]).is_err());
        // unknown opcode
        assert!(Packet::deserialize(&[9, 0, 0, 0, 0, 0, 0]).is_err());
        // truncated payload
        assert!(Packet::deserialize(&[1, 0, 0, 0, 0, 0, 4, 1, 2]).is_err());
        // oversized length field
        let mut buf = vec![1, 0, 0, 0, 0, 0x04, 0x01];
        buf.resize(HEADER_SIZE + 1025, 0);
        assert!(Packet::deserialize(&buf).is_err());
    }

    #[test]
    fn ack_is_four_bytes() {
        assert_eq!(encode_ack(7), [0, 0, 0, 7]);
        assert_eq!(decode_ack(&encode_ack(0xdead_beef)), Some(0xdead_beef));
        assert_eq!(decode_ack(&[0, 0, 7]), None);
        assert_eq!(decode_ack(&[0, 0, 0, 0, 7]), None);
    }
}
