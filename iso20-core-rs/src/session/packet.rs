//! V2GTP packet framing
//!
//! ```text
//! 0        1        2        4                 8
//! +--------+--------+--------+-----------------+----------------
//! | 0x01   | 0xFE   | type   | length (u32 BE) | payload ...
//! +--------+--------+--------+-----------------+----------------
//! ```

use tracing::error;

use crate::error::{Error, Result};
use crate::transport::Connection;

pub const V2GTP_VERSION: u8 = 0x01;
pub const V2GTP_HEADER_LENGTH: usize = 8;

/// Largest payload a packet buffer accepts
pub const MAX_PAYLOAD_LENGTH: usize = 16 * 1024;

/// Serialize a V2GTP header
pub fn encode_header(payload_type: u16, length: u32) -> [u8; V2GTP_HEADER_LENGTH] {
    let t = payload_type.to_be_bytes();
    let l = length.to_be_bytes();
    [V2GTP_VERSION, !V2GTP_VERSION, t[0], t[1], l[0], l[1], l[2], l[3]]
}

/// Prefix `payload` with its V2GTP header
pub fn frame(payload_type: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(V2GTP_HEADER_LENGTH + payload.len());
    out.extend_from_slice(&encode_header(payload_type, payload.len() as u32));
    out.extend_from_slice(payload);
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStatus {
    WouldBlock,
    Complete,
}

/// Incrementally filled packet buffer
///
/// Read progress survives across calls, so a packet can trickle in over
/// several polls. A payload is only visible once complete.
#[derive(Debug)]
pub struct PacketBuffer {
    header: [u8; V2GTP_HEADER_LENGTH],
    header_read: usize,
    payload: Vec<u8>,
    payload_read: usize,
    payload_type: u16,
    complete: bool,
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuffer {
    pub fn new() -> Self {
        Self {
            header: [0; V2GTP_HEADER_LENGTH],
            header_read: 0,
            payload: Vec::new(),
            payload_read: 0,
            payload_type: 0,
            complete: false,
        }
    }

    /// Pull as many bytes as available from `connection`
    pub fn read_from(&mut self, connection: &mut dyn Connection) -> Result<PacketStatus> {
        if self.complete {
            return Ok(PacketStatus::Complete);
        }

        while self.header_read < V2GTP_HEADER_LENGTH {
            let result = connection.read(&mut self.header[self.header_read..])?;
            self.header_read += result.bytes_read;
            if self.header_read < V2GTP_HEADER_LENGTH && (result.would_block || result.bytes_read == 0) {
                return Ok(PacketStatus::WouldBlock);
            }
        }

        if self.payload_read == 0 && self.payload.is_empty() {
            let length = self.parse_header()?;
            self.payload = vec![0; length];
        }

        while self.payload_read < self.payload.len() {
            let result = connection.read(&mut self.payload[self.payload_read..])?;
            self.payload_read += result.bytes_read;
            if self.payload_read < self.payload.len() && (result.would_block || result.bytes_read == 0) {
                return Ok(PacketStatus::WouldBlock);
            }
        }

        self.complete = true;
        Ok(PacketStatus::Complete)
    }

    fn parse_header(&mut self) -> Result<usize> {
        if self.header[0] != V2GTP_VERSION || self.header[1] != !V2GTP_VERSION {
            let msg = format!("version {:#04x}/{:#04x}", self.header[0], self.header[1]);
            error!("Invalid V2GTP header: {}", msg);
            return Err(Error::InvalidHeader(msg));
        }

        self.payload_type = u16::from_be_bytes([self.header[2], self.header[3]]);
        let length =
            u32::from_be_bytes([self.header[4], self.header[5], self.header[6], self.header[7]]) as usize;

        if length > MAX_PAYLOAD_LENGTH {
            error!("V2GTP payload of {} bytes exceeds buffer capacity", length);
            return Err(Error::PayloadTooLong {
                length,
                capacity: MAX_PAYLOAD_LENGTH,
            });
        }

        Ok(length)
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn payload_type(&self) -> u16 {
        self.payload_type
    }

    /// Complete payload, `None` while the packet is still arriving
    pub fn payload(&self) -> Option<&[u8]> {
        self.complete.then_some(self.payload.as_slice())
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::memory_pipe;

    #[test]
    fn test_header_layout() {
        assert_eq!(encode_header(0x8002, 0x0102_0304), [0x01, 0xFE, 0x80, 0x02, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn test_complete_packet() {
        let (mut evse, ev) = memory_pipe();
        ev.send(&frame(0x8004, b"hello"));

        let mut buffer = PacketBuffer::new();
        assert_eq!(buffer.read_from(&mut evse).unwrap(), PacketStatus::Complete);
        assert_eq!(buffer.payload_type(), 0x8004);
        assert_eq!(buffer.payload(), Some(&b"hello"[..]));
    }

    #[test]
    fn test_trickled_packet_keeps_progress() {
        let (mut evse, ev) = memory_pipe();
        let packet = frame(0x8002, b"abcdef");
        let mut buffer = PacketBuffer::new();

        ev.send(&packet[..5]);
        assert_eq!(buffer.read_from(&mut evse).unwrap(), PacketStatus::WouldBlock);
        assert!(buffer.payload().is_none());

        ev.send(&packet[5..10]);
        assert_eq!(buffer.read_from(&mut evse).unwrap(), PacketStatus::WouldBlock);
        assert!(buffer.payload().is_none());

        ev.send(&packet[10..]);
        assert_eq!(buffer.read_from(&mut evse).unwrap(), PacketStatus::Complete);
        assert_eq!(buffer.payload(), Some(&b"abcdef"[..]));

        buffer.reset();
        assert!(!buffer.is_complete());
    }

    #[test]
    fn test_empty_payload() {
        let (mut evse, ev) = memory_pipe();
        ev.send(&frame(0x8002, b""));

        let mut buffer = PacketBuffer::new();
        assert_eq!(buffer.read_from(&mut evse).unwrap(), PacketStatus::Complete);
        assert_eq!(buffer.payload(), Some(&[][..]));
    }

    #[test]
    fn test_invalid_header() {
        let (mut evse, ev) = memory_pipe();
        ev.send(&[0x02, 0xFD, 0x80, 0x02, 0, 0, 0, 0]);

        let mut buffer = PacketBuffer::new();
        assert!(matches!(buffer.read_from(&mut evse), Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_payload_too_long() {
        let (mut evse, ev) = memory_pipe();
        ev.send(&encode_header(0x8002, (MAX_PAYLOAD_LENGTH + 1) as u32));

        let mut buffer = PacketBuffer::new();
        assert!(matches!(buffer.read_from(&mut evse), Err(Error::PayloadTooLong { .. })));
    }
}
