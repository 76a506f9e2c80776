//! Outgoing response buffer.
//!
//! A response is laid out as `[status][payload ...][crc_lo][crc_hi]` with
//! the CRC taken over status and payload. The read cursor drains it one byte
//! per bus read; reads past the 128-byte buffer return 0.

use log::trace;

use crate::command::MAX_PACKET_SIZE;
use crate::crc::crc16;

pub const STATUS_SUCCESS: u8 = 0x00;

/// Status byte plus CRC.
const FRAMING_OVERHEAD: usize = 3;

pub const MAX_RESPONSE_PAYLOAD: usize = MAX_PACKET_SIZE - FRAMING_OVERHEAD;

#[derive(Debug, Clone)]
pub struct ResponseBuffer {
    buffer: [u8; MAX_PACKET_SIZE],
    len: usize,
    pos: usize,
}

impl Default for ResponseBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self {
            buffer: [0; MAX_PACKET_SIZE],
            len: 0,
            pos: 0,
        }
    }

    /// Replace the pending response and rewind the read cursor. Payload
    /// beyond the buffer capacity is truncated.
    pub fn set(&mut self, status: u8, payload: &[u8]) {
        let n = payload.len().min(MAX_RESPONSE_PAYLOAD);
        self.buffer = [0; MAX_PACKET_SIZE];
        self.buffer[0] = status;
        self.buffer[1..1 + n].copy_from_slice(&payload[..n]);

        let crc = crc16(&self.buffer[..1 + n]);
        self.buffer[1 + n..FRAMING_OVERHEAD + n].copy_from_slice(&crc.to_le_bytes());
        self.len = FRAMING_OVERHEAD + n;
        self.pos = 0;
        trace!("Response staged: {:02X?}", &self.buffer[..self.len]);
    }

    /// Next byte for the bus, 0 once the buffer bound is reached.
    pub fn take_byte(&mut self) -> u8 {
        if self.pos < MAX_PACKET_SIZE {
            let byte = self.buffer[self.pos];
            self.pos += 1;
            byte
        } else {
            0
        }
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    /// Framed length of the pending response.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Framed bytes of the pending response.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..self.len]
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}
