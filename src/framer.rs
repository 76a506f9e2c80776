//! Byte-at-a-time command frame assembly.
//!
//! The bus collaborator hands over one byte per call. The framer tracks
//! whether it is waiting for a word address or accumulating a command frame
//! and reports each transition as a [`FrameEvent`]. It never blocks and holds
//! at most one frame; the device dispatches a ready frame before the next
//! byte arrives.

use log::{debug, trace, warn};

use crate::command::{WordAddress, MAX_PACKET_SIZE, MIN_FRAME_LEN, OFFSET_LENGTH};
use crate::error::DeviceError;

/// Framer states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramerState {
    AwaitingWordAddress,
    AccumulatingFrame,
}

/// Outcome of feeding one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// Byte consumed, nothing to act on yet.
    Pending,
    /// A non-command word address arrived.
    WordAddress(WordAddress),
    /// A complete frame is available from [`Framer::frame`].
    FrameReady,
    /// The frame in progress was dropped.
    Rejected(DeviceError),
}

/// Command frame assembler
#[derive(Debug, Clone)]
pub struct Framer {
    state: FramerState,
    buffer: [u8; MAX_PACKET_SIZE],
    pos: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Self {
            state: FramerState::AwaitingWordAddress,
            buffer: [0; MAX_PACKET_SIZE],
            pos: 0,
        }
    }

    pub fn state(&self) -> FramerState {
        self.state
    }

    /// Bytes held for the current frame, marker included.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// The last completed frame. Only meaningful right after
    /// [`FrameEvent::FrameReady`].
    pub fn frame(&self) -> &[u8] {
        &self.buffer[..self.pos]
    }

    /// Feed one byte from the bus.
    pub fn push(&mut self, byte: u8) -> FrameEvent {
        match self.state {
            FramerState::AwaitingWordAddress => self.on_word_address(byte),
            FramerState::AccumulatingFrame => self.on_frame_byte(byte),
        }
    }

    fn on_word_address(&mut self, byte: u8) -> FrameEvent {
        match WordAddress::from_u8(byte) {
            Some(WordAddress::Command) => {
                self.buffer[0] = byte;
                self.pos = 1;
                self.state = FramerState::AccumulatingFrame;
                trace!("Command word address, accumulating frame");
                FrameEvent::Pending
            }
            Some(address) => {
                debug!("Word address {:?}", address);
                FrameEvent::WordAddress(address)
            }
            None => {
                warn!("Ignoring unknown word address 0x{:02X}", byte);
                FrameEvent::Pending
            }
        }
    }

    fn on_frame_byte(&mut self, byte: u8) -> FrameEvent {
        if self.pos < MAX_PACKET_SIZE {
            self.buffer[self.pos] = byte;
            self.pos += 1;
        }

        let declared = self.buffer[OFFSET_LENGTH] as usize;
        if self.pos == OFFSET_LENGTH + 1 && !(MIN_FRAME_LEN..=MAX_PACKET_SIZE).contains(&declared) {
            warn!("Dropping frame with declared length {}", declared);
            self.abandon();
            return FrameEvent::Rejected(DeviceError::InvalidFrameLength(declared as u8));
        }

        if self.pos == declared {
            trace!("Frame complete ({} bytes): {}", self.pos, hex::encode_upper(self.frame()));
            self.state = FramerState::AwaitingWordAddress;
            return FrameEvent::FrameReady;
        }

        FrameEvent::Pending
    }

    fn abandon(&mut self) {
        self.state = FramerState::AwaitingWordAddress;
        self.pos = 0;
    }

    /// Drop any partial frame and wait for a word address.
    pub fn reset(&mut self) {
        self.buffer = [0; MAX_PACKET_SIZE];
        self.abandon();
    }
}
