//! Command vocabulary: bus word addresses, opcodes and the command frame
//! layout.
//!
//! ```text
//! [0x03][len][opcode][param1][param2_lo][param2_hi][payload ...][crc]
//!   0     1     2       3        4          5          6..        len-1
//! ```
//!
//! `len` counts every byte of the frame from the 0x03 marker through the
//! trailing CRC byte. The CRC byte is the low byte of the frame CRC over
//! `frame[1..len - 1]`.

use crate::crc::command_crc;
use crate::error::{DeviceError, Result};

/// Offsets inside a command frame
pub const OFFSET_LENGTH: usize = 1;
pub const OFFSET_OPCODE: usize = 2;
pub const OFFSET_PARAM1: usize = 3;
pub const OFFSET_PARAM2: usize = 4;
pub const OFFSET_PAYLOAD: usize = 6;

/// Size of the command and response buffers.
pub const MAX_PACKET_SIZE: usize = 128;

/// Marker, length, opcode, param1, two param2 bytes and CRC.
pub const MIN_FRAME_LEN: usize = 7;

pub const MAX_PAYLOAD_LEN: usize = MAX_PACKET_SIZE - MIN_FRAME_LEN;

/// First byte of every bus write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WordAddress {
    /// Rewind the response read cursor.
    Reset = 0x00,
    Sleep = 0x01,
    Idle = 0x02,
    /// A command frame follows.
    Command = 0x03,
}

impl WordAddress {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Reset),
            0x01 => Some(Self::Sleep),
            0x02 => Some(Self::Idle),
            0x03 => Some(Self::Command),
            _ => None,
        }
    }
}

/// Recognised command opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Read = 0x02,
    Write = 0x12,
    Nonce = 0x16,
    Lock = 0x17,
    Random = 0x1B,
    Info = 0x30,
    GenKey = 0x40,
    Sign = 0x41,
    Verify = 0x45,
}

impl Opcode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x02 => Some(Self::Read),
            0x12 => Some(Self::Write),
            0x16 => Some(Self::Nonce),
            0x17 => Some(Self::Lock),
            0x1B => Some(Self::Random),
            0x30 => Some(Self::Info),
            0x40 => Some(Self::GenKey),
            0x41 => Some(Self::Sign),
            0x45 => Some(Self::Verify),
            _ => None,
        }
    }

    /// Typical execution time in milliseconds. Advisory only.
    pub fn execution_time(self) -> u32 {
        match self {
            Opcode::Random => 23,
            Opcode::Nonce => 7,
            Opcode::GenKey => 115,
            Opcode::Sign => 60,
            Opcode::Verify => 72,
            Opcode::Read => 1,
            Opcode::Write => 26,
            Opcode::Lock => 32,
            Opcode::Info => 1,
        }
    }
}

/// Decoded view of a complete command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Command<'a> {
    pub opcode: u8,
    pub param1: u8,
    pub param2: u16,
    pub payload: &'a [u8],
}

impl<'a> Command<'a> {
    /// Decode a frame whose length byte has already been validated.
    pub fn parse(frame: &'a [u8]) -> Result<Self> {
        let len = *frame
            .get(OFFSET_LENGTH)
            .ok_or(DeviceError::InvalidFrameLength(0))?;
        if (len as usize) < MIN_FRAME_LEN || frame.len() < len as usize {
            return Err(DeviceError::InvalidFrameLength(len));
        }
        let len = len as usize;

        Ok(Self {
            opcode: frame[OFFSET_OPCODE],
            param1: frame[OFFSET_PARAM1],
            param2: u16::from_le_bytes([frame[OFFSET_PARAM2], frame[OFFSET_PARAM2 + 1]]),
            payload: &frame[OFFSET_PAYLOAD..len - 1],
        })
    }
}

/// Check the trailing CRC byte of a complete frame.
pub fn verify_frame_crc(frame: &[u8]) -> Result<()> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(DeviceError::InvalidFrameLength(frame.len() as u8));
    }
    let crc_pos = frame.len() - 1;
    let expected = command_crc(&frame[OFFSET_LENGTH..crc_pos]);
    let received = frame[crc_pos];
    if expected != received {
        return Err(DeviceError::CrcMismatch { expected, received });
    }
    Ok(())
}

/// Build a complete command frame, marker and CRC included, as a host
/// would put it on the bus.
pub fn encode_command(opcode: u8, param1: u8, param2: u16, payload: &[u8]) -> Result<Vec<u8>> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(DeviceError::InvalidParameter("payload does not fit in a frame"));
    }
    let count = MIN_FRAME_LEN + payload.len();

    let mut frame = Vec::with_capacity(count);
    frame.push(WordAddress::Command as u8);
    frame.push(count as u8);
    frame.push(opcode);
    frame.push(param1);
    frame.extend_from_slice(&param2.to_le_bytes());
    frame.extend_from_slice(payload);
    let crc = command_crc(&frame[OFFSET_LENGTH..]);
    frame.push(crc);

    Ok(frame)
}
