//! Frame CRC for the ATECC608 command/response protocol.
//!
//! The chip family stamps frames with a 16-bit CRC computed by a running
//! register that is byte-swapped, XORed with the next data byte and then has
//! its low nibble and shifted terms folded back in. That register update is
//! the table-free form of the CRC-16/XMODEM parameterisation (register starts
//! at zero, no reflection, no final XOR), so the catalogue algorithm from the
//! `crc` crate is used directly.

use crc::{Crc, CRC_16_XMODEM};

const FRAME_CRC: Crc<u16> = Crc::<u16>::new(&CRC_16_XMODEM);

/// CRC-16 over `data`.
pub fn crc16(data: &[u8]) -> u16 {
    FRAME_CRC.checksum(data)
}

/// Trailing check byte of a command frame.
///
/// Covers the frame from the length byte up to (not including) the CRC
/// position, truncated to the low byte.
pub fn command_crc(body: &[u8]) -> u8 {
    (crc16(body) & 0xFF) as u8
}
