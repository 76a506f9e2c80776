//! Device error taxonomy.
//!
//! Every failure the emulated chip can report maps to a stable one-byte code.
//! The code is what the device stores as its last error and what it returns
//! as the status byte of a failed response.

use thiserror::Error;

use crate::zone::Zone;

/// Result type used throughout the emulator.
pub type Result<T> = core::result::Result<T, DeviceError>;

/// Errors reported by the emulated secure element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeviceError {
    /// Single zone access larger than 32 bytes.
    #[error("access length {0} exceeds the 32-byte limit")]
    LengthTooLarge(usize),

    /// Zone tag outside CONFIG/OTP/DATA.
    #[error("invalid zone tag {0:#04x}")]
    InvalidZone(u8),

    /// `address + len` runs past the end of the zone.
    #[error("access at {address} of {len} bytes is out of range for {zone:?}")]
    OutOfRange { zone: Zone, address: u16, len: usize },

    /// Declared frame length cannot describe a command frame.
    #[error("invalid frame length {0}")]
    InvalidFrameLength(u8),

    /// Trailing CRC byte of a command frame did not match.
    #[error("frame CRC mismatch: expected {expected:#04x}, received {received:#04x}")]
    CrcMismatch { expected: u8, received: u8 },

    /// Command parameters or payload are not usable for the opcode.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// Opcode not recognised by the dispatcher.
    #[error("unknown command opcode {0:#04x}")]
    UnknownCommand(u8),

    /// Key slot index outside 0..16.
    #[error("invalid key slot {0}")]
    InvalidSlot(u16),

    /// Write command aimed at a locked zone.
    #[error("{0:?} zone is locked")]
    ZoneLocked(Zone),

    /// Signature did not verify against the slot's public key.
    #[error("signature verification failed")]
    SignatureMismatch,
}

impl DeviceError {
    /// Numeric code stored as the device's last error.
    pub fn code(&self) -> u8 {
        match self {
            DeviceError::LengthTooLarge(_) => 1,
            DeviceError::InvalidZone(_) => 2,
            DeviceError::OutOfRange { .. } => 3,
            DeviceError::InvalidFrameLength(_) => 4,
            DeviceError::CrcMismatch { .. } => 5,
            DeviceError::InvalidParameter(_) => 6,
            DeviceError::UnknownCommand(_) => 7,
            DeviceError::InvalidSlot(_) => 8,
            DeviceError::ZoneLocked(_) => 9,
            DeviceError::SignatureMismatch => 10,
        }
    }
}
