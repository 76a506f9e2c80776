//! # atecc608-sim
//!
//! Behavioral emulator of an ATECC608-class secure element as seen from its
//! byte-oriented bus.
//!
//! The crate models the protocol side of the chip: command frames arrive one
//! byte at a time, are checked and dispatched, mutate a zoned memory image
//! (config, OTP, data with 16 key slots) and leave a CRC-stamped response
//! for the bus master to read back one byte at a time. Device state, the
//! last error and a per-command execution time are tracked alongside.
//!
//! Cryptographic results are simulated. Randomness and the asymmetric
//! operations are injected through [`RandomSource`] and [`CryptoProvider`]
//! so tests can be deterministic and a real backend can be substituted.
//!
//! ## Bus session
//!
//! ```
//! use atecc608_sim::{encode_command, Device, Opcode};
//!
//! let mut chip = Device::new();
//!
//! // Host writes a RANDOM command frame
//! for byte in encode_command(Opcode::Random as u8, 0, 0, &[]).unwrap() {
//!     chip.deliver_byte(byte);
//! }
//!
//! // ...and reads back status + 32 random bytes
//! let status = chip.take_response_byte();
//! let random: Vec<u8> = (0..32).map(|_| chip.take_response_byte()).collect();
//! assert_eq!(status, 0x00);
//! assert_eq!(random.len(), 32);
//! assert_eq!(chip.execution_time(), 23);
//! ```
//!
//! The emulator does not model the physical bus. A host embedding several
//! threads must serialize access to a [`Device`] itself.

pub mod command;
pub mod config;
pub mod crc;
pub mod crypto;
pub mod device;
mod dispatch;
pub mod error;
pub mod framer;
pub mod keystore;
pub mod response;
pub mod rng;
pub mod zone;

pub use command::{encode_command, Command, Opcode, WordAddress};
pub use config::DeviceConfig;
pub use crc::crc16;
pub use crypto::{CryptoProvider, SimulatedCrypto};
pub use device::{Device, DeviceState};
pub use error::{DeviceError, Result};
pub use keystore::{KeyType, KEY_SIZE, SLOT_COUNT};
pub use rng::{ClockSeededRng, RandomSource};
pub use zone::Zone;
