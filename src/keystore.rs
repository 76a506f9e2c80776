//! Key slots in the data zone.
//!
//! Sixteen 32-byte slots, slot *n* at data-zone offset `32 * n`. All key
//! material goes through the zone memory so the usual length and bounds
//! checks apply; slot ids are validated first.
//!
//! `combine` and `derive_child` are behavioral stand-ins for the chip's HMAC
//! and key-derivation responses. They are plain XOR transforms and provide no
//! security.

use log::debug;

use crate::error::{DeviceError, Result};
use crate::rng::RandomSource;
use crate::zone::{Zone, ZoneMemory};

pub const SLOT_COUNT: usize = 16;
pub const KEY_SIZE: usize = 32;

/// Key type recorded with a slot. Storage layout is the same for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum KeyType {
    P256 = 0x04,
    Aes = 0x06,
}

/// Byte-wise XOR of a key and a message.
pub fn xor_combine(key: &[u8; KEY_SIZE], message: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = key[i] ^ message[i];
    }
    out
}

/// Child key: `parent[i] ^ (i + 1)`.
pub fn derive_child_key(parent: &[u8; KEY_SIZE]) -> [u8; KEY_SIZE] {
    let mut out = [0u8; KEY_SIZE];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = parent[i] ^ (i as u8 + 1);
    }
    out
}

fn slot_address(slot: u16) -> Result<u16> {
    if slot as usize >= SLOT_COUNT {
        return Err(DeviceError::InvalidSlot(slot));
    }
    Ok(slot * KEY_SIZE as u16)
}

/// Slot bookkeeping on top of the data zone.
#[derive(Debug, Clone, Default)]
pub struct KeyStore {
    key_types: [Option<KeyType>; SLOT_COUNT],
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Key type last recorded for `slot`, if any.
    pub fn key_type(&self, slot: u16) -> Option<KeyType> {
        self.key_types.get(slot as usize).copied().flatten()
    }

    pub fn store_key(
        &mut self,
        zones: &mut ZoneMemory,
        slot: u16,
        key: &[u8; KEY_SIZE],
        key_type: KeyType,
    ) -> Result<()> {
        let address = slot_address(slot)?;
        zones.write(Zone::Data as u8, address, key)?;
        self.key_types[slot as usize] = Some(key_type);
        debug!("Stored {:?} key in slot {}", key_type, slot);
        Ok(())
    }

    /// Fill `slot` with 32 bytes from `rng`.
    pub fn generate_key(
        &mut self,
        zones: &mut ZoneMemory,
        rng: &mut dyn RandomSource,
        slot: u16,
        key_type: KeyType,
    ) -> Result<()> {
        slot_address(slot)?;
        let mut key = [0u8; KEY_SIZE];
        rng.fill_bytes(&mut key);
        self.store_key(zones, slot, &key, key_type)
    }

    pub fn read_key(&self, zones: &ZoneMemory, slot: u16) -> Result<[u8; KEY_SIZE]> {
        let address = slot_address(slot)?;
        let bytes = zones.read(Zone::Data as u8, address, KEY_SIZE)?;
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&bytes);
        Ok(key)
    }

    /// Slot key XOR `message`.
    pub fn combine(
        &self,
        zones: &ZoneMemory,
        slot: u16,
        message: &[u8; KEY_SIZE],
    ) -> Result<[u8; KEY_SIZE]> {
        let key = self.read_key(zones, slot)?;
        Ok(xor_combine(&key, message))
    }

    pub fn derive_child(&self, zones: &ZoneMemory, parent_slot: u16) -> Result<[u8; KEY_SIZE]> {
        let parent = self.read_key(zones, parent_slot)?;
        Ok(derive_child_key(&parent))
    }
}
