//! Zone memory model.
//!
//! Three fixed-size byte regions mirror the chip's EEPROM layout:
//!
//! | Zone   | Tag  | Size  | Erased value |
//! |--------|------|-------|--------------|
//! | Config | 0x00 | 128 B | 0xFF         |
//! | OTP    | 0x01 | 64 B  | 0x00         |
//! | Data   | 0x02 | 1024 B| 0x00         |
//!
//! Lock status lives inside the config zone: byte 87 locks the config zone,
//! byte 86 locks data and OTP together. A lock byte of 0x00 means locked. A
//! config write may set a lock byte to 0x00 but never clears one that is set.

use log::trace;

use crate::error::{DeviceError, Result};

pub const CONFIG_SIZE: usize = 128;
pub const OTP_SIZE: usize = 64;
pub const DATA_SIZE: usize = 1024;

/// Largest single read or write.
pub const MAX_ACCESS_LEN: usize = 32;

pub const CONFIG_LOCK_BYTE: usize = 87;
pub const DATA_LOCK_BYTE: usize = 86;

const LOCKED: u8 = 0x00;

/// Addressable memory zones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum Zone {
    Config = 0x00,
    Otp = 0x01,
    Data = 0x02,
}

impl Zone {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x00 => Some(Self::Config),
            0x01 => Some(Self::Otp),
            0x02 => Some(Self::Data),
            _ => None,
        }
    }

    /// Fixed size of the zone in bytes.
    pub fn size(self) -> usize {
        match self {
            Zone::Config => CONFIG_SIZE,
            Zone::Otp => OTP_SIZE,
            Zone::Data => DATA_SIZE,
        }
    }
}

/// Backing storage for the three zones.
#[derive(Clone)]
pub struct ZoneMemory {
    config: [u8; CONFIG_SIZE],
    otp: [u8; OTP_SIZE],
    data: [u8; DATA_SIZE],
}

impl Default for ZoneMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for ZoneMemory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ZoneMemory")
            .field("config_locked", &self.is_config_locked())
            .field("data_locked", &self.is_data_and_otp_locked())
            .finish_non_exhaustive()
    }
}

impl ZoneMemory {
    /// Erased memory: config all 0xFF, OTP and data all zero.
    pub fn new() -> Self {
        Self {
            config: [0xFF; CONFIG_SIZE],
            otp: [0; OTP_SIZE],
            data: [0; DATA_SIZE],
        }
    }

    /// Overlay power-on values on the config zone. Offsets past the zone
    /// are ignored.
    pub fn seed_config(&mut self, image: &[(u16, u8)]) {
        for &(offset, value) in image {
            if let Some(byte) = self.config.get_mut(offset as usize) {
                *byte = value;
            }
        }
    }

    fn zone(&self, zone: Zone) -> &[u8] {
        match zone {
            Zone::Config => &self.config,
            Zone::Otp => &self.otp,
            Zone::Data => &self.data,
        }
    }

    fn zone_mut(&mut self, zone: Zone) -> &mut [u8] {
        match zone {
            Zone::Config => &mut self.config,
            Zone::Otp => &mut self.otp,
            Zone::Data => &mut self.data,
        }
    }

    /// Validate an access and resolve the zone. Checks run in the order the
    /// chip reports them: length, zone tag, then bounds.
    fn check(tag: u8, address: u16, len: usize) -> Result<Zone> {
        if len > MAX_ACCESS_LEN {
            return Err(DeviceError::LengthTooLarge(len));
        }
        let zone = Zone::from_u8(tag).ok_or(DeviceError::InvalidZone(tag))?;
        if address as usize + len > zone.size() {
            return Err(DeviceError::OutOfRange { zone, address, len });
        }
        Ok(zone)
    }

    /// Copy `len` bytes starting at `address` out of the zone tagged `tag`.
    pub fn read(&self, tag: u8, address: u16, len: usize) -> Result<Vec<u8>> {
        let zone = Self::check(tag, address, len)?;
        let start = address as usize;
        trace!("zone read {:?} @{} len={}", zone, start, len);
        Ok(self.zone(zone)[start..start + len].to_vec())
    }

    /// Overwrite the addressed range with `bytes`. Nothing is written unless
    /// the whole access is valid.
    pub fn write(&mut self, tag: u8, address: u16, bytes: &[u8]) -> Result<()> {
        let zone = Self::check(tag, address, bytes.len())?;
        let start = address as usize;
        if zone == Zone::Config {
            self.check_lock_bytes(start, bytes)?;
        }
        trace!("zone write {:?} @{} len={}", zone, start, bytes.len());
        self.zone_mut(zone)[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Reject a config write that would clear a lock byte already set.
    fn check_lock_bytes(&self, start: usize, bytes: &[u8]) -> Result<()> {
        for (offset, guarded) in [(CONFIG_LOCK_BYTE, Zone::Config), (DATA_LOCK_BYTE, Zone::Data)] {
            let Some(index) = offset.checked_sub(start) else {
                continue;
            };
            match bytes.get(index) {
                Some(&value) if self.config[offset] == LOCKED && value != LOCKED => {
                    return Err(DeviceError::ZoneLocked(guarded));
                }
                _ => {}
            }
        }
        Ok(())
    }

    pub fn lock_config(&mut self) {
        self.config[CONFIG_LOCK_BYTE] = LOCKED;
    }

    pub fn lock_data_and_otp(&mut self) {
        self.config[DATA_LOCK_BYTE] = LOCKED;
    }

    pub fn is_config_locked(&self) -> bool {
        self.config[CONFIG_LOCK_BYTE] == LOCKED
    }

    pub fn is_data_and_otp_locked(&self) -> bool {
        self.config[DATA_LOCK_BYTE] == LOCKED
    }

    /// Whether writes to `zone` are blocked by its lock byte.
    pub fn is_locked(&self, zone: Zone) -> bool {
        match zone {
            Zone::Config => self.is_config_locked(),
            Zone::Otp | Zone::Data => self.is_data_and_otp_locked(),
        }
    }

    /// Raw view of a whole zone.
    pub fn contents(&self, zone: Zone) -> &[u8] {
        self.zone(zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_erased_state() {
        let mem = ZoneMemory::new();
        assert!(mem.contents(Zone::Config).iter().all(|&b| b == 0xFF));
        assert!(mem.contents(Zone::Otp).iter().all(|&b| b == 0));
        assert!(mem.contents(Zone::Data).iter().all(|&b| b == 0));
        assert!(!mem.is_config_locked());
        assert!(!mem.is_data_and_otp_locked());
    }

    #[test]
    fn test_write_then_read_each_zone() {
        let mut mem = ZoneMemory::new();
        let bytes = [0xA5u8; 32];
        for zone in [Zone::Config, Zone::Otp, Zone::Data] {
            let address = (zone.size() - 32) as u16;
            mem.write(zone as u8, address, &bytes).unwrap();
            assert_eq!(mem.read(zone as u8, address, 32).unwrap(), bytes.to_vec());
        }
    }

    #[test]
    fn test_length_checked_before_zone() {
        let mem = ZoneMemory::new();
        assert_eq!(mem.read(7, 0, 33), Err(DeviceError::LengthTooLarge(33)));
        assert_eq!(mem.read(7, 0, 4), Err(DeviceError::InvalidZone(7)));
        assert_eq!(mem.read(3, 0, 4), Err(DeviceError::InvalidZone(3)));
    }

    #[test]
    fn test_out_of_range_leaves_memory_untouched() {
        let mut mem = ZoneMemory::new();
        let before = mem.contents(Zone::Otp).to_vec();
        let result = mem.write(Zone::Otp as u8, 60, &[1, 2, 3, 4, 5]);
        assert_eq!(
            result,
            Err(DeviceError::OutOfRange { zone: Zone::Otp, address: 60, len: 5 })
        );
        assert_eq!(mem.contents(Zone::Otp), &before[..]);
    }

    #[test]
    fn test_address_near_u16_max_does_not_wrap() {
        let mem = ZoneMemory::new();
        assert!(matches!(
            mem.read(Zone::Data as u8, u16::MAX, 32),
            Err(DeviceError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_locks_are_idempotent() {
        let mut mem = ZoneMemory::new();
        mem.lock_config();
        mem.lock_config();
        assert!(mem.is_config_locked());
        assert!(!mem.is_data_and_otp_locked());

        mem.lock_data_and_otp();
        assert!(mem.is_locked(Zone::Otp));
        assert!(mem.is_locked(Zone::Data));
    }

    #[test]
    fn test_lock_bytes_cannot_be_cleared() {
        let mut mem = ZoneMemory::new();
        mem.lock_data_and_otp();

        // Config itself is unlocked, but byte 86 is held
        let result = mem.write(Zone::Config as u8, 84, &[0xFF; 4]);
        assert_eq!(result, Err(DeviceError::ZoneLocked(Zone::Data)));
        assert!(mem.is_data_and_otp_locked());
        assert_eq!(mem.contents(Zone::Config)[84], 0xFF);

        mem.lock_config();
        let result = mem.write(Zone::Config as u8, CONFIG_LOCK_BYTE as u16, &[0xFF]);
        assert_eq!(result, Err(DeviceError::ZoneLocked(Zone::Config)));
        assert!(mem.is_config_locked());
    }

    #[test]
    fn test_config_write_around_lock_bytes() {
        let mut mem = ZoneMemory::new();
        mem.lock_config();
        mem.lock_data_and_otp();

        // Rewriting the lock bytes as locked and touching neighbours is fine
        mem.write(Zone::Config as u8, 84, &[0x11, 0x22, 0x00, 0x00]).unwrap();
        mem.write(Zone::Config as u8, 88, &[0x33; 4]).unwrap();
        assert_eq!(&mem.contents(Zone::Config)[84..89], &[0x11, 0x22, 0x00, 0x00, 0x33]);

        // Writing 0x00 through a config write locks an unlocked zone
        let mut fresh = ZoneMemory::new();
        fresh.write(Zone::Config as u8, DATA_LOCK_BYTE as u16, &[0x00]).unwrap();
        assert!(fresh.is_data_and_otp_locked());
        assert!(!fresh.is_config_locked());
    }

    proptest! {
        #[test]
        fn prop_round_trip_within_bounds(
            tag in 0u8..3,
            len in 0usize..=32,
            seed in any::<u8>(),
            offset in any::<u16>(),
        ) {
            let mut mem = ZoneMemory::new();
            let size = Zone::from_u8(tag).unwrap().size();
            let address = (offset as usize % (size - len + 1)) as u16;
            let bytes: Vec<u8> = (0..len).map(|i| seed.wrapping_add(i as u8)).collect();

            mem.write(tag, address, &bytes).unwrap();
            prop_assert_eq!(mem.read(tag, address, len).unwrap(), bytes);
        }

        #[test]
        fn prop_rejected_writes_do_not_mutate(
            tag in 0u8..3,
            len in 1usize..=40,
            address in any::<u16>(),
        ) {
            let mut mem = ZoneMemory::new();
            let zone = Zone::from_u8(tag).unwrap();
            prop_assume!(len > MAX_ACCESS_LEN || address as usize + len > zone.size());

            let before = mem.contents(zone).to_vec();
            let bytes = vec![0x5A; len];
            let err = mem.write(tag, address, &bytes).unwrap_err();
            let read_err = mem.read(tag, address, len).unwrap_err();

            prop_assert_eq!(err, read_err);
            let expected = if len > MAX_ACCESS_LEN { 1 } else { 3 };
            prop_assert_eq!(err.code(), expected);
            prop_assert_eq!(mem.contents(zone), &before[..]);
        }
    }
}
