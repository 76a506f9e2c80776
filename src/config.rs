//! Device configuration.
//!
//! Values a host chooses when it instantiates an emulated chip. A default
//! configuration reproduces the power-on image the emulator has always used;
//! individual fields can be overridden with the `with_*` setters.

/// 7-bit bus address of the chip (0xC0 in 8-bit form).
pub const DEFAULT_BUS_ADDRESS: u8 = 0x60;

/// Revision reported by INFO mode 0.
pub const DEFAULT_REVISION: [u8; 4] = [0x00, 0x00, 0x60, 0x02];

/// Emulated device settings
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceConfig {
    /// Address the bus collaborator should match on. Not used by the core.
    pub bus_address: u8,

    // Power-on config zone image
    pub i2c_address: u8,
    pub chip_mode: u8,

    /// Bytes returned by INFO in revision mode.
    pub revision: [u8; 4],

    /// Reject command frames whose trailing CRC byte does not match.
    pub verify_crc: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            bus_address: DEFAULT_BUS_ADDRESS,
            i2c_address: 0x01, // config zone byte 0
            chip_mode: 0x23,   // config zone byte 1
            revision: DEFAULT_REVISION,
            verify_crc: true,
        }
    }
}

impl DeviceConfig {
    pub fn with_bus_address(mut self, address: u8) -> Self {
        self.bus_address = address;
        self
    }

    pub fn with_revision(mut self, revision: [u8; 4]) -> Self {
        self.revision = revision;
        self
    }

    /// Accept frames regardless of their CRC byte.
    pub fn without_crc_check(mut self) -> Self {
        self.verify_crc = false;
        self
    }

    /// Bytes written over the erased config zone at power-on and reset,
    /// as `(offset, value)` pairs.
    pub fn config_zone_image(&self) -> [(u16, u8); 2] {
        [(0, self.i2c_address), (1, self.chip_mode)]
    }
}
