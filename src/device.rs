//! The emulated chip.
//!
//! [`Device`] owns every piece of chip state: zones, key slot metadata, the
//! framer, the response buffer, the state tracker and the last error. The
//! bus collaborator drives it through [`Device::deliver_byte`] and
//! [`Device::take_response_byte`]; everything runs synchronously inside
//! those calls.
//!
//! The device has no internal locking. A multi-threaded host must serialize
//! all calls on one instance, e.g. behind a `Mutex<Device>`.

use log::{debug, info, warn};

use crate::command::{encode_command, verify_frame_crc, Command, WordAddress, MAX_PACKET_SIZE};
use crate::config::DeviceConfig;
use crate::crypto::{CryptoProvider, SimulatedCrypto};
use crate::error::{DeviceError, Result};
use crate::framer::{FrameEvent, Framer};
use crate::keystore::{KeyStore, KeyType, KEY_SIZE};
use crate::response::ResponseBuffer;
use crate::rng::{ClockSeededRng, RandomSource};
use crate::zone::ZoneMemory;

/// Power state of the chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum DeviceState {
    Idle = 0,
    Sleep = 1,
    Active = 2,
}

/// Emulated ATECC608 secure element
pub struct Device<R = ClockSeededRng, C = SimulatedCrypto> {
    pub(crate) config: DeviceConfig,
    pub(crate) state: DeviceState,
    pub(crate) last_error: Option<DeviceError>,
    pub(crate) zones: ZoneMemory,
    pub(crate) keys: KeyStore,
    pub(crate) framer: Framer,
    pub(crate) response: ResponseBuffer,
    pub(crate) execution_time: u32,
    pub(crate) temp_key: Option<[u8; KEY_SIZE]>,
    pub(crate) rng: R,
    pub(crate) crypto: C,
}

impl Device {
    /// Device with default configuration, clock-seeded randomness and
    /// simulated crypto.
    pub fn new() -> Self {
        Self::with_config(DeviceConfig::default())
    }

    pub fn with_config(config: DeviceConfig) -> Self {
        Self::with_parts(config, ClockSeededRng::new(), SimulatedCrypto)
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RandomSource, C: CryptoProvider> Device<R, C> {
    /// Device built from explicit collaborators.
    pub fn with_parts(config: DeviceConfig, rng: R, crypto: C) -> Self {
        let mut device = Self {
            config,
            state: DeviceState::Idle,
            last_error: None,
            zones: ZoneMemory::new(),
            keys: KeyStore::new(),
            framer: Framer::new(),
            response: ResponseBuffer::new(),
            execution_time: 0,
            temp_key: None,
            rng,
            crypto,
        };
        device.load_defaults();
        info!("ATECC608 emulator ready (bus address 0x{:02X})", device.config.bus_address);
        device
    }

    fn load_defaults(&mut self) {
        self.state = DeviceState::Idle;
        self.last_error = None;
        self.zones = ZoneMemory::new();
        self.zones.seed_config(&self.config.config_zone_image());
        self.keys = KeyStore::new();
        self.framer.reset();
        self.response.clear();
        self.execution_time = 0;
        self.temp_key = None;
    }

    /// Return to power-on defaults. All zone contents and keys are lost.
    pub fn reset(&mut self) {
        self.load_defaults();
        self.rng.reseed();
        info!("Device reset");
    }

    // ---------------------------------------------------------------------
    // Bus surface
    // ---------------------------------------------------------------------

    /// Deliver one byte written by the bus master. A completed frame is
    /// dispatched before this returns.
    pub fn deliver_byte(&mut self, byte: u8) {
        match self.framer.push(byte) {
            FrameEvent::Pending => {}
            FrameEvent::WordAddress(address) => self.on_word_address(address),
            FrameEvent::FrameReady => {
                let mut frame = [0u8; MAX_PACKET_SIZE];
                let len = self.framer.frame().len();
                frame[..len].copy_from_slice(self.framer.frame());
                self.process_frame(&frame[..len]);
            }
            FrameEvent::Rejected(err) => self.respond_error(err),
        }
    }

    /// Next response byte for a bus read.
    pub fn take_response_byte(&mut self) -> u8 {
        self.response.take_byte()
    }

    /// Encode a command and feed it through the bus surface. Returns the
    /// framed response.
    pub fn send_command(&mut self, opcode: u8, param1: u8, param2: u16, payload: &[u8]) -> Result<Vec<u8>> {
        let frame = encode_command(opcode, param1, param2, payload)?;
        for byte in frame {
            self.deliver_byte(byte);
        }
        Ok(self.response.as_bytes().to_vec())
    }

    fn on_word_address(&mut self, address: WordAddress) {
        match address {
            WordAddress::Reset => self.response.rewind(),
            WordAddress::Sleep => {
                self.temp_key = None;
                self.transition(DeviceState::Sleep);
            }
            WordAddress::Idle => self.transition(DeviceState::Idle),
            WordAddress::Command => {}
        }
    }

    fn process_frame(&mut self, frame: &[u8]) {
        if self.config.verify_crc {
            if let Err(err) = verify_frame_crc(frame) {
                warn!("Rejecting frame: {}", err);
                self.respond_error(err);
                return;
            }
        }

        match Command::parse(frame) {
            Ok(command) => {
                self.transition(DeviceState::Active);
                self.dispatch(&command);
            }
            Err(err) => self.respond_error(err),
        }
    }

    pub(crate) fn transition(&mut self, next: DeviceState) {
        if self.state != next {
            debug!("State {:?} -> {:?}", self.state, next);
            self.state = next;
        }
    }

    /// Record `err` as the last error and hand it back.
    pub(crate) fn fail(&mut self, err: DeviceError) -> DeviceError {
        debug!("Device error {}: {}", err.code(), err);
        self.last_error = Some(err);
        err
    }

    pub(crate) fn record<T>(&mut self, result: Result<T>) -> Result<T> {
        result.map_err(|err| self.fail(err))
    }

    pub(crate) fn respond_error(&mut self, err: DeviceError) {
        let err = self.fail(err);
        self.response.set(err.code(), &[]);
    }

    // ---------------------------------------------------------------------
    // State inspection
    // ---------------------------------------------------------------------

    pub fn state(&self) -> DeviceState {
        self.state
    }

    pub fn last_error(&self) -> Option<DeviceError> {
        self.last_error
    }

    /// Last error code, 0 when nothing has failed since reset.
    pub fn last_error_code(&self) -> u8 {
        self.last_error.map_or(0, |err| err.code())
    }

    /// Latency of the most recent recognised command.
    pub fn execution_time(&self) -> u32 {
        self.execution_time
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn zones(&self) -> &ZoneMemory {
        &self.zones
    }

    pub fn temp_key(&self) -> Option<&[u8; KEY_SIZE]> {
        self.temp_key.as_ref()
    }

    /// Pending framed response.
    pub fn response(&self) -> &[u8] {
        self.response.as_bytes()
    }

    // ---------------------------------------------------------------------
    // Zone memory
    // ---------------------------------------------------------------------

    pub fn read_zone(&mut self, zone: u8, address: u16, len: usize) -> Result<Vec<u8>> {
        let result = self.zones.read(zone, address, len);
        self.record(result)
    }

    pub fn write_zone(&mut self, zone: u8, address: u16, bytes: &[u8]) -> Result<()> {
        let result = self.zones.write(zone, address, bytes);
        self.record(result)
    }

    pub fn lock_config(&mut self) {
        self.zones.lock_config();
        info!("Config zone locked");
    }

    pub fn lock_data_and_otp(&mut self) {
        self.zones.lock_data_and_otp();
        info!("Data and OTP zones locked");
    }

    pub fn is_config_locked(&self) -> bool {
        self.zones.is_config_locked()
    }

    pub fn is_data_and_otp_locked(&self) -> bool {
        self.zones.is_data_and_otp_locked()
    }

    // ---------------------------------------------------------------------
    // Key store
    // ---------------------------------------------------------------------

    pub fn store_key(&mut self, slot: u16, key: &[u8; KEY_SIZE], key_type: KeyType) -> Result<()> {
        let result = self.keys.store_key(&mut self.zones, slot, key, key_type);
        self.record(result)
    }

    pub fn generate_key(&mut self, slot: u16, key_type: KeyType) -> Result<()> {
        let result = self
            .keys
            .generate_key(&mut self.zones, &mut self.rng, slot, key_type);
        self.record(result)
    }

    pub fn read_key(&mut self, slot: u16) -> Result<[u8; KEY_SIZE]> {
        let result = self.keys.read_key(&self.zones, slot);
        self.record(result)
    }

    pub fn key_type(&self, slot: u16) -> Option<KeyType> {
        self.keys.key_type(slot)
    }

    /// Slot key XOR `message`. Stand-in for an HMAC response.
    pub fn compute_combine(&mut self, slot: u16, message: &[u8; KEY_SIZE]) -> Result<[u8; KEY_SIZE]> {
        let result = self.keys.combine(&self.zones, slot, message);
        self.record(result)
    }

    pub fn derive_child(&mut self, parent_slot: u16) -> Result<[u8; KEY_SIZE]> {
        let result = self.keys.derive_child(&self.zones, parent_slot);
        self.record(result)
    }
}
