//! Command dispatch.
//!
//! Each recognised opcode records its typical latency, runs against the zone
//! memory, key store or crypto provider, and stages a response. Failures are
//! recorded as the device's last error and returned to the host as the
//! status byte.

use log::{debug, info, warn};

use crate::command::{Command, Opcode};
use crate::crypto::{CryptoProvider, DIGEST_SIZE, SIGNATURE_SIZE};
use crate::device::Device;
use crate::error::{DeviceError, Result};
use crate::keystore::{KeyType, KEY_SIZE};
use crate::response::STATUS_SUCCESS;
use crate::rng::RandomSource;
use crate::zone::Zone;

/// READ/WRITE param1: zone tag bits.
const ZONE_MASK: u8 = 0x03;
/// READ param1: 32-byte block instead of a 4-byte word.
const READ_BLOCK_FLAG: u8 = 0x80;
const WORD_SIZE: usize = 4;
const BLOCK_SIZE: usize = 32;

/// LOCK param1 bit 0: clear locks config, set locks data and OTP.
const LOCK_DATA_FLAG: u8 = 0x01;

/// NONCE mode that loads the payload directly into TempKey.
const NONCE_MODE_PASSTHROUGH: u8 = 0x03;

/// GENKEY mode bit requesting a fresh private key.
const GENKEY_MODE_CREATE: u8 = 0x04;

const INFO_MODE_REVISION: u8 = 0x00;
const INFO_MODE_STATE: u8 = 0x02;

impl<R: RandomSource, C: CryptoProvider> Device<R, C> {
    /// Run one decoded command and stage its response.
    pub(crate) fn dispatch(&mut self, command: &Command<'_>) {
        let Some(opcode) = Opcode::from_u8(command.opcode) else {
            warn!("Unknown opcode 0x{:02X}", command.opcode);
            self.respond_error(DeviceError::UnknownCommand(command.opcode));
            return;
        };

        self.execution_time = opcode.execution_time();
        debug!(
            "Dispatch {:?} p1=0x{:02X} p2=0x{:04X} payload={} bytes ({} ms)",
            opcode,
            command.param1,
            command.param2,
            command.payload.len(),
            self.execution_time
        );

        let result = match opcode {
            Opcode::Random => self.cmd_random(),
            Opcode::Nonce => self.cmd_nonce(command),
            Opcode::GenKey => self.cmd_genkey(command),
            Opcode::Sign => self.cmd_sign(command),
            Opcode::Verify => self.cmd_verify(command),
            Opcode::Read => self.cmd_read(command),
            Opcode::Write => self.cmd_write(command),
            Opcode::Lock => self.cmd_lock(command),
            Opcode::Info => self.cmd_info(command),
        };

        match result {
            Ok(payload) => self.response.set(STATUS_SUCCESS, &payload),
            Err(err) => self.respond_error(err),
        }
    }

    fn cmd_random(&mut self) -> Result<Vec<u8>> {
        let mut random = vec![0u8; 32];
        self.rng.fill_bytes(&mut random);
        Ok(random)
    }

    fn cmd_nonce(&mut self, command: &Command<'_>) -> Result<Vec<u8>> {
        if command.param1 == NONCE_MODE_PASSTHROUGH {
            let temp_key: [u8; KEY_SIZE] = command
                .payload
                .try_into()
                .map_err(|_| DeviceError::InvalidParameter("pass-through nonce needs 32 bytes"))?;
            self.temp_key = Some(temp_key);
            return Ok(Vec::new());
        }

        let mut rand_out = [0u8; KEY_SIZE];
        self.rng.fill_bytes(&mut rand_out);
        self.temp_key = Some(rand_out);
        Ok(rand_out.to_vec())
    }

    fn cmd_genkey(&mut self, command: &Command<'_>) -> Result<Vec<u8>> {
        let slot = command.param2;
        if command.param1 & GENKEY_MODE_CREATE != 0 {
            self.keys
                .generate_key(&mut self.zones, &mut self.rng, slot, KeyType::P256)?;
            info!("Generated private key in slot {}", slot);
        }
        let private_key = self.keys.read_key(&self.zones, slot)?;
        Ok(self.crypto.public_key(&private_key).to_vec())
    }

    /// Digest to sign: a 32-byte payload if present, else TempKey.
    fn sign_digest(&self, payload: &[u8]) -> Result<[u8; DIGEST_SIZE]> {
        if payload.is_empty() {
            return self
                .temp_key
                .ok_or(DeviceError::InvalidParameter("no digest and TempKey is empty"));
        }
        payload
            .try_into()
            .map_err(|_| DeviceError::InvalidParameter("digest must be 32 bytes"))
    }

    fn cmd_sign(&mut self, command: &Command<'_>) -> Result<Vec<u8>> {
        let digest = self.sign_digest(command.payload)?;
        let private_key = self.keys.read_key(&self.zones, command.param2)?;
        let signature = self.crypto.sign(&private_key, &digest, &mut self.rng);
        Ok(signature.to_vec())
    }

    fn cmd_verify(&mut self, command: &Command<'_>) -> Result<Vec<u8>> {
        let signature: [u8; SIGNATURE_SIZE] = command
            .payload
            .try_into()
            .map_err(|_| DeviceError::InvalidParameter("signature must be 64 bytes"))?;
        let digest = self
            .temp_key
            .ok_or(DeviceError::InvalidParameter("TempKey is empty"))?;
        let private_key = self.keys.read_key(&self.zones, command.param2)?;
        let public_key = self.crypto.public_key(&private_key);

        if self.crypto.verify(&public_key, &digest, &signature) {
            Ok(Vec::new())
        } else {
            Err(DeviceError::SignatureMismatch)
        }
    }

    fn cmd_read(&mut self, command: &Command<'_>) -> Result<Vec<u8>> {
        let len = if command.param1 & READ_BLOCK_FLAG != 0 {
            BLOCK_SIZE
        } else {
            WORD_SIZE
        };
        self.zones.read(command.param1 & ZONE_MASK, command.param2, len)
    }

    fn cmd_write(&mut self, command: &Command<'_>) -> Result<Vec<u8>> {
        let tag = command.param1 & ZONE_MASK;
        if let Some(zone) = Zone::from_u8(tag) {
            if self.zones.is_locked(zone) {
                return Err(DeviceError::ZoneLocked(zone));
            }
        }
        self.zones.write(tag, command.param2, command.payload)?;
        Ok(Vec::new())
    }

    fn cmd_lock(&mut self, command: &Command<'_>) -> Result<Vec<u8>> {
        if command.param1 & LOCK_DATA_FLAG == 0 {
            self.lock_config();
        } else {
            self.lock_data_and_otp();
        }
        Ok(Vec::new())
    }

    fn cmd_info(&mut self, command: &Command<'_>) -> Result<Vec<u8>> {
        match command.param1 {
            INFO_MODE_REVISION => Ok(self.config.revision.to_vec()),
            INFO_MODE_STATE => Ok(vec![
                self.last_error_code(),
                self.state as u8,
                self.zones.is_config_locked() as u8,
                self.zones.is_data_and_otp_locked() as u8,
            ]),
            _ => Err(DeviceError::InvalidParameter("unsupported INFO mode")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;
    use crate::crypto::{SimulatedCrypto, PUBLIC_KEY_SIZE};
    use crate::device::DeviceState;
    use crate::zone::CONFIG_LOCK_BYTE;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_device() -> Device<StdRng, SimulatedCrypto> {
        Device::with_parts(DeviceConfig::default(), StdRng::seed_from_u64(42), SimulatedCrypto)
    }

    /// Crypto provider that rejects every signature.
    struct RejectingCrypto;

    impl CryptoProvider for RejectingCrypto {
        fn public_key(&self, _private_key: &[u8; KEY_SIZE]) -> [u8; PUBLIC_KEY_SIZE] {
            [0x04; PUBLIC_KEY_SIZE]
        }

        fn sign(
            &mut self,
            _private_key: &[u8; KEY_SIZE],
            _digest: &[u8; DIGEST_SIZE],
            _rng: &mut dyn RandomSource,
        ) -> [u8; SIGNATURE_SIZE] {
            [0; SIGNATURE_SIZE]
        }

        fn verify(
            &self,
            _public_key: &[u8; PUBLIC_KEY_SIZE],
            _digest: &[u8; DIGEST_SIZE],
            _signature: &[u8; SIGNATURE_SIZE],
        ) -> bool {
            false
        }
    }

    // =========================================================================
    // RANDOM / NONCE
    // =========================================================================

    #[test]
    fn test_random_response_layout() {
        let mut device = test_device();
        let response = device.send_command(Opcode::Random as u8, 0, 0, &[]).unwrap();

        assert_eq!(response.len(), 1 + 32 + 2);
        assert_eq!(response[0], STATUS_SUCCESS);
        let crc = crate::crc::crc16(&response[..33]);
        assert_eq!(&response[33..], &crc.to_le_bytes()[..]);
        assert_eq!(device.execution_time(), 23);
    }

    #[test]
    fn test_random_output_changes() {
        let mut device = test_device();
        let first = device.send_command(Opcode::Random as u8, 0, 0, &[]).unwrap();
        let second = device.send_command(Opcode::Random as u8, 0, 0, &[]).unwrap();
        assert_ne!(first[1..33], second[1..33]);
    }

    #[test]
    fn test_nonce_passthrough_loads_temp_key() {
        let mut device = test_device();
        let nonce = [0x5Au8; 32];
        let response = device
            .send_command(Opcode::Nonce as u8, NONCE_MODE_PASSTHROUGH, 0, &nonce)
            .unwrap();
        assert_eq!(response[0], STATUS_SUCCESS);
        assert_eq!(response.len(), 3);
        assert_eq!(device.temp_key(), Some(&nonce));
        assert_eq!(device.execution_time(), 7);
    }

    #[test]
    fn test_nonce_random_mode_returns_temp_key() {
        let mut device = test_device();
        let response = device
            .send_command(Opcode::Nonce as u8, 0x00, 0, &[0x11; 20])
            .unwrap();
        assert_eq!(response[0], STATUS_SUCCESS);
        assert_eq!(device.temp_key().map(|k| &k[..]), Some(&response[1..33]));
    }

    #[test]
    fn test_nonce_passthrough_wrong_size() {
        let mut device = test_device();
        let response = device
            .send_command(Opcode::Nonce as u8, NONCE_MODE_PASSTHROUGH, 0, &[1, 2, 3])
            .unwrap();
        assert_eq!(response[0], 6);
        assert_eq!(device.last_error_code(), 6);
        assert!(device.temp_key().is_none());
    }

    // =========================================================================
    // READ / WRITE / LOCK
    // =========================================================================

    #[test]
    fn test_write_then_read_block() {
        let mut device = test_device();
        let block = [0xC3u8; 32];
        let write = device
            .send_command(Opcode::Write as u8, Zone::Data as u8, 64, &block)
            .unwrap();
        assert_eq!(write[0], STATUS_SUCCESS);
        assert_eq!(device.execution_time(), 26);

        let read = device
            .send_command(Opcode::Read as u8, READ_BLOCK_FLAG | Zone::Data as u8, 64, &[])
            .unwrap();
        assert_eq!(read[0], STATUS_SUCCESS);
        assert_eq!(&read[1..33], &block[..]);
        assert_eq!(device.execution_time(), 1);
    }

    #[test]
    fn test_read_word_of_config() {
        let mut device = test_device();
        let read = device
            .send_command(Opcode::Read as u8, Zone::Config as u8, 0, &[])
            .unwrap();
        assert_eq!(&read[..5], &[STATUS_SUCCESS, 0x01, 0x23, 0xFF, 0xFF]);
    }

    #[test]
    fn test_read_out_of_range_reports_code() {
        let mut device = test_device();
        let read = device
            .send_command(Opcode::Read as u8, READ_BLOCK_FLAG | Zone::Otp as u8, 40, &[])
            .unwrap();
        assert_eq!(read[0], 3);
        assert_eq!(read.len(), 3);
        assert_eq!(device.last_error_code(), 3);
    }

    #[test]
    fn test_invalid_zone_tag() {
        let mut device = test_device();
        let read = device.send_command(Opcode::Read as u8, 0x03, 0, &[]).unwrap();
        assert_eq!(read[0], 2);
    }

    #[test]
    fn test_lock_command_blocks_writes() {
        let mut device = test_device();
        let lock = device.send_command(Opcode::Lock as u8, 0x00, 0, &[]).unwrap();
        assert_eq!(lock[0], STATUS_SUCCESS);
        assert_eq!(device.execution_time(), 32);
        assert!(device.is_config_locked());
        assert!(!device.is_data_and_otp_locked());

        let write = device
            .send_command(Opcode::Write as u8, Zone::Config as u8, 16, &[0; 4])
            .unwrap();
        assert_eq!(write[0], 9);
        assert_eq!(device.last_error(), Some(DeviceError::ZoneLocked(Zone::Config)));

        // Data zone still writable until its own lock
        let write = device
            .send_command(Opcode::Write as u8, Zone::Data as u8, 0, &[1; 4])
            .unwrap();
        assert_eq!(write[0], STATUS_SUCCESS);

        device.send_command(Opcode::Lock as u8, LOCK_DATA_FLAG, 0, &[]).unwrap();
        let write = device
            .send_command(Opcode::Write as u8, Zone::Otp as u8, 0, &[1; 4])
            .unwrap();
        assert_eq!(write[0], 9);
        assert_eq!(device.zones().contents(Zone::Config)[CONFIG_LOCK_BYTE], 0x00);
    }

    #[test]
    fn test_config_write_cannot_unlock_data() {
        let mut device = test_device();
        device.send_command(Opcode::Lock as u8, LOCK_DATA_FLAG, 0, &[]).unwrap();

        // Config zone is still open, but the range covers the data lock byte
        let write = device
            .send_command(Opcode::Write as u8, Zone::Config as u8, 84, &[0xFF; 4])
            .unwrap();
        assert_eq!(write[0], 9);
        assert_eq!(device.last_error(), Some(DeviceError::ZoneLocked(Zone::Data)));
        assert!(device.is_data_and_otp_locked());

        let write = device
            .send_command(Opcode::Write as u8, Zone::Data as u8, 0, &[0xFF; 4])
            .unwrap();
        assert_eq!(write[0], 9);
        assert!(device.zones().contents(Zone::Data)[..4].iter().all(|&b| b == 0));
    }

    // =========================================================================
    // GENKEY / SIGN / VERIFY
    // =========================================================================

    #[test]
    fn test_genkey_creates_key_and_returns_public_key() {
        let mut device = test_device();
        let response = device
            .send_command(Opcode::GenKey as u8, GENKEY_MODE_CREATE, 2, &[])
            .unwrap();
        assert_eq!(response[0], STATUS_SUCCESS);
        assert_eq!(response.len(), 1 + PUBLIC_KEY_SIZE + 2);
        assert_eq!(device.execution_time(), 115);
        assert_eq!(device.key_type(2), Some(KeyType::P256));

        // Public-key mode recomputes the same key without regenerating
        let again = device.send_command(Opcode::GenKey as u8, 0x00, 2, &[]).unwrap();
        assert_eq!(again[..1 + PUBLIC_KEY_SIZE], response[..1 + PUBLIC_KEY_SIZE]);
    }

    #[test]
    fn test_genkey_invalid_slot() {
        let mut device = test_device();
        let response = device
            .send_command(Opcode::GenKey as u8, GENKEY_MODE_CREATE, 16, &[])
            .unwrap();
        assert_eq!(response[0], 8);
        assert_eq!(device.last_error(), Some(DeviceError::InvalidSlot(16)));
    }

    #[test]
    fn test_sign_with_payload_digest() {
        let mut device = test_device();
        device.generate_key(1, KeyType::P256).unwrap();
        let response = device
            .send_command(Opcode::Sign as u8, 0x80, 1, &[0x42; 32])
            .unwrap();
        assert_eq!(response[0], STATUS_SUCCESS);
        assert_eq!(response.len(), 1 + SIGNATURE_SIZE + 2);
        assert_eq!(device.execution_time(), 60);
    }

    #[test]
    fn test_sign_without_digest_fails() {
        let mut device = test_device();
        let response = device.send_command(Opcode::Sign as u8, 0x80, 1, &[]).unwrap();
        assert_eq!(response[0], 6);
    }

    #[test]
    fn test_sign_then_verify_with_temp_key() {
        let mut device = test_device();
        device.generate_key(0, KeyType::P256).unwrap();
        device
            .send_command(Opcode::Nonce as u8, NONCE_MODE_PASSTHROUGH, 0, &[0x24; 32])
            .unwrap();

        let signed = device.send_command(Opcode::Sign as u8, 0x80, 0, &[]).unwrap();
        assert_eq!(signed[0], STATUS_SUCCESS);

        let signature = signed[1..1 + SIGNATURE_SIZE].to_vec();
        let verified = device
            .send_command(Opcode::Verify as u8, 0x00, 0, &signature)
            .unwrap();
        assert_eq!(verified[0], STATUS_SUCCESS);
        assert_eq!(device.execution_time(), 72);
    }

    #[test]
    fn test_verify_rejection_from_provider() {
        let mut device = Device::with_parts(
            DeviceConfig::default(),
            StdRng::seed_from_u64(5),
            RejectingCrypto,
        );
        device
            .send_command(Opcode::Nonce as u8, NONCE_MODE_PASSTHROUGH, 0, &[0; 32])
            .unwrap();
        let response = device
            .send_command(Opcode::Verify as u8, 0x00, 0, &[0; SIGNATURE_SIZE])
            .unwrap();
        assert_eq!(response[0], 10);
        assert_eq!(device.last_error(), Some(DeviceError::SignatureMismatch));
    }

    // =========================================================================
    // INFO / unknown opcodes
    // =========================================================================

    #[test]
    fn test_info_revision_and_state() {
        let mut device = test_device();
        let revision = device.send_command(Opcode::Info as u8, INFO_MODE_REVISION, 0, &[]).unwrap();
        assert_eq!(&revision[..5], &[STATUS_SUCCESS, 0x00, 0x00, 0x60, 0x02]);

        let _ = device.read_zone(Zone::Data as u8, 1020, 8);
        device.lock_data_and_otp();
        let state = device.send_command(Opcode::Info as u8, INFO_MODE_STATE, 0, &[]).unwrap();
        assert_eq!(
            &state[..5],
            &[STATUS_SUCCESS, 3, DeviceState::Active as u8, 0, 1]
        );
    }

    #[test]
    fn test_unknown_opcode() {
        let mut device = test_device();
        device.send_command(Opcode::Random as u8, 0, 0, &[]).unwrap();
        let data_before = device.zones().contents(Zone::Data).to_vec();
        let config_before = device.zones().contents(Zone::Config).to_vec();

        let response = device.send_command(0x99, 0xFF, 0xFFFF, &[0xAA; 32]).unwrap();
        assert_eq!(response[0], 7);
        assert_eq!(device.last_error_code(), 7);
        // No latency recorded for unrecognised opcodes
        assert_eq!(device.execution_time(), 23);
        assert_eq!(device.zones().contents(Zone::Data), &data_before[..]);
        assert_eq!(device.zones().contents(Zone::Config), &config_before[..]);
    }
}
