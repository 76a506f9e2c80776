//! ATECC608 Emulator Bus Session
//!
//! Plays the role of an I2C host talking to the emulated chip:
//! 1. Wakes the device and pulls random bytes
//! 2. Generates a key pair in a slot and signs a nonce with it
//! 3. Writes, reads back and locks the data zone
//! 4. Sends a corrupted frame and an unknown opcode to show error reporting
//!
//! Usage:
//!   cargo run --example bus_session [bus_address_hex]
//!
//! Set RUST_LOG=debug (or trace) to watch the framer and dispatcher.

use atecc608_sim::{encode_command, Device, DeviceConfig, Opcode, Zone};
use std::env;

/// Host-side session settings
struct SessionConfig {
    bus_address: u8,
    key_slot: u16,
    data_address: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bus_address: 0x60,
            key_slot: 2,
            data_address: 0x0200,
        }
    }
}

/// Minimal bus master that addresses a single device.
struct BusHost {
    address: u8,
    device: Device,
}

impl BusHost {
    fn new(address: u8) -> Self {
        let config = DeviceConfig::default().with_bus_address(address);
        Self {
            address,
            device: Device::with_config(config),
        }
    }

    /// Write a transaction addressed to `target`. Other addresses are not
    /// acknowledged and the bytes never reach the chip.
    fn write(&mut self, target: u8, bytes: &[u8]) -> bool {
        if target != self.address {
            return false;
        }
        for &byte in bytes {
            self.device.deliver_byte(byte);
        }
        true
    }

    fn read(&mut self, count: usize) -> Vec<u8> {
        (0..count).map(|_| self.device.take_response_byte()).collect()
    }

    /// Send one command and read `payload_len` bytes after the status.
    fn execute(
        &mut self,
        opcode: Opcode,
        param1: u8,
        param2: u16,
        data: &[u8],
        payload_len: usize,
    ) -> Result<(u8, Vec<u8>), Box<dyn std::error::Error>> {
        let frame = encode_command(opcode as u8, param1, param2, data)?;
        self.write(self.address, &frame);
        let response = self.read(1 + payload_len);
        println!(
            "  {:<8} -> status 0x{:02X}, {} ms",
            format!("{:?}", opcode),
            response[0],
            self.device.execution_time()
        );
        Ok((response[0], response[1..].to_vec()))
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║             ATECC608 Emulator Bus Session                    ║");
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = env::args().collect();
    let mut config = SessionConfig::default();
    if args.len() > 1 {
        config.bus_address = u8::from_str_radix(args[1].trim_start_matches("0x"), 16)?;
    }

    let mut host = BusHost::new(config.bus_address);
    println!("Device at bus address 0x{:02X}", config.bus_address);
    println!();

    // Wake, then pull random bytes
    println!("── Random ──────────────────────────────────────────────────────");
    host.write(config.bus_address, &[0x02]);
    let (_, random) = host.execute(Opcode::Random, 0, 0, &[], 32)?;
    println!("  random   {}", hex::encode_upper(&random));
    println!();

    println!("── Keys ────────────────────────────────────────────────────────");
    let (_, public_key) = host.execute(Opcode::GenKey, 0x04, config.key_slot, &[], 64)?;
    println!("  pubkey X {}", hex::encode_upper(&public_key[..32]));
    println!("  pubkey Y {}", hex::encode_upper(&public_key[32..]));

    let (_, temp_key) = host.execute(Opcode::Nonce, 0x00, 0, &[0u8; 20], 32)?;
    println!("  tempkey  {}", hex::encode_upper(&temp_key));
    let (_, signature) = host.execute(Opcode::Sign, 0x80, config.key_slot, &[], 64)?;
    println!("  sig R    {}", hex::encode_upper(&signature[..32]));
    println!("  sig S    {}", hex::encode_upper(&signature[32..]));
    let (status, _) = host.execute(Opcode::Verify, 0x00, config.key_slot, &signature, 0)?;
    println!("  verify   {}", if status == 0 { "ok" } else { "FAILED" });
    println!();

    println!("── Data zone ───────────────────────────────────────────────────");
    let block: Vec<u8> = (0u8..32).collect();
    host.execute(Opcode::Write, Zone::Data as u8, config.data_address, &block, 0)?;
    let (_, read_back) = host.execute(Opcode::Read, 0x80 | Zone::Data as u8, config.data_address, &[], 32)?;
    println!("  match    {}", read_back == block);
    host.execute(Opcode::Lock, 0x01, 0, &[], 0)?;
    let (status, _) = host.execute(Opcode::Write, Zone::Data as u8, config.data_address, &block, 0)?;
    println!("  write after lock -> status {}", status);
    println!();

    println!("── Errors ──────────────────────────────────────────────────────");
    let mut frame = encode_command(Opcode::Random as u8, 0, 0, &[])?;
    if let Some(crc) = frame.last_mut() {
        *crc ^= 0xFF;
    }
    host.write(config.bus_address, &frame);
    println!("  bad CRC  -> status {}", host.read(1)[0]);

    let frame = encode_command(0x7E, 0, 0, &[])?;
    host.write(config.bus_address, &frame);
    println!("  opcode 0x7E -> status {}", host.read(1)[0]);

    let acked = host.write(config.bus_address.wrapping_add(1), &frame);
    println!("  wrong address acknowledged: {}", acked);

    let (_, state) = host.execute(Opcode::Info, 0x02, 0, &[], 4)?;
    println!(
        "  last error {} | state {} | config locked {} | data locked {}",
        state[0], state[1], state[2], state[3]
    );

    // Put the chip back to sleep
    host.write(config.bus_address, &[0x01]);
    println!();
    println!("Session complete, device state {:?}", host.device.state());

    Ok(())
}
