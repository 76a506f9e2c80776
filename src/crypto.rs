//! Asymmetric crypto strategy for GENKEY, SIGN and VERIFY.
//!
//! The dispatcher only talks to [`CryptoProvider`]. The bundled
//! [`SimulatedCrypto`] reproduces the emulator's response shapes without any
//! real ECC; a genuine P-256 backend can be dropped in without touching the
//! framer or dispatcher.

use crate::keystore::{derive_child_key, KEY_SIZE};
use crate::rng::RandomSource;

pub const DIGEST_SIZE: usize = 32;
pub const PUBLIC_KEY_SIZE: usize = 64;
pub const SIGNATURE_SIZE: usize = 64;

/// Provider of the chip's asymmetric operations.
pub trait CryptoProvider {
    /// Public key (X || Y) for a private key held in a slot.
    fn public_key(&self, private_key: &[u8; KEY_SIZE]) -> [u8; PUBLIC_KEY_SIZE];

    /// Signature (R || S) over a 32-byte digest.
    fn sign(
        &mut self,
        private_key: &[u8; KEY_SIZE],
        digest: &[u8; DIGEST_SIZE],
        rng: &mut dyn RandomSource,
    ) -> [u8; SIGNATURE_SIZE];

    fn verify(
        &self,
        public_key: &[u8; PUBLIC_KEY_SIZE],
        digest: &[u8; DIGEST_SIZE],
        signature: &[u8; SIGNATURE_SIZE],
    ) -> bool;
}

/// Behavioral simulation. Not cryptography.
///
/// - public key: X = child derivation of the private key, Y = child of X
///   taken in reverse byte order
/// - signature: `digest[i % 32] ^ random`
/// - verify: always accepts
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedCrypto;

impl CryptoProvider for SimulatedCrypto {
    fn public_key(&self, private_key: &[u8; KEY_SIZE]) -> [u8; PUBLIC_KEY_SIZE] {
        let x = derive_child_key(private_key);
        let mut reversed = x;
        reversed.reverse();
        let y = derive_child_key(&reversed);
        let mut public = [0u8; PUBLIC_KEY_SIZE];
        public[..KEY_SIZE].copy_from_slice(&x);
        public[KEY_SIZE..].copy_from_slice(&y);
        public
    }

    fn sign(
        &mut self,
        _private_key: &[u8; KEY_SIZE],
        digest: &[u8; DIGEST_SIZE],
        rng: &mut dyn RandomSource,
    ) -> [u8; SIGNATURE_SIZE] {
        let mut signature = [0u8; SIGNATURE_SIZE];
        rng.fill_bytes(&mut signature);
        for (i, byte) in signature.iter_mut().enumerate() {
            *byte ^= digest[i % DIGEST_SIZE];
        }
        signature
    }

    fn verify(
        &self,
        _public_key: &[u8; PUBLIC_KEY_SIZE],
        _digest: &[u8; DIGEST_SIZE],
        _signature: &[u8; SIGNATURE_SIZE],
    ) -> bool {
        true
    }
}
