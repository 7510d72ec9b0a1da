//! Keyed PRF over chunk ids.
//!
//! `F(k, c)` is the first 8 bytes (big endian) of `AES-128_k(0^64 || c)`.

use aes::cipher::{generic_array::GenericArray, BlockEncrypt, KeyInit};
use aes::Aes128;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const PRF_KEY_SIZE: usize = 16;

/// Secret per-hint PRF key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrfKey([u8; PRF_KEY_SIZE]);

impl PrfKey {
    pub fn new(bytes: [u8; PRF_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Sample a fresh uniform key.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let mut key = [0u8; PRF_KEY_SIZE];
        rng.fill_bytes(&mut key);
        Self(key)
    }

    pub fn as_bytes(&self) -> &[u8; PRF_KEY_SIZE] {
        &self.0
    }

    /// One-shot evaluation. Expands the key schedule on every call, so hot
    /// loops should hold a [`Prf`] instead.
    pub fn eval(&self, chunk: u64) -> u64 {
        Prf::new(self).eval(chunk)
    }
}

impl fmt::Debug for PrfKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrfKey(..)")
    }
}

/// PRF instance with the AES key schedule already expanded.
#[derive(Clone)]
pub struct Prf {
    cipher: Aes128,
}

impl Prf {
    pub fn new(key: &PrfKey) -> Self {
        Self {
            cipher: Aes128::new(&GenericArray::from(key.0)),
        }
    }

    pub fn eval(&self, chunk: u64) -> u64 {
        let mut input = [0u8; 16];
        input[8..16].copy_from_slice(&chunk.to_be_bytes());
        let mut block = GenericArray::from(input);
        self.cipher.encrypt_block(&mut block);
        let mut out = [0u8; 8];
        out.copy_from_slice(&block[0..8]);
        u64::from_be_bytes(out)
    }
}

impl fmt::Debug for Prf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Prf(..)")
    }
}
