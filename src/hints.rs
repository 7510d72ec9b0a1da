//! Hints and the per-chunk selection function.

use crate::params::{Params, Word};
use crate::prf::{Prf, PrfKey};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

/// A keyed selector naming one index per chunk, plus the XOR of the
/// database values at those indices.
///
/// A programmed hint always selects `programmed_point` inside that point's
/// chunk, whatever its key says.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub key: PrfKey,
    pub parity: Word,
    pub programmed_point: Option<u64>,
}

impl Hint {
    /// Fresh unprogrammed hint with zero parity.
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            key: PrfKey::random(rng),
            parity: 0,
            programmed_point: None,
        }
    }

    pub fn is_programmed(&self) -> bool {
        self.programmed_point.is_some()
    }

    /// Global index this hint selects inside `chunk`.
    pub fn select(&self, params: &Params, chunk: u64) -> u64 {
        self.select_with(&Prf::new(&self.key), params, chunk)
    }

    /// Same as [`Hint::select`] with a pre-expanded PRF for this hint's key.
    pub fn select_with(&self, prf: &Prf, params: &Params, chunk: u64) -> u64 {
        if let Some(point) = self.programmed_point {
            if params.chunk_of(point) == chunk {
                return point;
            }
        }
        params.chunk_start(chunk) + prf.eval(chunk) % params.chunk_len(chunk)
    }

    /// True if this hint selects `index` inside `index`'s own chunk.
    pub fn covers(&self, params: &Params, index: u64) -> bool {
        self.select(params, params.chunk_of(index)) == index
    }

    /// Selection for every chunk, in chunk order.
    pub fn cover_set(&self, params: &Params) -> Vec<u64> {
        let prf = Prf::new(&self.key);
        (0..params.chunk_count)
            .map(|chunk| self.select_with(&prf, params, chunk))
            .collect()
    }

    /// Turn this hint into one that covers `index`, given the database value
    /// there. Only valid for a backup hint whose parity excludes `index`'s chunk.
    pub fn program(&mut self, index: u64, value: Word) {
        self.programmed_point = Some(index);
        self.parity ^= value;
    }
}

/// XOR of the database values at `indices`.
pub fn parity_of(db: &[Word], indices: impl IntoIterator<Item = u64>) -> Word {
    indices
        .into_iter()
        .fold(0, |acc, index| acc ^ db[index as usize])
}
