//! Protocol parameters.

use crate::messages::ClientError;
use serde::{Deserialize, Serialize};

/// Width of one database element in bytes.
pub const WORD_SIZE: usize = 8;

/// Database element, hint parity and server reply are all one word wide.
pub type Word = u64;

/// `M1 = PRIMARY_HINT_FACTOR * sqrt(N) * ln N`.
///
/// A target index is left uncovered with probability about
/// `exp(-M1 / sqrt(N))`, so the factor controls the failure rate per query.
pub const PRIMARY_HINT_FACTOR: f64 = 4.0;

/// `M2 = BACKUP_HINT_FACTOR * ln N` backup hints and replacements per chunk.
///
/// A session of `Q = sqrt(N) * ln N` uniform queries puts about `ln N` of
/// them in each chunk. The factor sets the headroom above that mean.
pub const BACKUP_HINT_FACTOR: f64 = 4.0;

/// Parameters for one PIR deployment.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Params {
    /// Total number of database entries (N).
    pub num_entries: u64,
    /// Entries per chunk, `floor(sqrt(N))`.
    pub chunk_size: u64,
    /// Number of chunks, `ceil(N / chunk_size)`.
    pub chunk_count: u64,
    /// Number of primary hints (M1).
    pub num_primary_hints: u64,
    /// Backup hints per chunk (M2).
    pub backup_hints_per_chunk: u64,
    /// Replacement pairs per chunk. Defaults to M2.
    pub replacements_per_chunk: u64,
}

impl Params {
    /// Derive hint counts from the database size using the factors above.
    pub fn new(num_entries: u64) -> Result<Self, ClientError> {
        if num_entries == 0 {
            return Err(ClientError::Configuration(
                "num_entries must be greater than 0".to_string(),
            ));
        }
        let n = num_entries as f64;
        let ln_n = n.ln().max(1.0);
        let m1 = (PRIMARY_HINT_FACTOR * n.sqrt() * ln_n).ceil() as u64;
        let m2 = (BACKUP_HINT_FACTOR * ln_n).ceil() as u64;
        Self::with_counts(num_entries, m1.max(1), m2.max(1))
    }

    /// Build parameters with explicit hint counts.
    pub fn with_counts(
        num_entries: u64,
        num_primary_hints: u64,
        backup_hints_per_chunk: u64,
    ) -> Result<Self, ClientError> {
        if num_entries == 0 {
            return Err(ClientError::Configuration(
                "num_entries must be greater than 0".to_string(),
            ));
        }
        if num_primary_hints == 0 {
            return Err(ClientError::Configuration(
                "num_primary_hints must be greater than 0".to_string(),
            ));
        }
        if backup_hints_per_chunk == 0 {
            return Err(ClientError::Configuration(
                "backup_hints_per_chunk must be greater than 0".to_string(),
            ));
        }
        let chunk_size = isqrt(num_entries);
        let chunk_count = num_entries.div_ceil(chunk_size);
        Ok(Self {
            num_entries,
            chunk_size,
            chunk_count,
            num_primary_hints,
            backup_hints_per_chunk,
            replacements_per_chunk: backup_hints_per_chunk,
        })
    }

    /// Override the replacement pool size per chunk.
    pub fn with_replacements_per_chunk(mut self, replacements: u64) -> Result<Self, ClientError> {
        if replacements == 0 {
            return Err(ClientError::Configuration(
                "replacements_per_chunk must be greater than 0".to_string(),
            ));
        }
        self.replacements_per_chunk = replacements;
        Ok(self)
    }

    /// Return the chunk containing the given entry index.
    pub fn chunk_of(&self, index: u64) -> u64 {
        index / self.chunk_size
    }

    /// First global index of a chunk.
    pub fn chunk_start(&self, chunk: u64) -> u64 {
        chunk * self.chunk_size
    }

    /// Number of entries in a chunk. Only the last chunk can be short.
    pub fn chunk_len(&self, chunk: u64) -> u64 {
        let start = self.chunk_start(chunk);
        self.chunk_size.min(self.num_entries.saturating_sub(start))
    }

    /// Total backup hints across all chunks.
    pub fn total_backup_hints(&self) -> u64 {
        self.backup_hints_per_chunk * self.chunk_count
    }

    /// Expected number of uniform queries a session supports, `sqrt(N) * ln N`.
    pub fn expected_query_budget(&self) -> u64 {
        let n = self.num_entries as f64;
        (n.sqrt() * n.ln().max(1.0)) as u64
    }

    /// Hard upper bound on queries: every chunk has its own budget.
    pub fn max_queries(&self) -> u64 {
        self.backup_hints_per_chunk.min(self.replacements_per_chunk) * self.chunk_count
    }

    pub(crate) fn validate(&self) -> Result<(), ClientError> {
        let expected = Self::with_counts(
            self.num_entries,
            self.num_primary_hints,
            self.backup_hints_per_chunk,
        )?;
        if expected.chunk_size != self.chunk_size || expected.chunk_count != self.chunk_count {
            return Err(ClientError::Configuration(
                "chunk geometry does not match num_entries".to_string(),
            ));
        }
        if self.replacements_per_chunk == 0 {
            return Err(ClientError::Configuration(
                "replacements_per_chunk must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Integer square root: floor(sqrt(n)).
pub fn isqrt(n: u64) -> u64 {
    if n <= 1 {
        return n;
    }
    // Newton from above; the initial guess 2^ceil(bits/2) is >= sqrt(n).
    let bits = 64 - n.leading_zeros();
    let mut x = 1u64 << bits.div_ceil(2);
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}
