use crate::messages::{Query, Reply, ServerError};
use crate::params::{isqrt, Word, WORD_SIZE};

/// Random-access, read-only view of the database.
pub trait Db {
    fn num_entries(&self) -> u64;
    fn entry(&self, index: u64) -> Result<Word, ServerError>;
}

#[derive(Debug, Clone)]
pub struct InMemoryDb {
    entries: Vec<Word>,
}

impl InMemoryDb {
    pub fn new(entries: Vec<Word>) -> Result<Self, ServerError> {
        if entries.is_empty() {
            return Err(ServerError::InvalidDatabase(
                "database must contain at least one entry".to_string(),
            ));
        }
        Ok(Self { entries })
    }

    /// Decode a little-endian image of `u64` words.
    pub fn from_le_bytes(bytes: &[u8]) -> Result<Self, ServerError> {
        if bytes.len() % WORD_SIZE != 0 {
            return Err(ServerError::InvalidDatabase(format!(
                "byte length {} is not a multiple of {}",
                bytes.len(),
                WORD_SIZE
            )));
        }
        let entries = bytes
            .chunks_exact(WORD_SIZE)
            .map(|chunk| {
                let mut word = [0u8; WORD_SIZE];
                word.copy_from_slice(chunk);
                Word::from_le_bytes(word)
            })
            .collect();
        Self::new(entries)
    }

    pub fn as_slice(&self) -> &[Word] {
        &self.entries
    }
}

impl Db for InMemoryDb {
    fn num_entries(&self) -> u64 {
        self.entries.len() as u64
    }

    fn entry(&self, index: u64) -> Result<Word, ServerError> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.entries.get(i).copied())
            .ok_or(ServerError::IndexOutOfRange { index })
    }
}

/// Answers cover-set queries. One request in, one parity word out.
pub trait ServerOracle {
    fn answer(&mut self, query: &Query) -> Result<Reply, ServerError>;
}

/// Stateless XOR server over an immutable database.
///
/// The chunk geometry is derived from the database size alone, so client
/// and server agree on it without exchanging anything secret.
pub struct Server<D: Db> {
    db: D,
    chunk_size: u64,
    chunk_count: u64,
}

impl<D: Db> Server<D> {
    pub fn new(db: D) -> Result<Self, ServerError> {
        let num_entries = db.num_entries();
        if num_entries == 0 {
            return Err(ServerError::InvalidDatabase(
                "database must contain at least one entry".to_string(),
            ));
        }
        let chunk_size = isqrt(num_entries);
        let chunk_count = num_entries.div_ceil(chunk_size);
        Ok(Self { db, chunk_size, chunk_count })
    }

    pub fn db(&self) -> &D {
        &self.db
    }

    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// XOR of the database values at the query's indices.
    ///
    /// Rejects queries that do not name exactly one index per chunk.
    pub fn answer(&self, query: &Query) -> Result<Reply, ServerError> {
        let expected = usize::try_from(self.chunk_count).unwrap_or(usize::MAX);
        if query.indices.len() != expected {
            log::warn!(
                "query id={} rejected: {} indices for {} chunks",
                query.id,
                query.indices.len(),
                self.chunk_count
            );
            return Err(ServerError::QueryShapeMismatch {
                expected,
                got: query.indices.len(),
            });
        }
        let mut parity: Word = 0;
        for (chunk, &index) in (0u64..).zip(query.indices.iter()) {
            if index / self.chunk_size != chunk {
                log::warn!("query id={} rejected: index {} not in chunk {}", query.id, index, chunk);
                return Err(ServerError::IndexOutOfChunk { chunk, index });
            }
            parity ^= self.db.entry(index)?;
        }
        Ok(Reply { id: query.id, parity })
    }
}

impl<D: Db> ServerOracle for Server<D> {
    fn answer(&mut self, query: &Query) -> Result<Reply, ServerError> {
        Server::answer(self, query)
    }
}

impl<D: Db> ServerOracle for &Server<D> {
    fn answer(&mut self, query: &Query) -> Result<Reply, ServerError> {
        Server::answer(*self, query)
    }
}
