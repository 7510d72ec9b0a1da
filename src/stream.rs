//! Forward-only database streams consumed by preprocessing.

use crate::messages::ClientError;
use crate::params::{Params, Word, WORD_SIZE};
use crate::server::Db;
use std::io::{ErrorKind, Read};

/// Yields the database one chunk at a time, in index order, exactly once.
pub trait ChunkStream {
    /// Next chunk, or `None` once the database is exhausted.
    fn next_chunk(&mut self) -> Result<Option<Vec<Word>>, ClientError>;
}

/// Stream over an in-memory database.
pub struct SliceChunks<'a> {
    words: &'a [Word],
    chunk_size: usize,
}

impl<'a> SliceChunks<'a> {
    pub fn new(words: &'a [Word], params: &Params) -> Self {
        Self {
            words,
            chunk_size: params.chunk_size as usize,
        }
    }
}

impl ChunkStream for SliceChunks<'_> {
    fn next_chunk(&mut self) -> Result<Option<Vec<Word>>, ClientError> {
        if self.words.is_empty() {
            return Ok(None);
        }
        let take = self.chunk_size.min(self.words.len());
        let (head, rest) = self.words.split_at(take);
        self.words = rest;
        Ok(Some(head.to_vec()))
    }
}

/// Stream decoding little-endian `u64` words from a byte source.
pub struct ReaderChunks<R> {
    inner: R,
    params: Params,
    next: u64,
    buf: Vec<u8>,
}

impl<R: Read> ReaderChunks<R> {
    pub fn new(inner: R, params: &Params) -> Self {
        Self {
            inner,
            params: params.clone(),
            next: 0,
            buf: Vec::with_capacity(params.chunk_size as usize * WORD_SIZE),
        }
    }

    fn ensure_drained(&mut self) -> Result<(), ClientError> {
        let mut probe = [0u8; 1];
        loop {
            match self.inner.read(&mut probe) {
                Ok(0) => return Ok(()),
                Ok(_) => {
                    return Err(ClientError::Stream(format!(
                        "trailing bytes after {} entries",
                        self.params.num_entries
                    )))
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(ClientError::Stream(e.to_string())),
            }
        }
    }
}

impl<R: Read> ChunkStream for ReaderChunks<R> {
    fn next_chunk(&mut self) -> Result<Option<Vec<Word>>, ClientError> {
        if self.next == self.params.chunk_count {
            self.ensure_drained()?;
            return Ok(None);
        }
        let len = self.params.chunk_len(self.next) as usize;
        self.buf.resize(len * WORD_SIZE, 0);
        self.inner.read_exact(&mut self.buf).map_err(|e| {
            log::debug!("chunk {} read error: {}", self.next, e);
            ClientError::Stream(format!("chunk {}: {}", self.next, e))
        })?;
        self.next += 1;
        let words = self
            .buf
            .chunks_exact(WORD_SIZE)
            .map(|bytes| {
                let mut word = [0u8; WORD_SIZE];
                word.copy_from_slice(bytes);
                Word::from_le_bytes(word)
            })
            .collect();
        Ok(Some(words))
    }
}

/// Stream that reads chunks out of a random-access [`Db`].
pub struct DbChunks<'a, D> {
    db: &'a D,
    params: Params,
    next: u64,
}

impl<'a, D: Db> DbChunks<'a, D> {
    pub fn new(db: &'a D, params: &Params) -> Self {
        Self {
            db,
            params: params.clone(),
            next: 0,
        }
    }
}

impl<D: Db> ChunkStream for DbChunks<'_, D> {
    fn next_chunk(&mut self) -> Result<Option<Vec<Word>>, ClientError> {
        if self.next == self.params.chunk_count {
            return Ok(None);
        }
        let start = self.params.chunk_start(self.next);
        let end = start + self.params.chunk_len(self.next);
        self.next += 1;
        let words = (start..end)
            .map(|index| self.db.entry(index))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(words))
    }
}

/// Encode words as the little-endian image read by [`ReaderChunks`].
pub fn to_le_bytes(words: &[Word]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}
