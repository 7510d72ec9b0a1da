//! Client session state: hints, single-use pools and the answer cache.

use crate::hints::Hint;
use crate::messages::ClientError;
use crate::params::{Params, Word};
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

/// Pre-sampled `(index, value)` pair used to disguise the real target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replacement {
    pub index: u64,
    pub value: Word,
}

/// Per-chunk groups of single-use entries.
///
/// Entries are handed out from the front of each group. A taken entry is
/// gone for good; only its count is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChunkPool<T> {
    groups: Vec<VecDeque<T>>,
    consumed: Vec<usize>,
}

impl<T> ChunkPool<T> {
    pub fn new(groups: Vec<Vec<T>>) -> Self {
        let consumed = vec![0; groups.len()];
        let groups = groups.into_iter().map(VecDeque::from).collect();
        Self { groups, consumed }
    }

    /// Rebuild a partially consumed pool from its remaining entries.
    fn from_parts(consumed: Vec<usize>, remaining: Vec<Vec<T>>) -> Self {
        let groups = remaining.into_iter().map(VecDeque::from).collect();
        Self { groups, consumed }
    }

    pub fn num_chunks(&self) -> usize {
        self.groups.len()
    }

    /// Next unconsumed entry of `chunk`, without consuming it.
    pub fn peek(&self, chunk: u64) -> Option<&T> {
        self.groups.get(chunk as usize)?.front()
    }

    /// Consume and return the next entry of `chunk`.
    pub fn take(&mut self, chunk: u64) -> Option<T> {
        let c = chunk as usize;
        let entry = self.groups.get_mut(c)?.pop_front()?;
        self.consumed[c] += 1;
        Some(entry)
    }

    pub fn consumed(&self, chunk: u64) -> usize {
        self.consumed.get(chunk as usize).copied().unwrap_or(0)
    }

    pub fn remaining(&self, chunk: u64) -> usize {
        self.groups.get(chunk as usize).map_or(0, VecDeque::len)
    }

    pub fn remaining_total(&self) -> usize {
        self.groups.iter().map(VecDeque::len).sum()
    }

    /// Unconsumed entries of `chunk`, in hand-out order.
    pub fn iter_remaining(&self, chunk: u64) -> impl Iterator<Item = &T> {
        self.groups.get(chunk as usize).into_iter().flatten()
    }
}

impl<T: Clone> ChunkPool<T> {
    fn to_snapshot(&self) -> PoolSnapshot<T> {
        PoolSnapshot {
            consumed: self.consumed.iter().map(|&c| c as u64).collect(),
            remaining: (0..self.groups.len() as u64)
                .map(|c| self.iter_remaining(c).cloned().collect())
                .collect(),
        }
    }
}

/// Serializable form of a [`ChunkPool`]: consumed entries are gone for good.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot<T> {
    pub consumed: Vec<u64>,
    pub remaining: Vec<Vec<T>>,
}

/// Serializable export of a whole session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub params: Params,
    pub primary: Vec<Hint>,
    pub backups: PoolSnapshot<Hint>,
    pub replacements: PoolSnapshot<Replacement>,
    pub cache: Vec<(u64, Word)>,
}

/// Everything the client keeps between queries.
#[derive(Clone, Debug)]
pub struct SessionState {
    pub(crate) params: Params,
    pub(crate) primary: Vec<Hint>,
    pub(crate) backups: ChunkPool<Hint>,
    pub(crate) replacements: ChunkPool<Replacement>,
    pub(crate) cache: HashMap<u64, Word>,
}

impl SessionState {
    pub(crate) fn new(
        params: Params,
        primary: Vec<Hint>,
        backups: ChunkPool<Hint>,
        replacements: ChunkPool<Replacement>,
    ) -> Self {
        Self {
            params,
            primary,
            backups,
            replacements,
            cache: HashMap::new(),
        }
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn primary_hints(&self) -> &[Hint] {
        &self.primary
    }

    pub fn backups(&self) -> &ChunkPool<Hint> {
        &self.backups
    }

    pub fn replacements(&self) -> &ChunkPool<Replacement> {
        &self.replacements
    }

    /// Value previously reconstructed for `index`, if any.
    pub fn answered(&self, index: u64) -> Option<Word> {
        self.cache.get(&index).copied()
    }

    pub fn num_answered(&self) -> usize {
        self.cache.len()
    }

    /// Position of the first primary hint whose selection in `index`'s chunk
    /// is `index`.
    pub fn covering_hint(&self, index: u64) -> Option<usize> {
        self.primary
            .iter()
            .position(|hint| hint.covers(&self.params, index))
    }

    /// How many more queries can land in `chunk` before a pool runs dry.
    pub fn remaining_queries_in_chunk(&self, chunk: u64) -> usize {
        self.backups
            .remaining(chunk)
            .min(self.replacements.remaining(chunk))
    }

    pub fn to_snapshot(&self) -> SessionSnapshot {
        let mut cache: Vec<(u64, Word)> = self.cache.iter().map(|(&k, &v)| (k, v)).collect();
        cache.sort_unstable();
        SessionSnapshot {
            params: self.params.clone(),
            primary: self.primary.clone(),
            backups: self.backups.to_snapshot(),
            replacements: self.replacements.to_snapshot(),
            cache,
        }
    }

    pub fn from_snapshot(snapshot: SessionSnapshot) -> Result<Self, ClientError> {
        validate_snapshot(&snapshot)?;
        let SessionSnapshot {
            params,
            primary,
            backups,
            replacements,
            cache,
        } = snapshot;
        let to_usize = |v: Vec<u64>| v.into_iter().map(|c| c as usize).collect::<Vec<_>>();
        Ok(Self {
            params,
            primary,
            backups: ChunkPool::from_parts(to_usize(backups.consumed), backups.remaining),
            replacements: ChunkPool::from_parts(
                to_usize(replacements.consumed),
                replacements.remaining,
            ),
            cache: cache.into_iter().collect(),
        })
    }

    pub fn serialize_state(&self) -> Result<Vec<u8>, ClientError> {
        bincode_options()
            .serialize(&self.to_snapshot())
            .map_err(|e| ClientError::SerializationError(e.to_string()))
    }

    pub fn deserialize_state(bytes: &[u8]) -> Result<Self, ClientError> {
        let snapshot: SessionSnapshot = bincode_options()
            .with_limit(bytes.len() as u64)
            .deserialize(bytes)
            .map_err(|e| ClientError::SerializationError(e.to_string()))?;
        Self::from_snapshot(snapshot)
    }
}

fn bincode_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
}

fn snapshot_error(msg: &str) -> ClientError {
    ClientError::SerializationError(msg.to_string())
}

fn validate_pool<T>(
    pool: &PoolSnapshot<T>,
    chunk_count: u64,
    group_size: u64,
    name: &str,
) -> Result<(), ClientError> {
    if pool.consumed.len() as u64 != chunk_count || pool.remaining.len() as u64 != chunk_count {
        return Err(ClientError::SerializationError(format!(
            "{} pool chunk count mismatch",
            name
        )));
    }
    for (consumed, remaining) in pool.consumed.iter().zip(&pool.remaining) {
        if usize::try_from(*consumed).is_err() {
            return Err(ClientError::SerializationError(format!(
                "{} pool consumed count too large",
                name
            )));
        }
        if consumed.checked_add(remaining.len() as u64) != Some(group_size) {
            return Err(ClientError::SerializationError(format!(
                "{} pool group size mismatch",
                name
            )));
        }
    }
    Ok(())
}

fn validate_snapshot(snapshot: &SessionSnapshot) -> Result<(), ClientError> {
    let params = &snapshot.params;
    params
        .validate()
        .map_err(|e| ClientError::SerializationError(e.to_string()))?;

    if snapshot.primary.len() as u64 != params.num_primary_hints {
        return Err(snapshot_error("primary hint count mismatch"));
    }
    validate_pool(
        &snapshot.backups,
        params.chunk_count,
        params.backup_hints_per_chunk,
        "backup",
    )?;
    validate_pool(
        &snapshot.replacements,
        params.chunk_count,
        params.replacements_per_chunk,
        "replacement",
    )?;

    let mut answered = HashSet::new();
    for &(index, _) in &snapshot.cache {
        if index >= params.num_entries {
            return Err(snapshot_error("cached index out of range"));
        }
        if !answered.insert(index) {
            return Err(snapshot_error("duplicate cached index"));
        }
    }

    // A programmed primary hint only exists because its point was answered.
    for hint in &snapshot.primary {
        if let Some(point) = hint.programmed_point {
            if !answered.contains(&point) {
                return Err(snapshot_error("programmed point missing from cache"));
            }
        }
    }
    if snapshot
        .backups
        .remaining
        .iter()
        .flatten()
        .any(Hint::is_programmed)
    {
        return Err(snapshot_error("unused backup hint is programmed"));
    }

    for (chunk, group) in (0u64..).zip(&snapshot.replacements.remaining) {
        if group.iter().any(|r| params.chunk_of(r.index) != chunk || r.index >= params.num_entries) {
            return Err(snapshot_error("replacement index outside its chunk"));
        }
    }
    Ok(())
}
