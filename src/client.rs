//! Online phase: turn a target index into a disguised cover-set query,
//! reconstruct the answer and heal the consumed hint.

use crate::messages::{ClientError, Query, Reply};
use crate::params::{Params, Word};
use crate::preprocess::preprocess;
use crate::server::ServerOracle;
use crate::state::{Replacement, SessionState};
use crate::stream::ChunkStream;
use rand::{CryptoRng, RngCore};

/// A query that has been built but not yet answered.
///
/// Holds everything `finish_query` needs to reconstruct the target and
/// refresh the session. Building one changes nothing but the query-id
/// counter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedQuery {
    query: Query,
    target: u64,
    chunk: u64,
    hint_slot: usize,
    replacement: Replacement,
    generation: u64,
    epoch: usize,
}

impl PreparedQuery {
    /// The request to hand to the server.
    pub fn query(&self) -> &Query {
        &self.query
    }

    pub fn target(&self) -> u64 {
        self.target
    }
}

/// One client session: hints, pools, answer cache and the session rng.
pub struct Client<R> {
    state: SessionState,
    rng: R,
    next_query_id: u64,
    generation: u64,
}

impl<R: RngCore + CryptoRng> Client<R> {
    /// Resume a session from existing state.
    pub fn new(state: SessionState, rng: R) -> Self {
        Self {
            state,
            rng,
            next_query_id: 0,
            generation: 0,
        }
    }

    /// Run the offline phase over `stream` and start a session on the result.
    pub fn setup<S: ChunkStream>(params: &Params, stream: &mut S, mut rng: R) -> Result<Self, ClientError> {
        let state = preprocess(params, stream, &mut rng)?;
        Ok(Self::new(state, rng))
    }

    /// Throw the current hints away and preprocess again with the same
    /// parameters. Used once the query budget is spent.
    pub fn rebuild<S: ChunkStream>(&mut self, stream: &mut S) -> Result<(), ClientError> {
        let params = self.state.params.clone();
        self.state = preprocess(&params, stream, &mut self.rng)?;
        self.generation += 1;
        log::info!("session rebuilt after {} queries", self.next_query_id);
        Ok(())
    }

    pub fn params(&self) -> &Params {
        &self.state.params
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn into_state(self) -> SessionState {
        self.state
    }

    pub fn next_query_id(&mut self) -> u64 {
        let id = self.next_query_id;
        self.next_query_id += 1;
        id
    }

    pub fn answered(&self, index: u64) -> Option<Word> {
        self.state.answered(index)
    }

    pub fn remaining_queries_in_chunk(&self, chunk: u64) -> usize {
        self.state.remaining_queries_in_chunk(chunk)
    }

    /// Build the disguised query for `index`.
    ///
    /// The covering primary hint's cover set is sent with the target's own
    /// chunk swapped for the next replacement index, so the server sees a
    /// uniformly random index in every chunk. Pools are only peeked here.
    pub fn prepare_query(&mut self, index: u64) -> Result<PreparedQuery, ClientError> {
        let params = &self.state.params;
        if index >= params.num_entries {
            return Err(ClientError::InvalidIndex {
                index,
                num_entries: params.num_entries,
            });
        }
        if self.state.cache.contains_key(&index) {
            return Err(ClientError::DuplicateTarget(index));
        }

        let chunk = params.chunk_of(index);
        let hint_slot = self.state.covering_hint(index).ok_or_else(|| {
            log::error!("no primary hint covers uncached index {}", index);
            ClientError::InvariantViolation { index }
        })?;
        // Both pools are checked before anything leaves the client, so an
        // exhausted chunk never exposes the same replacement index twice.
        if self.state.backups.peek(chunk).is_none() {
            return Err(ClientError::BackupPoolExhausted { chunk });
        }
        let replacement = *self
            .state
            .replacements
            .peek(chunk)
            .ok_or(ClientError::ReplacementPoolExhausted { chunk })?;

        let mut indices = self.state.primary[hint_slot].cover_set(params);
        indices[chunk as usize] = replacement.index;
        let epoch = self.state.num_answered();

        let id = self.next_query_id();
        log::debug!("query id={} prepared: chunk={} hint={}", id, chunk, hint_slot);
        Ok(PreparedQuery {
            query: Query { id, indices },
            target: index,
            chunk,
            hint_slot,
            replacement,
            generation: self.generation,
            epoch,
        })
    }

    /// Reconstruct the target from the server's reply and refresh the
    /// consumed hint. Either every change is committed or none is.
    pub fn finish_query(&mut self, prepared: PreparedQuery, reply: Reply) -> Result<Word, ClientError> {
        if prepared.generation != self.generation
            || self.state.num_answered() != prepared.epoch
            || self.state.cache.contains_key(&prepared.target)
        {
            return Err(ClientError::StalePreparedQuery);
        }
        if reply.id != prepared.query.id {
            return Err(ClientError::ReplyMismatch {
                expected: prepared.query.id,
                got: reply.id,
            });
        }
        let hint = self
            .state
            .primary
            .get(prepared.hint_slot)
            .ok_or(ClientError::StalePreparedQuery)?;
        let answer = reply.parity ^ hint.parity ^ prepared.replacement.value;

        let chunk = prepared.chunk;
        let mut backup = self.state.backups.take(chunk).ok_or_else(|| {
            log::warn!("query id={} cannot refresh: chunk {} has no backup hints", reply.id, chunk);
            ClientError::BackupPoolExhausted { chunk }
        })?;
        self.state.replacements.take(chunk);
        backup.program(prepared.target, answer);
        self.state.primary[prepared.hint_slot] = backup;
        self.state.cache.insert(prepared.target, answer);

        log::debug!(
            "query id={} done: hint {} refreshed, {} left in chunk {}",
            reply.id,
            prepared.hint_slot,
            self.state.remaining_queries_in_chunk(chunk),
            chunk
        );
        Ok(answer)
    }

    /// Full round trip for `index` against `server`.
    pub fn query<S: ServerOracle>(&mut self, server: &mut S, index: u64) -> Result<Word, ClientError> {
        let prepared = self.prepare_query(index)?;
        let reply = server.answer(prepared.query())?;
        self.finish_query(prepared, reply)
    }
}
