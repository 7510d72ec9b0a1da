//! Offline phase: one streaming pass over the database builds every hint
//! and pool the session needs.

use crate::hints::Hint;
use crate::messages::ClientError;
use crate::params::{Params, Word};
use crate::prf::Prf;
use crate::state::{ChunkPool, Replacement, SessionState};
use crate::stream::{ChunkStream, SliceChunks};
use rand::{CryptoRng, Rng, RngCore};
use rayon::prelude::*;

/// Build a fresh session from a chunk-ordered database stream.
///
/// Primary hint parities cover every chunk. Backup hints in group `c` skip
/// chunk `c`. Replacement group `c` holds uniform samples from chunk `c`.
/// The stream must yield exactly `chunk_count` chunks of the expected lengths.
pub fn preprocess<S, R>(params: &Params, stream: &mut S, rng: &mut R) -> Result<SessionState, ClientError>
where
    S: ChunkStream,
    R: RngCore + CryptoRng,
{
    params.validate()?;
    let chunk_count = params.chunk_count as usize;

    let mut primary: Vec<Hint> = (0..params.num_primary_hints)
        .map(|_| Hint::random(rng))
        .collect();
    let mut backups: Vec<Vec<Hint>> = (0..chunk_count)
        .map(|_| {
            (0..params.backup_hints_per_chunk)
                .map(|_| Hint::random(rng))
                .collect()
        })
        .collect();

    // Key schedules are expanded once for the whole pass.
    let primary_prfs: Vec<Prf> = primary.iter().map(|h| Prf::new(&h.key)).collect();
    let backup_prfs: Vec<Vec<Prf>> = backups
        .iter()
        .map(|group| group.iter().map(|h| Prf::new(&h.key)).collect())
        .collect();

    let mut replacements: Vec<Vec<Replacement>> = Vec::with_capacity(chunk_count);

    for chunk_id in 0..params.chunk_count {
        let chunk = stream.next_chunk()?.ok_or_else(|| {
            ClientError::Stream(format!(
                "stream ended after {} of {} chunks",
                chunk_id, params.chunk_count
            ))
        })?;
        let expected_len = params.chunk_len(chunk_id);
        if chunk.len() as u64 != expected_len {
            return Err(ClientError::Stream(format!(
                "chunk {} has {} entries, expected {}",
                chunk_id,
                chunk.len(),
                expected_len
            )));
        }
        let start = params.chunk_start(chunk_id);
        let value_at = |hint: &Hint, prf: &Prf| -> Word {
            chunk[(hint.select_with(prf, params, chunk_id) - start) as usize]
        };

        primary
            .par_iter_mut()
            .zip(primary_prfs.par_iter())
            .for_each(|(hint, prf)| {
                let value = value_at(hint, prf);
                hint.parity ^= value;
            });

        backups
            .par_iter_mut()
            .zip(backup_prfs.par_iter())
            .enumerate()
            .filter(|(home, _)| *home as u64 != chunk_id)
            .for_each(|(_, (group, prfs))| {
                for (hint, prf) in group.iter_mut().zip(prfs) {
                    let value = value_at(hint, prf);
                    hint.parity ^= value;
                }
            });

        let group = (0..params.replacements_per_chunk)
            .map(|_| {
                let offset = rng.gen_range(0..expected_len);
                Replacement {
                    index: start + offset,
                    value: chunk[offset as usize],
                }
            })
            .collect();
        replacements.push(group);

        log::debug!("preprocessed chunk {}/{}", chunk_id + 1, params.chunk_count);
    }

    if stream.next_chunk()?.is_some() {
        return Err(ClientError::Stream(format!(
            "stream has more than {} chunks",
            params.chunk_count
        )));
    }

    log::info!(
        "preprocessing done: entries={} chunks={} primary_hints={} backup_hints={} replacements={}",
        params.num_entries,
        params.chunk_count,
        primary.len(),
        params.total_backup_hints(),
        params.replacements_per_chunk * params.chunk_count
    );

    Ok(SessionState::new(
        params.clone(),
        primary,
        ChunkPool::new(backups),
        ChunkPool::new(replacements),
    ))
}

/// [`preprocess`] over a database already in memory.
pub fn preprocess_db<R>(params: &Params, db: &[Word], rng: &mut R) -> Result<SessionState, ClientError>
where
    R: RngCore + CryptoRng,
{
    if db.len() as u64 != params.num_entries {
        return Err(ClientError::Configuration(format!(
            "database has {} entries, params expect {}",
            db.len(),
            params.num_entries
        )));
    }
    preprocess(params, &mut SliceChunks::new(db, params), rng)
}
