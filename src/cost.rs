//! Cost estimator for a Piano PIR deployment.
//!
//! Computes theoretical storage, bandwidth and computation costs per
//! component from the protocol parameters alone.

use crate::params::{Params, WORD_SIZE};
use serde::Serialize;

/// PRF key plus parity plus the optional programmed point.
const HINT_BYTES: u64 = 16 + WORD_SIZE as u64 + 1 + 8;
/// Index plus value.
const REPLACEMENT_BYTES: u64 = 8 + WORD_SIZE as u64;

/// Per-component cost breakdown.
#[derive(Clone, Debug, Serialize)]
pub struct CostReport {
    pub params: Params,
    pub client_primary_hint_bytes: u64,
    pub client_backup_hint_bytes: u64,
    pub client_replacement_bytes: u64,
    pub client_storage_bytes: u64,
    pub server_db_storage_bytes: u64,
    pub offline_download_bytes: u64,
    pub online_upload_bytes: u64,
    pub online_download_bytes: u64,
    pub server_xor_ops_per_query: u64,
    pub expected_query_budget: u64,
    pub per_chunk_query_budget: u64,
    pub max_queries: u64,
}

/// Estimate costs for the given parameters.
pub fn estimate(params: &Params) -> CostReport {
    let word = WORD_SIZE as u64;

    let client_primary_hint_bytes = params.num_primary_hints * HINT_BYTES;
    let client_backup_hint_bytes = params.total_backup_hints() * HINT_BYTES;
    let client_replacement_bytes =
        params.replacements_per_chunk * params.chunk_count * REPLACEMENT_BYTES;

    // Offline: the whole database is streamed once.
    let server_db_storage_bytes = params.num_entries * word;
    let offline_download_bytes = params.num_entries * word;

    // Online: one index per chunk up, one parity word down.
    let online_upload_bytes = params.chunk_count * 8;
    let online_download_bytes = word;

    CostReport {
        params: params.clone(),
        client_primary_hint_bytes,
        client_backup_hint_bytes,
        client_replacement_bytes,
        client_storage_bytes: client_primary_hint_bytes
            + client_backup_hint_bytes
            + client_replacement_bytes,
        server_db_storage_bytes,
        offline_download_bytes,
        online_upload_bytes,
        online_download_bytes,
        server_xor_ops_per_query: params.chunk_count,
        expected_query_budget: params.expected_query_budget(),
        per_chunk_query_budget: params
            .backup_hints_per_chunk
            .min(params.replacements_per_chunk),
        max_queries: params.max_queries(),
    }
}

fn mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

impl std::fmt::Display for CostReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Piano PIR Cost Report ===")?;
        writeln!(f, "Parameters:")?;
        writeln!(f, "  num_entries:        {}", self.params.num_entries)?;
        writeln!(f, "  chunk_size:         {}", self.params.chunk_size)?;
        writeln!(f, "  chunk_count:        {}", self.params.chunk_count)?;
        writeln!(f, "  primary hints:      {}", self.params.num_primary_hints)?;
        writeln!(f, "  backups/chunk:      {}", self.params.backup_hints_per_chunk)?;
        writeln!(f, "  replacements/chunk: {}", self.params.replacements_per_chunk)?;
        writeln!(f)?;
        writeln!(f, "Storage:")?;
        writeln!(
            f,
            "  client primary:     {} ({:.2} MB)",
            self.client_primary_hint_bytes,
            mb(self.client_primary_hint_bytes)
        )?;
        writeln!(
            f,
            "  client backup:      {} ({:.2} MB)",
            self.client_backup_hint_bytes,
            mb(self.client_backup_hint_bytes)
        )?;
        writeln!(
            f,
            "  client replacement: {} ({:.2} MB)",
            self.client_replacement_bytes,
            mb(self.client_replacement_bytes)
        )?;
        writeln!(
            f,
            "  client total:       {} ({:.2} MB)",
            self.client_storage_bytes,
            mb(self.client_storage_bytes)
        )?;
        writeln!(
            f,
            "  server DB:          {} ({:.2} MB)",
            self.server_db_storage_bytes,
            mb(self.server_db_storage_bytes)
        )?;
        writeln!(f)?;
        writeln!(f, "Bandwidth:")?;
        writeln!(
            f,
            "  offline (stream):   {} ({:.2} MB)",
            self.offline_download_bytes,
            mb(self.offline_download_bytes)
        )?;
        writeln!(
            f,
            "  online upload/q:    {} ({:.2} KB)",
            self.online_upload_bytes,
            self.online_upload_bytes as f64 / 1024.0
        )?;
        writeln!(f, "  online download/q:  {} B", self.online_download_bytes)?;
        writeln!(f)?;
        writeln!(f, "Computation:")?;
        writeln!(f, "  server XORs/q:      {}", self.server_xor_ops_per_query)?;
        writeln!(f)?;
        writeln!(f, "Query budget:")?;
        writeln!(f, "  expected:           {}", self.expected_query_budget)?;
        writeln!(f, "  per chunk:          {}", self.per_chunk_query_budget)?;
        writeln!(f, "  hard maximum:       {}", self.max_queries)?;
        Ok(())
    }
}
