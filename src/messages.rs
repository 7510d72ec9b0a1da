use crate::params::Word;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Cover set sent to the server: one global index per chunk, in chunk order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub id: u64,
    pub indices: Vec<u64>,
}

/// Server reply containing the XOR parity of the queried indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: u64,
    pub parity: Word,
}

/// Errors returned by the server when validating or answering a query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    #[error("query has {got} indices, expected one per chunk ({expected})")]
    QueryShapeMismatch { expected: usize, got: usize },
    #[error("index {index} is not inside chunk {chunk}")]
    IndexOutOfChunk { chunk: u64, index: u64 },
    #[error("index {index} out of range")]
    IndexOutOfRange { index: u64 },
    #[error("invalid database: {0}")]
    InvalidDatabase(String),
}

/// Errors encountered on the client side during setup, queries or state import.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("index {index} out of range [0, {num_entries})")]
    InvalidIndex { index: u64, num_entries: u64 },
    #[error("index {0} was already answered in this session")]
    DuplicateTarget(u64),
    #[error("no primary hint covers index {index}")]
    InvariantViolation { index: u64 },
    #[error("replacement pool exhausted for chunk {chunk}")]
    ReplacementPoolExhausted { chunk: u64 },
    #[error("backup hint pool exhausted for chunk {chunk}")]
    BackupPoolExhausted { chunk: u64 },
    #[error("reply id {got} does not match query id {expected}")]
    ReplyMismatch { expected: u64, got: u64 },
    #[error("prepared query is stale")]
    StalePreparedQuery,
    #[error("server error: {0}")]
    Server(#[from] ServerError),
    #[error("database stream error: {0}")]
    Stream(String),
    #[error("serialization error: {0}")]
    SerializationError(String),
}

impl ClientError {
    /// The session ran out of its provisioned query budget and must be
    /// re-provisioned by running preprocessing again. Raised before the
    /// query reaches the server.
    pub fn is_exhaustion(&self) -> bool {
        matches!(
            self,
            ClientError::ReplacementPoolExhausted { .. } | ClientError::BackupPoolExhausted { .. }
        )
    }

    /// The hint invariant is broken: a preprocessing defect or miscalculated
    /// parameters. Report it rather than retrying.
    pub fn is_bug(&self) -> bool {
        matches!(self, ClientError::InvariantViolation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_reply_bincode() {
        let q = Query { id: 7, indices: vec![1, 6, 9, 12] };
        let bytes = bincode::serialize(&q).unwrap();
        let decoded: Query = bincode::deserialize(&bytes).unwrap();
        assert_eq!(q, decoded);

        let r = Reply { id: 7, parity: 0xdead_beef };
        let bytes = bincode::serialize(&r).unwrap();
        let decoded: Reply = bincode::deserialize(&bytes).unwrap();
        assert_eq!(r, decoded);
    }

    #[test]
    fn test_error_classification() {
        assert!(ClientError::BackupPoolExhausted { chunk: 1 }.is_exhaustion());
        assert!(ClientError::ReplacementPoolExhausted { chunk: 1 }.is_exhaustion());
        assert!(!ClientError::DuplicateTarget(3).is_exhaustion());
        assert!(ClientError::InvariantViolation { index: 3 }.is_bug());
        assert!(!ClientError::StalePreparedQuery.is_bug());
    }

    #[test]
    fn test_server_error_converts() {
        let err: ClientError = ServerError::IndexOutOfRange { index: 9 }.into();
        assert!(matches!(err, ClientError::Server(ServerError::IndexOutOfRange { index: 9 })));
        assert_eq!(err.to_string(), "server error: index 9 out of range");
    }
}
