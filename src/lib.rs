//! Piano: single-server PIR with client-side preprocessing.
//!
//! The client streams the database once to build keyed hints, then answers
//! point queries with `O(sqrt(N))` work per query while the server only ever
//! sees one uniformly random index per chunk. A consumed hint is replaced by
//! a backup hint programmed at the queried index, so the session keeps its
//! privacy without re-running preprocessing.
//!
//! Based on "Piano: Extremely Simple, Single-Server PIR with Sublinear Server
//! Computation" (https://eprint.iacr.org/2023/452).

pub mod client;
pub mod cost;
pub mod hints;
pub mod messages;
pub mod params;
pub mod preprocess;
pub mod prf;
pub mod server;
pub mod state;
pub mod stream;

pub use client::{Client, PreparedQuery};
pub use messages::{ClientError, Query, Reply, ServerError};
pub use params::{Params, Word};
pub use server::{Db, InMemoryDb, Server, ServerOracle};
pub use state::SessionState;
