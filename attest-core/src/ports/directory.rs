// attest-core/src/ports/directory.rs

// This file defines what the resolver needs, without knowing how it's done.
// The tenant directory can live in DuckDB, MySQL or behind an API: the
// resolver only ever sees this contract.

use crate::error::AttestError;
use async_trait::async_trait;

pub use crate::domain::lookup::Candidate;

#[async_trait]
pub trait Directory: Send + Sync {
    /// Returns every directory entry whose `field` column equals `value`.
    /// Must be safe to call concurrently. Failures surface as an Err that the
    /// resolver downgrades to zero candidates, never as a crash.
    async fn query(&self, field: &str, value: &str) -> Result<Vec<Candidate>, AttestError>;
}
