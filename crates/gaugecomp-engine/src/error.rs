// SPDX-License-Identifier: Apache-2.0

//! Engine error types.
//!
//! The taxonomy is deliberately narrow: almost nothing in the decision core
//! is fatal. Malformed samples are skipped with a warning, hardware write
//! failures surface inside the batch outcome, and a racing ingestion trigger
//! is a silent no-op. What remains here are configuration faults (unknown
//! feature ids), which must never be silently defaulted.

use gaugecomp_catalog::CatalogError;
use thiserror::Error;

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Catalog lookup or validation failure. An unknown feature id during
    /// ingestion lands here and aborts the cycle for that trigger.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
