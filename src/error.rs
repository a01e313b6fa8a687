//! Error types for def-map construction.
//!
//! Resolution misses are not errors: an unresolved path is an empty
//! [`PerNs`](crate::hir::PerNs) and an unresolved import is a
//! [`DefDiagnostic`](crate::hir::DefDiagnostic) on the finished map. Only
//! cancellation, a malformed crate graph and environment failures surface
//! here.

use thiserror::Error;

use crate::base::FileId;
use crate::hir::CrateId;

/// Error returned by the def-map builders and the project updater.
#[derive(Debug, Error)]
pub enum DefMapError {
    /// The cancellation token fired. Retry later; nothing was published.
    #[error("def map update was cancelled")]
    Cancelled,

    #[error("unknown crate {0}")]
    UnknownCrate(CrateId),

    /// Adding the dependency `from -> to` would close a cycle.
    #[error("dependency {from} -> {to} would create a cycle in the crate graph")]
    CyclicCrateGraph { from: CrateId, to: CrateId },

    #[error("root file {file} of {krate} does not exist")]
    MissingRootFile { krate: CrateId, file: FileId },

    #[error("failed to build the rebuild thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DefMapError {
    /// Returns true if the operation was cancelled rather than failed.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, DefMapError::Cancelled)
    }

    /// Returns true if this error is due to I/O failure.
    pub fn is_io(&self) -> bool {
        matches!(self, DefMapError::Io(_))
    }
}

/// Result alias used throughout the crate.
pub type DefMapResult<T> = Result<T, DefMapError>;
