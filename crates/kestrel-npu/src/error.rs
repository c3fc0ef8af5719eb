//! Error types for controller operations.

use thiserror::Error;

/// Result type alias for controller operations.
pub type Result<T> = std::result::Result<T, KestrelError>;

/// Errors that can occur while describing or running a model.
#[derive(Debug, Error)]
pub enum KestrelError {
    /// Model instance index out of range.
    #[error("Instance index {index} out of range (have {count} instances)")]
    InvalidIndex {
        /// Requested index.
        index: usize,
        /// Number of available instances.
        count: usize,
    },

    /// A handle that does not refer to a live instance.
    #[error("Invalid instance handle")]
    InvalidHandle,

    /// The model declares more buffers than the controller supports.
    #[error("Too many {kind} buffers (capacity {capacity})")]
    CapacityExceeded {
        /// Buffer direction ("input" or "output").
        kind: &'static str,
        /// The fixed per-direction capacity.
        capacity: usize,
    },

    /// Host and accelerator disagree about execution progress.
    ///
    /// Raised when the epoch-block list has no terminal sentinel or the
    /// step loop exceeds its bound. There is no recovery path; the
    /// accelerator must be reset.
    #[error("Host/accelerator desynchronized: {reason}")]
    Desynchronized {
        /// What went out of sync.
        reason: String,
    },

    /// Failure reported by the accelerator runtime. Fatal; no retry
    /// or rollback semantics exist anywhere in the controller.
    #[error("Accelerator runtime error: {reason}")]
    Runtime {
        /// Reason for failure.
        reason: String,
    },
}

impl KestrelError {
    /// Create a desynchronization error.
    pub fn desynchronized(reason: impl Into<String>) -> Self {
        Self::Desynchronized {
            reason: reason.into(),
        }
    }

    /// Create an accelerator runtime error.
    pub fn runtime(reason: impl Into<String>) -> Self {
        Self::Runtime {
            reason: reason.into(),
        }
    }
}
