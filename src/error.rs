//! Typed failure kinds raised by the batch machinery itself.
//!
//! Everything else (model or trajectory failures) travels as a plain
//! [`anyhow::Error`]. Callers that need to tell a user abort apart from a
//! genuine fault downcast:
//!
//! ```ignore
//! match err.downcast_ref::<BatchError>() {
//!     Some(BatchError::Interrupted { .. }) => { /* user abort */ }
//!     _ => { /* anything else */ }
//! }
//! ```

use thiserror::Error;

/// Errors originating in the batch layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum BatchError {
    /// The batch was cancelled from outside. Never absorbed into a result.
    #[error("batch interrupted after {completed} trajectories")]
    Interrupted {
        /// Trajectories that had finished when the interrupt was observed.
        completed: usize,
    },

    /// A configuration value is out of its allowed range.
    #[error("invalid batch configuration: {0}")]
    InvalidConfig(String),

    /// Two arrays that must agree in shape do not.
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

impl BatchError {
    /// Whether this is a user-initiated cancellation.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }
}

/// Returns `true` if `err` carries a [`BatchError::Interrupted`] anywhere in
/// its chain.
pub fn is_interrupt(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<BatchError>())
        .any(BatchError::is_interrupt)
}
