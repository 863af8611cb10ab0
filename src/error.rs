//! Error types for selection operations.

use thiserror::Error;

/// Errors raised by the selection subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// The mask handed to the tracer is not a single 8-bit channel, or its
    /// backing buffer does not match the declared geometry.
    #[error("Invalid mask format: {0}")]
    InvalidMaskFormat(String),

    /// A canvas passed to a drawing operation is not RGBA (height, width, 4).
    #[error("Invalid image format: {0}")]
    InvalidImageFormat(String),

    /// A trace did not return to its seed within the iteration cap.
    #[error("Trace starting at ({x}, {y}) did not close after {steps} steps")]
    UnboundedTrace { x: usize, y: usize, steps: usize },

    /// The marching squares lookup produced a case it cannot follow.
    #[error("Unexpected pixel group case {case} at ({x}, {y})")]
    UnexpectedCase { case: u8, x: usize, y: usize },

    /// Operation exists in the API but has no implementation.
    #[error("Unsupported selection operation: {0}")]
    Unsupported(&'static str),
}

/// Result type for selection operations.
pub type Result<T> = std::result::Result<T, SelectionError>;

#[cfg(feature = "python")]
impl From<SelectionError> for pyo3::PyErr {
    fn from(err: SelectionError) -> Self {
        pyo3::exceptions::PyValueError::new_err(err.to_string())
    }
}
