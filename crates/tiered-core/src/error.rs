//! Error types for kernel dispatch and execution contexts
//!
//! Provides a unified error type for all tiered crates.

use thiserror::Error;

use crate::context::ContextKind;
use crate::cpu::CpuTier;
use crate::numeric::FloatType;

/// Core error type for dispatch and execution operations
#[derive(Error, Debug)]
pub enum Error {
    /// No kernel at or below the requested tier is registered for this pair
    #[error("Configuration error: no kernel for {tag}/{float_type} at or below tier {tier}")]
    KernelNotFound {
        tag: String,
        float_type: FloatType,
        tier: CpuTier,
    },

    /// The (tag, float type) pair has no registered kernels at any tier
    #[error("Unsupported combination: {tag} has no kernels for {float_type}")]
    UnsupportedCombination { tag: String, float_type: FloatType },

    /// The same (tag, float type, tier) key was registered twice
    #[error("Configuration error: duplicate kernel for {tag}/{float_type} at tier {tier}")]
    DuplicateKernel {
        tag: String,
        float_type: FloatType,
        tier: CpuTier,
    },

    /// A registered entry does not have the signature the caller asked for
    #[error("Configuration error: kernel {tag}/{float_type} was registered with a different signature")]
    SignatureMismatch { tag: String, float_type: FloatType },

    /// Invalid or conflicting runtime configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The current execution context cannot serve the request
    #[error("Execution context mismatch in {operation}: requires {required}, current context is {actual}")]
    ContextMismatch {
        operation: String,
        required: ContextKind,
        actual: ContextKind,
    },

    /// Invalid parameter provided to a function
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Numerical computation error
    #[error("Computation error: {0}")]
    Computation(String),

    /// Buffer allocation or access error
    #[error("Memory error: {0}")]
    Memory(String),

    /// Threading, queue or event error
    #[error("Execution error: {0}")]
    Execution(String),

    /// CPU feature not available on this host
    #[error("Feature not available: {0}")]
    FeatureNotAvailable(String),

    /// IO error (config files)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON config parse error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other errors
    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True for errors caused by a missing or inconsistent kernel manifest
    /// or configuration. These are fatal and never worth retrying.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::KernelNotFound { .. }
                | Self::UnsupportedCombination { .. }
                | Self::DuplicateKernel { .. }
                | Self::SignatureMismatch { .. }
                | Self::Config(_)
        )
    }

    /// Create an error for size mismatch
    pub fn size_mismatch(expected: usize, actual: usize, context: &str) -> Self {
        Self::InvalidInput(format!(
            "Size mismatch in {context}: expected {expected}, got {actual}"
        ))
    }

    /// Create an error for a context used for an operation it cannot serve
    pub fn context_mismatch(operation: &str, required: ContextKind, actual: ContextKind) -> Self {
        Self::ContextMismatch {
            operation: operation.to_string(),
            required,
            actual,
        }
    }
}
