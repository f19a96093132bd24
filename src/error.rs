//! pointr error types

/// pointr result type
pub type Result<T> = std::result::Result<T, Error>;

/// pointr errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Error from numr operations
    #[error("numr error: {0}")]
    Numr(#[from] numr::error::Error),

    /// Attention type selector that has no scoring function
    #[error("unsupported attention type: {kind}")]
    UnsupportedAttention {
        /// The selector as given in the configuration
        kind: String,
    },

    /// Model construction or weight loading error
    #[error("model error: {reason}")]
    ModelError {
        /// Description of what went wrong
        reason: String,
    },

    /// Invalid argument to an operation
    #[error("invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// Argument name
        arg: &'static str,
        /// Why it's invalid
        reason: String,
    },
}
