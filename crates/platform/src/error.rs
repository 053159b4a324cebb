//! Error types for sealwire

use std::fmt;

/// Unified error type for all sealwire operations
#[derive(Debug)]
pub enum SealError {
    /// I/O error
    Io(std::io::Error),

    /// Configuration error
    Config(String),

    /// Wire data is truncated, over-length or structurally invalid
    MalformedInput(String),

    /// More bytes must be read before the operation can proceed.
    ///
    /// No state has been changed by the failed call.
    IncompleteData {
        /// Bytes required by the operation
        needed: usize,
        /// Bytes that were supplied
        available: usize,
    },

    /// MAC verification failed
    ///
    /// Deliberately carries no detail.
    IntegrityFailure,

    /// Unknown or unavailable algorithm, key type or certificate type
    UnsupportedAlgorithm(String),

    /// Key material rejected at construction time
    InvalidKeyData(String),

    /// Algorithm refused to operate on otherwise valid input
    Algorithm(String),

    /// Caller broke an API contract (disposed object, misaligned packet)
    ContractViolation(String),

    /// Other error
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl SealError {
    /// Returns true for MAC verification failures
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, SealError::IntegrityFailure)
    }

    /// Returns true when the caller should read more bytes and retry
    pub fn is_incomplete(&self) -> bool {
        matches!(self, SealError::IncompleteData { .. })
    }
}

impl fmt::Display for SealError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SealError::Io(e) => write!(f, "IO error: {}", e),
            SealError::Config(msg) => write!(f, "Configuration error: {}", msg),
            SealError::MalformedInput(msg) => write!(f, "Malformed input: {}", msg),
            SealError::IncompleteData { needed, available } => write!(
                f,
                "Incomplete data: need {} bytes, have {}",
                needed, available
            ),
            SealError::IntegrityFailure => write!(f, "Integrity check failed"),
            SealError::UnsupportedAlgorithm(msg) => write!(f, "Unsupported algorithm: {}", msg),
            SealError::InvalidKeyData(msg) => write!(f, "Invalid key data: {}", msg),
            SealError::Algorithm(msg) => write!(f, "Algorithm error: {}", msg),
            SealError::ContractViolation(msg) => write!(f, "Contract violation: {}", msg),
            SealError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for SealError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SealError::Io(e) => Some(e),
            SealError::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SealError {
    fn from(err: std::io::Error) -> Self {
        SealError::Io(err)
    }
}

/// Result type for sealwire operations
pub type SealResult<T> = Result<T, SealError>;
