//! # LineKV Error Types
//!
//! ## Design Principles
//!
//! 1. **Wire-Stable Messages**: `Display` output is written verbatim to the
//!    client, so every message here is part of the protocol surface.
//! 2. **One Enum**: Engine, snapshotter, and server all speak `CacheError`;
//!    callers never juggle conversion layers.
//! 3. **Usage Strings Inline**: Arity violations carry the canonical usage
//!    string for their command.

use thiserror::Error;

/// Result type used across LineKV components.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors produced while handling a cache command.
///
/// The rendered message is sent to the client followed by `\r\n`; errors
/// never terminate a connection.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Argument count or literal-flag mismatch. Carries the usage string.
    #[error("Expected format: {0}")]
    Args(&'static str),

    /// A numeric argument could not be parsed as a signed integer.
    #[error("{0} is not an integer")]
    NotAnInteger(String),

    /// The key holds a value of a different kind than the command expects.
    #[error("Requested field is of type {0}")]
    WrongType(&'static str),

    /// List index outside the (normalized) bounds.
    #[error("Index out of range")]
    IndexOutOfRange,

    /// Range form with start past end after normalization.
    #[error("First index must be less than second")]
    BadRange,

    /// Count form of LPOP/RPOP with a zero or negative count.
    #[error("count must be positive")]
    NonPositiveCount,

    /// KEYS received a pattern the glob compiler rejected.
    #[error("invalid pattern: {0}")]
    BadPattern(String),

    /// The method is not in the command table.
    #[error("method does not exist")]
    UnknownMethod,

    /// Snapshot file could not be read or written.
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot blob could not be encoded or decoded.
    #[error("snapshot encoding failed: {0}")]
    Encoding(String),
}
