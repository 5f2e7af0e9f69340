// lkv-common - Shared error and wire-request definitions for LineKV
//
// This crate defines what crosses the engine/server/client boundaries:
// the cache error type (whose Display strings are the wire error messages)
// and the line-protocol request model.

pub mod error;
pub mod protocol;

// Re-export for convenience
pub use error::{CacheError, CacheResult};
pub use protocol::Request;
