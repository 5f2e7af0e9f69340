// lkv-engine - Typed keyspace, expiry engine, and command dispatch for LineKV
//
// The engine owns all mutable shared state: the keyspace (a readers-writer
// locked map of typed values) and the expiry index (a mutex-guarded min-heap
// with positional cancellation). Everything above it - server, client - is
// plumbing around `Cache::handle_request`.

pub mod cache;
pub mod cleaner;
pub mod expiry;
pub mod snapshot;
pub mod value;

pub use cache::Cache;
pub use cleaner::CleanerHandle;
pub use expiry::{ExpiryIndex, ExpiryRecord};
pub use value::Value;
