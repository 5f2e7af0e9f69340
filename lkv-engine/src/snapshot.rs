//! # Snapshot Persistence
//!
//! SAVE and LOAD move the full state - keyspace plus expiry index - through
//! a self-describing JSON blob. The value enum's external tag is the
//! per-value kind marker, so loading never guesses kinds, and deadlines are
//! absolute wall-clock instants that survive a restart. The byte layout is
//! not a contract; round-tripping is.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use lkv_common::{CacheError, CacheResult};

use crate::expiry::ExpiryIndex;
use crate::value::Fields;

/// Full cache state as written to disk.
#[derive(Serialize, Deserialize)]
pub(crate) struct Snapshot {
    pub fields: Fields,
    pub exps: ExpiryIndex,
}

/// Borrowing mirror of `Snapshot`, so SAVE serializes under the locks
/// without cloning the whole keyspace.
#[derive(Serialize)]
struct SnapshotRef<'a> {
    fields: &'a Fields,
    exps: &'a ExpiryIndex,
}

pub(crate) fn encode(fields: &Fields, exps: &ExpiryIndex) -> CacheResult<Vec<u8>> {
    serde_json::to_vec(&SnapshotRef { fields, exps })
        .map_err(|err| CacheError::Encoding(err.to_string()))
}

pub(crate) fn decode(blob: &[u8]) -> CacheResult<Snapshot> {
    serde_json::from_slice(blob).map_err(|err| CacheError::Encoding(err.to_string()))
}

pub(crate) fn write(root: &Path, name: &str, blob: &[u8]) -> CacheResult<()> {
    fs::create_dir_all(root)?;
    fs::write(root.join(name), blob)?;
    Ok(())
}

pub(crate) fn read(root: &Path, name: &str) -> CacheResult<Vec<u8>> {
    Ok(fs::read(root.join(name))?)
}
