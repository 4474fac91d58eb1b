//! Recovery manager façade: diagnose, never auto-repair.

use std::path::Path;

use crate::backing::{BackingStore, FileBackingStore, OpenFlags};
use crate::codec::Header;
use crate::codec::whole_history::WholeHistory;
use crate::errors::Result;
use crate::fsutil::recovery_path;
use crate::history::ingest_header;

/// The outcome of inspecting an onion file without opening it for writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryStatus {
    /// Set when the header's `WRITE_LOCK` flag is observed, meaning the
    /// previous write session did not commit cleanly.
    pub write_lock_set: bool,
    /// Whether `<onion-path>.recovery` exists on disk.
    pub recovery_file_present: bool,
}

/// Read the onion header at `onion_path` and report whether the previous
/// write session left the file in a crashed state.
///
/// # Errors
/// Returns an error if the onion file cannot be opened or its header
/// cannot be decoded.
pub fn inspect(onion_path: &Path) -> Result<RecoveryStatus> {
    let store = FileBackingStore;
    let mut file = store.open(onion_path, OpenFlags::READ, u64::MAX)?;
    let header = ingest_header(file.as_mut(), 0)?;
    Ok(RecoveryStatus {
        write_lock_set: header.flags.contains(crate::config::HeaderFlags::WRITE_LOCK),
        recovery_file_present: recovery_path(onion_path).exists(),
    })
}

/// Decode and return the whole-history preserved in `<onion-path>.recovery`,
/// the last consistent state before the crashed session began writing.
///
/// # Errors
/// Returns an error if the recovery file is absent or malformed.
pub fn verify(onion_path: &Path) -> Result<WholeHistory> {
    let path = recovery_path(onion_path);
    let store = FileBackingStore;
    let mut file = store.open(&path, OpenFlags::READ, u64::MAX)?;
    let size = file.get_eof()?;
    let buf = file.read(0, size as usize)?;
    let (whole_history, _used) = WholeHistory::decode(&buf)?;
    Ok(whole_history)
}
