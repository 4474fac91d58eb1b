//! The onion engine: the stateful handle returned by `open`/`create`,
//! and the read/write/close operations driven against it.

mod close;
mod open;
mod read;
mod write;

pub use open::create;
pub use open::open;

use std::path::PathBuf;

use crate::backing::BackingFile;
use crate::codec::{Header, RevisionRecord, WholeHistory};
use crate::index::{ArchivalIndex, RevisionIndex};

/// A live handle on an onion-backed store, opened read-only or read-write.
///
/// Dropping an `OnionFile` without calling [`crate::engine::close`] leaves
/// any write-session state (the `WRITE_LOCK` bit, the recovery sidecar) in
/// place — exactly as if the process had crashed, matching spec §5's
/// crash-recovery contract. Callers that open read-write must call `close`
/// on every path, including error paths, to commit or to at least release
/// the canonical/onion file handles.
pub struct OnionFile {
    pub(crate) canonical_path: PathBuf,
    pub(crate) onion_path: PathBuf,

    pub(crate) canonical: Box<dyn BackingFile>,
    pub(crate) onion: Box<dyn BackingFile>,
    pub(crate) recovery: Option<Box<dyn BackingFile>>,

    pub(crate) header: Header,
    pub(crate) whole_history: WholeHistory,
    pub(crate) revision_record: RevisionRecord,
    pub(crate) archival_index: ArchivalIndex,
    pub(crate) revision_index: Option<RevisionIndex>,

    pub(crate) page_size_log2: u32,
    pub(crate) origin_eof: u64,
    pub(crate) logi_eof: u64,
    pub(crate) logi_eoa: u64,
    pub(crate) history_eof: u64,
    pub(crate) read_write: bool,
}

impl OnionFile {
    /// Whether this handle was opened for writing.
    #[must_use]
    pub fn is_read_write(&self) -> bool {
        self.read_write
    }

    /// The current logical end-of-file: the highest offset ever written
    /// or present in the ingested revision.
    #[must_use]
    pub fn logi_eof(&self) -> u64 {
        self.logi_eof
    }

    /// The current logical end-of-address: the caller-declared extent of
    /// the logical address space. Writes past this are rejected.
    #[must_use]
    pub fn logi_eoa(&self) -> u64 {
        self.logi_eoa
    }

    /// The revision this handle is reading (or, if read-write, the
    /// revision that will be committed on close).
    #[must_use]
    pub fn revision_id(&self) -> crate::types::RevisionId {
        self.revision_record.revision_id
    }

    /// Extend (or shrink) the logical end-of-address. A caller must raise
    /// this before `write` can touch bytes past the previous `logi_eoa`,
    /// mirroring the inner block-device `set_eoa` contract this engine
    /// itself consumes (spec §9 open question 2).
    pub fn set_logi_eoa(&mut self, addr: u64) {
        self.logi_eoa = addr;
    }
}
