//! History ingest: reading header, whole-history, and revision records back
//! out of an onion file via the backing-store trait.

use crate::backing::BackingFile;
use crate::codec::{Header, RevisionRecord, WholeHistory};
use crate::errors::{Error, Result};
use crate::types::{RevisionId, LATEST};

/// Read and decode the 40-byte header at `addr`.
///
/// # Errors
/// Returns `Error::Decode` on a malformed header, or `Error::Io`/
/// `Error::InvalidArgument` if the backing file cannot supply the span.
pub fn ingest_header(file: &mut dyn BackingFile, addr: u64) -> Result<Header> {
    let buf = file.read(addr, crate::codec::header::ENCODED_SIZE)?;
    Header::decode(&buf)
}

/// Read and decode the whole-history at `(addr, size)`.
///
/// # Errors
/// Returns `Error::Decode` on a malformed whole-history, or an I/O error
/// if the backing file cannot supply the span.
pub fn ingest_whole_history(file: &mut dyn BackingFile, addr: u64, size: u64) -> Result<WholeHistory> {
    let buf = file.read(addr, size as usize)?;
    let (whole_history, used) = WholeHistory::decode(&buf)?;
    if used as u64 != size {
        return Err(Error::Decode(format!(
            "whole-history declared size {size} does not match decoded length {used}"
        )));
    }
    Ok(whole_history)
}

/// Resolve `target_id` (or the `LATEST` sentinel) against `whole_history`'s
/// record-pointer list via binary search, then ingest and return that
/// revision record.
///
/// # Errors
/// Returns `Error::InvalidArgument` if the history has no revisions or
/// `target_id` is out of range, or `Error::Decode` if a probed record is
/// malformed.
pub fn ingest_revision(
    file: &mut dyn BackingFile,
    whole_history: &WholeHistory,
    target_id: RevisionId,
) -> Result<RevisionRecord> {
    let n_revisions = whole_history.record_pointers.len();
    if n_revisions == 0 {
        return Err(Error::InvalidArgument("whole-history has no revisions".to_string()));
    }
    let target_id = if target_id == LATEST { n_revisions as u64 - 1 } else { target_id };
    if target_id >= n_revisions as u64 {
        return Err(Error::InvalidArgument(format!(
            "revision {target_id} out of range [0, {n_revisions})"
        )));
    }

    let mut low = 0usize;
    let mut high = n_revisions;
    while low < high {
        let mid = low + (high - low) / 2;
        let pointer = whole_history.record_pointers[mid];
        let buf = file.read(pointer.phys_addr, pointer.record_size as usize)?;
        let fixed = RevisionRecord::decode_fixed(&buf)?;
        if fixed.revision_id < target_id {
            low = mid + 1;
        } else {
            high = mid;
        }
    }

    if low >= n_revisions {
        return Err(Error::Internal(format!("revision {target_id} not found during search")));
    }
    let pointer = whole_history.record_pointers[low];
    let buf = file.read(pointer.phys_addr, pointer.record_size as usize)?;
    let (record, _used) = RevisionRecord::decode(&buf)?;
    if record.revision_id != target_id {
        return Err(Error::Internal(format!(
            "binary search converged on revision {} instead of {target_id}",
            record.revision_id
        )));
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::whole_history::RecordPointer;
    use crate::index::ArchivalIndex;
    use std::collections::HashMap;

    struct MemFile {
        data: Vec<u8>,
    }

    impl MemFile {
        fn new() -> Self {
            Self { data: Vec::new() }
        }

        fn append(&mut self, bytes: &[u8]) -> u64 {
            let addr = self.data.len() as u64;
            self.data.extend_from_slice(bytes);
            addr
        }
    }

    impl BackingFile for MemFile {
        fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
            let start = offset as usize;
            Ok(self.data[start..start + len].to_vec())
        }
        fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
            let start = offset as usize;
            if start + data.len() > self.data.len() {
                self.data.resize(start + data.len(), 0);
            }
            self.data[start..start + data.len()].copy_from_slice(data);
            Ok(())
        }
        fn get_eoa(&self) -> u64 {
            self.data.len() as u64
        }
        fn set_eoa(&mut self, _addr: u64) -> Result<()> {
            Ok(())
        }
        fn get_eof(&self) -> Result<u64> {
            Ok(self.data.len() as u64)
        }
        fn close(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    fn revision(id: RevisionId, parent: RevisionId) -> RevisionRecord {
        RevisionRecord {
            version: crate::codec::revision_record::VERSION,
            revision_id: id,
            parent_revision_id: parent,
            time_of_creation: *b"20260726T000000Z",
            logi_eof: 4096,
            user_id: 0,
            username: String::new(),
            comment: String::new(),
            archival_index: ArchivalIndex::empty(9),
        }
    }

    #[test]
    fn ingest_header_round_trips() {
        let mut file = MemFile::new();
        let header = Header::new(512, crate::config::HeaderFlags::empty());
        file.append(&header.encode());
        let decoded = ingest_header(&mut file, 0).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn ingest_whole_history_detects_size_mismatch() {
        let mut file = MemFile::new();
        let whs = WholeHistory::empty();
        let addr = file.append(&whs.encode());
        assert!(ingest_whole_history(&mut file, addr, whs.encode().len() as u64 + 1).is_err());
    }

    #[test]
    fn ingest_revision_resolves_latest_and_by_id() {
        let mut file = MemFile::new();
        let mut pointers = Vec::new();
        let mut by_id = HashMap::new();
        for id in 0..5u64 {
            let record = revision(id, id.saturating_sub(1));
            let buf = record.encode();
            let addr = file.append(&buf);
            pointers.push(RecordPointer::new(addr, buf.len() as u64));
            by_id.insert(id, record);
        }
        let whs = WholeHistory { version: crate::codec::whole_history::VERSION, record_pointers: pointers };

        let latest = ingest_revision(&mut file, &whs, LATEST).unwrap();
        assert_eq!(latest.revision_id, 4);

        for id in 0..5u64 {
            let got = ingest_revision(&mut file, &whs, id).unwrap();
            assert_eq!(got.revision_id, id);
            assert_eq!(got, by_id[&id]);
        }
    }

    #[test]
    fn ingest_revision_rejects_empty_history() {
        let mut file = MemFile::new();
        let whs = WholeHistory::empty();
        assert!(ingest_revision(&mut file, &whs, LATEST).is_err());
    }

    #[test]
    fn ingest_revision_rejects_out_of_range() {
        let mut file = MemFile::new();
        let record = revision(0, 0);
        let buf = record.encode();
        let addr = file.append(&buf);
        let whs = WholeHistory {
            version: crate::codec::whole_history::VERSION,
            record_pointers: vec![RecordPointer::new(addr, buf.len() as u64)],
        };
        assert!(ingest_revision(&mut file, &whs, 7).is_err());
    }
}
