//! Close / commit (spec.md §4.10).

use chrono::Utc;
use log::info;

use crate::codec::whole_history::RecordPointer;
use crate::config::HeaderFlags;
use crate::errors::Result;
use crate::index::merge;
use crate::types;

use super::OnionFile;

impl OnionFile {
    /// Commit (if opened read-write) and release this handle's resources.
    ///
    /// A read-only handle simply releases its file handles. A read-write
    /// handle additionally stamps the revision record, merges the
    /// revision index into the archival index, appends the new revision
    /// record and a fresh whole-history, clears `WRITE_LOCK`, and deletes
    /// the recovery sidecar — the durable acts of a clean commit.
    ///
    /// # Errors
    /// Returns an error if any encode, write, or filesystem operation
    /// during commit fails. On failure mid-commit, the recovery file is
    /// left in place deliberately (spec §7): it preserves evidence for a
    /// future recovery tool rather than being deleted on a failed commit.
    pub fn close(mut self) -> Result<()> {
        if self.read_write {
            self.commit()?;
        }
        self.onion.close()?;
        self.canonical.close()?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let page_aligned = self.header.flags.contains(HeaderFlags::PAGE_ALIGNMENT);

        self.revision_record.time_of_creation = stamp_now();
        self.revision_record.logi_eof = self.logi_eof;

        let revision_index = self.revision_index.take().expect("commit requires a read-write handle with a revision index");
        self.revision_record.archival_index = merge::merge(&self.revision_record.archival_index, &revision_index)?;

        let record_buf = self.revision_record.encode();
        let record_addr = self.history_eof;
        self.onion.write(record_addr, &record_buf)?;
        self.history_eof = round_up(record_addr + record_buf.len() as u64, self.page_size_log2, page_aligned);

        self.whole_history.record_pointers.push(RecordPointer::new(record_addr, record_buf.len() as u64));

        let whs_addr = self.history_eof;
        let whs_buf = self.whole_history.encode();
        self.onion.write(whs_addr, &whs_buf)?;
        self.header.whole_history_addr = whs_addr;
        self.header.whole_history_size = whs_buf.len() as u64;
        self.history_eof = round_up(whs_addr + whs_buf.len() as u64, self.page_size_log2, page_aligned);

        self.header.flags.remove(HeaderFlags::WRITE_LOCK);
        self.onion.write(0, &self.header.encode())?;

        if let Some(recovery) = self.recovery.take() {
            recovery.close()?;
        }
        std::fs::remove_file(crate::fsutil::recovery_path(&self.onion_path)).ok();

        info!(
            "committed revision {} to {} ({} bytes logical)",
            self.revision_record.revision_id,
            self.onion_path.display(),
            self.revision_record.logi_eof
        );
        Ok(())
    }
}

fn stamp_now() -> [u8; 16] {
    let formatted = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
    let mut out = [0u8; 16];
    out.copy_from_slice(formatted.as_bytes());
    out
}

fn round_up(addr: u64, page_size_log2: u32, page_aligned: bool) -> u64 {
    if page_aligned {
        types::round_up_to_page(addr, page_size_log2)
    } else {
        addr
    }
}
