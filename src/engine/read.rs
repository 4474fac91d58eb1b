//! Read path (spec.md §4.8).

use crate::errors::{Error, Result};
use crate::types;

use super::OnionFile;

impl OnionFile {
    /// Read `len` bytes starting at `offset` into `out`, which must be
    /// exactly `len` bytes long.
    ///
    /// # Errors
    /// Returns `Error::InvalidArgument` if `offset + len` exceeds
    /// `logi_eoa`, or an I/O/decode error if a resolved page cannot be
    /// read back from its backing file.
    pub fn read(&mut self, offset: u64, len: usize, out: &mut [u8]) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        if out.len() != len {
            return Err(Error::InvalidArgument(format!(
                "output buffer length {} does not match requested len {len}",
                out.len()
            )));
        }
        let end = offset.checked_add(len as u64).ok_or_else(|| Error::InvalidArgument("offset + len overflows u64".to_string()))?;
        if end > self.logi_eoa {
            return Err(Error::InvalidArgument(format!(
                "read [{offset}, {end}) exceeds logical end-of-address {}",
                self.logi_eoa
            )));
        }

        let page_size = 1u64 << self.page_size_log2;
        let first_page = types::logi_page(offset, self.page_size_log2);
        let last_page = types::logi_page(end - 1, self.page_size_log2);

        let mut written = 0usize;
        for page in first_page..=last_page {
            let page_start = types::page_start_addr(page, self.page_size_log2);
            let head = offset.saturating_sub(page_start).min(page_size) as usize;
            let page_end = page_start + page_size;
            let tail = page_end.saturating_sub(end).min(page_size) as usize;
            let copy_len = page_size as usize - head - tail;

            let bytes = self.read_page_range(page, head, copy_len)?;
            out[written..written + copy_len].copy_from_slice(&bytes);
            written += copy_len;
        }

        debug_assert_eq!(written, len, "read path must account for every requested byte");
        Ok(())
    }

    fn read_page_range(&mut self, page: types::LogiPage, head: usize, copy_len: usize) -> Result<Vec<u8>> {
        if self.read_write {
            if let Some(entry) = self.revision_index.as_ref().and_then(|ix| ix.find(page)) {
                return self.onion.read(entry.phys_addr + head as u64, copy_len);
            }
        }
        if let Some(entry) = self.archival_index.find(page) {
            return self.onion.read(entry.phys_addr + head as u64, copy_len);
        }

        let page_start = types::page_start_addr(page, self.page_size_log2);
        let available = self.origin_eof.saturating_sub(page_start + head as u64).min(copy_len as u64) as usize;
        let mut buf = vec![0u8; copy_len];
        if available > 0 {
            let from_canonical = self.canonical.read(page_start + head as u64, available)?;
            buf[..available].copy_from_slice(&from_canonical);
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::index::ArchivalIndex;

    fn fresh_store(dir: &std::path::Path, name: &str) -> OnionFile {
        let canonical_path = dir.join(name);
        std::fs::write(&canonical_path, b"origin-bytes-0123456789").unwrap();
        let config = EngineConfig::with_file_backing(16);
        super::super::create(&canonical_path, config).unwrap()
    }

    #[test]
    fn read_zero_length_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fresh_store(dir.path(), "a.h5");
        file.set_logi_eoa(16);
        let mut out: [u8; 0] = [];
        assert!(file.read(0, 0, &mut out).is_ok());
    }

    #[test]
    fn read_rejects_past_eoa() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fresh_store(dir.path(), "b.h5");
        file.set_logi_eoa(16);
        let mut out = [0u8; 8];
        assert!(file.read(16, 8, &mut out).is_err());
    }

    #[test]
    fn read_falls_back_to_canonical_with_zero_fill_past_origin_eof() {
        let dir = tempfile::tempdir().unwrap();
        let canonical_path = dir.path().join("c.h5");
        std::fs::write(&canonical_path, b"0123456789").unwrap();
        let config = EngineConfig::with_file_backing(16);
        let mut file = super::super::create(&canonical_path, config).unwrap();
        file.origin_eof = 10;
        file.set_logi_eoa(16);

        let mut out = [0xFFu8; 16];
        file.read(0, 16, &mut out).unwrap();
        assert_eq!(&out[0..10], b"0123456789");
        assert_eq!(&out[10..16], &[0u8; 6]);
    }

    #[test]
    fn read_prefers_onion_page_over_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let canonical_path = dir.path().join("d.h5");
        std::fs::write(&canonical_path, [0u8; 16]).unwrap();
        let config = EngineConfig::with_file_backing(16);
        let mut file = super::super::create(&canonical_path, config).unwrap();
        file.set_logi_eoa(16);

        let committed_page = vec![7u8; 16];
        let phys_addr = file.history_eof;
        file.onion.write(phys_addr, &committed_page).unwrap();
        file.history_eof += 16;
        file.archival_index = ArchivalIndex { page_size_log2: file.page_size_log2, entries: vec![crate::codec::IndexEntry::new(0, phys_addr)] };

        let mut out = [0u8; 16];
        file.read(0, 16, &mut out).unwrap();
        assert_eq!(out, [7u8; 16]);
    }
}
