//! Write path (spec.md §4.9).

use crate::codec::IndexEntry;
use crate::errors::{Error, Result};
use crate::types;

use super::OnionFile;

impl OnionFile {
    /// Write `len` bytes from `data` starting at `offset`.
    ///
    /// # Errors
    /// Returns `Error::NotSupported` if this handle was opened read-only,
    /// or `Error::InvalidArgument` if `offset + len` exceeds `logi_eoa`.
    pub fn write(&mut self, offset: u64, len: usize, data: &[u8]) -> Result<()> {
        if len == 0 {
            return Ok(());
        }
        if !self.read_write {
            return Err(Error::NotSupported("write attempted on a read-only handle".to_string()));
        }
        if data.len() != len {
            return Err(Error::InvalidArgument(format!(
                "input buffer length {} does not match declared len {len}",
                data.len()
            )));
        }
        let end = offset.checked_add(len as u64).ok_or_else(|| Error::InvalidArgument("offset + len overflows u64".to_string()))?;
        if end > self.logi_eoa {
            return Err(Error::InvalidArgument(format!(
                "write [{offset}, {end}) exceeds logical end-of-address {}",
                self.logi_eoa
            )));
        }

        let page_size = 1u64 << self.page_size_log2;
        let first_page = types::logi_page(offset, self.page_size_log2);
        let last_page = types::logi_page(end - 1, self.page_size_log2);

        let mut consumed = 0usize;
        for page in first_page..=last_page {
            let page_start = types::page_start_addr(page, self.page_size_log2);
            let head = offset.saturating_sub(page_start).min(page_size) as usize;
            let page_end = page_start + page_size;
            let tail = page_end.saturating_sub(end).min(page_size) as usize;
            let copy_len = page_size as usize - head - tail;

            self.write_page(page, head, tail, &data[consumed..consumed + copy_len])?;
            consumed += copy_len;
        }

        self.logi_eof = self.logi_eof.max(end);
        Ok(())
    }

    fn write_page(&mut self, page: types::LogiPage, head: usize, tail: usize, new_bytes: &[u8]) -> Result<()> {
        let page_size = 1usize << self.page_size_log2;
        let existing_entry = self.revision_index.as_ref().and_then(|ix| ix.find(page));

        let image = if head == 0 && tail == 0 {
            new_bytes.to_vec()
        } else {
            let mut buf = self.existing_page_image(page, existing_entry)?;
            buf[head..head + new_bytes.len()].copy_from_slice(new_bytes);
            buf
        };
        debug_assert_eq!(image.len(), page_size);

        if let Some(entry) = existing_entry {
            self.onion.write(entry.phys_addr, &image)?;
            return Ok(());
        }

        let phys_addr = self.history_eof;
        self.onion.write(phys_addr, &image)?;
        self.history_eof += page_size as u64;
        self.revision_index
            .as_mut()
            .expect("write path requires a read-write handle with a revision index")
            .insert(page, phys_addr)?;
        Ok(())
    }

    fn existing_page_image(&mut self, page: types::LogiPage, revision_hit: Option<IndexEntry>) -> Result<Vec<u8>> {
        let page_size = 1usize << self.page_size_log2;
        if let Some(entry) = revision_hit {
            return self.onion.read(entry.phys_addr, page_size);
        }
        if let Some(entry) = self.archival_index.find(page) {
            return self.onion.read(entry.phys_addr, page_size);
        }

        let page_start = types::page_start_addr(page, self.page_size_log2);
        let available = self.origin_eof.saturating_sub(page_start).min(page_size as u64) as usize;
        let mut buf = vec![0u8; page_size];
        if available > 0 {
            let from_canonical = self.canonical.read(page_start, available)?;
            buf[..available].copy_from_slice(&from_canonical);
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn fresh_store(dir: &std::path::Path, name: &str, page_size: u32) -> OnionFile {
        let canonical_path = dir.join(name);
        std::fs::write(&canonical_path, [0u8; 32]).unwrap();
        let config = EngineConfig::with_file_backing(page_size);
        super::super::create(&canonical_path, config).unwrap()
    }

    #[test]
    fn write_rejects_on_read_only_handle() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fresh_store(dir.path(), "a.h5", 16);
        file.read_write = false;
        assert!(matches!(file.write(0, 4, &[1, 2, 3, 4]), Err(Error::NotSupported(_))));
    }

    #[test]
    fn full_page_write_goes_directly_to_history_eof() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fresh_store(dir.path(), "b.h5", 16);
        file.set_logi_eoa(16);
        let data = vec![9u8; 16];
        file.write(0, 16, &data).unwrap();
        assert_eq!(file.logi_eof(), 16);

        let mut out = vec![0u8; 16];
        file.read(0, 16, &mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn partial_page_write_preserves_untouched_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let canonical_path = dir.path().join("c.h5");
        std::fs::write(&canonical_path, [5u8; 16]).unwrap();
        let config = EngineConfig::with_file_backing(16);
        let mut file = super::super::create(&canonical_path, config).unwrap();
        file.origin_eof = 16;
        file.set_logi_eoa(16);

        file.write(4, 4, &[0xAA, 0xAA, 0xAA, 0xAA]).unwrap();

        let mut out = vec![0u8; 16];
        file.read(0, 16, &mut out).unwrap();
        assert_eq!(&out[0..4], &[5u8; 4]);
        assert_eq!(&out[4..8], &[0xAAu8; 4]);
        assert_eq!(&out[8..16], &[5u8; 8]);
    }

    #[test]
    fn rewriting_a_revision_indexed_page_overwrites_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fresh_store(dir.path(), "d.h5", 16);
        file.set_logi_eoa(16);
        file.write(0, 16, &vec![1u8; 16]).unwrap();
        let phys_addr_first = file.revision_index.as_ref().unwrap().find(0).unwrap().phys_addr;
        let history_eof_after_first = file.history_eof;

        file.write(0, 16, &vec![2u8; 16]).unwrap();
        let phys_addr_second = file.revision_index.as_ref().unwrap().find(0).unwrap().phys_addr;

        assert_eq!(phys_addr_first, phys_addr_second);
        assert_eq!(file.history_eof, history_eof_after_first, "second write must not allocate a new slot");

        let mut out = vec![0u8; 16];
        file.read(0, 16, &mut out).unwrap();
        assert_eq!(out, vec![2u8; 16]);
    }

    #[test]
    fn write_rejects_past_logi_eoa() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = fresh_store(dir.path(), "e.h5", 16);
        file.set_logi_eoa(8);
        assert!(file.write(4, 8, &[0u8; 8]).is_err());
    }
}
