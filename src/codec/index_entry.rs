//! Index entry: maps a logical page to a physical offset in the onion
//! file. 20 bytes on disk: logical address (8), physical address (8),
//! per-entry checksum (4).

use crate::checksum::fletcher32;
use crate::errors::{Error, Result};
use crate::types::{LogiPage, PhysAddr};

pub const ENCODED_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct IndexEntry {
    pub logi_page: LogiPage,
    pub phys_addr: PhysAddr,
}

impl IndexEntry {
    #[must_use]
    pub const fn new(logi_page: LogiPage, phys_addr: PhysAddr) -> Self {
        Self { logi_page, phys_addr }
    }

    /// Append this entry's encoding to `buf`. `page_size_log2` determines
    /// how `logi_page` is converted to the on-disk logical address.
    pub fn encode_into(&self, page_size_log2: u32, buf: &mut Vec<u8>) {
        let logi_addr = self.logi_page << page_size_log2;
        let start = buf.len();
        buf.extend_from_slice(&logi_addr.to_le_bytes());
        buf.extend_from_slice(&self.phys_addr.to_le_bytes());
        let checksum = fletcher32(&buf[start..start + 16]);
        buf.extend_from_slice(&checksum.to_le_bytes());
    }

    /// Decode one entry from the front of `data`.
    ///
    /// # Errors
    /// Returns `Error::Decode` if `data` is too short, the per-entry
    /// checksum doesn't match, or the decoded logical address is not a
    /// multiple of `page_size` (`1 << page_size_log2`).
    pub fn decode(data: &[u8], page_size_log2: u32) -> Result<Self> {
        if data.len() < ENCODED_SIZE {
            return Err(Error::Decode(format!(
                "index entry buffer too short: {} < {ENCODED_SIZE}",
                data.len()
            )));
        }
        let logi_addr = u64::from_le_bytes(data[0..8].try_into().unwrap());
        let phys_addr = u64::from_le_bytes(data[8..16].try_into().unwrap());
        let stored = u32::from_le_bytes(data[16..20].try_into().unwrap());
        let computed = fletcher32(&data[0..16]);
        if computed != stored {
            return Err(Error::Decode("index entry checksum mismatch".to_string()));
        }
        let page_size = 1u64 << page_size_log2;
        if logi_addr % page_size != 0 {
            return Err(Error::Decode(format!(
                "index entry logical address {logi_addr} misaligned to page size {page_size}"
            )));
        }
        Ok(Self { logi_page: logi_addr >> page_size_log2, phys_addr })
    }
}
