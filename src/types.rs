//! Small value types shared across the codec, index, and engine modules.

use crate::errors::{Error, Result};

/// A committed revision's identifier. Revision 0 is the initial revision.
pub type RevisionId = u64;

/// Sentinel passed to `open`/ingest to mean "the newest committed revision".
pub const LATEST: RevisionId = u64::MAX;

/// Byte offset into the onion file where a full page image lives.
pub type PhysAddr = u64;

/// Byte offset in the logical (post-history) file.
pub type LogiAddr = u64;

/// A page number in the logical address space: `logi_addr >> page_size_log2`.
pub type LogiPage = u64;

/// Validate that `page_size` is non-zero and a power of two, and return its
/// base-2 logarithm.
///
/// # Errors
/// Returns `Error::InvalidArgument` if `page_size` is zero or not a power of two.
pub fn page_size_log2(page_size: u32) -> Result<u32> {
    if page_size == 0 || !page_size.is_power_of_two() {
        return Err(Error::InvalidArgument(format!(
            "page_size must be a nonzero power of two, got {page_size}"
        )));
    }
    Ok(page_size.trailing_zeros())
}

/// Logical page number containing `addr`, given `page_size_log2`.
#[must_use]
pub const fn logi_page(addr: LogiAddr, page_size_log2: u32) -> LogiPage {
    addr >> page_size_log2
}

/// Logical address of the start of `page`, given `page_size_log2`.
#[must_use]
pub const fn page_start_addr(page: LogiPage, page_size_log2: u32) -> LogiAddr {
    page << page_size_log2
}

/// Round `addr` up to the next multiple of `2^page_size_log2`.
#[must_use]
pub const fn round_up_to_page(addr: u64, page_size_log2: u32) -> u64 {
    let page_size = 1u64 << page_size_log2;
    let mask = page_size - 1;
    (addr + mask) & !mask
}
