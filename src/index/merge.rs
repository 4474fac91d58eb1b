//! Fold a write session's revision index into the prior archival index at
//! commit. `O((R + A) log(R + A))`; acceptable since merges happen only
//! at close.

use std::collections::HashSet;

use crate::errors::{Error, Result};

use super::{ArchivalIndex, RevisionIndex};

/// Merge `revision` into `archival`, consuming neither but returning a new,
/// valid `ArchivalIndex`. When the same `logi_page` appears in both, the
/// revision-index entry wins.
///
/// # Errors
/// Returns `Error::Internal` if the two indexes disagree on page size.
pub fn merge(archival: &ArchivalIndex, revision: &RevisionIndex) -> Result<ArchivalIndex> {
    if archival.page_size_log2 != revision.page_size_log2() {
        return Err(Error::Internal(format!(
            "page size mismatch during merge: archival={}, revision={}",
            archival.page_size_log2,
            revision.page_size_log2()
        )));
    }
    if revision.is_empty() {
        return Ok(archival.clone());
    }

    let mut new_entries: Vec<_> = revision.iter_entries().collect();
    new_entries.sort_by_key(|e| e.logi_page);

    let touched: HashSet<_> = new_entries.iter().map(|e| e.logi_page).collect();
    let kept: Vec<_> = archival.entries.iter().filter(|e| !touched.contains(&e.logi_page)).copied().collect();

    let mut merged = new_entries;
    merged.extend(kept);
    merged.sort_by_key(|e| e.logi_page);

    let result = ArchivalIndex { page_size_log2: archival.page_size_log2, entries: merged };
    debug_assert!(result.is_valid(), "merge must produce a strictly-ascending archival index");
    Ok(result)
}
