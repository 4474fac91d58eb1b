//! In-memory hashed index for pages touched in the current write session.
//!
//! The reference design chains hash-bucket collisions as singly-linked
//! nodes; this engine is single-threaded and the chain never needs a
//! back-reference, so each bucket is simply a `Vec<IndexEntry>` in
//! insertion order — the same append-at-tail, walk-to-find semantics
//! without hand-rolled pointer chasing.

use crate::codec::IndexEntry;
use crate::errors::{Error, Result};
use crate::types::{self, LogiPage, PhysAddr};

const STARTING_TABLE_SIZE_LOG2: u32 = 10;

pub struct RevisionIndex {
    page_size_log2: u32,
    buckets: Vec<Vec<IndexEntry>>,
    n_entries: u64,
    n_keys_populated: u64,
}

impl RevisionIndex {
    /// # Errors
    /// Returns `Error::InvalidArgument` if `page_size` is zero or not a
    /// power of two.
    pub fn new(page_size: u32) -> Result<Self> {
        let page_size_log2 = types::page_size_log2(page_size)?;
        Ok(Self {
            page_size_log2,
            buckets: (0..(1u64 << STARTING_TABLE_SIZE_LOG2)).map(|_| Vec::new()).collect(),
            n_entries: 0,
            n_keys_populated: 0,
        })
    }

    #[must_use]
    pub fn page_size_log2(&self) -> u32 {
        self.page_size_log2
    }

    #[must_use]
    pub fn n_entries(&self) -> u64 {
        self.n_entries
    }

    #[must_use]
    pub fn table_size(&self) -> u64 {
        self.buckets.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.n_entries == 0
    }

    fn bucket_of(&self, logi_page: LogiPage) -> usize {
        (logi_page & (self.table_size() - 1)) as usize
    }

    /// Idempotent insert: re-inserting `(logi_page, phys_addr)` leaves
    /// `n_entries` unchanged. Inserting the same `logi_page` with a
    /// different `phys_addr` fails.
    ///
    /// # Errors
    /// Returns `Error::Internal` if `logi_page` is already present with a
    /// different `phys_addr`.
    pub fn insert(&mut self, logi_page: LogiPage, phys_addr: PhysAddr) -> Result<()> {
        if self.n_entries >= 2 * self.table_size() || self.n_keys_populated * 2 >= self.table_size() {
            self.resize();
        }
        let idx = self.bucket_of(logi_page);
        let bucket = &mut self.buckets[idx];
        if let Some(existing) = bucket.iter_mut().find(|e| e.logi_page == logi_page) {
            if existing.phys_addr != phys_addr {
                return Err(Error::Internal(format!(
                    "revision index conflict: page {logi_page} already maps to {}, cannot also map to {phys_addr}",
                    existing.phys_addr
                )));
            }
            existing.phys_addr = phys_addr;
            return Ok(());
        }
        let was_empty = bucket.is_empty();
        bucket.push(IndexEntry::new(logi_page, phys_addr));
        self.n_entries += 1;
        if was_empty {
            self.n_keys_populated += 1;
        }
        Ok(())
    }

    #[must_use]
    pub fn find(&self, logi_page: LogiPage) -> Option<IndexEntry> {
        let idx = self.bucket_of(logi_page);
        self.buckets[idx].iter().find(|e| e.logi_page == logi_page).copied()
    }

    /// All entries across all buckets, in no particular order.
    pub fn iter_entries(&self) -> impl Iterator<Item = IndexEntry> + '_ {
        self.buckets.iter().flatten().copied()
    }

    fn resize(&mut self) {
        let new_size = self.buckets.len() * 2;
        let mut new_buckets: Vec<Vec<IndexEntry>> = (0..new_size).map(|_| Vec::new()).collect();
        let mask = new_size as u64 - 1;
        let mut n_keys_populated = 0u64;
        for entry in self.buckets.drain(..).flatten() {
            let idx = (entry.logi_page & mask) as usize;
            if new_buckets[idx].is_empty() {
                n_keys_populated += 1;
            }
            new_buckets[idx].push(entry);
        }
        self.buckets = new_buckets;
        self.n_keys_populated = n_keys_populated;
    }
}
