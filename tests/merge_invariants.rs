//! Cross-module invariants for the archival/revision index pair that a
//! single unit test, confined to one module, can't exercise: building both
//! indexes independently, merging them, and checking the result against
//! both sources at once.

use onion_store::codec::IndexEntry;
use onion_store::index::{merge, ArchivalIndex, RevisionIndex};

#[test]
fn merging_a_large_revision_index_into_a_large_archival_index_preserves_every_page() {
    let mut archival_entries: Vec<IndexEntry> = (0..200u64).step_by(2).map(|p| IndexEntry::new(p, p * 512)).collect();
    archival_entries.sort_by_key(|e| e.logi_page);
    let archival = ArchivalIndex { page_size_log2: 9, entries: archival_entries };
    assert!(archival.is_valid());

    let mut revision = RevisionIndex::new(512).unwrap();
    for p in (1..200u64).step_by(2) {
        revision.insert(p, 1_000_000 + p * 512).unwrap();
    }
    // also overwrite a handful of pages already present in the archival index
    revision.insert(10, 9_999_999).unwrap();
    revision.insert(50, 8_888_888).unwrap();

    let merged = merge::merge(&archival, &revision).unwrap();
    assert!(merged.is_valid());
    assert_eq!(merged.entries.len(), 200);

    for p in 0..200u64 {
        let entry = merged.find(p).unwrap_or_else(|| panic!("page {p} missing from merged index"));
        if p == 10 {
            assert_eq!(entry.phys_addr, 9_999_999);
        } else if p == 50 {
            assert_eq!(entry.phys_addr, 8_888_888);
        } else if p % 2 == 0 {
            assert_eq!(entry.phys_addr, p * 512);
        } else {
            assert_eq!(entry.phys_addr, 1_000_000 + p * 512);
        }
    }
}

#[test]
fn repeated_merges_compose_like_successive_commits() {
    let archival = ArchivalIndex::empty(9);

    let mut first_revision = RevisionIndex::new(512).unwrap();
    first_revision.insert(0, 100).unwrap();
    first_revision.insert(1, 200).unwrap();
    let after_first = merge::merge(&archival, &first_revision).unwrap();

    let mut second_revision = RevisionIndex::new(512).unwrap();
    second_revision.insert(1, 9_000).unwrap();
    second_revision.insert(2, 300).unwrap();
    let after_second = merge::merge(&after_first, &second_revision).unwrap();

    assert_eq!(after_second.find(0), Some(IndexEntry::new(0, 100)));
    assert_eq!(after_second.find(1), Some(IndexEntry::new(1, 9_000)));
    assert_eq!(after_second.find(2), Some(IndexEntry::new(2, 300)));
}

#[test]
fn revision_index_survives_many_resizes_and_remains_consistent_after_merge() {
    let mut revision = RevisionIndex::new(64).unwrap();
    let starting_table_size = revision.table_size();
    for p in 0..10_000u64 {
        revision.insert(p, p * 64).unwrap();
    }
    assert!(revision.table_size() > starting_table_size);

    let archival = ArchivalIndex::empty(revision.page_size_log2());
    let merged = merge::merge(&archival, &revision).unwrap();
    assert!(merged.is_valid());
    assert_eq!(merged.entries.len(), 10_000);
    for p in [0u64, 1, 4_999, 9_999] {
        assert_eq!(merged.find(p), Some(IndexEntry::new(p, p * 64)));
    }
}
