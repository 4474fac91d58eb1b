//! Property-based coverage for `index::merge`: whatever random set of
//! pages the archival index and the revision index each hold, the merge
//! must stay strictly ascending and never lose or misattribute a page.

use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest::collection::hash_map;

use onion_store::codec::IndexEntry;
use onion_store::index::{merge, ArchivalIndex, RevisionIndex};

const PAGE_SIZE_LOG2: u32 = 9;

fn build_archival(pages: &BTreeMap<u64, u64>) -> ArchivalIndex {
    ArchivalIndex {
        page_size_log2: PAGE_SIZE_LOG2,
        entries: pages.iter().map(|(&page, &addr)| IndexEntry::new(page, addr)).collect(),
    }
}

fn build_revision(pages: &BTreeMap<u64, u64>) -> RevisionIndex {
    let mut ix = RevisionIndex::new(1 << PAGE_SIZE_LOG2).unwrap();
    for (&page, &addr) in pages {
        ix.insert(page, addr).unwrap();
    }
    ix
}

proptest! {
    #[test]
    fn merge_is_strictly_ascending_and_revision_wins_ties(
        archival_pages in hash_map(0u64..500, 0u64..1_000_000u64, 0..60),
        revision_pages in hash_map(0u64..500, 1_000_000u64..2_000_000u64, 0..60),
    ) {
        let archival_map: BTreeMap<_, _> = archival_pages.into_iter().collect();
        let revision_map: BTreeMap<_, _> = revision_pages.into_iter().collect();

        let archival = build_archival(&archival_map);
        let revision = build_revision(&revision_map);

        let merged = merge::merge(&archival, &revision).unwrap();
        prop_assert!(merged.is_valid());

        let mut expected: BTreeMap<u64, u64> = archival_map.clone();
        for (&page, &addr) in &revision_map {
            expected.insert(page, addr);
        }

        prop_assert_eq!(merged.entries.len(), expected.len());
        for (&page, &addr) in &expected {
            prop_assert_eq!(merged.find(page), Some(IndexEntry::new(page, addr)));
        }
    }
}
