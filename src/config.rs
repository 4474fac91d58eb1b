//! The typed configuration surface consumed by `open`/`create` (spec §6).
//!
//! This is deliberately not a generic property-list registry — the full
//! property-list surface that configures the real driver is an external
//! collaborator, out of scope here (spec §1). This is the smallest typed
//! value that lets a caller drive the engine.

use bitflags::bitflags;

use crate::backing::BackingStore;

bitflags! {
    /// Creation-time flags (spec §6 `creation_flags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct CreationFlags: u32 {
        const ENABLE_PAGE_ALIGNMENT    = 0x1;
        const ENABLE_DIVERGENT_HISTORY = 0x2;
    }
}

bitflags! {
    /// On-disk header flags (spec §3 "History header").
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct HeaderFlags: u32 {
        const WRITE_LOCK        = 0x1;
        const DIVERGENT_HISTORY = 0x2;
        const PAGE_ALIGNMENT    = 0x4;
    }
}

/// Where onion history data is stored. Only `Onion` (a separate
/// companion file) is implemented; `H5` (embedding onion data inside the
/// canonical file itself) is a reserved option rejected at open/create time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTarget {
    Onion,
    H5,
}

/// Configuration accepted by `open`/`create`.
pub struct EngineConfig {
    /// Delta granularity in bytes; must be a nonzero power of two.
    pub page_size: u32,
    /// Only `StoreTarget::Onion` is supported; `H5` is rejected.
    pub store_target: StoreTarget,
    /// Creation-only flags; ignored when opening an existing onion file.
    pub creation_flags: CreationFlags,
    /// Which revision to open; `types::LATEST` maps to the newest.
    pub revision_id: crate::types::RevisionId,
    /// Stored with the new revision created by a read-write session.
    pub comment: Option<String>,
    /// The inner block-device abstraction the engine drives.
    pub backing: Box<dyn BackingStore>,
}

impl EngineConfig {
    /// Build a config for the default `FileBackingStore`, with all other
    /// fields at their spec-mandated defaults.
    #[must_use]
    pub fn with_file_backing(page_size: u32) -> Self {
        Self {
            page_size,
            store_target: StoreTarget::Onion,
            creation_flags: CreationFlags::empty(),
            revision_id: crate::types::LATEST,
            comment: None,
            backing: Box::new(crate::backing::FileBackingStore),
        }
    }
}
