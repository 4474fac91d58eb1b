//! The two-tier index model: a sorted, per-revision archival index over
//! committed pages, and an in-memory hashed revision index over pages
//! touched in the current write session, plus the merge that folds one
//! into the other at commit.

pub mod archival;
pub mod merge;
pub mod revision;

pub use archival::ArchivalIndex;
pub use revision::RevisionIndex;
