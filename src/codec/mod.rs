//! Binary codec for the onion file's structures.
//!
//! All multi-byte integers are little-endian. Every encoded structure ends
//! with a 4-byte Fletcher-32 checksum over the preceding bytes of that
//! structure. Decoders verify signature, version, and checksum; any
//! mismatch is a fatal `Error::Decode`.

pub mod header;
pub mod index_entry;
pub mod revision_record;
pub mod whole_history;

pub use header::Header;
pub use index_entry::IndexEntry;
pub use revision_record::RevisionRecord;
pub use whole_history::{RecordPointer, WholeHistory};
