//! Revision record: the committed description of one write session's
//! delta set, plus its archival index, username, and comment.

use crate::checksum::fletcher32;
use crate::errors::{Error, Result};
use crate::index::ArchivalIndex;
use crate::types::RevisionId;

use super::index_entry::{self, IndexEntry};

pub const SIGNATURE: &[u8; 4] = b"ORRS";
pub const VERSION: u8 = 1;
/// Bytes preceding the variable-length entry list/username/comment.
pub const FIXED_PREFIX_SIZE: usize = 72;
/// Sum of all fixed-width fields in the structure (the 72-byte prefix
/// plus the trailing 4-byte checksum, which follows the variable data).
pub const FIXED_PART_SIZE: usize = 76;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRecord {
    pub version: u8,
    pub revision_id: RevisionId,
    pub parent_revision_id: RevisionId,
    /// `YYYYMMDDTHHMMSSZ`, exactly 16 ASCII bytes.
    pub time_of_creation: [u8; 16],
    pub logi_eof: u64,
    pub user_id: u32,
    pub username: String,
    pub comment: String,
    pub archival_index: ArchivalIndex,
}

/// The fixed-size fields decoded by phase one, before the caller knows how
/// large the variable-length components are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub version: u8,
    pub revision_id: RevisionId,
    pub parent_revision_id: RevisionId,
    pub time_of_creation: [u8; 16],
    pub logi_eof: u64,
    pub page_size: u32,
    pub user_id: u32,
    pub n_entries: u64,
    pub username_size: u32,
    pub comment_size: u32,
}

impl RevisionRecord {
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let page_size_log2 = self.archival_index.page_size_log2;
        let page_size: u32 = 1u32 << page_size_log2;
        let username_bytes = self.username.as_bytes();
        let comment_bytes = self.comment.as_bytes();

        let mut buf = Vec::with_capacity(
            FIXED_PREFIX_SIZE
                + self.archival_index.entries.len() * index_entry::ENCODED_SIZE
                + username_bytes.len()
                + comment_bytes.len()
                + 4,
        );
        buf.extend_from_slice(SIGNATURE);
        buf.extend_from_slice(&u32::from(self.version).to_le_bytes());
        buf.extend_from_slice(&self.revision_id.to_le_bytes());
        buf.extend_from_slice(&self.parent_revision_id.to_le_bytes());
        buf.extend_from_slice(&self.time_of_creation);
        buf.extend_from_slice(&self.logi_eof.to_le_bytes());
        buf.extend_from_slice(&page_size.to_le_bytes());
        buf.extend_from_slice(&self.user_id.to_le_bytes());
        buf.extend_from_slice(&(self.archival_index.entries.len() as u64).to_le_bytes());
        buf.extend_from_slice(&(username_bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(comment_bytes.len() as u32).to_le_bytes());
        debug_assert_eq!(buf.len(), FIXED_PREFIX_SIZE);

        for entry in &self.archival_index.entries {
            entry.encode_into(page_size_log2, &mut buf);
        }
        buf.extend_from_slice(username_bytes);
        buf.extend_from_slice(comment_bytes);

        let checksum = fletcher32(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Phase one: decode the fixed-size prefix and learn the variable-part
    /// sizes. Does not verify the checksum (it covers data not yet read).
    ///
    /// # Errors
    /// Returns `Error::Decode` on signature/version mismatch or a buffer
    /// shorter than `FIXED_PREFIX_SIZE`.
    pub fn decode_fixed(buf: &[u8]) -> Result<FixedHeader> {
        if buf.len() < FIXED_PREFIX_SIZE {
            return Err(Error::Decode(format!(
                "revision record buffer too short: {} < {FIXED_PREFIX_SIZE}",
                buf.len()
            )));
        }
        if &buf[0..4] != SIGNATURE {
            return Err(Error::Decode("bad revision record signature".to_string()));
        }
        let version_u32 = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        if version_u32 > u32::from(u8::MAX) || version_u32 as u8 != VERSION {
            return Err(Error::Decode(format!("unsupported revision record version {version_u32}")));
        }
        let revision_id = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        let parent_revision_id = u64::from_le_bytes(buf[16..24].try_into().unwrap());
        let mut time_of_creation = [0u8; 16];
        time_of_creation.copy_from_slice(&buf[24..40]);
        let logi_eof = u64::from_le_bytes(buf[40..48].try_into().unwrap());
        let page_size = u32::from_le_bytes(buf[48..52].try_into().unwrap());
        let user_id = u32::from_le_bytes(buf[52..56].try_into().unwrap());
        let n_entries = u64::from_le_bytes(buf[56..64].try_into().unwrap());
        let username_size = u32::from_le_bytes(buf[64..68].try_into().unwrap());
        let comment_size = u32::from_le_bytes(buf[68..72].try_into().unwrap());
        Ok(FixedHeader {
            version: version_u32 as u8,
            revision_id,
            parent_revision_id,
            time_of_creation,
            logi_eof,
            page_size,
            user_id,
            n_entries,
            username_size,
            comment_size,
        })
    }

    /// Phase two: given the fixed header from phase one, decode the
    /// variable-length entry list, username, and comment, and verify the
    /// whole-structure checksum. Returns the record and total bytes consumed.
    ///
    /// # Errors
    /// Returns `Error::Decode` if `buf` is too short for the declared
    /// variable-length sizes, an entry fails its own checksum, or the
    /// trailing structure checksum mismatches.
    pub fn decode_variable(buf: &[u8], fixed: &FixedHeader) -> Result<(Self, usize)> {
        let page_size_log2 = crate::types::page_size_log2(fixed.page_size)?;
        let mut offset = FIXED_PREFIX_SIZE;
        let mut entries = Vec::with_capacity(fixed.n_entries as usize);
        for _ in 0..fixed.n_entries {
            let remaining = buf.get(offset..).ok_or_else(|| Error::Decode("revision record truncated entry list".to_string()))?;
            let entry = IndexEntry::decode(remaining, page_size_log2)?;
            entries.push(entry);
            offset += index_entry::ENCODED_SIZE;
        }

        let username_size = fixed.username_size as usize;
        let username_bytes = buf
            .get(offset..offset + username_size)
            .ok_or_else(|| Error::Decode("revision record truncated username".to_string()))?;
        let username = String::from_utf8_lossy(username_bytes).into_owned();
        offset += username_size;

        let comment_size = fixed.comment_size as usize;
        let comment_bytes = buf
            .get(offset..offset + comment_size)
            .ok_or_else(|| Error::Decode("revision record truncated comment".to_string()))?;
        let comment = String::from_utf8_lossy(comment_bytes).into_owned();
        offset += comment_size;

        let stored_checksum_bytes = buf
            .get(offset..offset + 4)
            .ok_or_else(|| Error::Decode("revision record truncated checksum".to_string()))?;
        let stored_checksum = u32::from_le_bytes(stored_checksum_bytes.try_into().unwrap());
        let computed = fletcher32(&buf[0..offset]);
        if computed != stored_checksum {
            return Err(Error::Decode("revision record checksum mismatch".to_string()));
        }
        offset += 4;

        let record = RevisionRecord {
            version: fixed.version,
            revision_id: fixed.revision_id,
            parent_revision_id: fixed.parent_revision_id,
            time_of_creation: fixed.time_of_creation,
            logi_eof: fixed.logi_eof,
            user_id: fixed.user_id,
            username,
            comment,
            archival_index: ArchivalIndex { page_size_log2, entries },
        };
        Ok((record, offset))
    }

    /// Convenience combining both decode phases for callers holding the
    /// entire record buffer already (e.g. a test, or a caller who read
    /// `record_size` bytes up front from the whole-history pointer).
    ///
    /// # Errors
    /// See `decode_fixed` and `decode_variable`.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let fixed = Self::decode_fixed(buf)?;
        Self::decode_variable(buf, &fixed)
    }
}
