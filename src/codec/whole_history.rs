//! Whole-history: the table enumerating every revision record by
//! `(phys_addr, record_size, checksum)`.

use crate::checksum::fletcher32;
use crate::errors::{Error, Result};

pub const SIGNATURE: &[u8; 4] = b"OWHS";
pub const VERSION: u8 = 1;
/// Bytes preceding the variable-length record-pointer list.
pub const FIXED_PREFIX_SIZE: usize = 16;
/// Sum of all fixed-width fields (prefix plus trailing checksum).
pub const FIXED_PART_SIZE: usize = 20;

pub const RECORD_POINTER_ENCODED_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordPointer {
    pub phys_addr: u64,
    pub record_size: u64,
}

impl RecordPointer {
    #[must_use]
    pub const fn new(phys_addr: u64, record_size: u64) -> Self {
        Self { phys_addr, record_size }
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        let start = buf.len();
        buf.extend_from_slice(&self.phys_addr.to_le_bytes());
        buf.extend_from_slice(&self.record_size.to_le_bytes());
        let checksum = fletcher32(&buf[start..start + 16]);
        buf.extend_from_slice(&checksum.to_le_bytes());
    }

    fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < RECORD_POINTER_ENCODED_SIZE {
            return Err(Error::Decode(format!(
                "record pointer buffer too short: {} < {RECORD_POINTER_ENCODED_SIZE}",
                data.len()
            )));
        }
        let phys_addr = u64::from_le_bytes(data[0..8].try_into().unwrap());
        let record_size = u64::from_le_bytes(data[8..16].try_into().unwrap());
        let stored = u32::from_le_bytes(data[16..20].try_into().unwrap());
        let computed = fletcher32(&data[0..16]);
        if computed != stored {
            return Err(Error::Decode("record pointer checksum mismatch".to_string()));
        }
        Ok(Self { phys_addr, record_size })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WholeHistory {
    pub version: u8,
    /// Chronologically ordered: `revision_id` is monotone non-decreasing.
    pub record_pointers: Vec<RecordPointer>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedHeader {
    pub version: u8,
    pub n_revisions: u64,
}

impl WholeHistory {
    #[must_use]
    pub fn empty() -> Self {
        Self { version: VERSION, record_pointers: Vec::new() }
    }

    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(FIXED_PREFIX_SIZE + self.record_pointers.len() * RECORD_POINTER_ENCODED_SIZE + 4);
        buf.extend_from_slice(SIGNATURE);
        buf.extend_from_slice(&u32::from(self.version).to_le_bytes());
        buf.extend_from_slice(&(self.record_pointers.len() as u64).to_le_bytes());
        debug_assert_eq!(buf.len(), FIXED_PREFIX_SIZE);
        for pointer in &self.record_pointers {
            pointer.encode_into(&mut buf);
        }
        let checksum = fletcher32(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Phase one: decode signature, version, and `n_revisions`.
    ///
    /// # Errors
    /// Returns `Error::Decode` on signature/version mismatch or a buffer
    /// shorter than `FIXED_PREFIX_SIZE`.
    pub fn decode_fixed(buf: &[u8]) -> Result<FixedHeader> {
        if buf.len() < FIXED_PREFIX_SIZE {
            return Err(Error::Decode(format!(
                "whole-history buffer too short: {} < {FIXED_PREFIX_SIZE}",
                buf.len()
            )));
        }
        if &buf[0..4] != SIGNATURE {
            return Err(Error::Decode("bad whole-history signature".to_string()));
        }
        let version_u32 = u32::from_le_bytes(buf[4..8].try_into().unwrap());
        if version_u32 > u32::from(u8::MAX) || version_u32 as u8 != VERSION {
            return Err(Error::Decode(format!("unsupported whole-history version {version_u32}")));
        }
        let n_revisions = u64::from_le_bytes(buf[8..16].try_into().unwrap());
        Ok(FixedHeader { version: version_u32 as u8, n_revisions })
    }

    /// Phase two: decode the record-pointer list and verify the checksum.
    /// Returns the whole-history and total bytes consumed.
    ///
    /// # Errors
    /// Returns `Error::Decode` if `buf` is too short for `n_revisions`
    /// pointers, a pointer fails its own checksum, or the trailing
    /// structure checksum mismatches.
    pub fn decode_variable(buf: &[u8], fixed: &FixedHeader) -> Result<(Self, usize)> {
        let mut offset = FIXED_PREFIX_SIZE;
        let mut record_pointers = Vec::with_capacity(fixed.n_revisions as usize);
        for _ in 0..fixed.n_revisions {
            let remaining = buf
                .get(offset..)
                .ok_or_else(|| Error::Decode("whole-history truncated pointer list".to_string()))?;
            record_pointers.push(RecordPointer::decode(remaining)?);
            offset += RECORD_POINTER_ENCODED_SIZE;
        }
        let stored_checksum_bytes = buf
            .get(offset..offset + 4)
            .ok_or_else(|| Error::Decode("whole-history truncated checksum".to_string()))?;
        let stored_checksum = u32::from_le_bytes(stored_checksum_bytes.try_into().unwrap());
        let computed = fletcher32(&buf[0..offset]);
        if computed != stored_checksum {
            return Err(Error::Decode("whole-history checksum mismatch".to_string()));
        }
        offset += 4;
        Ok((Self { version: fixed.version, record_pointers }, offset))
    }

    /// # Errors
    /// See `decode_fixed` and `decode_variable`.
    pub fn decode(buf: &[u8]) -> Result<(Self, usize)> {
        let fixed = Self::decode_fixed(buf)?;
        Self::decode_variable(buf, &fixed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_empty() {
        let whs = WholeHistory::empty();
        let buf = whs.encode();
        assert_eq!(buf.len(), FIXED_PART_SIZE);
        let (decoded, used) = WholeHistory::decode(&buf).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(decoded, whs);
    }

    #[test]
    fn round_trip_with_pointers() {
        let whs = WholeHistory {
            version: VERSION,
            record_pointers: vec![RecordPointer::new(40, 120), RecordPointer::new(160, 96)],
        };
        let buf = whs.encode();
        let (decoded, used) = WholeHistory::decode(&buf).unwrap();
        assert_eq!(used, buf.len());
        assert_eq!(decoded, whs);
    }

    #[test]
    fn bit_flip_breaks_checksum() {
        let whs = WholeHistory { version: VERSION, record_pointers: vec![RecordPointer::new(40, 120)] };
        let mut buf = whs.encode();
        let last = buf.len() - 1;
        buf[last] ^= 0x01;
        assert!(WholeHistory::decode(&buf).is_err());
    }

    #[test]
    fn fixed_size_constants_match_spec() {
        assert_eq!(FIXED_PART_SIZE, FIXED_PREFIX_SIZE + 4);
    }
}
