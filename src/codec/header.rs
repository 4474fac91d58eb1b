//! History header: onion file offset 0, fixed 40 bytes, signature `OHDH`.

use crate::checksum::fletcher32;
use crate::config::HeaderFlags;
use crate::errors::{Error, Result};

pub const SIGNATURE: &[u8; 4] = b"OHDH";
pub const VERSION: u8 = 1;
pub const ENCODED_SIZE: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub flags: HeaderFlags,
    pub page_size: u32,
    pub origin_eof: u64,
    pub whole_history_addr: u64,
    pub whole_history_size: u64,
}

impl Header {
    #[must_use]
    pub fn new(page_size: u32, flags: HeaderFlags) -> Self {
        Self { version: VERSION, flags, page_size, origin_eof: 0, whole_history_addr: 0, whole_history_size: 0 }
    }

    #[must_use]
    pub fn encode(&self) -> [u8; ENCODED_SIZE] {
        let mut buf = [0u8; ENCODED_SIZE];
        buf[0..4].copy_from_slice(SIGNATURE);
        buf[4] = self.version;
        let flags = self.flags.bits().to_le_bytes();
        buf[5..8].copy_from_slice(&flags[..3]);
        buf[8..12].copy_from_slice(&self.page_size.to_le_bytes());
        buf[12..20].copy_from_slice(&self.origin_eof.to_le_bytes());
        buf[20..28].copy_from_slice(&self.whole_history_addr.to_le_bytes());
        buf[28..36].copy_from_slice(&self.whole_history_size.to_le_bytes());
        let checksum = fletcher32(&buf[0..36]);
        buf[36..40].copy_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Decode a 40-byte header buffer.
    ///
    /// # Errors
    /// Returns `Error::Decode` on signature, version, or checksum mismatch,
    /// or if `buf` is shorter than `ENCODED_SIZE`.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < ENCODED_SIZE {
            return Err(Error::Decode(format!(
                "header buffer too short: {} < {ENCODED_SIZE}",
                buf.len()
            )));
        }
        if &buf[0..4] != SIGNATURE {
            return Err(Error::Decode("bad onion header signature".to_string()));
        }
        let version = buf[4];
        if version != VERSION {
            return Err(Error::Decode(format!("unsupported onion header version {version}")));
        }
        let mut flags_bytes = [0u8; 4];
        flags_bytes[..3].copy_from_slice(&buf[5..8]);
        let flags = HeaderFlags::from_bits_truncate(u32::from_le_bytes(flags_bytes));
        let page_size = u32::from_le_bytes(buf[8..12].try_into().unwrap());
        let origin_eof = u64::from_le_bytes(buf[12..20].try_into().unwrap());
        let whole_history_addr = u64::from_le_bytes(buf[20..28].try_into().unwrap());
        let whole_history_size = u64::from_le_bytes(buf[28..36].try_into().unwrap());
        let stored_checksum = u32::from_le_bytes(buf[36..40].try_into().unwrap());
        let computed = fletcher32(&buf[0..36]);
        if computed != stored_checksum {
            return Err(Error::Decode("onion header checksum mismatch".to_string()));
        }
        Ok(Self { version, flags, page_size, origin_eof, whole_history_addr, whole_history_size })
    }
}
