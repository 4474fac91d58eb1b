//! The inner block-device abstraction the engine drives (spec §6).
//!
//! This is an external collaborator: the real driver stacks the onion
//! engine on top of a swappable inner VFD. This crate defines the trait
//! boundary the spec names and ships exactly one concrete implementation,
//! `FileBackingStore`, built on `std::fs::File`, so the engine can be
//! exercised standalone. The spec also mentions a `DRAW` memory kind and a
//! default transfer-property handle passed on every call; those parameters
//! exist in the real property-list system to select among several backing
//! representations and transfer policies. This engine only ever uses one of
//! each, so the trait omits them rather than modeling a registry this crate
//! never populates (documented in DESIGN.md).

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::errors::{Error, Result};

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const READ     = 0x1;
        const WRITE    = 0x2;
        const CREATE   = 0x4;
        const TRUNCATE = 0x8;
    }
}

/// An open backing file handle.
pub trait BackingFile: Send {
    /// Read `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns `Error::Io` if the read fails, or `Error::InvalidArgument`
    /// if the requested span exceeds the handle's addressable range.
    fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>>;

    /// Write `data` starting at `offset`.
    ///
    /// # Errors
    /// Returns `Error::Io` if the write fails.
    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()>;

    /// The current end-of-address: the logical extent of this handle's
    /// addressable range, which may exceed the bytes actually on disk.
    fn get_eoa(&self) -> u64;

    /// Extend (or shrink) the end-of-address.
    ///
    /// # Errors
    /// Returns `Error::Io` if the underlying file cannot be resized.
    fn set_eoa(&mut self, addr: u64) -> Result<()>;

    /// The current end-of-file: bytes physically present on disk.
    ///
    /// # Errors
    /// Returns `Error::Io` if file metadata cannot be read.
    fn get_eof(&self) -> Result<u64>;

    /// Release the handle.
    ///
    /// # Errors
    /// Returns `Error::Io` if flushing fails.
    fn close(self: Box<Self>) -> Result<()>;
}

/// The inner block-device abstraction. Implementations must be able to
/// open a path under a combination of `OpenFlags`.
pub trait BackingStore: Send + Sync {
    /// # Errors
    /// Returns `Error::Io` if the path cannot be opened under the given flags.
    fn open(&self, path: &Path, flags: OpenFlags, max_addr: u64) -> Result<Box<dyn BackingFile>>;
}

/// The only backing store this crate ships: a thin, unbuffered wrapper
/// over `std::fs::File`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileBackingStore;

impl BackingStore for FileBackingStore {
    fn open(&self, path: &Path, flags: OpenFlags, max_addr: u64) -> Result<Box<dyn BackingFile>> {
        let mut opts = OpenOptions::new();
        opts.read(flags.contains(OpenFlags::READ))
            .write(flags.contains(OpenFlags::WRITE))
            .create(flags.contains(OpenFlags::CREATE))
            .truncate(flags.contains(OpenFlags::TRUNCATE));
        let file = opts.open(path)?;
        let eoa = file.metadata()?.len();
        if eoa > max_addr {
            return Err(Error::InvalidArgument(format!(
                "{} exceeds max addressable range ({eoa} > {max_addr})",
                path.display()
            )));
        }
        Ok(Box::new(StdBackingFile { file, eoa }))
    }
}

struct StdBackingFile {
    file: File,
    eoa: u64,
}

impl BackingFile for StdBackingFile {
    fn read(&mut self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if offset.saturating_add(len as u64) > self.eoa {
            return Err(Error::InvalidArgument(format!(
                "read [{offset}, {}) exceeds end-of-address {}",
                offset + len as u64,
                self.eoa
            )));
        }
        let mut buf = vec![0u8; len];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    fn write(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        self.file.sync_data()?;
        let end = offset + data.len() as u64;
        if end > self.eoa {
            self.eoa = end;
        }
        Ok(())
    }

    fn get_eoa(&self) -> u64 {
        self.eoa
    }

    fn set_eoa(&mut self, addr: u64) -> Result<()> {
        self.eoa = addr;
        Ok(())
    }

    fn get_eof(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }
}
