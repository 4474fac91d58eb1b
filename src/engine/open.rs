use std::path::Path;

use log::{debug, info, warn};

use crate::backing::{BackingFile, BackingStore, OpenFlags};
use crate::codec::{Header, RevisionRecord, WholeHistory};
use crate::config::{EngineConfig, HeaderFlags, StoreTarget};
use crate::errors::{Error, Result};
use crate::fsutil::{onion_path, recovery_path};
use crate::history::{ingest_header, ingest_revision, ingest_whole_history};
use crate::index::{ArchivalIndex, RevisionIndex};
use crate::types::{self, LATEST};

use super::OnionFile;

const ONION_MARKER: &[u8; 8] = b"ONIONEOF";

/// Look up the effective OS user for the `user_id`/`username` fields
/// populated on a new revision record (spec.md §4.6 create step 3).
/// Falls back to `(0, "")` rather than failing the open, matching the
/// original's best-effort behavior.
fn current_user() -> (u32, String) {
    let uid = nix::unistd::Uid::current();
    let name = nix::unistd::User::from_uid(uid).ok().flatten().map(|u| u.name).unwrap_or_default();
    (uid.as_raw(), name)
}

fn header_flags_from_config(config: &EngineConfig) -> HeaderFlags {
    let mut flags = HeaderFlags::WRITE_LOCK;
    if config.creation_flags.contains(crate::config::CreationFlags::ENABLE_PAGE_ALIGNMENT) {
        flags |= HeaderFlags::PAGE_ALIGNMENT;
    }
    if config.creation_flags.contains(crate::config::CreationFlags::ENABLE_DIVERGENT_HISTORY) {
        flags |= HeaderFlags::DIVERGENT_HISTORY;
    }
    flags
}

fn page_round(addr: u64, page_size_log2: u32, page_aligned: bool) -> u64 {
    if page_aligned {
        types::round_up_to_page(addr, page_size_log2)
    } else {
        addr
    }
}

fn reject_unsupported_target(config: &EngineConfig) -> Result<()> {
    match config.store_target {
        StoreTarget::Onion => Ok(()),
        StoreTarget::H5 => Err(Error::NotSupported("H5 (same-file) store target is not implemented".to_string())),
    }
}

/// Create (or truncate) a new onion-backed store over `canonical_path`
/// (spec.md §4.6, "Create (truncate) flow").
///
/// # Errors
/// Returns `Error::NotSupported` for `StoreTarget::H5`, or `Error::Io`/
/// `Error::InvalidArgument` if any of the three backing files cannot be
/// brought up.
pub fn create(canonical_path: &Path, config: EngineConfig) -> Result<OnionFile> {
    reject_unsupported_target(&config)?;
    let page_size_log2 = types::page_size_log2(config.page_size)?;
    let page_aligned = config.creation_flags.contains(crate::config::CreationFlags::ENABLE_PAGE_ALIGNMENT);

    let onion_path_buf = onion_path(canonical_path);
    let recovery_path_buf = recovery_path(&onion_path_buf);

    let mut header = Header::new(config.page_size, header_flags_from_config(&config));
    let whole_history = WholeHistory::empty();
    let (user_id, username) = current_user();
    let revision_record = RevisionRecord {
        version: crate::codec::revision_record::VERSION,
        revision_id: 0,
        parent_revision_id: 0,
        time_of_creation: [0u8; 16],
        logi_eof: 0,
        user_id,
        username,
        comment: config.comment.clone().unwrap_or_default(),
        archival_index: ArchivalIndex::empty(page_size_log2),
    };

    debug!("creating onion store at {}", onion_path_buf.display());
    let mut canonical = config.backing.open(
        canonical_path,
        OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
        u64::MAX,
    )?;
    let mut onion = config.backing.open(
        &onion_path_buf,
        OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
        u64::MAX,
    )?;
    let mut recovery = config.backing.open(
        &recovery_path_buf,
        OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
        u64::MAX,
    )?;

    canonical.write(0, ONION_MARKER)?;

    recovery.write(0, &whole_history.encode())?;

    let header_buf = header.encode();
    onion.write(0, &header_buf)?;
    let history_eof = page_round(header_buf.len() as u64, page_size_log2, page_aligned);

    info!("created onion store {} (page_size={})", onion_path_buf.display(), config.page_size);

    Ok(OnionFile {
        canonical_path: canonical_path.to_path_buf(),
        onion_path: onion_path_buf,
        canonical,
        onion,
        recovery: Some(recovery),
        header,
        whole_history,
        revision_record,
        archival_index: ArchivalIndex::empty(page_size_log2),
        revision_index: Some(RevisionIndex::new(config.page_size)?),
        page_size_log2,
        origin_eof: 0,
        logi_eof: 0,
        logi_eoa: 0,
        history_eof,
        read_write: true,
    })
}

/// Open an existing onion-backed store over `canonical_path` (spec.md
/// §4.6, "Open existing flow", and §4.7 "Write-open protocol").
///
/// # Errors
/// Returns `Error::NotSupported` if the header's `WRITE_LOCK` flag is
/// already set (another writer holds the file) or for `StoreTarget::H5`;
/// `Error::InvalidArgument` if the requested revision is out of range;
/// `Error::Decode` if any on-disk structure is malformed.
pub fn open(canonical_path: &Path, config: EngineConfig, read_write: bool) -> Result<OnionFile> {
    reject_unsupported_target(&config)?;
    // Only meaningful for the no-onion-yet bootstrap below, where there is no
    // on-disk header yet to derive geometry from.
    let requested_page_size_log2 = types::page_size_log2(config.page_size)?;
    let onion_path_buf = onion_path(canonical_path);

    let canonical_flags = if read_write {
        OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE
    } else {
        OpenFlags::READ
    };
    let canonical = config.backing.open(canonical_path, canonical_flags, u64::MAX)?;

    if !onion_path_buf.exists() && read_write {
        debug!("no onion file at {}; bootstrapping empty history", onion_path_buf.display());
        return create_reduced(canonical_path, canonical, config, requested_page_size_log2);
    }

    let onion_flags = if read_write {
        OpenFlags::READ | OpenFlags::WRITE
    } else {
        OpenFlags::READ
    };
    let mut onion = config.backing.open(&onion_path_buf, onion_flags, u64::MAX)?;

    let mut header = ingest_header(onion.as_mut(), 0)?;
    if header.flags.contains(HeaderFlags::WRITE_LOCK) {
        warn!("refusing to open {}: WRITE_LOCK already set", onion_path_buf.display());
        return Err(Error::NotSupported(
            "onion file is write-locked by a previous session; see recovery::inspect".to_string(),
        ));
    }

    // Page size is fixed at creation (spec.md §3); the on-disk header, not
    // the caller's config, is authoritative. Reject a mismatched config
    // rather than silently splitting pages on the wrong granularity.
    if config.page_size != header.page_size {
        return Err(Error::InvalidArgument(format!(
            "config page_size {} does not match onion file's page_size {} (set at creation)",
            config.page_size, header.page_size
        )));
    }
    let page_size_log2 = types::page_size_log2(header.page_size)?;

    let whole_history = if header.whole_history_size > 0 {
        ingest_whole_history(onion.as_mut(), header.whole_history_addr, header.whole_history_size)?
    } else {
        WholeHistory::empty()
    };
    let n_revisions = whole_history.record_pointers.len() as u64;
    if config.revision_id != LATEST && config.revision_id >= n_revisions {
        return Err(Error::InvalidArgument(format!(
            "revision {} out of range [0, {n_revisions})",
            config.revision_id
        )));
    }

    let (user_id, username) = current_user();
    let mut revision_record = if n_revisions > 0 {
        ingest_revision(onion.as_mut(), &whole_history, config.revision_id)?
    } else {
        RevisionRecord {
            version: crate::codec::revision_record::VERSION,
            revision_id: 0,
            parent_revision_id: 0,
            time_of_creation: [0u8; 16],
            logi_eof: 0,
            user_id,
            username: username.clone(),
            comment: config.comment.clone().unwrap_or_default(),
            archival_index: ArchivalIndex::empty(page_size_log2),
        }
    };

    let archival_index = revision_record.archival_index.clone();
    let page_aligned = header.flags.contains(HeaderFlags::PAGE_ALIGNMENT);
    let history_eof = page_round(onion.get_eoa(), page_size_log2, page_aligned);

    let mut recovery = None;
    let mut revision_index = None;
    if read_write {
        let recovery_path_buf = recovery_path(&onion_path_buf);
        let mut recovery_file = config.backing.open(
            &recovery_path_buf,
            OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
            u64::MAX,
        )?;
        let whs_buf = whole_history.encode();
        recovery_file.write(0, &whs_buf)?;
        if header.whole_history_size != 0 && whs_buf.len() as u64 != header.whole_history_size {
            return Err(Error::Internal(format!(
                "recovery file size {} does not match header.whole_history_size {}",
                whs_buf.len(),
                header.whole_history_size
            )));
        }

        header.flags |= HeaderFlags::WRITE_LOCK;
        onion.write(0, &header.encode())?;
        info!("acquired write lock on {}", onion_path_buf.display());

        revision_index = Some(RevisionIndex::new(config.page_size)?);
        revision_record.parent_revision_id = revision_record.revision_id;
        if n_revisions > 0 {
            revision_record.revision_id += 1;
        }
        revision_record.user_id = user_id;
        revision_record.username = username;
        revision_record.comment = config.comment.unwrap_or_default();
        recovery = Some(recovery_file);
    }

    Ok(OnionFile {
        canonical_path: canonical_path.to_path_buf(),
        onion_path: onion_path_buf,
        canonical,
        onion,
        recovery,
        origin_eof: header.origin_eof,
        logi_eof: revision_record.logi_eof,
        logi_eoa: 0,
        header,
        whole_history,
        revision_record,
        archival_index,
        revision_index,
        page_size_log2,
        history_eof,
        read_write,
    })
}

/// The reduced create flow used when a read-write open targets a
/// canonical file with no onion sidecar yet: bring the onion and recovery
/// files up via the ordinary create steps, but never touch the canonical
/// file itself (spec §9 open question 1, resolved in SPEC_FULL.md).
fn create_reduced(
    canonical_path: &Path,
    canonical: Box<dyn BackingFile>,
    config: EngineConfig,
    page_size_log2: u32,
) -> Result<OnionFile> {
    let origin_eof = canonical.get_eof()?;
    let page_aligned = config.creation_flags.contains(crate::config::CreationFlags::ENABLE_PAGE_ALIGNMENT);
    let onion_path_buf = onion_path(canonical_path);
    let recovery_path_buf = recovery_path(&onion_path_buf);

    let mut header = Header::new(config.page_size, header_flags_from_config(&config));
    header.origin_eof = origin_eof;
    let whole_history = WholeHistory::empty();
    let (user_id, username) = current_user();
    let revision_record = RevisionRecord {
        version: crate::codec::revision_record::VERSION,
        revision_id: 0,
        parent_revision_id: 0,
        time_of_creation: [0u8; 16],
        logi_eof: 0,
        user_id,
        username,
        comment: config.comment.clone().unwrap_or_default(),
        archival_index: ArchivalIndex::empty(page_size_log2),
    };

    let mut onion = config.backing.open(
        &onion_path_buf,
        OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
        u64::MAX,
    )?;
    let mut recovery = config.backing.open(
        &recovery_path_buf,
        OpenFlags::READ | OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE,
        u64::MAX,
    )?;
    recovery.write(0, &whole_history.encode())?;
    let header_buf = header.encode();
    onion.write(0, &header_buf)?;
    let history_eof = page_round(header_buf.len() as u64, page_size_log2, page_aligned);

    info!(
        "bootstrapped onion store for existing canonical file {} (origin_eof={origin_eof})",
        canonical_path.display()
    );

    Ok(OnionFile {
        canonical_path: canonical_path.to_path_buf(),
        onion_path: onion_path_buf,
        canonical,
        onion,
        recovery: Some(recovery),
        header,
        whole_history,
        revision_record,
        archival_index: ArchivalIndex::empty(page_size_log2),
        revision_index: Some(RevisionIndex::new(config.page_size)?),
        page_size_log2,
        origin_eof,
        logi_eof: 0,
        logi_eoa: 0,
        history_eof,
        read_write: true,
    })
}
