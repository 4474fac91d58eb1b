//! Crash-recovery diagnostics against an on-disk file left by an
//! uncommitted write session, exercised through the public `engine` and
//! `recovery` surfaces together (spec's crash-recovery contract: detect,
//! never auto-repair).

use onion_store::config::EngineConfig;
use onion_store::engine;
use onion_store::fsutil::{onion_path, recovery_path};
use onion_store::types::LATEST;

fn config(page_size: u32) -> EngineConfig {
    EngineConfig::with_file_backing(page_size)
}

#[test]
fn a_clean_store_reports_no_write_lock_and_no_recovery_file() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().join("store.dat");
    std::fs::write(&canonical, [0u8; 16]).unwrap();

    let mut file = engine::create(&canonical, config(16)).unwrap();
    file.set_logi_eoa(16);
    file.write(0, 16, &[1u8; 16]).unwrap();
    file.close().unwrap();

    let onion = onion_path(&canonical);
    let status = onion_store::recovery::inspect(&onion).unwrap();
    assert!(!status.write_lock_set);
    assert!(!status.recovery_file_present);
}

#[test]
fn a_crashed_session_leaves_a_decodable_recovery_sidecar_describing_the_prior_state() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().join("store.dat");
    std::fs::write(&canonical, [0u8; 16]).unwrap();

    let mut committed = engine::create(&canonical, config(16)).unwrap();
    committed.set_logi_eoa(16);
    committed.write(0, 16, &[1u8; 16]).unwrap();
    committed.close().unwrap();

    {
        let write_config = EngineConfig { revision_id: LATEST, ..config(16) };
        let mut crashing = engine::open(&canonical, write_config, true).unwrap();
        crashing.set_logi_eoa(16);
        crashing.write(0, 16, &[2u8; 16]).unwrap();
        // dropped without close(): simulates a crash mid-session
    }

    let onion = onion_path(&canonical);
    let status = onion_store::recovery::inspect(&onion).unwrap();
    assert!(status.write_lock_set);
    assert!(status.recovery_file_present);

    let recovered_history = onion_store::recovery::verify(&onion).unwrap();
    assert_eq!(recovered_history.record_pointers.len(), 1, "recovery sidecar reflects the one revision committed before the crash");

    // the onion/canonical files are left exactly as the crashed session left
    // them; recovery never rewrites them on its own.
    assert!(recovery_path(&onion).exists());

    // a reader can still see the last cleanly committed revision
    let read_config = EngineConfig { revision_id: LATEST, ..config(16) };
    let mut reader = engine::open(&canonical, read_config, false).unwrap();
    assert_eq!(reader.revision_id(), 0);
    reader.set_logi_eoa(16);
    let mut out = vec![0u8; 16];
    reader.read(0, 16, &mut out).unwrap();
    assert_eq!(out, vec![1u8; 16]);
}

#[test]
fn opening_read_write_over_a_write_locked_file_is_rejected_until_resolved() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().join("store.dat");
    std::fs::write(&canonical, [0u8; 16]).unwrap();

    {
        let mut crashing = engine::create(&canonical, config(16)).unwrap();
        crashing.set_logi_eoa(16);
        crashing.write(0, 16, &[9u8; 16]).unwrap();
    }

    let write_config = EngineConfig { revision_id: LATEST, ..config(16) };
    assert!(engine::open(&canonical, write_config, true).is_err());

    // WRITE_LOCK is checked before read/write mode is considered, so a
    // read-only open of the same write-locked file is rejected too.
    let read_config = EngineConfig { revision_id: LATEST, ..config(16) };
    let opened_read_only = engine::open(&canonical, read_config, false);
    assert!(opened_read_only.is_err());
}
