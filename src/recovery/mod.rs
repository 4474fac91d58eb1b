//! Crash-recovery façade: diagnose a write-locked onion file and inspect
//! its recovery sidecar. Matches the crash-recovery contract (spec §5):
//! recovery is detected and surfaced, never performed automatically.

mod recover;

pub use recover::{inspect, verify, RecoveryStatus};
