#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};
use onion_store::backing::{BackingStore, FileBackingStore, OpenFlags};
use onion_store::config::HeaderFlags;
use onion_store::history::{ingest_header, ingest_revision, ingest_whole_history};
use std::path::PathBuf;
use std::process::ExitCode;

/// Read-only diagnostics for an onion-backed store. Never mutates the
/// files it inspects.
#[derive(Parser)]
#[command(name = "onion-inspect", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the history header, flags, and whole-history summary.
    Header {
        /// Path to the onion file (not the canonical file).
        onion_path: PathBuf,
    },
    /// Print every revision's id, parent, timestamp, and page count.
    Revisions {
        onion_path: PathBuf,
    },
    /// Report whether an onion file was left write-locked by a crashed
    /// session, and whether a recovery sidecar is present.
    Recover {
        onion_path: PathBuf,
    },
}

fn main() -> ExitCode {
    if let Err(e) = onion_store::logger::init_for_store("onion-inspect") {
        eprintln!("warning: logging not initialized: {e}");
    }

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Header { onion_path } => print_header(&onion_path),
        Command::Revisions { onion_path } => print_revisions(&onion_path),
        Command::Recover { onion_path } => print_recovery_status(&onion_path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn print_header(onion_path: &PathBuf) -> onion_store::Result<()> {
    let store = FileBackingStore;
    let mut file = store.open(onion_path, OpenFlags::READ, u64::MAX)?;
    let header = ingest_header(file.as_mut(), 0)?;

    println!("page_size:          {}", header.page_size);
    println!("origin_eof:         {}", header.origin_eof);
    println!("whole_history_addr: {}", header.whole_history_addr);
    println!("whole_history_size: {}", header.whole_history_size);
    println!("write_lock:         {}", header.flags.contains(HeaderFlags::WRITE_LOCK));
    println!("page_alignment:     {}", header.flags.contains(HeaderFlags::PAGE_ALIGNMENT));
    println!("divergent_history:  {}", header.flags.contains(HeaderFlags::DIVERGENT_HISTORY));

    if header.whole_history_size > 0 {
        let whs = ingest_whole_history(file.as_mut(), header.whole_history_addr, header.whole_history_size)?;
        println!("n_revisions:        {}", whs.record_pointers.len());
    }
    Ok(())
}

fn print_revisions(onion_path: &PathBuf) -> onion_store::Result<()> {
    let store = FileBackingStore;
    let mut file = store.open(onion_path, OpenFlags::READ, u64::MAX)?;
    let header = ingest_header(file.as_mut(), 0)?;
    if header.whole_history_size == 0 {
        println!("(no revisions)");
        return Ok(());
    }
    let whs = ingest_whole_history(file.as_mut(), header.whole_history_addr, header.whole_history_size)?;
    for id in 0..whs.record_pointers.len() as u64 {
        let record = ingest_revision(file.as_mut(), &whs, id)?;
        println!(
            "revision {:>4}  parent={:<4}  created={}  logi_eof={:<10}  pages={:<6}  user={} ({})",
            record.revision_id,
            record.parent_revision_id,
            String::from_utf8_lossy(&record.time_of_creation),
            record.logi_eof,
            record.archival_index.entries.len(),
            record.username,
            record.user_id,
        );
        if !record.comment.is_empty() {
            println!("             comment: {}", record.comment);
        }
    }
    Ok(())
}

fn print_recovery_status(onion_path: &PathBuf) -> onion_store::Result<()> {
    let status = onion_store::recovery::inspect(onion_path)?;
    println!("write_lock_set:        {}", status.write_lock_set);
    println!("recovery_file_present: {}", status.recovery_file_present);
    if status.write_lock_set {
        println!("\nthis onion file was left by a session that did not commit.");
        if status.recovery_file_present {
            match onion_store::recovery::verify(onion_path) {
                Ok(whs) => println!(
                    "recovery sidecar decodes cleanly; it records {} revision(s) as of the crashed session's start.",
                    whs.record_pointers.len()
                ),
                Err(e) => println!("recovery sidecar is present but failed to decode: {e}"),
            }
        } else {
            println!("no recovery sidecar is present; manual inspection is required.");
        }
    }
    Ok(())
}
