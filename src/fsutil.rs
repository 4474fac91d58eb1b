use std::path::{Path, PathBuf};

/// The onion file's path: `<canonical>.onion`.
#[must_use]
pub fn onion_path(canonical: &Path) -> PathBuf {
    append_extension(canonical, "onion")
}

/// The recovery sidecar's path: `<onion-path>.recovery`.
#[must_use]
pub fn recovery_path(onion: &Path) -> PathBuf {
    append_extension(onion, "recovery")
}

fn append_extension(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
