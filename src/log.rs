// src/log.rs
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{
    EnvFilter,
    fmt::{time::Uptime, writer::MakeWriterExt},
};

use crate::config::consts::LOG_FILE;
use crate::file::ensure_parent;

/// `debug.log` next to the history artifact.
pub fn log_path(store_path: &Path) -> PathBuf {
    match store_path.parent() {
        Some(dir) => dir.join(LOG_FILE),
        None => PathBuf::from(LOG_FILE),
    }
}

fn open_log_file(path: &Path) -> Option<File> {
    ensure_parent(path).ok()?;
    OpenOptions::new().create(true).append(true).open(path).ok()
}

/// Install the global subscriber: stderr plus `debug.log` beside the store,
/// filtered by `RUST_LOG` (default `info`). Safe to call more than once.
pub fn init(store_path: &Path) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(Uptime::default())
        .with_target(false);

    // Stays stderr-only if the log file can't be opened.
    let _ = match open_log_file(&log_path(store_path)) {
        Some(file) => builder
            .with_ansi(false)
            .with_writer(std::io::stderr.and(Mutex::new(file)))
            .try_init(),
        None => builder.with_writer(std::io::stderr).try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_follows_the_store_directory() {
        assert_eq!(log_path(Path::new(".store/clan_data.json")), PathBuf::from(".store/debug.log"));
        assert_eq!(log_path(Path::new("/var/lib/cw/h.json")), PathBuf::from("/var/lib/cw/debug.log"));
        assert_eq!(log_path(Path::new("clan_data.json")), PathBuf::from("debug.log"));
    }
}
