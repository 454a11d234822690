use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};

/// Append-only status-change log. The only artifact the core persists;
/// downstream reporting parses it, so the line format is part of the
/// contract: `<ISO8601-UTC>\t<customer_id>\t<action>\n`.
///
/// Writes are serialized through a mutex so concurrent conversations can
/// share one log without interleaving partial lines.
#[derive(Debug)]
pub struct StatusLog {
    path: PathBuf,
    write_guard: Mutex<()>,
}

impl StatusLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_guard: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one entry, creating parent directories as needed.
    pub fn append(&self, customer_id: &str, action: &str) -> std::io::Result<()> {
        let _guard = self.write_guard.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        writeln!(file, "{timestamp}\t{customer_id}\t{action}")?;
        Ok(())
    }
}
