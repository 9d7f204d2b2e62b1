//! Per-run log directory.
//!
//! Log files are numbered in creation order (`0003-intro.txt`) so a run's
//! logs read as a timeline. Creation is cheap and thread-safe; workers on
//! different threads each get a unique path, so there is never write
//! contention on a single file.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

pub struct Logfile {
    root_dir: PathBuf,
    index: Mutex<u32>,
}

impl Logfile {
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            index: Mutex::new(0),
        }
    }

    /// Reserve the next indexed log path with the given tag. The file is
    /// not created; the path is handed to whatever runs the command.
    pub fn create(&self, tag: &str) -> PathBuf {
        let mut index = self.index.lock().expect("logfile index mutex");
        let path = self.root_dir.join(format!("{:04}-{}.txt", *index, tag));
        *index += 1;
        path
    }

    /// Write a message under the given tag and return the path.
    pub fn log(&self, tag: &str, message: &str) -> Result<PathBuf> {
        let path = self.create(tag);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating log directory {}", parent.display()))?;
        }
        fs::write(&path, message)
            .with_context(|| format!("writing log file {}", path.display()))?;
        Ok(path)
    }

    /// Pretty-printed JSON variant of [`Logfile::log`].
    pub fn json_log(&self, tag: &str, value: &serde_json::Value) -> Result<PathBuf> {
        let body = serde_json::to_string_pretty(value).context("serializing log payload")?;
        self.log(tag, &body)
    }
}

/// Replace every occurrence of `secret` in the file with a fixed marker.
/// Called after any network request whose log may carry a credential,
/// on success and failure alike.
pub fn redact_file(path: &Path, secret: &str) -> Result<()> {
    if secret.is_empty() || !path.is_file() {
        return Ok(());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("reading log file {}", path.display()))?;
    let redacted = content.replace(secret, "[REDACTED]");
    fs::write(path, redacted)
        .with_context(|| format!("writing redacted log file {}", path.display()))?;
    Ok(())
}
