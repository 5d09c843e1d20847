//! Append-only journal of permanently failed work units.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::error;

use crate::error::StoreResult;

/// One entry is appended per work unit whose retries were exhausted or that
/// failed fatally, so an operator can follow up after the run. Entries are
/// tab-separated: timestamp, unit context, last error.
#[derive(Debug)]
pub struct ErrorJournal {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ErrorJournal {
    /// Default journal file name under a cache root.
    pub const FILE_NAME: &'static str = "failures.log";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Journal co-located with a checkpoint store root.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one failure entry. Never fails the caller: a journal write
    /// error is logged and swallowed, because losing one journal line must
    /// not take down the run that the journal exists to describe.
    pub async fn record(&self, context: &str, last_error: &str) {
        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.append_line(context, last_error) {
            error!(context = context, error = %e, "Failed to write journal entry");
        }
    }

    fn append_line(&self, context: &str, last_error: &str) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = format!(
            "{}\t{}\t{}\n",
            Utc::now().to_rfc3339(),
            context,
            last_error.replace(['\n', '\t'], " ")
        );
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Number of entries currently in the journal.
    pub fn len(&self) -> usize {
        std::fs::read_to_string(&self.path)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_are_appended_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let journal = ErrorJournal::in_dir(dir.path());
        assert!(journal.is_empty());

        journal.record("segment S ep 1 seg 0", "quota exceeded").await;
        journal.record("episode S ep 1", "permission\ndenied").await;

        let contents = std::fs::read_to_string(journal.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("segment S ep 1 seg 0"));
        assert!(lines[0].contains("quota exceeded"));
        // Newlines in the error are flattened to keep one entry per line.
        assert!(lines[1].contains("permission denied"));
        assert_eq!(journal.len(), 2);
    }
}
