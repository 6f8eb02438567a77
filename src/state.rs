//! Last-notified ledger.
//!
//! A single JSON record of the last successfully sent notification, so a
//! restart shortly after an email does not immediately send another. The
//! ledger is best effort: a missing, unreadable, or corrupt file means "no
//! record", and write failures are reported but never fatal.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct LedgerRecord {
    last_notified_epoch_s: u64,
}

/// On-disk record of the last successful notification.
pub struct NotifyLedger {
    path: PathBuf,
}

impl NotifyLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the recorded time of the last notification, if any.
    ///
    /// Tolerates missing and malformed files: both are logged and treated
    /// as no record.
    pub fn load(&self) -> Option<SystemTime> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                log::warn!("failed to read {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_str::<LedgerRecord>(&raw) {
            Ok(record) => Some(UNIX_EPOCH + Duration::from_secs(record.last_notified_epoch_s)),
            Err(e) => {
                log::warn!("ignoring malformed ledger {}: {}", self.path.display(), e);
                None
            }
        }
    }

    /// Time elapsed since the recorded notification, if a record exists and
    /// the clock has not stepped backwards past it.
    pub fn elapsed_since_last(&self, now: SystemTime) -> Option<Duration> {
        let last = self.load()?;
        now.duration_since(last).ok()
    }

    /// Record a successful notification at `at`.
    pub fn record(&self, at: SystemTime) -> Result<()> {
        let record = LedgerRecord {
            last_notified_epoch_s: at
                .duration_since(UNIX_EPOCH)
                .map_err(|_| anyhow!("notification time predates the epoch"))?
                .as_secs(),
        };
        let json = serde_json::to_string(&record)?;
        std::fs::write(&self.path, json)
            .map_err(|e| anyhow!("failed to write {}: {}", self.path.display(), e))?;
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_no_record() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = NotifyLedger::new(dir.path().join("ledger.json"));
        assert!(ledger.load().is_none());
    }

    #[test]
    fn record_and_reload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = NotifyLedger::new(dir.path().join("ledger.json"));

        let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        ledger.record(t).unwrap();

        assert_eq!(ledger.load(), Some(t));
        assert_eq!(
            ledger.elapsed_since_last(t + Duration::from_secs(42)),
            Some(Duration::from_secs(42))
        );
    }

    #[test]
    fn corrupt_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, "not json").unwrap();

        let ledger = NotifyLedger::new(&path);
        assert!(ledger.load().is_none());
    }

    #[test]
    fn rewrite_updates_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = NotifyLedger::new(dir.path().join("ledger.json"));

        ledger.record(UNIX_EPOCH + Duration::from_secs(100)).unwrap();
        ledger.record(UNIX_EPOCH + Duration::from_secs(200)).unwrap();
        assert_eq!(ledger.load(), Some(UNIX_EPOCH + Duration::from_secs(200)));
    }
}
