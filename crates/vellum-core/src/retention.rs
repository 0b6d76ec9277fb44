//! Retention policies for archived audit log files.
//!
//! Retention runs alongside rotation: each policy selects archives that are
//! due for deletion, and the writer removes the union of the selections.
//! Deletion failures are the writer's concern; a policy only decides.

use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};

use crate::naming::FileNamingPolicy;

/// Selects archived files that are due for deletion.
pub trait RetentionPolicy: Send + Sync {
    /// Archives that should be deleted, resolved through `naming`.
    fn files_to_delete(&self, naming: &dyn FileNamingPolicy) -> io::Result<Vec<PathBuf>>;
}

/// Keeps at most a fixed number of archived history files, deleting the
/// oldest beyond that count.
#[derive(Debug, Clone, Copy)]
pub struct CountRetentionPolicy {
    max_history_files: usize,
}

impl CountRetentionPolicy {
    /// Create a count-based policy keeping at most `max_history_files`.
    pub fn new(max_history_files: usize) -> Self {
        Self { max_history_files }
    }
}

impl RetentionPolicy for CountRetentionPolicy {
    fn files_to_delete(&self, naming: &dyn FileNamingPolicy) -> io::Result<Vec<PathBuf>> {
        let archives = naming.archived_files()?;
        let excess = archives.len().saturating_sub(self.max_history_files);
        Ok(archives.into_iter().take(excess).collect())
    }
}

/// Deletes archives whose last modification is older than a maximum age.
#[derive(Debug, Clone, Copy)]
pub struct AgeRetentionPolicy {
    max_age: Duration,
}

impl AgeRetentionPolicy {
    /// Create an age-based policy deleting archives older than `max_age`.
    pub fn new(max_age: Duration) -> Self {
        Self { max_age }
    }
}

impl RetentionPolicy for AgeRetentionPolicy {
    fn files_to_delete(&self, naming: &dyn FileNamingPolicy) -> io::Result<Vec<PathBuf>> {
        let cutoff = Utc::now() - self.max_age;

        let mut expired = Vec::new();
        for archive in naming.archived_files()? {
            let Ok(metadata) = std::fs::metadata(&archive) else {
                continue;
            };
            let Ok(modified) = metadata.modified() else {
                continue;
            };
            let modified: DateTime<Utc> = modified.into();
            if modified < cutoff {
                expired.push(archive);
            }
        }
        Ok(expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::TimestampNamingPolicy;
    use tempfile::TempDir;

    fn policy_with_archives(dir: &TempDir, names: &[&str]) -> TimestampNamingPolicy {
        let live = dir.path().join("access.audit.json");
        std::fs::write(&live, b"").unwrap();
        for name in names {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        TimestampNamingPolicy::new(live, None, None)
    }

    #[test]
    fn count_policy_deletes_oldest_beyond_limit() {
        let dir = TempDir::new().unwrap();
        let naming = policy_with_archives(
            &dir,
            &[
                "access.audit.json-2024.01.01-00.00.00",
                "access.audit.json-2024.01.02-00.00.00",
                "access.audit.json-2024.01.03-00.00.00",
            ],
        );

        let policy = CountRetentionPolicy::new(2);
        let to_delete = policy.files_to_delete(&naming).unwrap();
        assert_eq!(to_delete.len(), 1);
        assert!(
            to_delete[0]
                .to_string_lossy()
                .ends_with("2024.01.01-00.00.00")
        );
    }

    #[test]
    fn count_policy_idle_under_limit() {
        let dir = TempDir::new().unwrap();
        let naming = policy_with_archives(&dir, &["access.audit.json-2024.01.01-00.00.00"]);

        let policy = CountRetentionPolicy::new(5);
        assert!(policy.files_to_delete(&naming).unwrap().is_empty());
    }

    #[test]
    fn age_policy_deletes_expired_archives() {
        let dir = TempDir::new().unwrap();
        let naming = policy_with_archives(&dir, &["access.audit.json-2024.01.01-00.00.00"]);

        std::thread::sleep(std::time::Duration::from_millis(60));

        let expired = AgeRetentionPolicy::new(Duration::milliseconds(50));
        assert_eq!(expired.files_to_delete(&naming).unwrap().len(), 1);

        let fresh = AgeRetentionPolicy::new(Duration::days(1));
        assert!(fresh.files_to_delete(&naming).unwrap().is_empty());
    }
}
