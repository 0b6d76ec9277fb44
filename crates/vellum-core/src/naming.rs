//! Archive naming for rotated audit log files.
//!
//! When a live file is rotated it is moved aside under a name produced by a
//! [`FileNamingPolicy`]; retention later asks the same policy which archives
//! exist so it can thin them out.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;

/// Names archives of a single live log file and enumerates them.
pub trait FileNamingPolicy: Send + Sync {
    /// Path the next archive of the live file should be moved to.
    fn next_archive_path(&self) -> PathBuf;

    /// Existing archives produced by this policy, oldest first.
    fn archived_files(&self) -> io::Result<Vec<PathBuf>>;
}

/// Names archives by appending a formatted timestamp to the live file name,
/// with an optional prefix: `{prefix}{name}{timestamp}`.
///
/// The default suffix format sorts lexicographically in chronological order,
/// which is what [`archived_files`](FileNamingPolicy::archived_files) relies
/// on when ordering archives oldest first.
#[derive(Debug, Clone)]
pub struct TimestampNamingPolicy {
    live_path: PathBuf,
    prefix: String,
    suffix_format: String,
}

impl TimestampNamingPolicy {
    /// Default archive suffix, a second-resolution UTC timestamp.
    pub const DEFAULT_SUFFIX_FORMAT: &'static str = "-%Y.%m.%d-%H.%M.%S";

    /// Create a naming policy for one live file.
    pub fn new(live_path: PathBuf, prefix: Option<String>, suffix_format: Option<String>) -> Self {
        Self {
            live_path,
            prefix: prefix.unwrap_or_default(),
            suffix_format: suffix_format.unwrap_or_else(|| Self::DEFAULT_SUFFIX_FORMAT.to_string()),
        }
    }

    /// The live file this policy names archives for.
    pub fn live_path(&self) -> &Path {
        &self.live_path
    }

    fn live_file_name(&self) -> &str {
        self.live_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
    }

    /// File-name stem every archive of this live file starts with.
    fn archive_stem(&self) -> String {
        format!("{}{}", self.prefix, self.live_file_name())
    }
}

impl FileNamingPolicy for TimestampNamingPolicy {
    fn next_archive_path(&self) -> PathBuf {
        let name = format!(
            "{}{}",
            self.archive_stem(),
            Utc::now().format(&self.suffix_format)
        );
        self.live_path.with_file_name(name)
    }

    fn archived_files(&self) -> io::Result<Vec<PathBuf>> {
        let directory = match self.live_path.parent() {
            Some(parent) => parent,
            None => return Ok(Vec::new()),
        };
        let stem = self.archive_stem();

        let mut archives = Vec::new();
        for entry in std::fs::read_dir(directory)? {
            let entry = entry?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            // archives carry a suffix beyond the stem; the live file does not
            if name.starts_with(&stem) && name.len() > stem.len() {
                archives.push(entry.path());
            }
        }
        archives.sort();
        Ok(archives)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn archive_name_carries_prefix_and_suffix() {
        let policy = TimestampNamingPolicy::new(
            PathBuf::from("/var/audit/access.audit.json"),
            Some("old-".to_string()),
            None,
        );
        let archive = policy.next_archive_path();
        let name = archive.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("old-access.audit.json-"));
        assert_eq!(archive.parent(), Some(Path::new("/var/audit")));
    }

    #[test]
    fn archived_files_excludes_live_file_and_sorts() {
        let dir = TempDir::new().unwrap();
        let live = dir.path().join("access.audit.json");
        std::fs::write(&live, b"{}\n").unwrap();
        std::fs::write(dir.path().join("access.audit.json-2024.01.02-00.00.00"), b"").unwrap();
        std::fs::write(dir.path().join("access.audit.json-2024.01.01-00.00.00"), b"").unwrap();
        // a different topic's file is not an archive of this one
        std::fs::write(dir.path().join("activity.audit.json"), b"").unwrap();

        let policy = TimestampNamingPolicy::new(live, None, None);
        let archives = policy.archived_files().unwrap();
        let names: Vec<_> = archives
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            vec![
                "access.audit.json-2024.01.01-00.00.00",
                "access.audit.json-2024.01.02-00.00.00",
            ]
        );
    }

    #[test]
    fn archived_files_empty_for_fresh_directory() {
        let dir = TempDir::new().unwrap();
        let policy = TimestampNamingPolicy::new(dir.path().join("access.audit.json"), None, None);
        assert!(policy.archived_files().unwrap().is_empty());
    }
}
