//! Per-topic audit file state.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};
use chrono::{DateTime, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use vellum_core::naming::{FileNamingPolicy, TimestampNamingPolicy};
use vellum_core::retention::RetentionPolicy;
use vellum_core::rotation::{LogFileStatus, RotationPolicy};

use crate::error::WriterError;

/// Flush the output buffer once it holds at least this many bytes.
const FILE_BUFFER_THRESHOLD: usize = 8 * 1024;

/// Initial output buffer capacity.
const OUTPUT_BUF_INITIAL_SIZE: usize = 16 * 1024;

/// State for a single topic's audit file: the open file handle, the
/// in-memory output buffer, the write position and rotation bookkeeping.
///
/// Owned exclusively by the queue consumer, so nothing here is synchronized.
pub(crate) struct TopicFile {
    path: PathBuf,
    file: Option<File>,
    buffer: BytesMut,
    position: u64,
    last_rotation: DateTime<Utc>,
    naming: TimestampNamingPolicy,
}

impl TopicFile {
    /// Opens the topic's audit file, creating the log directory and the file
    /// as needed. An existing file is opened for append with the position
    /// set to its current size.
    #[instrument(skip_all)]
    pub(crate) async fn open(
        path: PathBuf,
        naming: TimestampNamingPolicy,
    ) -> Result<Self, WriterError> {
        info!(path = %path.display(), "Opening audit file");
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let (file, position, last_rotation) = match tokio::fs::metadata(&path).await {
            Ok(metadata) => {
                let file = OpenOptions::new().append(true).open(&path).await?;
                let last_rotation = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                (file, metadata.len(), last_rotation)
            }
            Err(_) => {
                let file = OpenOptions::new()
                    .create_new(true)
                    .append(true)
                    .open(&path)
                    .await?;
                (file, 0, Utc::now())
            }
        };

        Ok(Self {
            path,
            file: Some(file),
            buffer: BytesMut::with_capacity(OUTPUT_BUF_INITIAL_SIZE),
            position,
            last_rotation,
            naming,
        })
    }

    /// Path of the live audit file.
    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    fn status(&self) -> LogFileStatus {
        LogFileStatus {
            bytes_written: self.position,
            last_rotation: self.last_rotation,
        }
    }

    /// Appends one newline-terminated event to the output buffer, flushing
    /// once the buffer crosses its threshold.
    pub(crate) async fn write(&mut self, bytes: &[u8]) -> Result<(), WriterError> {
        self.buffer.put_slice(bytes);
        self.buffer.put_u8(b'\n');
        if self.buffer.len() >= FILE_BUFFER_THRESHOLD {
            self.flush().await?;
        }
        Ok(())
    }

    /// Writes the buffered bytes to the file at the current position and
    /// clears the buffer. A flush on an empty buffer is a no-op.
    pub(crate) async fn flush(&mut self) -> Result<(), WriterError> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| WriterError::io("audit file is not open"))?;

        // the buffer is handed off before the write, so a failed write drops
        // its bytes rather than replaying them on the next flush
        let chunk = self.buffer.split();
        file.write_all(&chunk).await?;
        self.position += chunk.len() as u64;
        Ok(())
    }

    /// Archives the live file under the naming policy's next name and starts
    /// a fresh file at position zero.
    pub(crate) async fn rotate_now(&mut self) -> Result<(), WriterError> {
        self.flush().await?;

        // close the live handle before the rename
        self.file.take();

        let archive = self.naming.next_archive_path();
        if let Err(err) = tokio::fs::rename(&self.path, &archive).await {
            // reopen the live file so a failed archive never blocks writes
            self.file = Some(
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)
                    .await?,
            );
            return Err(err.into());
        }

        let file = OpenOptions::new()
            .create_new(true)
            .append(true)
            .open(&self.path)
            .await?;
        self.file = Some(file);
        self.position = 0;
        self.last_rotation = Utc::now();
        debug!(archive = %archive.display(), "Rotated audit file");
        Ok(())
    }

    /// Rotates when any rotation policy fires, then enforces retention.
    ///
    /// Retention runs independently of rotation: each policy's selection is
    /// collected and the union deleted. Failures to evaluate a policy or
    /// delete a file are logged and never raised, so the active file keeps
    /// accepting writes.
    pub(crate) async fn rotate_if_needed(
        &mut self,
        rotation_enabled: bool,
        rotation_policies: &[Box<dyn RotationPolicy>],
        retention_policies: &[Box<dyn RetentionPolicy>],
    ) -> Result<(), WriterError> {
        if rotation_enabled && !rotation_policies.is_empty() {
            let status = self.status();
            if rotation_policies.iter().any(|p| p.should_rotate(&status)) {
                self.rotate_now().await?;
            }
        }

        if !retention_policies.is_empty() {
            let mut files_to_delete = BTreeSet::new();
            for policy in retention_policies {
                match policy.files_to_delete(&self.naming) {
                    Ok(files) => files_to_delete.extend(files),
                    Err(err) => warn!(
                        path = %self.path.display(),
                        error = %err,
                        "Failed to evaluate retention policy"
                    ),
                }
            }
            for file in files_to_delete {
                if let Err(err) = tokio::fs::remove_file(&file).await {
                    warn!(
                        path = %file.display(),
                        error = %err,
                        "Could not delete archived audit file"
                    );
                }
            }
        }
        Ok(())
    }

    /// Closes the file handle; used only during shutdown.
    pub(crate) async fn close(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(err) = file.sync_all().await {
                warn!(
                    path = %self.path.display(),
                    error = %err,
                    "Failed to close audit file cleanly"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_topic(dir: &TempDir) -> TopicFile {
        let path = dir.path().join("access.audit.json");
        let naming = TimestampNamingPolicy::new(path.clone(), None, None);
        TopicFile::open(path, naming).await.unwrap()
    }

    #[tokio::test]
    async fn open_fresh_file_starts_at_zero() {
        let dir = TempDir::new().unwrap();
        let topic = open_topic(&dir).await;
        assert_eq!(topic.position, 0);
        assert!(topic.path().exists());
    }

    #[tokio::test]
    async fn open_existing_file_resumes_position() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("access.audit.json");
        std::fs::write(&path, b"{\"seq\":0}\n").unwrap();

        let topic = open_topic(&dir).await;
        assert_eq!(topic.position, 10);
    }

    #[tokio::test]
    async fn flush_on_empty_buffer_is_noop() {
        let dir = TempDir::new().unwrap();
        let mut topic = open_topic(&dir).await;

        topic.flush().await.unwrap();
        assert_eq!(topic.position, 0);
        assert_eq!(std::fs::metadata(topic.path()).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn write_buffers_until_flush() {
        let dir = TempDir::new().unwrap();
        let mut topic = open_topic(&dir).await;

        topic.write(b"{\"seq\":1}").await.unwrap();
        assert_eq!(topic.position, 0);
        assert_eq!(std::fs::metadata(topic.path()).unwrap().len(), 0);

        topic.flush().await.unwrap();
        assert_eq!(topic.position, 10);
        assert_eq!(std::fs::read_to_string(topic.path()).unwrap(), "{\"seq\":1}\n");

        // a second flush with nothing buffered leaves the position alone
        topic.flush().await.unwrap();
        assert_eq!(topic.position, 10);
    }

    #[tokio::test]
    async fn write_flushes_at_threshold() {
        let dir = TempDir::new().unwrap();
        let mut topic = open_topic(&dir).await;

        let payload = vec![b'x'; FILE_BUFFER_THRESHOLD];
        topic.write(&payload).await.unwrap();
        assert_eq!(topic.position, (FILE_BUFFER_THRESHOLD + 1) as u64);
        assert!(topic.buffer.is_empty());
    }

    #[tokio::test]
    async fn rotate_now_archives_and_resets() {
        let dir = TempDir::new().unwrap();
        let mut topic = open_topic(&dir).await;

        topic.write(b"{\"seq\":1}").await.unwrap();
        topic.rotate_now().await.unwrap();

        assert_eq!(topic.position, 0);
        assert_eq!(std::fs::metadata(topic.path()).unwrap().len(), 0);

        let archives = topic.naming.archived_files().unwrap();
        assert_eq!(archives.len(), 1);
        assert_eq!(
            std::fs::read_to_string(&archives[0]).unwrap(),
            "{\"seq\":1}\n"
        );

        // the fresh file accepts writes under the original name
        topic.write(b"{\"seq\":2}").await.unwrap();
        topic.flush().await.unwrap();
        assert_eq!(std::fs::read_to_string(topic.path()).unwrap(), "{\"seq\":2}\n");
    }

    #[tokio::test]
    async fn retention_deletes_marked_archives() {
        let dir = TempDir::new().unwrap();
        let mut topic = open_topic(&dir).await;

        let stale = dir.path().join("access.audit.json-2024.01.01-00.00.00");
        std::fs::write(&stale, b"{}\n").unwrap();

        let retention: Vec<Box<dyn RetentionPolicy>> =
            vec![Box::new(vellum_core::retention::CountRetentionPolicy::new(0))];
        topic.rotate_if_needed(false, &[], &retention).await.unwrap();
        assert!(!stale.exists());
    }
}
