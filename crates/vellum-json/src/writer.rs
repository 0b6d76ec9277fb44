//! Public facade for the buffered JSON audit-file writer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::error;

use vellum_core::elastic;

use crate::config::JsonWriterConfig;
use crate::consumer::{QueueConsumer, ShutdownSignal};
use crate::error::WriterError;
use crate::queue::{EntryKind, QueueEntry};
use crate::topic_file::TopicFile;

/// Queue capacity floor; under-provisioned configurations are raised to it
/// without warning, since a tiny queue turns backpressure pathological.
const MIN_QUEUE_SIZE: usize = 100_000;

/// Suffix of every live audit file: `{topic}.audit.json`.
pub const LOG_FILE_NAME_SUFFIX: &str = "audit.json";

/// Periodically writes queued JSON audit events to one file per topic.
///
/// Any number of producer tasks may call [`put`](Self::put) concurrently;
/// a single consumer task drains the queue in batches on the configured
/// write interval and owns all file state. `put` applies backpressure by
/// awaiting while the queue is at capacity; events are never silently
/// dropped.
pub struct JsonFileWriter {
    sender: mpsc::Sender<QueueEntry>,
    shutdown: watch::Sender<ShutdownSignal>,
    consumer: Mutex<Option<QueueConsumer>>,
    task: Mutex<Option<JoinHandle<()>>>,
    topic_paths: HashMap<String, PathBuf>,
    elasticsearch_compatible: bool,
    rotation_enabled: bool,
}

impl JsonFileWriter {
    /// Creates a writer for the given topics, opening (or creating) each
    /// topic's audit file under the configured log directory.
    pub async fn new(topics: &[String], config: &JsonWriterConfig) -> Result<Self, WriterError> {
        let write_interval = config.buffering.parsed_write_interval();
        let capacity = config.buffering.max_size.max(MIN_QUEUE_SIZE);

        let (sender, receiver) = mpsc::channel(capacity);
        let (shutdown, shutdown_rx) = watch::channel(ShutdownSignal::Run);

        let mut topic_files = HashMap::new();
        let mut topic_paths = HashMap::new();
        for topic in topics {
            let file_name = format!("{topic}.{LOG_FILE_NAME_SUFFIX}");
            let path = config.log_directory.join(file_name);
            let naming = config.file_rotation.build_naming_policy(&path);
            let topic_file = TopicFile::open(path.clone(), naming).await?;
            topic_files.insert(topic.clone(), topic_file);
            topic_paths.insert(topic.clone(), path);
        }

        let consumer = QueueConsumer::new(
            receiver,
            shutdown_rx,
            topic_files,
            config.file_rotation.rotation_enabled,
            config.file_rotation.build_rotation_policies(),
            config.file_retention.build_retention_policies(),
            write_interval,
        );

        Ok(Self {
            sender,
            shutdown,
            consumer: Mutex::new(Some(consumer)),
            task: Mutex::new(None),
            topic_paths,
            elasticsearch_compatible: config.elasticsearch_compatible,
            rotation_enabled: config.file_rotation.rotation_enabled,
        })
    }

    /// Starts the scheduled batch consumer.
    pub fn startup(&self) -> Result<(), WriterError> {
        let consumer = self
            .consumer
            .lock()
            .take()
            .ok_or_else(|| WriterError::config("audit writer already started"))?;
        *self.task.lock() = Some(tokio::spawn(consumer.run()));
        Ok(())
    }

    /// Stops the writer.
    ///
    /// With `flush_on_shutdown`, this waits until every entry enqueued
    /// before the call has been written, every topic buffer flushed and
    /// every file handle closed. Without it, the consumer stops promptly
    /// and queued entries may be discarded.
    pub async fn shutdown(&self, flush_on_shutdown: bool) {
        let signal = if flush_on_shutdown {
            ShutdownSignal::DrainAndStop
        } else {
            ShutdownSignal::Stop
        };
        // a send error just means the consumer is already gone
        let _ = self.shutdown.send(signal);

        // started: wait for the consumer task to finish its final drain
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                error!(error = %err, "Audit consumer task failed");
            }
        }

        // never started: run the consumer inline; it observes the signal
        // immediately, drains if asked to, and closes every topic file
        let consumer = self.consumer.lock().take();
        if let Some(consumer) = consumer {
            consumer.run().await;
        }
    }

    /// Enqueues one audit event for `topic`, awaiting while the queue is at
    /// capacity.
    ///
    /// The caller's event is never mutated: when ElasticSearch compatibility
    /// is enabled the field rename and key normalization are applied to a
    /// working copy before serialization.
    pub async fn put(&self, topic: &str, event: &Value) -> Result<(), WriterError> {
        let payload = self.encode(event)?;
        self.send(topic, EntryKind::Data(payload.into())).await
    }

    /// Requests an unscheduled rotation of `topic`'s audit file, which
    /// happens after every entry already queued has been applied.
    ///
    /// Returns whether rotation is enabled; the request is dropped otherwise.
    pub async fn request_rotation(&self, topic: &str) -> Result<bool, WriterError> {
        if !self.rotation_enabled {
            return Ok(false);
        }
        self.send(topic, EntryKind::Rotate).await?;
        Ok(true)
    }

    /// Requests an unscheduled flush of `topic`'s file buffer, which happens
    /// after every entry already queued has been applied.
    pub async fn request_flush(&self, topic: &str) -> Result<(), WriterError> {
        self.send(topic, EntryKind::Flush).await
    }

    /// Live audit file path for `topic`, or `None` when unrecognised.
    pub fn topic_file_path(&self, topic: &str) -> Option<&Path> {
        self.topic_paths.get(topic).map(PathBuf::as_path)
    }

    async fn send(&self, topic: &str, kind: EntryKind) -> Result<(), WriterError> {
        let entry = QueueEntry {
            topic: topic.to_string(),
            kind,
        };
        self.sender
            .send(entry)
            .await
            .map_err(|_| WriterError::QueueClosed)
    }

    fn encode(&self, event: &Value) -> Result<Vec<u8>, WriterError> {
        if self.elasticsearch_compatible {
            let mut copy = event.clone();
            elastic::rename_field(&mut copy, elastic::CONTENT_ID_FIELD, elastic::EVENT_ID_FIELD);
            elastic::normalize(&mut copy)
                .map_err(|err| WriterError::Serialization(err.to_string()))?;
            Ok(serde_json::to_vec(&copy)?)
        } else {
            Ok(serde_json::to_vec(event)?)
        }
    }
}
