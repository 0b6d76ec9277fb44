//! The scheduled batch consumer of the audit-event queue.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use vellum_core::retention::RetentionPolicy;
use vellum_core::rotation::RotationPolicy;

use crate::queue::{EntryKind, QueueEntry};
use crate::topic_file::TopicFile;

/// Maximum entries drained from the queue per batch.
pub(crate) const BATCH_SIZE: usize = 5000;

/// How the writer asked the consumer to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ShutdownSignal {
    /// Keep running.
    #[default]
    Run,
    /// Stop after draining the queue and flushing every topic.
    DrainAndStop,
    /// Stop promptly; queued entries may be discarded.
    Stop,
}

/// Where the consumer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConsumerState {
    /// Waiting for the next scheduled tick.
    Idle,
    /// Applying drained batches.
    Draining,
    /// Shutdown observed; performing the final drain.
    ShutdownRequested,
    /// Every topic file is closed.
    Closed,
}

/// Consumer of the audit-event queue, run as a single scheduled task.
///
/// Nothing here is synchronized: exactly one task runs the loop, and it is
/// the sole owner of every [`TopicFile`]. Batch failures are contained so
/// the loop never dies from one bad entry or a transient storage error.
pub(crate) struct QueueConsumer {
    queue: mpsc::Receiver<QueueEntry>,
    shutdown: watch::Receiver<ShutdownSignal>,
    topics: HashMap<String, TopicFile>,
    rotation_enabled: bool,
    rotation_policies: Vec<Box<dyn RotationPolicy>>,
    retention_policies: Vec<Box<dyn RetentionPolicy>>,
    has_rotation_or_retention: bool,
    write_interval: Duration,
    state: ConsumerState,
}

impl QueueConsumer {
    pub(crate) fn new(
        queue: mpsc::Receiver<QueueEntry>,
        shutdown: watch::Receiver<ShutdownSignal>,
        topics: HashMap<String, TopicFile>,
        rotation_enabled: bool,
        rotation_policies: Vec<Box<dyn RotationPolicy>>,
        retention_policies: Vec<Box<dyn RetentionPolicy>>,
        write_interval: Duration,
    ) -> Self {
        let has_rotation_or_retention = (rotation_enabled && !rotation_policies.is_empty())
            || !retention_policies.is_empty();
        Self {
            queue,
            shutdown,
            topics,
            rotation_enabled,
            rotation_policies,
            retention_policies,
            has_rotation_or_retention,
            write_interval,
            state: ConsumerState::Idle,
        }
    }

    fn set_state(&mut self, state: ConsumerState) {
        if self.state != state {
            debug!(from = ?self.state, to = ?state, "Audit consumer state change");
            self.state = state;
        }
    }

    fn shutdown_signal(&self) -> ShutdownSignal {
        *self.shutdown.borrow()
    }

    /// Runs the scheduled batch loop until shutdown is observed, then
    /// performs the final drain and closes every topic file.
    ///
    /// The task ending is what stops the schedule, so no freshly scheduled
    /// tick can race the final close.
    pub(crate) async fn run(mut self) {
        info!(
            interval_ms = self.write_interval.as_millis() as u64,
            topics = self.topics.len(),
            "Audit file writer started"
        );

        let mut interval = tokio::time::interval(self.write_interval);
        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    // also covers the writer being dropped without shutdown
                    break;
                }
                _ = interval.tick() => {
                    self.set_state(ConsumerState::Draining);
                    // drain-while-nonempty bounds enqueue-to-durable latency:
                    // a burst larger than one batch is written this tick, not
                    // spread across future ticks
                    loop {
                        self.write_events().await;
                        if self.queue.is_empty() || self.shutdown_signal() != ShutdownSignal::Run {
                            break;
                        }
                    }
                    self.set_state(ConsumerState::Idle);
                    if self.shutdown_signal() != ShutdownSignal::Run {
                        break;
                    }
                }
            }
        }

        self.finish().await;
    }

    /// Final drain (when requested) and close of every topic file.
    async fn finish(&mut self) {
        self.set_state(ConsumerState::ShutdownRequested);

        if self.shutdown_signal() == ShutdownSignal::DrainAndStop {
            while !self.queue.is_empty() {
                self.write_events().await;
            }
            self.flush_all().await;
        }

        for topic_file in self.topics.values_mut() {
            topic_file.close().await;
        }
        self.set_state(ConsumerState::Closed);
        info!("Audit file writer stopped");
    }

    /// Drains and applies one batch of up to [`BATCH_SIZE`] entries,
    /// preserving queue order. An empty drain is an idle poll: every topic
    /// buffer is flushed so sparse traffic never looks stuck.
    async fn write_events(&mut self) {
        let mut batch = Vec::new();
        while batch.len() < BATCH_SIZE {
            match self.queue.try_recv() {
                Ok(entry) => batch.push(entry),
                Err(_) => break,
            }
        }

        if batch.is_empty() {
            self.flush_all().await;
        } else {
            for entry in batch {
                self.apply(entry).await;
            }
        }

        if self.has_rotation_or_retention {
            for topic_file in self.topics.values_mut() {
                if let Err(err) = topic_file
                    .rotate_if_needed(
                        self.rotation_enabled,
                        &self.rotation_policies,
                        &self.retention_policies,
                    )
                    .await
                {
                    error!(error = %err, "Audit file rotation failed");
                }
            }
        }
    }

    /// Applies a single entry to its topic's file. Unknown topics are
    /// discarded with a warning; IO failures are logged and only affect
    /// this entry.
    async fn apply(&mut self, entry: QueueEntry) {
        let Some(topic_file) = self.topics.get_mut(&entry.topic) else {
            warn!(topic = %entry.topic, "Unknown audit topic, discarding entry");
            return;
        };

        let result = match entry.kind {
            EntryKind::Data(payload) => topic_file.write(&payload).await,
            EntryKind::Rotate => topic_file.rotate_now().await,
            EntryKind::Flush => topic_file.flush().await,
        };
        if let Err(err) = result {
            error!(topic = %entry.topic, error = %err, "Audit file write failed");
        }
    }

    async fn flush_all(&mut self) {
        for (topic, topic_file) in &mut self.topics {
            if let Err(err) = topic_file.flush().await {
                error!(topic = %topic, error = %err, "Failed to flush audit file buffer");
            }
        }
    }
}
