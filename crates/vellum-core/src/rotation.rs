//! Rotation policies for active audit log files.
//!
//! A policy inspects a [`LogFileStatus`] snapshot and decides whether the
//! active file is due for rotation. Any number of policies can be combined;
//! the file rotates as soon as one of them fires.

use chrono::{DateTime, Duration, NaiveTime, Utc};

/// Snapshot of an active log file, consulted by rotation policies.
#[derive(Debug, Clone, Copy)]
pub struct LogFileStatus {
    /// Bytes written to the file since it was created or last rotated.
    pub bytes_written: u64,
    /// When the file was last rotated, or created if it never rotated.
    pub last_rotation: DateTime<Utc>,
}

/// Decides whether an active log file should be rotated.
pub trait RotationPolicy: Send + Sync {
    /// Returns `true` when the file described by `status` is due for rotation.
    fn should_rotate(&self, status: &LogFileStatus) -> bool;
}

/// Rotates once the active file reaches a maximum size in bytes.
#[derive(Debug, Clone, Copy)]
pub struct SizeRotationPolicy {
    max_file_size: u64,
}

impl SizeRotationPolicy {
    /// Create a size-based policy; a zero `max_file_size` never rotates.
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }
}

impl RotationPolicy for SizeRotationPolicy {
    fn should_rotate(&self, status: &LogFileStatus) -> bool {
        self.max_file_size > 0 && status.bytes_written >= self.max_file_size
    }
}

/// Rotates once a fixed interval has elapsed since the last rotation.
#[derive(Debug, Clone, Copy)]
pub struct IntervalRotationPolicy {
    interval: Duration,
}

impl IntervalRotationPolicy {
    /// Create an interval policy; a non-positive interval never rotates.
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl RotationPolicy for IntervalRotationPolicy {
    fn should_rotate(&self, status: &LogFileStatus) -> bool {
        self.interval > Duration::zero() && Utc::now() - status.last_rotation >= self.interval
    }
}

/// Rotates when a configured time of day has been crossed since the last
/// rotation.
#[derive(Debug, Clone)]
pub struct FixedTimeRotationPolicy {
    times_of_day: Vec<NaiveTime>,
}

impl FixedTimeRotationPolicy {
    /// Create a policy rotating at the given UTC times of day.
    pub fn new(times_of_day: Vec<NaiveTime>) -> Self {
        Self { times_of_day }
    }
}

impl RotationPolicy for FixedTimeRotationPolicy {
    fn should_rotate(&self, status: &LogFileStatus) -> bool {
        let now = Utc::now();
        self.times_of_day.iter().any(|time| {
            let occurrence = now.date_naive().and_time(*time).and_utc();
            occurrence <= now && status.last_rotation < occurrence
        })
    }
}
