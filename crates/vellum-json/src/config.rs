//! Writer configuration.
//!
//! The surrounding audit framework loads this surface from JSON; this module
//! owns the defaults, the duration-string parsing with its safe fallback,
//! and the construction of policy objects from settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;
use tracing::{info, warn};

use vellum_core::naming::TimestampNamingPolicy;
use vellum_core::retention::{AgeRetentionPolicy, CountRetentionPolicy, RetentionPolicy};
use vellum_core::rotation::{
    FixedTimeRotationPolicy, IntervalRotationPolicy, RotationPolicy, SizeRotationPolicy,
};

/// Write interval used when the configured value is absent or invalid.
pub const DEFAULT_WRITE_INTERVAL: Duration = Duration::from_millis(100);

/// Configuration for the JSON audit-file writer.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonWriterConfig {
    /// Directory holding one live audit file per topic.
    pub log_directory: PathBuf,

    /// Rewrite events for ElasticSearch compatibility before persisting.
    #[serde(default)]
    pub elasticsearch_compatible: bool,

    #[serde(default)]
    pub buffering: BufferingConfig,

    #[serde(default)]
    pub file_rotation: FileRotationConfig,

    #[serde(default)]
    pub file_retention: FileRetentionConfig,
}

impl JsonWriterConfig {
    /// Configuration with defaults for everything but the log directory.
    pub fn new(log_directory: impl Into<PathBuf>) -> Self {
        Self {
            log_directory: log_directory.into(),
            elasticsearch_compatible: false,
            buffering: BufferingConfig::default(),
            file_rotation: FileRotationConfig::default(),
            file_retention: FileRetentionConfig::default(),
        }
    }
}

/// Queue and write-interval settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BufferingConfig {
    /// Event queue capacity. Values below the writer's floor are raised to
    /// the floor without warning.
    pub max_size: usize,

    /// Interval between batch writes, as a duration string such as
    /// `"100 ms"` or `"5 s"`. Invalid or non-positive values fall back to
    /// [`DEFAULT_WRITE_INTERVAL`].
    pub write_interval: String,
}

impl Default for BufferingConfig {
    fn default() -> Self {
        Self {
            max_size: 100_000,
            write_interval: String::new(),
        }
    }
}

impl BufferingConfig {
    /// The configured write interval, or the documented default when the
    /// configured value does not parse to a positive duration.
    pub fn parsed_write_interval(&self) -> Duration {
        match parse_duration(&self.write_interval) {
            Some(interval) if !interval.is_zero() => interval,
            _ => {
                info!(
                    configured = %self.write_interval,
                    fallback_ms = DEFAULT_WRITE_INTERVAL.as_millis() as u64,
                    "Invalid write interval, falling back to default"
                );
                DEFAULT_WRITE_INTERVAL
            }
        }
    }
}

/// File rotation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileRotationConfig {
    /// Whether rotation is enabled at all; when `false` every rotation
    /// request and policy is ignored.
    pub rotation_enabled: bool,

    /// Maximum live-file size in bytes; `0` disables size-based rotation.
    pub max_file_size: u64,

    /// Interval between rotations, as a duration string. `"disabled"` or
    /// `"zero"` turns interval-based rotation off.
    pub rotation_interval: String,

    /// UTC times of day (`"HH:MM"` or `"HH:MM:SS"`) at which to rotate.
    pub rotation_times: Vec<String>,

    /// Prefix prepended to archived file names.
    pub rotation_file_prefix: Option<String>,

    /// Timestamp suffix appended to archived file names, as a `chrono`
    /// format string.
    pub rotation_file_suffix: String,
}

impl Default for FileRotationConfig {
    fn default() -> Self {
        Self {
            rotation_enabled: false,
            max_file_size: 0,
            rotation_interval: "disabled".to_string(),
            rotation_times: Vec::new(),
            rotation_file_prefix: None,
            rotation_file_suffix: TimestampNamingPolicy::DEFAULT_SUFFIX_FORMAT.to_string(),
        }
    }
}

impl FileRotationConfig {
    /// Build the rotation policies selected by these settings.
    pub fn build_rotation_policies(&self) -> Vec<Box<dyn RotationPolicy>> {
        let mut policies: Vec<Box<dyn RotationPolicy>> = Vec::new();

        if self.max_file_size > 0 {
            policies.push(Box::new(SizeRotationPolicy::new(self.max_file_size)));
        }

        if let Some(interval) = parse_duration(&self.rotation_interval) {
            if let Ok(interval) = chrono::Duration::from_std(interval) {
                policies.push(Box::new(IntervalRotationPolicy::new(interval)));
            }
        }

        let times = self.parsed_rotation_times();
        if !times.is_empty() {
            policies.push(Box::new(FixedTimeRotationPolicy::new(times)));
        }

        policies
    }

    /// Build the archive naming policy for one topic's live file.
    pub fn build_naming_policy(&self, live_path: &Path) -> TimestampNamingPolicy {
        TimestampNamingPolicy::new(
            live_path.to_path_buf(),
            self.rotation_file_prefix.clone(),
            Some(self.rotation_file_suffix.clone()),
        )
    }

    fn parsed_rotation_times(&self) -> Vec<NaiveTime> {
        let mut times = Vec::new();
        for value in &self.rotation_times {
            let parsed = NaiveTime::parse_from_str(value, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"));
            match parsed {
                Ok(time) => times.push(time),
                Err(_) => warn!(value = %value, "Ignoring unparseable rotation time"),
            }
        }
        times
    }
}

/// Archive retention settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct FileRetentionConfig {
    /// Keep at most this many archived files per topic; `0` disables
    /// count-based retention.
    pub max_number_of_history_files: usize,

    /// Delete archives older than this duration string. Empty, `"disabled"`
    /// or `"zero"` turns age-based retention off.
    pub max_file_age: String,
}

impl FileRetentionConfig {
    /// Build the retention policies selected by these settings.
    pub fn build_retention_policies(&self) -> Vec<Box<dyn RetentionPolicy>> {
        let mut policies: Vec<Box<dyn RetentionPolicy>> = Vec::new();

        if self.max_number_of_history_files > 0 {
            policies.push(Box::new(CountRetentionPolicy::new(
                self.max_number_of_history_files,
            )));
        }

        if let Some(max_age) = parse_duration(&self.max_file_age) {
            if let Ok(max_age) = chrono::Duration::from_std(max_age) {
                policies.push(Box::new(AgeRetentionPolicy::new(max_age)));
            }
        }

        policies
    }
}

/// Parses duration strings of the form `"<value> <unit>"`, e.g. `"100 ms"`,
/// `"250ms"`, `"5 seconds"` or `"2 h"`.
///
/// Returns `None` for empty input, the sentinels `"zero"` and `"disabled"`,
/// and anything unparseable.
pub(crate) fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty()
        || value.eq_ignore_ascii_case("zero")
        || value.eq_ignore_ascii_case("disabled")
    {
        return None;
    }

    let digits_end = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (digits, unit) = value.split_at(digits_end);
    let amount: u64 = digits.parse().ok()?;

    match unit.trim() {
        "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => {
            Some(Duration::from_millis(amount))
        }
        "s" | "sec" | "secs" | "second" | "seconds" | "" => Some(Duration::from_secs(amount)),
        "m" | "min" | "mins" | "minute" | "minutes" => Some(Duration::from_secs(amount * 60)),
        "h" | "hour" | "hours" => Some(Duration::from_secs(amount * 3600)),
        "d" | "day" | "days" => Some(Duration::from_secs(amount * 86_400)),
        _ => None,
    }
}
