//! # Vellum JSON
//!
//! Buffered newline-delimited JSON audit-file writer.
//!
//! Audit events are appended to one UTF-8 file per topic, one JSON object
//! per line. Producers enqueue events onto a bounded queue; a single
//! scheduled consumer task drains the queue in batches, buffers writes per
//! topic, and enforces the rotation and retention policies from
//! `vellum-core`.
//!
//! ## Guarantees
//!
//! - Events for a topic reach that topic's file in enqueue order
//! - A full queue stalls producers instead of dropping events
//! - A bad event, an unknown topic or a transient storage failure never
//!   stops the consumer; subsequent batches keep flowing
//! - `shutdown(true)` returns only after everything enqueued before the
//!   call is durably written and every file handle is closed
//!
//! ## Example
//!
//! ```rust,ignore
//! use vellum_json::{JsonFileWriter, JsonWriterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), vellum_json::WriterError> {
//!     let config = JsonWriterConfig::new("/var/log/audit");
//!     let topics = vec!["access".to_string(), "activity".to_string()];
//!
//!     let writer = JsonFileWriter::new(&topics, &config).await?;
//!     writer.startup()?;
//!
//!     let event = serde_json::json!({"_id": "ev-1", "action": "login"});
//!     writer.put("access", &event).await?;
//!
//!     writer.shutdown(true).await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod writer;

mod consumer;
mod queue;
mod topic_file;

// Re-exports
pub use config::{
    BufferingConfig, FileRetentionConfig, FileRotationConfig, JsonWriterConfig,
    DEFAULT_WRITE_INTERVAL,
};
pub use error::WriterError;
pub use writer::{JsonFileWriter, LOG_FILE_NAME_SUFFIX};
