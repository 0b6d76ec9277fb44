//! # Vellum Core
//!
//! Policy capability set for Vellum audit-file persistence.
//!
//! This crate provides the pluggable decisions that surround a rotatable
//! audit log file, while the writer itself lives in `vellum-json`:
//!
//! - **RotationPolicy trait**: decides when the active file should rotate,
//!   with size-based, interval-based and fixed-time-of-day strategies
//! - **FileNamingPolicy trait**: names archived files and enumerates the
//!   archives it produced, with a timestamp-suffix implementation
//! - **RetentionPolicy trait**: selects archives that are due for deletion,
//!   with count-based and age-based strategies
//! - **ElasticSearch compatibility**: field rename and JSON key
//!   normalization applied to events before they are persisted
//!
//! Strategies are selected by configuration and combined freely; a policy is
//! a small value object with a single decision method, so the writer never
//! needs to know which concrete strategies are in play.

pub mod elastic;
pub mod naming;
pub mod retention;
pub mod rotation;

// Re-exports
pub use naming::{FileNamingPolicy, TimestampNamingPolicy};
pub use retention::{AgeRetentionPolicy, CountRetentionPolicy, RetentionPolicy};
pub use rotation::{
    FixedTimeRotationPolicy, IntervalRotationPolicy, LogFileStatus, RotationPolicy,
    SizeRotationPolicy,
};
