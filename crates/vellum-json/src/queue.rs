//! Entries flowing through the audit-event queue.

use bytes::Bytes;

/// What a queue entry instructs the consumer to do.
///
/// Control entries are distinguished from data by this tag, never by payload
/// contents, so an empty event payload can never be mistaken for a control
/// request.
#[derive(Debug)]
pub(crate) enum EntryKind {
    /// Append an encoded event to the topic's file.
    Data(Bytes),
    /// Archive the topic's live file and start a fresh one.
    Rotate,
    /// Write out the topic's buffered bytes.
    Flush,
}

/// A single entry in the audit-event queue.
#[derive(Debug)]
pub(crate) struct QueueEntry {
    /// Topic whose file this entry applies to.
    pub topic: String,
    pub kind: EntryKind,
}
