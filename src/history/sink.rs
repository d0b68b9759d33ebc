use std::fmt;

use crate::models::BarcodeEntry;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Remote or snapshot operation whose outcome is reported to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Append,
    FetchAll,
    ReplaceAll,
    SnapshotRead,
    SnapshotWrite,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Append => "append",
            Operation::FetchAll => "fetch_all",
            Operation::ReplaceAll => "replace_all",
            Operation::SnapshotRead => "snapshot_read",
            Operation::SnapshotWrite => "snapshot_write",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives the outcome of background persistence. Must not block.
pub trait ObservabilitySink: Send + Sync {
    fn failed(&self, operation: Operation, error: &dyn fmt::Display);

    /// An appended entry reached the remote store.
    fn saved(&self, _entry: &BarcodeEntry) {}
}

/// Sink that writes through the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ObservabilitySink for LogSink {
    fn failed(&self, operation: Operation, error: &dyn fmt::Display) {
        log_warn!("history {operation} failed: {error}");
    }

    fn saved(&self, entry: &BarcodeEntry) {
        log_info!("Saved {} {} to history", entry.symbology(), entry.value());
    }
}
