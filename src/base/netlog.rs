//! Structured event log.
//!
//! A trimmed version of Chromium's `NetLog`: observers receive typed
//! entries whose parameters are JSON values. PAC alerts and errors are
//! written both to the request-bound log and to the global stream.

use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, PoisonError};

/// Event types emitted by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NetLogEventType {
    /// `alert()` called by a PAC script.
    PacJavascriptAlert,
    /// Script error reported by the PAC engine.
    PacJavascriptError,
}

/// Where an entry originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetLogSource {
    Global,
    Request(u64),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetLogEntry {
    pub event_type: NetLogEventType,
    pub source: NetLogSource,
    pub params: Value,
}

impl NetLogEntry {
    pub fn new(event_type: NetLogEventType, source: NetLogSource, params: Value) -> Self {
        Self { event_type, source, params }
    }
}

/// Receiver of net-log entries. Implementations must be thread-safe since
/// entries are added from the resolver's worker thread.
pub trait NetLog: Send + Sync {
    fn add_entry(&self, entry: NetLogEntry);
}

impl<L: NetLog + ?Sized> NetLog for Arc<L> {
    fn add_entry(&self, entry: NetLogEntry) {
        (**self).add_entry(entry)
    }
}

/// Parameters for a `PacJavascriptAlert` event.
pub fn alert_params(message: &str) -> Value {
    json!({ "message": message })
}

/// Parameters for a `PacJavascriptError` event.
pub fn error_params(line_number: Option<u32>, message: &str) -> Value {
    json!({ "line_number": line_number, "message": message })
}

/// A net log bound to a single request.
#[derive(Clone, Default)]
pub struct BoundNetLog {
    net_log: Option<Arc<dyn NetLog>>,
    request_id: u64,
}

impl BoundNetLog {
    pub fn new(net_log: Arc<dyn NetLog>, request_id: u64) -> Self {
        Self { net_log: Some(net_log), request_id }
    }

    /// A bound log that drops every entry.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn add_event(&self, event_type: NetLogEventType, params: Value) {
        if let Some(log) = &self.net_log {
            log.add_entry(NetLogEntry::new(
                event_type,
                NetLogSource::Request(self.request_id),
                params,
            ));
        }
    }

    pub fn is_bound(&self) -> bool {
        self.net_log.is_some()
    }
}

impl std::fmt::Debug for BoundNetLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundNetLog")
            .field("bound", &self.net_log.is_some())
            .field("request_id", &self.request_id)
            .finish()
    }
}

/// Net log that records every entry in memory.
#[derive(Debug, Default)]
pub struct CapturingNetLog {
    entries: Mutex<Vec<NetLogEntry>>,
}

impl CapturingNetLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the entries recorded so far.
    pub fn entries(&self) -> Vec<NetLogEntry> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}

impl NetLog for CapturingNetLog {
    fn add_entry(&self, entry: NetLogEntry) {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).push(entry);
    }
}
