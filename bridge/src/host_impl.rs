//! State held in the wasmtime `Store` and the journal guest imports write to.
//!
//! The journal sits behind its own `Arc` so the host can read it without
//! taking the store lock, i.e. even while an execution context is live.

use std::sync::{Arc, Mutex, MutexGuard};

use callshim_hostapi::InstanceId;

/// Journal entries beyond this many are dropped.
pub const MAX_JOURNAL_ENTRIES: usize = 4096;

/// A log line emitted by the guest through `host.log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestLog {
    pub level: u32,
    pub message: String,
}

#[derive(Debug, Default)]
struct JournalInner {
    logs: Vec<GuestLog>,
    traces: Vec<u32>,
    dropped: u64,
}

/// Record of what the guest reported through host imports.
#[derive(Debug, Default)]
pub struct Journal {
    inner: Mutex<JournalInner>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, JournalInner> {
        // The journal holds plain data, so a poisoned lock is still usable.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push_log(&self, level: u32, message: String) {
        let mut inner = self.lock();
        if inner.logs.len() >= MAX_JOURNAL_ENTRIES {
            inner.dropped += 1;
            return;
        }
        inner.logs.push(GuestLog { level, message });
    }

    pub fn push_trace(&self, value: u32) {
        let mut inner = self.lock();
        if inner.traces.len() >= MAX_JOURNAL_ENTRIES {
            inner.dropped += 1;
            return;
        }
        inner.traces.push(value);
    }

    pub fn logs(&self) -> Vec<GuestLog> {
        self.lock().logs.clone()
    }

    /// Values passed to `host.trace`, in call order.
    pub fn traces(&self) -> Vec<u32> {
        self.lock().traces.clone()
    }

    /// Entries discarded because the journal was full.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }
}

/// Per-instance data stored in `Store<GuestState>`.
pub struct GuestState {
    pub instance: InstanceId,
    pub journal: Arc<Journal>,
    pub enable_guest_logs: bool,
}

impl GuestState {
    pub fn new(instance: InstanceId, journal: Arc<Journal>, enable_guest_logs: bool) -> Self {
        Self {
            instance,
            journal,
            enable_guest_logs,
        }
    }

    /// Record a guest log line, re-emitting it through `tracing` if enabled.
    pub fn add_log(&self, level: u32, message: String) {
        if self.enable_guest_logs {
            let instance = self.instance;
            match level {
                0 => tracing::error!(%instance, guest_message = %message, "guest log"),
                1 => tracing::warn!(%instance, guest_message = %message, "guest log"),
                2 => tracing::info!(%instance, guest_message = %message, "guest log"),
                3 => tracing::debug!(%instance, guest_message = %message, "guest log"),
                _ => tracing::trace!(%instance, guest_message = %message, "guest log"),
            }
        }
        self.journal.push_log(level, message);
    }

    pub fn add_trace(&self, value: u32) {
        tracing::trace!(instance = %self.instance, value, "guest trace");
        self.journal.push_trace(value);
    }
}
