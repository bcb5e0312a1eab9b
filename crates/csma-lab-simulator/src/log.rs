use std::sync::{Arc, Mutex, MutexGuard};

use csma_lab_abstract::{LogLevel, LogSink};
use tracing::{debug, error, info, trace, warn};

/// Forwards simulator trace lines to the `tracing` subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn log(&mut self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Trace => trace!(target: "csma_lab::mac", "{message}"),
            LogLevel::Debug => debug!(target: "csma_lab::mac", "{message}"),
            LogLevel::Info => info!(target: "csma_lab::mac", "{message}"),
            LogLevel::Warn => warn!(target: "csma_lab::mac", "{message}"),
            LogLevel::Error => error!(target: "csma_lab::mac", "{message}"),
        }
    }
}

/// Keeps trace lines in a shared buffer; clones see the same lines.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogSink {
    lines: Arc<Mutex<Vec<(LogLevel, String)>>>,
    capacity: Option<usize>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the most recent `capacity` lines.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            lines: Arc::default(),
            capacity: Some(capacity),
        }
    }

    pub fn lines(&self) -> Vec<(LogLevel, String)> {
        self.guard().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.guard().iter().any(|(_, line)| line.contains(needle))
    }

    fn guard(&self) -> MutexGuard<'_, Vec<(LogLevel, String)>> {
        self.lines.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LogSink for MemoryLogSink {
    fn log(&mut self, level: LogLevel, message: &str) {
        let capacity = self.capacity;
        let mut lines = self.guard();
        lines.push((level, message.to_string()));
        if let Some(cap) = capacity
            && lines.len() > cap
        {
            let excess = lines.len() - cap;
            lines.drain(..excess);
        }
    }
}
