/// Severity attached to a trace line handed to a [`LogSink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Receiver for the simulator's trace lines (collisions, drops, transmission
/// start/end). A sink only observes; whatever it does must not influence the
/// simulation outcome.
pub trait LogSink: Send {
    fn log(&mut self, level: LogLevel, message: &str);
}

/// Sink that discards everything. The simulator's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogSink;

impl LogSink for NoopLogSink {
    fn log(&mut self, _level: LogLevel, _message: &str) {}
}
