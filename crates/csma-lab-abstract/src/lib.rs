pub mod config;
pub mod interface;
pub mod scenario;

pub use interface::{LogLevel, LogSink, NoopLogSink};

pub use config::{BusyPolicy, SimConfig, TrafficModel};
pub use scenario::{SimConfigOverride, TestAssertion, TestScenario};
