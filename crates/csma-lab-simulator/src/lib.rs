pub mod engine;
pub mod error;
pub mod frame;
pub mod log;
pub mod medium;
pub mod node;
pub mod scenario_runner;
pub mod scheduler;
pub mod stats;
pub mod trace;

pub use engine::{Simulator, validate_config};
pub use error::{ConfigError, SimError};
pub use frame::{Frame, FrameId};
pub use log::{MemoryLogSink, TracingLogSink};
pub use medium::SharedMedium;
pub use node::{CollisionOutcome, MacState, Node, NodeId};
pub use stats::{ProgressHandle, SimulationSummary, StatisticsCollector};
pub use trace::SimulationReport;
