use thiserror::Error;

use crate::node::NodeId;
use crate::frame::FrameId;

/// Rejected simulator parameters. The simulation never starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("simulation horizon must be positive and finite, got {0}")]
    Horizon(f64),
    #[error("node count must be positive")]
    NoNodes,
    #[error("bandwidth must be positive and finite, got {0} Mb/s")]
    Bandwidth(f64),
    #[error("offered load must be non-negative and finite, got {0} Mb/s")]
    OfferedLoad(f64),
    #[error("frame size must be positive")]
    FrameSize,
    #[error("grouping epsilon must be non-negative and finite, got {0}")]
    Epsilon(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    /// A transmission was started on an occupied medium. Collision detection
    /// must have ruled this out, so the dispatch loop itself is broken.
    #[error(
        "node {node} started frame {frame} at {time}s while the medium is busy until {busy_until}s"
    )]
    MediumOccupied {
        node: NodeId,
        frame: FrameId,
        time: f64,
        busy_until: f64,
    },
}
