use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameId(pub u64);

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A unit of data queued at a node. Owned by that node until it is delivered
/// or dropped.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub id: FrameId,
    pub size_bytes: u32,
    pub generation_time: f64,
    /// Set on the first carrier sense for this frame.
    pub first_attempt_time: Option<f64>,
    pub received_time: Option<f64>,
    /// Collisions suffered so far.
    pub retries: u32,
}

impl Frame {
    pub fn new(id: FrameId, size_bytes: u32, generation_time: f64) -> Self {
        Self {
            id,
            size_bytes,
            generation_time,
            first_attempt_time: None,
            received_time: None,
            retries: 0,
        }
    }

    /// Time from the first sensing attempt until delivery, once both are known.
    pub fn latency(&self) -> Option<f64> {
        match (self.first_attempt_time, self.received_time) {
            (Some(first), Some(received)) => Some(received - first),
            _ => None,
        }
    }
}
