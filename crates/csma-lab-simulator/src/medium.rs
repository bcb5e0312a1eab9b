use crate::error::SimError;
use crate::frame::FrameId;
use crate::node::NodeId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveTransmission {
    pub node: NodeId,
    pub frame: FrameId,
    pub ends_at: f64,
}

/// Single half-duplex channel shared by every node.
#[derive(Debug, Clone)]
pub struct SharedMedium {
    bandwidth_bps: f64,
    busy_until: f64,
    active: Option<ActiveTransmission>,
}

impl SharedMedium {
    pub fn new(bandwidth_bps: f64) -> Self {
        Self {
            bandwidth_bps,
            busy_until: 0.0,
            active: None,
        }
    }

    pub fn is_free(&self, now: f64) -> bool {
        now >= self.busy_until
    }

    pub fn busy_until(&self) -> f64 {
        self.busy_until
    }

    pub fn active(&self) -> Option<&ActiveTransmission> {
        self.active.as_ref()
    }

    pub fn transmission_time(&self, size_bytes: u32) -> f64 {
        f64::from(size_bytes) * 8.0 / self.bandwidth_bps
    }

    /// Occupy the channel for one frame and return its duration.
    ///
    /// Collisions are resolved before this is called, so an occupied medium
    /// here is a dispatch bug and is reported as [`SimError::MediumOccupied`].
    pub fn start_transmission(
        &mut self,
        now: f64,
        node: NodeId,
        frame: FrameId,
        size_bytes: u32,
    ) -> Result<f64, SimError> {
        if !self.is_free(now) || self.active.is_some() {
            return Err(SimError::MediumOccupied {
                node,
                frame,
                time: now,
                busy_until: self.busy_until,
            });
        }

        let duration = self.transmission_time(size_bytes);
        self.busy_until = now + duration;
        self.active = Some(ActiveTransmission {
            node,
            frame,
            ends_at: self.busy_until,
        });
        Ok(duration)
    }

    /// Release the channel held by `node`. Calling it again, or for a node that
    /// is not transmitting, changes nothing.
    pub fn end_transmission(&mut self, node: NodeId, now: f64) {
        match self.active {
            Some(active) if active.node == node => {
                self.active = None;
                // Grouping tolerance may dispatch the end marginally early.
                self.busy_until = self.busy_until.min(now);
            }
            _ => {}
        }
    }
}
