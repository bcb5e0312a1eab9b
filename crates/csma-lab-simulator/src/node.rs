use std::collections::VecDeque;
use std::fmt;

use csma_lab_abstract::{BusyPolicy, SimConfig};
use rand::Rng;

use crate::frame::{Frame, FrameId};

/// Collisions a frame may survive; the next one drops it (16 attempts total).
pub const RETRY_LIMIT: u32 = 15;
/// Exponent cap of the truncated binary exponential backoff window.
pub const BACKOFF_EXPONENT_CAP: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacState {
    /// Nothing queued.
    Idle,
    /// Head frame waits for (or performs) a carrier sense.
    Sensing,
    Transmitting,
    /// Waiting out a post-collision backoff.
    BackingOff,
}

/// Channel timing a node needs to schedule its own retries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacTiming {
    pub slot_time: f64,
    pub inter_frame_gap: f64,
    pub busy_policy: BusyPolicy,
}

impl MacTiming {
    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            slot_time: config.slot_time(),
            inter_frame_gap: config.inter_frame_gap(),
            busy_policy: config.busy_policy,
        }
    }
}

/// Result of a collision for the node's head frame.
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionOutcome {
    /// The frame hit the retry limit and left the queue.
    Dropped(Frame),
    /// Retry no earlier than `until`.
    Backoff { until: f64, delay_slots: u64 },
}

/// A station: a FIFO of its own frames plus CSMA/CD state for the head frame.
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    queue: VecDeque<Frame>,
    retries: u32,
    backoff_deadline: f64,
    state: MacState,
}

impl Node {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            queue: VecDeque::new(),
            retries: 0,
            backoff_deadline: 0.0,
            state: MacState::Idle,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn queue(&self) -> &VecDeque<Frame> {
        &self.queue
    }

    pub fn head(&self) -> Option<&Frame> {
        self.queue.front()
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn backoff_deadline(&self) -> f64 {
        self.backoff_deadline
    }

    pub fn state(&self) -> MacState {
        self.state
    }

    /// Whether `frame` is the one currently eligible for transmission.
    pub fn is_head(&self, frame: FrameId) -> bool {
        self.head().is_some_and(|f| f.id == frame)
    }

    /// Append a freshly generated frame. Returns true if it is now the only
    /// queued frame, i.e. nothing else will trigger an attempt for it.
    pub fn generate_frame(&mut self, frame: Frame) -> bool {
        self.queue.push_back(frame);
        if self.state == MacState::Idle {
            self.state = MacState::Sensing;
        }
        self.queue.len() == 1
    }

    /// Carrier sense for the head frame. Returns false when nothing is queued.
    pub fn attempt_sense(&mut self, now: f64) -> bool {
        let Some(head) = self.queue.front_mut() else {
            self.state = MacState::Idle;
            return false;
        };
        head.first_attempt_time.get_or_insert(now);
        self.state = MacState::Sensing;
        true
    }

    pub fn begin_transmission(&mut self) {
        self.state = MacState::Transmitting;
    }

    /// Truncated binary exponential backoff after a collision of the head frame.
    /// Returns `None` when nothing is queued.
    pub fn handle_collision<R: Rng + ?Sized>(
        &mut self,
        now: f64,
        timing: &MacTiming,
        rng: &mut R,
    ) -> Option<CollisionOutcome> {
        let head = self.queue.front_mut()?;
        self.retries += 1;
        head.retries = self.retries;

        if self.retries > RETRY_LIMIT {
            let dropped = self.queue.pop_front()?;
            self.reset_contention();
            return Some(CollisionOutcome::Dropped(dropped));
        }

        let k = self.retries.min(BACKOFF_EXPONENT_CAP);
        let delay_slots = rng.random_range(0..=(1u64 << k) - 1);
        self.backoff_deadline = now + delay_slots as f64 * timing.slot_time;
        self.state = MacState::BackingOff;
        Some(CollisionOutcome::Backoff {
            until: self.backoff_deadline,
            delay_slots,
        })
    }

    /// Next sensing time when the channel is merely occupied. The retry counter
    /// and backoff window are left alone.
    pub fn handle_busy_retry(&mut self, now: f64, busy_until: f64, timing: &MacTiming) -> f64 {
        self.state = MacState::Sensing;
        match timing.busy_policy {
            BusyPolicy::DeferToIdle => busy_until.max(now) + timing.inter_frame_gap,
            BusyPolicy::SlotPoll => now + timing.slot_time,
        }
    }

    /// Remove a successfully transmitted frame. Returns `None` if the frame is
    /// no longer queued; contention state is reset either way.
    pub fn complete(&mut self, frame: FrameId, now: f64) -> Option<Frame> {
        let delivered = self
            .queue
            .iter()
            .position(|f| f.id == frame)
            .and_then(|pos| self.queue.remove(pos))
            .map(|mut f| {
                f.received_time = Some(now);
                f
            });
        self.reset_contention();
        delivered
    }

    fn reset_contention(&mut self) {
        self.retries = 0;
        self.backoff_deadline = 0.0;
        self.state = if self.queue.is_empty() {
            MacState::Idle
        } else {
            MacState::Sensing
        };
    }
}
