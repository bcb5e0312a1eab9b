use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::frame::FrameId;
use crate::node::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    GenerateFrame { node: NodeId },
    TryTransmission { node: NodeId },
    StartTransmission { node: NodeId, frame: FrameId },
    EndTransmission { node: NodeId, frame: FrameId },
}

impl EventKind {
    pub fn node(&self) -> NodeId {
        match *self {
            EventKind::GenerateFrame { node }
            | EventKind::TryTransmission { node }
            | EventKind::StartTransmission { node, .. }
            | EventKind::EndTransmission { node, .. } => node,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Event {
    pub time: f64,
    pub kind: EventKind,
    seq: u64, // Insertion order breaks ties at equal times
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison: smallest time is Greater in BinaryHeap
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Time-ordered event queue that hands events out in batches of
/// near-simultaneous occurrences.
#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<Event>,
    next_seq: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, time: f64, kind: EventKind) {
        debug_assert!(time.is_finite(), "event scheduled at {time}");
        self.queue.push(Event {
            time,
            kind,
            seq: self.next_seq,
        });
        self.next_seq += 1;
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.queue.peek().map(|e| e.time)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Remove the earliest instant `t` together with every event due within
    /// `[t, t + epsilon]`, in time then insertion order.
    pub fn pop_batch(&mut self, epsilon: f64) -> Option<(f64, Vec<Event>)> {
        let first = self.queue.pop()?;
        let now = first.time;
        let mut batch = vec![first];
        while self
            .queue
            .peek()
            .is_some_and(|next| next.time - now <= epsilon)
        {
            if let Some(event) = self.queue.pop() {
                batch.push(event);
            }
        }
        Some((now, batch))
    }
}
