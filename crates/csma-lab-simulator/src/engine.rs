use csma_lab_abstract::{LogLevel, LogSink, NoopLogSink, SimConfig, TrafficModel};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};
use tracing::{debug, info};

use crate::error::{ConfigError, SimError};
use crate::frame::{Frame, FrameId};
use crate::medium::SharedMedium;
use crate::node::{CollisionOutcome, MacTiming, Node, NodeId};
use crate::scheduler::{Event, EventKind, Scheduler};
use crate::stats::{ProgressHandle, SimulationSummary, StatisticsCollector};
use crate::trace::SimulationReport;

/// Latest slot (inclusive) at which a saturated node makes its first attempt.
const SATURATED_START_SLOTS: u64 = 10;

/// Check the parameters a run depends on.
pub fn validate_config(config: &SimConfig) -> Result<(), ConfigError> {
    if !(config.max_sim_time > 0.0 && config.max_sim_time.is_finite()) {
        return Err(ConfigError::Horizon(config.max_sim_time));
    }
    if config.num_nodes == 0 {
        return Err(ConfigError::NoNodes);
    }
    if !(config.bandwidth_mbps > 0.0 && config.bandwidth_mbps.is_finite()) {
        return Err(ConfigError::Bandwidth(config.bandwidth_mbps));
    }
    if !(config.offered_load_mbps >= 0.0 && config.offered_load_mbps.is_finite()) {
        return Err(ConfigError::OfferedLoad(config.offered_load_mbps));
    }
    if config.frame_size_bytes == 0 {
        return Err(ConfigError::FrameSize);
    }
    if let Some(epsilon) = config.epsilon
        && !(epsilon >= 0.0 && epsilon.is_finite())
    {
        return Err(ConfigError::Epsilon(epsilon));
    }
    Ok(())
}

/// Event-driven CSMA/CD simulation of `num_nodes` stations sharing one channel.
///
/// Each [`step`](Simulator::step) takes the earliest pending instant plus every
/// event within the grouping epsilon of it and resolves that batch as one
/// simultaneous occurrence: frame generation first, then transmission ends,
/// then carrier sensing and collision detection over all attempts.
pub struct Simulator {
    time: f64,
    config: SimConfig,
    timing: MacTiming,
    epsilon: f64,

    scheduler: Scheduler,
    nodes: Vec<Node>,
    medium: SharedMedium,
    stats: StatisticsCollector,

    rng: StdRng,
    arrivals: Option<Exp<f64>>,
    next_frame_id: u64,

    log_sink: Box<dyn LogSink>,
    initialized: bool,
    batches_processed: u64,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        validate_config(&config)?;

        let rate = config.per_node_arrival_rate();
        let arrivals = match config.traffic {
            TrafficModel::Poisson if rate > 0.0 => Exp::new(rate).ok(),
            _ => None,
        };

        Ok(Self {
            time: 0.0,
            timing: MacTiming::from_config(&config),
            epsilon: config.effective_epsilon(),
            scheduler: Scheduler::new(),
            nodes: (0..config.num_nodes).map(|i| Node::new(NodeId(i))).collect(),
            medium: SharedMedium::new(config.bandwidth_bps()),
            stats: StatisticsCollector::new(),
            rng: StdRng::seed_from_u64(config.seed),
            arrivals,
            next_frame_id: 0,
            log_sink: Box::new(NoopLogSink),
            initialized: false,
            batches_processed: 0,
            config,
        })
    }

    /// Route collision, drop and transmission trace lines to `sink`.
    pub fn with_log_sink(mut self, sink: impl LogSink + 'static) -> Self {
        self.log_sink = Box::new(sink);
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn current_time(&self) -> f64 {
        self.time
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn medium(&self) -> &SharedMedium {
        &self.medium
    }

    pub fn stats(&self) -> &StatisticsCollector {
        &self.stats
    }

    pub fn progress(&self) -> ProgressHandle {
        self.stats.progress()
    }

    pub fn frames_queued(&self) -> u64 {
        self.nodes.iter().map(|n| n.queue().len() as u64).sum()
    }

    pub fn peek_next_event_time(&self) -> Option<f64> {
        self.scheduler.peek_time()
    }

    pub fn remaining_events(&self) -> usize {
        self.scheduler.len()
    }

    pub fn batches_processed(&self) -> u64 {
        self.batches_processed
    }

    /// Schedule a frame arrival at `node`. Later arrivals follow the
    /// configured traffic model.
    pub fn schedule_generation(&mut self, node: usize, time: f64) {
        self.scheduler.schedule(
            time,
            EventKind::GenerateFrame {
                node: NodeId(node),
            },
        );
    }

    /// Seed the event queue from the traffic model. Runs once.
    pub fn init(&mut self) {
        if self.initialized {
            return;
        }
        self.initialized = true;

        match self.config.traffic {
            TrafficModel::Poisson => {
                for index in 0..self.nodes.len() {
                    if let Some(at) = self.next_arrival(0.0) {
                        self.schedule_generation(index, at);
                    }
                }
            }
            TrafficModel::Saturated { bytes_per_node } => {
                let per_node = bytes_per_node / u64::from(self.config.frame_size_bytes);
                for index in 0..self.nodes.len() {
                    for _ in 0..per_node {
                        let frame = self.new_frame();
                        self.nodes[index].generate_frame(frame);
                    }
                    if per_node > 0 {
                        let slots = self.rng.random_range(0..=SATURATED_START_SLOTS);
                        self.scheduler.schedule(
                            slots as f64 * self.timing.slot_time,
                            EventKind::TryTransmission {
                                node: NodeId(index),
                            },
                        );
                    }
                }
                info!(
                    "Saturated start: {} frames queued at each of {} nodes",
                    per_node,
                    self.nodes.len()
                );
            }
        }
    }

    /// Process the next batch of simultaneous events. Returns `Ok(false)` once
    /// the queue is empty or the next instant lies past the horizon.
    pub fn step(&mut self) -> Result<bool, SimError> {
        self.init();

        match self.scheduler.peek_time() {
            Some(next) if next <= self.config.max_sim_time => {}
            _ => return Ok(false),
        }
        let Some((now, batch)) = self.scheduler.pop_batch(self.epsilon) else {
            return Ok(false);
        };

        self.time = now;
        self.batches_processed += 1;
        debug!("Processing {} event(s) at {:.9}s", batch.len(), now);
        self.dispatch(batch)?;
        Ok(true)
    }

    pub fn run(&mut self) -> Result<SimulationSummary, SimError> {
        self.init();
        info!(
            "Simulating {} nodes on {} Mb/s with {} Mb/s offered for {}s",
            self.config.num_nodes,
            self.config.bandwidth_mbps,
            self.config.offered_load_mbps,
            self.config.max_sim_time
        );

        while self.step()? {}

        let summary = self.summary();
        info!(
            "Simulation finished at {:.6}s: {} frames delivered, {} collisions, {} dropped",
            summary.duration_s,
            summary.frames_received,
            summary.collisions,
            summary.frames_dropped
        );
        Ok(summary)
    }

    /// Statistics as of the current simulated time.
    pub fn summary(&self) -> SimulationSummary {
        self.stats
            .summary(self.time, self.offered_load_mbps(), self.frames_queued())
    }

    /// Load the run actually offered. A saturated backlog offers everything
    /// it preloaded over the elapsed time.
    fn offered_load_mbps(&self) -> f64 {
        match self.config.traffic {
            TrafficModel::Poisson => self.config.offered_load_mbps,
            TrafficModel::Saturated { .. } if self.time > 0.0 => {
                let bits = self.stats.frames_generated() as f64
                    * f64::from(self.config.frame_size_bytes)
                    * 8.0;
                bits / (self.time * 1e6)
            }
            TrafficModel::Saturated { .. } => 0.0,
        }
    }

    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            summary: self.summary(),
        }
    }

    fn dispatch(&mut self, batch: Vec<Event>) -> Result<(), SimError> {
        let mut ends = Vec::new();
        let mut attempts = Vec::new();

        // Generation only adds frames, so it is applied before anything else.
        for event in batch {
            match event.kind {
                EventKind::GenerateFrame { node } => self.on_generate(node),
                EventKind::EndTransmission { node, frame } => ends.push((node, frame)),
                EventKind::TryTransmission { .. } | EventKind::StartTransmission { .. } => {
                    attempts.push(event.kind)
                }
            }
        }

        for (node, frame) in ends {
            self.on_end(node, frame);
        }

        attempts.retain(|kind| self.is_live(kind));
        match attempts.as_slice() {
            [] => Ok(()),
            [EventKind::TryTransmission { node }] => {
                self.on_try(*node);
                Ok(())
            }
            [EventKind::StartTransmission { node, frame }] => self.on_start(*node, *frame),
            _ => {
                self.on_contention(&attempts);
                Ok(())
            }
        }
    }

    /// Whether an attempt still refers to something that exists. A start must
    /// still name the node's head frame.
    fn is_live(&mut self, kind: &EventKind) -> bool {
        let node = kind.node();
        let live = match (self.nodes.get(node.0), kind) {
            (Some(n), EventKind::StartTransmission { frame, .. }) => n.is_head(*frame),
            (Some(n), _) => n.head().is_some(),
            (None, _) => false,
        };
        if !live {
            self.emit(
                LogLevel::Trace,
                format!("node {node}: stale {kind:?} at {:.9}s skipped", self.time),
            );
        }
        live
    }

    fn on_generate(&mut self, node: NodeId) {
        if node.0 >= self.nodes.len() {
            return;
        }
        let frame = self.new_frame();
        if self.nodes[node.0].generate_frame(frame) {
            self.scheduler
                .schedule(self.time, EventKind::TryTransmission { node });
        }
        if let Some(at) = self.next_arrival(self.time) {
            self.scheduler
                .schedule(at, EventKind::GenerateFrame { node });
        }
    }

    fn on_end(&mut self, node: NodeId, frame: FrameId) {
        let now = self.time;
        let Some(station) = self.nodes.get_mut(node.0) else {
            return;
        };

        let delivered = station.complete(frame, now);
        let has_more = station.head().is_some();
        self.medium.end_transmission(node, now);

        match delivered {
            Some(frame) => {
                self.stats.record_received(&frame);
                self.emit(
                    LogLevel::Debug,
                    format!(
                        "node {node}: frame {} delivered at {now:.9}s after {} collision(s)",
                        frame.id, frame.retries
                    ),
                );
            }
            None => self.emit(
                LogLevel::Trace,
                format!("node {node}: frame {frame} already gone at end of transmission"),
            ),
        }

        if has_more {
            self.scheduler.schedule(
                now + self.timing.inter_frame_gap,
                EventKind::TryTransmission { node },
            );
        }
    }

    fn on_try(&mut self, node: NodeId) {
        let now = self.time;
        let station = &mut self.nodes[node.0];
        if !station.attempt_sense(now) {
            return;
        }

        if self.medium.is_free(now) {
            if let Some(head) = station.head() {
                let frame = head.id;
                self.scheduler
                    .schedule(now, EventKind::StartTransmission { node, frame });
            }
        } else {
            let at = station.handle_busy_retry(now, self.medium.busy_until(), &self.timing);
            self.scheduler
                .schedule(at, EventKind::TryTransmission { node });
        }
    }

    fn on_start(&mut self, node: NodeId, frame: FrameId) -> Result<(), SimError> {
        let now = self.time;
        if !self.medium.is_free(now) {
            // The channel was taken between sensing and starting.
            self.stats.record_collision();
            self.emit(
                LogLevel::Debug,
                format!("node {node}: frame {frame} collided on start at {now:.9}s"),
            );
            self.collide(node);
            return Ok(());
        }

        let station = &mut self.nodes[node.0];
        let Some(size_bytes) = station.head().map(|f| f.size_bytes) else {
            return Ok(());
        };
        let duration = self
            .medium
            .start_transmission(now, node, frame, size_bytes)?;
        station.begin_transmission();
        self.scheduler
            .schedule(now + duration, EventKind::EndTransmission { node, frame });
        self.emit(
            LogLevel::Debug,
            format!(
                "node {node}: frame {frame} transmitting {now:.9}s..{:.9}s",
                now + duration
            ),
        );
        Ok(())
    }

    /// Several attempts in one instant.
    fn on_contention(&mut self, attempts: &[EventKind]) {
        let now = self.time;
        let nodes: Vec<NodeId> = attempts.iter().map(EventKind::node).collect();

        if self.medium.is_free(now) {
            self.stats.record_collision();
            self.emit(
                LogLevel::Debug,
                format!("collision at {now:.9}s between nodes {nodes:?}"),
            );
            for &node in &nodes {
                self.nodes[node.0].attempt_sense(now);
                self.collide(node);
            }
            return;
        }

        // Busy channel: sensing nodes defer, nodes already cleared to start
        // have just missed it and collide.
        let mut missed = Vec::new();
        for kind in attempts {
            match *kind {
                EventKind::TryTransmission { node } => {
                    let station = &mut self.nodes[node.0];
                    station.attempt_sense(now);
                    let at =
                        station.handle_busy_retry(now, self.medium.busy_until(), &self.timing);
                    self.scheduler
                        .schedule(at, EventKind::TryTransmission { node });
                }
                EventKind::StartTransmission { node, .. } => missed.push(node),
                _ => {}
            }
        }
        if !missed.is_empty() {
            self.stats.record_collision();
            self.emit(
                LogLevel::Debug,
                format!("collision at {now:.9}s on busy medium for nodes {missed:?}"),
            );
            for node in missed {
                self.collide(node);
            }
        }
    }

    /// Run backoff for `node`'s head frame and schedule its next attempt.
    fn collide(&mut self, node: NodeId) {
        let now = self.time;
        let station = &mut self.nodes[node.0];
        let Some(outcome) = station.handle_collision(now, &self.timing, &mut self.rng) else {
            return;
        };

        match outcome {
            CollisionOutcome::Dropped(frame) => {
                let has_more = station.head().is_some();
                self.stats.record_drop();
                self.emit(
                    LogLevel::Info,
                    format!(
                        "node {node}: frame {} dropped after {} collisions at {now:.9}s",
                        frame.id, frame.retries
                    ),
                );
                if has_more {
                    self.scheduler.schedule(
                        now + self.timing.slot_time,
                        EventKind::TryTransmission { node },
                    );
                }
            }
            CollisionOutcome::Backoff { until, delay_slots } => {
                self.stats.record_retry();
                self.emit(
                    LogLevel::Trace,
                    format!("node {node}: backing off {delay_slots} slot(s) until {until:.9}s"),
                );
                self.scheduler
                    .schedule(until, EventKind::TryTransmission { node });
            }
        }
    }

    fn new_frame(&mut self) -> Frame {
        let id = FrameId(self.next_frame_id);
        self.next_frame_id += 1;
        self.stats.record_generated();
        Frame::new(id, self.config.frame_size_bytes, self.time)
    }

    /// Next Poisson arrival after `from`, or `None` past the horizon.
    fn next_arrival(&mut self, from: f64) -> Option<f64> {
        let gap = self.arrivals.as_ref()?.sample(&mut self.rng);
        let at = from + gap;
        (at <= self.config.max_sim_time).then_some(at)
    }

    fn emit(&mut self, level: LogLevel, message: String) {
        self.log_sink.log(level, &message);
    }
}
