use serde::{Deserialize, Serialize};

/// What a node does when it senses the channel busy (not a collision).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BusyPolicy {
    /// Re-sense once the current transmission ends plus one inter-frame gap.
    #[default]
    DeferToIdle,
    /// Re-sense one slot time later, regardless of when the channel frees.
    SlotPoll,
}

/// How frames enter the node queues.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrafficModel {
    /// Independent per-node Poisson arrivals driven by the offered load.
    #[default]
    Poisson,
    /// Every node starts with a fixed backlog and generates nothing afterwards.
    Saturated { bytes_per_node: u64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Simulation horizon in seconds.
    pub max_sim_time: f64,
    pub num_nodes: usize,
    pub bandwidth_mbps: f64,
    /// Aggregate frame generation rate over all nodes.
    pub offered_load_mbps: f64,
    pub frame_size_bytes: u32,
    pub seed: u64,
    /// Tolerance used to group events into one instant. `None` derives it
    /// from the slot time.
    pub epsilon: Option<f64>,
    pub busy_policy: BusyPolicy,
    pub traffic: TrafficModel,
}

impl SimConfig {
    pub fn new(
        max_sim_time: f64,
        num_nodes: usize,
        bandwidth_mbps: f64,
        offered_load_mbps: f64,
    ) -> Self {
        Self {
            max_sim_time,
            num_nodes,
            bandwidth_mbps,
            offered_load_mbps,
            ..Default::default()
        }
    }

    pub fn bandwidth_bps(&self) -> f64 {
        self.bandwidth_mbps * 1e6
    }

    pub fn offered_load_bps(&self) -> f64 {
        self.offered_load_mbps * 1e6
    }

    /// Minimum collision window: 512 bit times.
    pub fn slot_time(&self) -> f64 {
        512.0 / self.bandwidth_bps()
    }

    /// Idle gap of 96 bit times a node observes after a transmission.
    pub fn inter_frame_gap(&self) -> f64 {
        96.0 / self.bandwidth_bps()
    }

    pub fn effective_epsilon(&self) -> f64 {
        self.epsilon
            .unwrap_or_else(|| f64::max(1e-9, self.slot_time() * 1e-6))
    }

    /// Poisson arrival rate (frames per second) of a single node.
    pub fn per_node_arrival_rate(&self) -> f64 {
        let frame_bits = f64::from(self.frame_size_bytes) * 8.0;
        (self.offered_load_bps() / frame_bits) / self.num_nodes as f64
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_sim_time: 1.0,
            num_nodes: 5,
            bandwidth_mbps: 10.0,
            offered_load_mbps: 5.0,
            frame_size_bytes: 1500,
            seed: 0,
            epsilon: None,
            busy_policy: BusyPolicy::default(),
            traffic: TrafficModel::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timing_follows_bandwidth() {
        let config = SimConfig::new(1.0, 2, 10.0, 1.0);
        assert!((config.slot_time() - 51.2e-6).abs() < 1e-12);
        assert!((config.inter_frame_gap() - 9.6e-6).abs() < 1e-12);
        assert_eq!(config.effective_epsilon(), 1e-9);
    }

    #[test]
    fn explicit_epsilon_wins() {
        let config = SimConfig {
            epsilon: Some(0.0),
            ..Default::default()
        };
        assert_eq!(config.effective_epsilon(), 0.0);
    }

    #[test]
    fn arrival_rate_is_split_across_nodes() {
        // 12 Mb/s of 1500-byte frames is 1000 frames/s in total.
        let config = SimConfig::new(1.0, 4, 100.0, 12.0);
        assert!((config.per_node_arrival_rate() - 250.0).abs() < 1e-9);
    }
}
