use crate::config::{BusyPolicy, SimConfig, TrafficModel};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub config: SimConfigOverride,
    #[serde(default)]
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub max_sim_time: Option<f64>,
    pub num_nodes: Option<usize>,
    pub bandwidth_mbps: Option<f64>,
    pub offered_load_mbps: Option<f64>,
    pub frame_size_bytes: Option<u32>,
    pub seed: Option<u64>,
    pub epsilon: Option<f64>,
    pub busy_policy: Option<BusyPolicy>,
    pub traffic: Option<TrafficModel>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.max_sim_time {
            config.max_sim_time = v;
        }
        if let Some(v) = self.num_nodes {
            config.num_nodes = v;
        }
        if let Some(v) = self.bandwidth_mbps {
            config.bandwidth_mbps = v;
        }
        if let Some(v) = self.offered_load_mbps {
            config.offered_load_mbps = v;
        }
        if let Some(v) = self.frame_size_bytes {
            config.frame_size_bytes = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.epsilon {
            config.epsilon = Some(v);
        }
        if let Some(v) = self.busy_policy {
            config.busy_policy = v;
        }
        if let Some(v) = self.traffic {
            config.traffic = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Realized throughput must reach at least this rate
    MinThroughput { mbps: f64 },
    /// Number of collision events must not exceed `count`
    MaxCollisions { count: u64 },
    /// Number of dropped frames must not exceed `count`
    MaxDropped { count: u64 },
    /// Share of the offered load actually delivered, in percent
    MinDeliveredPercent { percent: f64 },
    /// Average frame latency upper bound
    MaxAvgLatency { ms: f64 },
    /// Assert that simulation finishes within time
    MaxDuration { seconds: f64 },
}
