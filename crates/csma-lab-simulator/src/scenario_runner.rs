use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use csma_lab_abstract::{SimConfig, TestAssertion, TestScenario};
use tracing::info;

use crate::engine::Simulator;
use crate::log::TracingLogSink;
use crate::stats::SimulationSummary;
use crate::trace::SimulationReport;

pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    parse_scenario(&content)
}

pub fn parse_scenario(content: &str) -> Result<TestScenario> {
    toml::from_str(content).context("Failed to parse scenario file")
}

/// Load a scenario from disk, run it on top of the default configuration and
/// check its assertions.
pub fn run_scenario(path: &Path) -> Result<SimulationReport> {
    let scenario = load_scenario(path)?;
    run_test_scenario(&scenario, SimConfig::default())
}

pub fn run_test_scenario(scenario: &TestScenario, base: SimConfig) -> Result<SimulationReport> {
    let mut config = base;
    scenario.config.apply_to(&mut config);
    info!("Running scenario '{}': {}", scenario.name, scenario.description);

    let mut sim = Simulator::new(config)
        .with_context(|| format!("Scenario '{}' has an invalid configuration", scenario.name))?
        .with_log_sink(TracingLogSink);
    let summary = sim
        .run()
        .with_context(|| format!("Scenario '{}' aborted", scenario.name))?;

    check_assertions(&summary, &scenario.assertions)
        .with_context(|| format!("Scenario '{}' failed", scenario.name))?;
    info!(
        "Scenario '{}' passed {} assertion(s)",
        scenario.name,
        scenario.assertions.len()
    );
    Ok(sim.export_report())
}

/// Fail on the first assertion the summary does not satisfy.
pub fn check_assertions(summary: &SimulationSummary, assertions: &[TestAssertion]) -> Result<()> {
    for assertion in assertions {
        match *assertion {
            TestAssertion::MinThroughput { mbps } => {
                if summary.throughput_mbps < mbps {
                    bail!(
                        "throughput {:.3} Mb/s is below {mbps} Mb/s",
                        summary.throughput_mbps
                    );
                }
            }
            TestAssertion::MaxCollisions { count } => {
                if summary.collisions > count {
                    bail!("{} collisions exceed the limit of {count}", summary.collisions);
                }
            }
            TestAssertion::MaxDropped { count } => {
                if summary.frames_dropped > count {
                    bail!(
                        "{} dropped frames exceed the limit of {count}",
                        summary.frames_dropped
                    );
                }
            }
            TestAssertion::MinDeliveredPercent { percent } => {
                if summary.offered_load_delivered_pct < percent {
                    bail!(
                        "only {:.2}% of the offered load delivered, expected {percent}%",
                        summary.offered_load_delivered_pct
                    );
                }
            }
            TestAssertion::MaxAvgLatency { ms } => {
                if summary.avg_latency_ms > ms {
                    bail!(
                        "average latency {:.3} ms exceeds {ms} ms",
                        summary.avg_latency_ms
                    );
                }
            }
            TestAssertion::MaxDuration { seconds } => {
                if summary.duration_s > seconds {
                    bail!(
                        "simulation ran {:.6}s, longer than {seconds}s",
                        summary.duration_s
                    );
                }
            }
        }
    }
    Ok(())
}
