use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::info;

use csma_lab_abstract::{BusyPolicy, SimConfig, TestScenario, TrafficModel};
use csma_lab_simulator::scenario_runner::{check_assertions, load_scenario};
use csma_lab_simulator::{ProgressHandle, SimulationReport, Simulator, TracingLogSink};

#[derive(Parser, Debug)]
#[command(author, version, about = "CSMA/CD shared-medium simulator")]
struct Args {
    /// Load a scenario (config overrides + assertions) from disk.
    #[arg(long)]
    scenario: Option<PathBuf>,

    #[arg(long, default_value_t = 5)]
    nodes: usize,

    #[arg(long, default_value_t = 10.0)]
    bandwidth_mbps: f64,

    /// Aggregate offered load over all nodes.
    #[arg(long, default_value_t = 5.0)]
    load_mbps: f64,

    /// Simulation horizon in seconds.
    #[arg(long, default_value_t = 1.0)]
    horizon: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    #[arg(long, default_value_t = 1500)]
    frame_size: u32,

    /// Event grouping tolerance in seconds (derived from the slot time if unset).
    #[arg(long)]
    epsilon: Option<f64>,

    #[arg(long, value_enum, default_value_t = BusyPolicyArg::DeferToIdle)]
    busy_policy: BusyPolicyArg,

    /// Start every node with this many bytes queued instead of Poisson arrivals.
    #[arg(long)]
    saturated_bytes: Option<u64>,

    /// Write a JSON report of the finished simulation.
    #[arg(long)]
    report_out: Option<PathBuf>,

    /// Progress log interval in milliseconds; 0 disables progress output.
    #[arg(long, default_value_t = 200)]
    progress_ms: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BusyPolicyArg {
    DeferToIdle,
    SlotPoll,
}

impl From<BusyPolicyArg> for BusyPolicy {
    fn from(arg: BusyPolicyArg) -> Self {
        match arg {
            BusyPolicyArg::DeferToIdle => BusyPolicy::DeferToIdle,
            BusyPolicyArg::SlotPoll => BusyPolicy::SlotPoll,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt::init();
    info!("csma-lab-sim-cli starting…");

    let scenario = args.scenario.as_deref().map(load_scenario).transpose()?;
    let config = args.build_config(scenario.as_ref());

    let report = run_sim(config, args.progress_ms)?;
    log_summary(&report);

    if let Some(scenario) = &scenario {
        check_assertions(&report.summary, &scenario.assertions)
            .with_context(|| format!("Scenario '{}' failed", scenario.name))?;
        info!("Scenario '{}' passed", scenario.name);
    }

    if let Some(path) = &args.report_out {
        write_report(path, &report)?;
    }

    Ok(())
}

impl Args {
    /// Command-line values first, then the scenario's overrides on top.
    fn build_config(&self, scenario: Option<&TestScenario>) -> SimConfig {
        let mut config = SimConfig {
            seed: self.seed,
            frame_size_bytes: self.frame_size,
            epsilon: self.epsilon,
            busy_policy: self.busy_policy.into(),
            traffic: match self.saturated_bytes {
                Some(bytes_per_node) => TrafficModel::Saturated { bytes_per_node },
                None => TrafficModel::Poisson,
            },
            ..SimConfig::new(
                self.horizon,
                self.nodes,
                self.bandwidth_mbps,
                self.load_mbps,
            )
        };
        if let Some(scenario) = scenario {
            info!("Applying scenario '{}'", scenario.name);
            scenario.config.apply_to(&mut config);
        }
        config
    }
}

fn run_sim(config: SimConfig, progress_ms: u64) -> Result<SimulationReport> {
    let mut sim = Simulator::new(config)
        .context("Invalid simulation parameters")?
        .with_log_sink(TracingLogSink);

    if progress_ms == 0 {
        sim.run().context("Simulation aborted")?;
        return Ok(sim.export_report());
    }

    let progress = sim.progress();
    let done = AtomicBool::new(false);
    let interval = Duration::from_millis(progress_ms);

    std::thread::scope(|scope| {
        scope.spawn(|| report_progress(&progress, &done, interval));
        let outcome = sim.run();
        done.store(true, Ordering::Release);
        outcome
    })
    .context("Simulation aborted")?;

    Ok(sim.export_report())
}

fn report_progress(progress: &ProgressHandle, done: &AtomicBool, interval: Duration) {
    let mut last = 0;
    while !done.load(Ordering::Acquire) {
        std::thread::sleep(interval);
        let bytes = progress.bytes_received();
        if bytes != last {
            info!("Received {:.3} MB so far", bytes as f64 / 1e6);
            last = bytes;
        }
    }
}

fn log_summary(report: &SimulationReport) {
    let summary = &report.summary;
    info!(
        "Duration: {:.3} s | throughput: {:.3} Mb/s ({:.1}% of offered) | avg latency: {:.3} ms",
        summary.duration_s,
        summary.throughput_mbps,
        summary.offered_load_delivered_pct,
        summary.avg_latency_ms
    );
    info!(
        "Frames: {} generated, {} received ({:.3} MB), {} dropped, {} still queued | collisions: {} | retries: {}",
        summary.frames_generated,
        summary.frames_received,
        summary.bytes_received as f64 / 1e6,
        summary.frames_dropped,
        summary.frames_queued,
        summary.collisions,
        summary.total_retries
    );
}

fn write_report(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation report")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write report file {}", path.display()))?;
    Ok(())
}
