//! End-to-end runs of the CSMA/CD simulator.
//!
//! These cover the properties a run must hold regardless of load: frame
//! conservation, retry bounds, determinism for a fixed seed, and the
//! boundary scenarios (single station, silent network, forced collision).

use std::sync::atomic::{AtomicBool, Ordering};

use csma_lab_abstract::{BusyPolicy, SimConfig, TrafficModel};
use csma_lab_simulator::node::RETRY_LIMIT;
use csma_lab_simulator::{MemoryLogSink, Simulator, TracingLogSink};
use tracing_test::traced_test;

fn assert_invariants(sim: &Simulator) {
    let stats = sim.stats();
    assert_eq!(
        stats.frames_received() + stats.frames_dropped() + sim.frames_queued(),
        stats.frames_generated(),
        "frame conservation broken at {}s",
        sim.current_time()
    );
    for node in sim.nodes() {
        for frame in node.queue() {
            assert!(frame.retries <= RETRY_LIMIT, "{frame:?} outlived its retries");
            if let Some(first) = frame.first_attempt_time {
                assert!(first >= frame.generation_time, "{frame:?}");
            }
        }
    }
    assert!(stats.latencies().iter().all(|&l| l > 0.0));
}

fn run_checked(config: SimConfig) -> Simulator {
    let mut sim = Simulator::new(config).unwrap();
    while sim.step().unwrap() {
        assert_invariants(&sim);
    }
    sim
}

#[test]
fn single_station_never_collides() {
    let sim = run_checked(SimConfig {
        seed: 3,
        ..SimConfig::new(0.5, 1, 10.0, 5.0)
    });
    let stats = sim.stats();
    assert!(stats.frames_generated() > 0);
    assert!(stats.frames_received() > 0);
    assert_eq!(stats.collisions(), 0);
    assert_eq!(stats.frames_dropped(), 0);
    assert_eq!(stats.retries(), 0);
}

#[test]
fn single_station_drains_its_backlog() {
    let mut sim = Simulator::new(SimConfig::new(1.0, 1, 10.0, 0.0)).unwrap();
    // Arrivals faster than the 1.2 ms frame time build a queue.
    for i in 0..20 {
        sim.schedule_generation(0, i as f64 * 1e-3);
    }
    let summary = sim.run().unwrap();
    assert_eq!(summary.frames_generated, 20);
    assert_eq!(summary.frames_received, 20);
    assert_eq!(summary.frames_queued, 0);
    assert_eq!(summary.collisions, 0);
    assert!(summary.avg_latency_ms > 0.0);
}

#[test]
fn forced_simultaneous_attempts_collide_once() {
    let mut sim = Simulator::new(SimConfig::new(1.0, 2, 10.0, 0.0)).unwrap();
    let t0 = 0.125;
    sim.schedule_generation(0, t0);
    sim.schedule_generation(1, t0);

    while sim.stats().collisions() == 0 {
        assert!(sim.step().unwrap(), "queue ran dry before the collision");
    }
    assert_eq!(sim.current_time(), t0);
    assert_eq!(sim.stats().collisions(), 1);
    for node in sim.nodes() {
        assert_eq!(node.retries(), 1);
        assert_eq!(node.head().unwrap().first_attempt_time, Some(t0));
    }

    let summary = sim.run().unwrap();
    assert_eq!(summary.frames_received + summary.frames_dropped, 2);
}

#[test]
fn zero_offered_load_generates_nothing() {
    let mut sim = Simulator::new(SimConfig::new(10.0, 8, 100.0, 0.0)).unwrap();
    let summary = sim.run().unwrap();
    assert_eq!(summary.frames_generated, 0);
    assert_eq!(summary.throughput_mbps, 0.0);
    assert_eq!(summary.collisions, 0);
    assert_eq!(summary.frames_dropped, 0);
    assert_eq!(summary.duration_s, 0.0);
    assert_eq!(sim.batches_processed(), 0);
}

#[test]
fn same_seed_gives_identical_summaries() {
    let config = SimConfig {
        seed: 42,
        ..SimConfig::new(0.2, 10, 10.0, 8.0)
    };
    let first = Simulator::new(config.clone()).unwrap().run().unwrap();
    let second = Simulator::new(config).unwrap().run().unwrap();
    assert_eq!(first, second);
    assert!(first.frames_received > 0);
}

#[test]
fn log_sink_does_not_change_results() {
    let config = SimConfig {
        seed: 5,
        ..SimConfig::new(0.1, 6, 10.0, 9.0)
    };
    let sink = MemoryLogSink::new();
    let logged = Simulator::new(config.clone())
        .unwrap()
        .with_log_sink(sink.clone())
        .run()
        .unwrap();
    let silent = Simulator::new(config).unwrap().run().unwrap();
    assert_eq!(logged, silent);
    assert!(sink.contains("transmitting"));
}

#[test]
fn overloaded_poisson_network_keeps_invariants() {
    let sim = run_checked(SimConfig {
        seed: 9,
        ..SimConfig::new(0.2, 8, 10.0, 20.0)
    });
    let summary = sim.summary();
    assert!(summary.throughput_mbps <= 10.0 + 1e-6);
    assert!(summary.frames_queued > 0);
}

#[test]
fn saturated_contention_collides_and_keeps_invariants() {
    for busy_policy in [BusyPolicy::DeferToIdle, BusyPolicy::SlotPoll] {
        let sim = run_checked(SimConfig {
            seed: 17,
            busy_policy,
            traffic: TrafficModel::Saturated {
                bytes_per_node: 30_000,
            },
            ..SimConfig::new(1.0, 20, 10.0, 0.0)
        });
        let summary = sim.summary();
        assert_eq!(summary.frames_generated, 400);
        assert!(summary.frames_received > 0);
        if busy_policy == BusyPolicy::DeferToIdle {
            // Every deferring station re-senses at the same idle instant.
            assert!(summary.collisions > 0);
        }
    }
}

#[test]
fn grouping_epsilon_decides_simultaneity() {
    let run_with = |epsilon: f64| {
        let mut sim = Simulator::new(SimConfig {
            epsilon: Some(epsilon),
            ..SimConfig::new(1.0, 2, 10.0, 0.0)
        })
        .unwrap();
        sim.schedule_generation(0, 0.0);
        sim.schedule_generation(1, 5e-5);
        sim.run().unwrap()
    };

    assert_eq!(run_with(0.0).collisions, 0);
    assert!(run_with(1e-4).collisions >= 1);
}

#[test]
fn progress_is_readable_from_another_thread() {
    let mut sim = Simulator::new(SimConfig {
        seed: 1,
        ..SimConfig::new(0.5, 4, 10.0, 6.0)
    })
    .unwrap();
    let progress = sim.progress();
    let done = AtomicBool::new(false);

    let summary = std::thread::scope(|scope| {
        let reader = scope.spawn(|| {
            let mut last = 0;
            while !done.load(Ordering::Acquire) {
                let now = progress.bytes_received();
                assert!(now >= last);
                last = now;
                std::thread::yield_now();
            }
        });
        let summary = sim.run().unwrap();
        done.store(true, Ordering::Release);
        reader.join().unwrap();
        summary
    });

    assert_eq!(progress.bytes_received(), summary.bytes_received);
}

#[test]
fn independent_simulators_run_concurrently() {
    let config = SimConfig {
        seed: 77,
        ..SimConfig::new(0.1, 5, 10.0, 7.0)
    };
    let handles: Vec<_> = (0..3)
        .map(|_| {
            let config = config.clone();
            std::thread::spawn(move || Simulator::new(config).unwrap().run().unwrap())
        })
        .collect();
    let summaries: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(summaries.windows(2).all(|w| w[0] == w[1]));
}

#[traced_test]
#[test]
fn tracing_sink_reports_collisions() {
    let mut sim = Simulator::new(SimConfig::new(1.0, 3, 10.0, 0.0))
        .unwrap()
        .with_log_sink(TracingLogSink);
    for node in 0..3 {
        sim.schedule_generation(node, 0.0);
    }
    let summary = sim.run().unwrap();
    assert!(summary.collisions >= 1);
    assert!(logs_contain("collision at"));
    assert!(logs_contain("delivered"));
}
