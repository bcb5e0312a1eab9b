use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::frame::Frame;

/// Read-only view of the received-bytes counter, safe to poll from another
/// thread while the simulator runs.
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    bytes_received: Arc<AtomicU64>,
}

impl ProgressHandle {
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received.load(Ordering::Relaxed)
    }
}

/// Aggregate results of one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationSummary {
    pub duration_s: f64,
    pub throughput_mbps: f64,
    /// Delivered throughput as a share of the offered load, in percent.
    pub offered_load_delivered_pct: f64,
    pub avg_latency_ms: f64,
    pub collisions: u64,
    pub frames_dropped: u64,
    pub frames_generated: u64,
    pub frames_received: u64,
    pub frames_queued: u64,
    pub bytes_received: u64,
    pub total_retries: u64,
    pub avg_retries_per_frame: f64,
}

#[derive(Debug, Default)]
pub struct StatisticsCollector {
    progress: ProgressHandle,
    frames_generated: u64,
    frames_received: u64,
    collisions: u64,
    retries: u64,
    frames_dropped: u64,
    latencies: Vec<f64>,
}

impl StatisticsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    pub fn record_generated(&mut self) {
        self.frames_generated += 1;
    }

    /// Count a delivered frame. Its latency sample is taken when both the
    /// first attempt and reception times are known.
    pub fn record_received(&mut self, frame: &Frame) {
        self.frames_received += 1;
        self.progress
            .bytes_received
            .fetch_add(u64::from(frame.size_bytes), Ordering::Relaxed);
        if let Some(latency) = frame.latency() {
            self.latencies.push(latency);
        }
    }

    pub fn record_collision(&mut self) {
        self.collisions += 1;
    }

    pub fn record_retry(&mut self) {
        self.retries += 1;
    }

    pub fn record_drop(&mut self) {
        self.frames_dropped += 1;
    }

    pub fn frames_generated(&self) -> u64 {
        self.frames_generated
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn collisions(&self) -> u64 {
        self.collisions
    }

    pub fn retries(&self) -> u64 {
        self.retries
    }

    pub fn bytes_received(&self) -> u64 {
        self.progress.bytes_received()
    }

    pub fn latencies(&self) -> &[f64] {
        &self.latencies
    }

    pub fn summary(
        &self,
        duration_s: f64,
        offered_load_mbps: f64,
        frames_queued: u64,
    ) -> SimulationSummary {
        let bytes_received = self.bytes_received();
        let throughput_mbps = if duration_s > 0.0 {
            (bytes_received as f64 * 8.0) / (duration_s * 1e6)
        } else {
            0.0
        };
        let offered_load_delivered_pct = if offered_load_mbps > 0.0 {
            throughput_mbps / offered_load_mbps * 100.0
        } else {
            0.0
        };
        let avg_latency_ms = if self.latencies.is_empty() {
            0.0
        } else {
            self.latencies.iter().sum::<f64>() / self.latencies.len() as f64 * 1e3
        };
        let finished = self.frames_received + self.frames_dropped;
        let avg_retries_per_frame = if finished > 0 {
            self.retries as f64 / finished as f64
        } else {
            0.0
        };

        SimulationSummary {
            duration_s,
            throughput_mbps,
            offered_load_delivered_pct,
            avg_latency_ms,
            collisions: self.collisions,
            frames_dropped: self.frames_dropped,
            frames_generated: self.frames_generated,
            frames_received: self.frames_received,
            frames_queued,
            bytes_received,
            total_retries: self.retries,
            avg_retries_per_frame,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FrameId;

    fn delivered(id: u64, first: f64, received: f64) -> Frame {
        let mut frame = Frame::new(FrameId(id), 1500, first);
        frame.first_attempt_time = Some(first);
        frame.received_time = Some(received);
        frame
    }

    #[test]
    fn summary_of_empty_run_is_zero() {
        let stats = StatisticsCollector::new();
        let summary = stats.summary(0.0, 0.0, 0);
        assert_eq!(summary.throughput_mbps, 0.0);
        assert_eq!(summary.avg_latency_ms, 0.0);
        assert_eq!(summary.offered_load_delivered_pct, 0.0);
        assert_eq!(summary.collisions, 0);
    }

    #[test]
    fn summary_derives_rates() {
        let mut stats = StatisticsCollector::new();
        for id in 0..3 {
            stats.record_generated();
            stats.record_received(&delivered(id, 0.0, 0.002));
        }
        stats.record_collision();
        stats.record_retry();
        stats.record_retry();

        // 4500 bytes in 0.01 s is 3.6 Mb/s.
        let summary = stats.summary(0.01, 7.2, 0);
        assert!((summary.throughput_mbps - 3.6).abs() < 1e-9);
        assert!((summary.offered_load_delivered_pct - 50.0).abs() < 1e-9);
        assert!((summary.avg_latency_ms - 2.0).abs() < 1e-9);
        assert!((summary.avg_retries_per_frame - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(summary.bytes_received, 4500);
    }

    #[test]
    fn progress_handle_tracks_received_bytes() {
        let mut stats = StatisticsCollector::new();
        let progress = stats.progress();
        assert_eq!(progress.bytes_received(), 0);

        stats.record_received(&delivered(0, 0.0, 1.0));
        let reader = std::thread::spawn(move || progress.bytes_received());
        assert_eq!(reader.join().unwrap(), 1500);
    }
}
