//! Fleet monitor (§4.I, optional): polls the durable-queue backlog and
//! worker telemetry, keeps a bounded throughput history, reports progress.
//!
//! The stats model mirrors `es_translator/monitor.py`'s `MonitorStats`
//! dataclass; the `rich`/`plotext` terminal UI itself is out of scope
//! (§1), so rendering here is an `indicatif` progress line instead of a
//! full TUI — the pack's own convention for terminal progress reporting
//! (`estuary-flow`).

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

use crate::tasks::TaskBridge;

pub struct MonitorStats {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub pending_tasks: u64,
    pub active_tasks: u64,
    pub failed_tasks: u64,
    pub workers: usize,
    pub worker_last_processed: HashMap<String, u64>,
    pub throughput_history: VecDeque<f64>,
    pub peak_throughput: f64,
    last_completed_count: u64,
    last_check_time: Instant,
    start_time: Instant,
    initial_pending: u64,
}

impl MonitorStats {
    fn new(history_len: usize) -> Self {
        let now = Instant::now();
        Self {
            total_tasks: 0,
            completed_tasks: 0,
            pending_tasks: 0,
            active_tasks: 0,
            failed_tasks: 0,
            workers: 0,
            worker_last_processed: HashMap::new(),
            throughput_history: VecDeque::with_capacity(history_len),
            peak_throughput: 0.0,
            last_completed_count: 0,
            last_check_time: now,
            start_time: now,
            initial_pending: 0,
        }
    }
}

/// One sample of worker telemetry, supplied by the caller on each poll.
pub struct WorkerSample {
    pub worker_id: String,
    pub processed: u64,
}

pub struct FleetMonitor {
    refresh_interval: Duration,
    history_len: usize,
    stats: MonitorStats,
    first_sample: bool,
    bar: ProgressBar,
}

impl FleetMonitor {
    pub fn new(refresh_interval: Duration, history_duration: Duration) -> Self {
        let history_len = ((history_duration.as_secs_f64() / refresh_interval.as_secs_f64())
            .max(1.0)) as usize;
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner} {msg} [{elapsed_precise}] {pos}/{len} ({per_sec})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self {
            refresh_interval,
            history_len,
            stats: MonitorStats::new(history_len),
            first_sample: true,
            bar,
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Updates the stats model from one poll. `completed_tasks` is a
    /// monotonically increasing counter; the first sample establishes the
    /// baseline so the initial throughput reading is zero rather than a
    /// spike from historical counters.
    pub fn sample(&mut self, completed_tasks: u64, pending_tasks: u64, workers: &[WorkerSample]) {
        let now = Instant::now();
        self.stats.pending_tasks = pending_tasks;
        self.stats.workers = workers.len();
        for w in workers {
            self.stats
                .worker_last_processed
                .insert(w.worker_id.clone(), w.processed);
        }

        if self.first_sample {
            self.stats.last_completed_count = completed_tasks;
            self.stats.initial_pending = pending_tasks;
            self.stats.total_tasks = completed_tasks + pending_tasks;
            self.first_sample = false;
            self.stats.last_check_time = now;
            return;
        }

        let elapsed = now.duration_since(self.stats.last_check_time).as_secs_f64();
        let delta = completed_tasks.saturating_sub(self.stats.last_completed_count);
        let throughput = if elapsed > 0.0 {
            delta as f64 / elapsed
        } else {
            0.0
        };

        if self.stats.throughput_history.len() >= self.history_len {
            self.stats.throughput_history.pop_front();
        }
        self.stats.throughput_history.push_back(throughput);
        self.stats.peak_throughput = self.stats.peak_throughput.max(throughput);

        self.stats.completed_tasks = completed_tasks;
        self.stats.last_completed_count = completed_tasks;
        self.stats.last_check_time = now;

        self.bar.set_length(self.stats.total_tasks.max(completed_tasks + pending_tasks));
        self.bar.set_position(completed_tasks);
        self.bar.set_message(format!(
            "{:.2} docs/s (peak {:.2})",
            throughput, self.stats.peak_throughput
        ));
    }

    pub fn average_throughput(&self) -> f64 {
        if self.stats.throughput_history.is_empty() {
            return 0.0;
        }
        self.stats.throughput_history.iter().sum::<f64>() / self.stats.throughput_history.len() as f64
    }

    pub fn eta(&self) -> Option<Duration> {
        let avg = self.average_throughput();
        if avg <= 0.0 {
            return None;
        }
        Some(Duration::from_secs_f64(self.stats.pending_tasks as f64 / avg))
    }

    pub fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("done");
    }
}

/// Polls `bridge`'s backlog length on `monitor.refresh_interval()` until
/// `should_stop` returns true. Completed-task count is derived from the
/// drop in backlog since the first sample, since a standalone monitor
/// process has no direct line to per-worker telemetry; a deployment that
/// wires workers to report their own counters can call
/// [`FleetMonitor::sample`] directly instead.
pub async fn run_loop<F>(mut monitor: FleetMonitor, bridge: &TaskBridge, mut should_stop: F) -> anyhow::Result<()>
where
    F: FnMut() -> bool,
{
    let mut completed = 0u64;
    let mut baseline: Option<u64> = None;
    while !should_stop() {
        let pending = bridge.backlog_len().await? as u64;
        if let Some(base) = baseline {
            completed = base.saturating_sub(pending).max(completed);
        } else {
            baseline = Some(pending);
        }
        monitor.sample(completed, pending, &[]);
        tokio::time::sleep(monitor.refresh_interval()).await;
    }
    monitor.finish();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_establishes_baseline_not_spike() {
        let mut monitor = FleetMonitor::new(Duration::from_millis(1), Duration::from_millis(60));
        monitor.sample(1000, 5, &[]);
        assert_eq!(monitor.stats().completed_tasks, 0);
        assert!(monitor.stats().throughput_history.is_empty());
    }

    #[test]
    fn history_is_bounded() {
        let mut monitor = FleetMonitor::new(Duration::from_millis(1), Duration::from_millis(5));
        monitor.sample(0, 0, &[]);
        for i in 1..50u64 {
            monitor.sample(i, 0, &[]);
        }
        assert!(monitor.stats().throughput_history.len() <= 5);
    }
}
