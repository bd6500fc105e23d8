//! Periodic progress reporting

use crate::counters::{CounterSnapshot, RunCounters};
use crate::summary::rate;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::info;

/// Column headings matching [`ProgressLine`]'s display
pub const PROGRESS_HEADER: &str =
    "time,per. metric/s,metric total,overall metric/s,per. row/s,row total,overall row/s,backoff";

/// One progress report
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressLine {
    pub elapsed: Duration,
    pub metrics: u64,
    pub rows: u64,
    pub period_metrics_per_sec: f64,
    pub overall_metrics_per_sec: f64,
    pub period_rows_per_sec: f64,
    pub overall_rows_per_sec: f64,
    pub backoff: Duration,
    pub backing_off_workers: usize,
}

impl fmt::Display for ProgressLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.0},{:.2},{},{:.2},{:.2},{},{:.2},{:.2}s",
            self.elapsed.as_secs_f64(),
            self.period_metrics_per_sec,
            self.metrics,
            self.overall_metrics_per_sec,
            self.period_rows_per_sec,
            self.rows,
            self.overall_rows_per_sec,
            self.backoff.as_secs_f64()
        )
    }
}

/// Turns successive counter snapshots into per-period and overall rates
#[derive(Debug)]
pub struct ProgressTracker {
    start: Instant,
    last_at: Instant,
    last: CounterSnapshot,
}

impl ProgressTracker {
    pub fn new(start: Instant) -> Self {
        Self {
            start,
            last_at: start,
            last: CounterSnapshot::default(),
        }
    }

    pub fn tick(&mut self, snapshot: CounterSnapshot, now: Instant) -> ProgressLine {
        let period = now.saturating_duration_since(self.last_at);
        let elapsed = now.saturating_duration_since(self.start);

        let line = ProgressLine {
            elapsed,
            metrics: snapshot.metrics,
            rows: snapshot.rows,
            period_metrics_per_sec: rate(snapshot.metrics.saturating_sub(self.last.metrics), period),
            overall_metrics_per_sec: rate(snapshot.metrics, elapsed),
            period_rows_per_sec: rate(snapshot.rows.saturating_sub(self.last.rows), period),
            overall_rows_per_sec: rate(snapshot.rows, elapsed),
            backoff: snapshot.backoff,
            backing_off_workers: snapshot.backing_off_workers,
        };

        self.last = snapshot;
        self.last_at = now;
        line
    }
}

/// Background task logging a [`ProgressLine`] every period
#[derive(Debug)]
pub struct ProgressReporter {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl ProgressReporter {
    /// Start reporting; `None` when `period` is zero
    pub fn spawn(counters: Arc<RunCounters>, period: Duration) -> Option<Self> {
        if period.is_zero() {
            return None;
        }

        let (stop, mut stopped) = oneshot::channel();
        let handle = tokio::spawn(async move {
            let mut tracker = ProgressTracker::new(Instant::now());
            let mut ticks = interval(period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick fires immediately
            ticks.tick().await;

            info!("{}", PROGRESS_HEADER);
            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    at = ticks.tick() => {
                        let line = tracker.tick(counters.snapshot(), at);
                        info!(
                            backing_off_workers = line.backing_off_workers,
                            "{}", line
                        );
                    }
                }
            }
        });

        Some(Self { stop, handle })
    }

    pub async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tsbench_interfaces::BatchCounts;

    #[test]
    fn test_tick_rates() {
        let start = Instant::now();
        let mut tracker = ProgressTracker::new(start);

        let first = tracker.tick(
            CounterSnapshot { metrics: 1000, rows: 100, ..Default::default() },
            start + Duration::from_secs(10),
        );
        assert_eq!(first.period_metrics_per_sec, 100.0);
        assert_eq!(first.overall_metrics_per_sec, 100.0);
        assert_eq!(first.period_rows_per_sec, 10.0);

        let second = tracker.tick(
            CounterSnapshot { metrics: 4000, rows: 400, ..Default::default() },
            start + Duration::from_secs(20),
        );
        assert_eq!(second.period_metrics_per_sec, 300.0);
        assert_eq!(second.overall_metrics_per_sec, 200.0);
        assert_eq!(second.elapsed, Duration::from_secs(20));
    }

    #[test]
    fn test_display_columns() {
        let line = ProgressLine {
            elapsed: Duration::from_secs(10),
            metrics: 500,
            rows: 50,
            period_metrics_per_sec: 50.0,
            overall_metrics_per_sec: 50.0,
            period_rows_per_sec: 5.0,
            overall_rows_per_sec: 5.0,
            backoff: Duration::ZERO,
            backing_off_workers: 0,
        };
        assert_eq!(line.to_string(), "10,50.00,500,50.00,5.00,50,5.00,0.00s");
        assert_eq!(line.to_string().split(',').count(), PROGRESS_HEADER.split(',').count());
    }

    #[test]
    fn test_zero_period_disables_reporting() {
        let counters = Arc::new(RunCounters::new());
        // No runtime needed: nothing is spawned
        assert!(ProgressReporter::spawn(counters, Duration::ZERO).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reporter_stops() {
        let counters = Arc::new(RunCounters::new());
        counters.add(BatchCounts { metrics: 10, rows: 1 });
        let reporter = ProgressReporter::spawn(Arc::clone(&counters), Duration::from_secs(1)).unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        reporter.stop().await;
    }
}
