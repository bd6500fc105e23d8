//! Backoff accounting
//!
//! Each worker reports "backing off" / "not backing off" events over a
//! bounded channel to an observer task. The observer turns rising and falling
//! edges into backoff periods and sums them up; the total is reported when the
//! worker closes.

use log::info;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Capacity of the per-worker event channel
pub const BACKOFF_CHANNEL_CAPACITY: usize = 100;

/// Time a worker spent backing off, reported when it closes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffSummary {
    pub worker: usize,
    #[serde(with = "humantime_serde")]
    pub total: Duration,
    /// Number of distinct backing-off periods
    pub episodes: u64,
}

/// One state report from a worker
#[derive(Debug, Clone, Copy)]
pub struct BackoffEvent {
    pub backing_off: bool,
    pub at: Instant,
}

/// Sending half handed to whoever performs the resends
#[derive(Debug, Clone)]
pub struct BackoffSender {
    worker: usize,
    tx: mpsc::Sender<BackoffEvent>,
}

impl BackoffSender {
    pub fn worker(&self) -> usize {
        self.worker
    }

    /// Report the current state, waiting if the observer is behind
    pub async fn send(&self, backing_off: bool) {
        let event = BackoffEvent {
            backing_off,
            at: Instant::now(),
        };
        // The observer only goes away once every sender is dropped
        let _ = self.tx.send(event).await;
    }
}

#[derive(Debug, Default)]
struct GaugeState {
    completed: Duration,
    open: HashMap<usize, Instant>,
}

/// Live, run-wide view of backoff time across all workers
///
/// Includes periods still in progress, so the total keeps growing while a
/// worker is stuck backing off.
#[derive(Debug, Default)]
pub struct BackoffGauge {
    state: Mutex<GaugeState>,
}

impl BackoffGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backoff time so far, never decreasing
    pub fn total(&self) -> Duration {
        let state = self.state.lock();
        let now = Instant::now();
        state
            .open
            .values()
            .fold(state.completed, |acc, start| acc + now.saturating_duration_since(*start))
    }

    /// Number of workers currently backing off
    pub fn backing_off(&self) -> usize {
        self.state.lock().open.len()
    }

    fn open(&self, worker: usize) {
        self.state.lock().open.entry(worker).or_insert_with(Instant::now);
    }

    fn close(&self, worker: usize) {
        let mut state = self.state.lock();
        if let Some(start) = state.open.remove(&worker) {
            state.completed += Instant::now().saturating_duration_since(start);
        }
    }
}

/// Observer task for one worker's backoff events
#[derive(Debug)]
pub struct BackoffTracker {
    sender: BackoffSender,
    handle: JoinHandle<BackoffSummary>,
}

impl BackoffTracker {
    /// Start observing backoff events for `worker`
    pub fn spawn(worker: usize, gauge: Option<Arc<BackoffGauge>>) -> Self {
        let (tx, rx) = mpsc::channel(BACKOFF_CHANNEL_CAPACITY);
        let handle = tokio::spawn(observe(worker, rx, gauge));
        Self {
            sender: BackoffSender { worker, tx },
            handle,
        }
    }

    pub fn sender(&self) -> BackoffSender {
        self.sender.clone()
    }

    /// Stop observing and return the worker's totals
    ///
    /// Every sender obtained from [`sender`](Self::sender) must be dropped
    /// first, otherwise this waits forever.
    pub async fn finish(self) -> BackoffSummary {
        let worker = self.sender.worker;
        drop(self.sender);
        match self.handle.await {
            Ok(summary) => summary,
            Err(e) => {
                log::error!("[worker {}] backoff observer failed: {}", worker, e);
                BackoffSummary {
                    worker,
                    ..Default::default()
                }
            }
        }
    }
}

async fn observe(
    worker: usize,
    mut events: mpsc::Receiver<BackoffEvent>,
    gauge: Option<Arc<BackoffGauge>>,
) -> BackoffSummary {
    let mut summary = BackoffSummary {
        worker,
        ..Default::default()
    };
    let mut started: Option<Instant> = None;

    while let Some(event) = events.recv().await {
        match (event.backing_off, started) {
            (true, None) => {
                started = Some(event.at);
                if let Some(gauge) = &gauge {
                    gauge.open(worker);
                }
            }
            (false, Some(start)) => {
                let took = event.at.saturating_duration_since(start);
                info!("[worker {}] backoff took {:.2}sec", worker, took.as_secs_f64());
                summary.total += took;
                summary.episodes += 1;
                started = None;
                if let Some(gauge) = &gauge {
                    gauge.close(worker);
                }
            }
            _ => {}
        }
    }

    // Channel closed while still backing off, e.g. the run was cancelled
    if let Some(start) = started {
        summary.total += Instant::now().saturating_duration_since(start);
        summary.episodes += 1;
        if let Some(gauge) = &gauge {
            gauge.close(worker);
        }
    }

    info!(
        "[worker {}] backoffs took a total of {:.6}sec of runtime",
        worker,
        summary.total.as_secs_f64()
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_falling_edges_accumulate() {
        let tracker = BackoffTracker::spawn(0, None);
        let sender = tracker.sender();

        sender.send(true).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        sender.send(true).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        sender.send(false).await;

        sender.send(false).await;
        sender.send(true).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        sender.send(false).await;

        drop(sender);
        let summary = tracker.finish().await;
        assert_eq!(summary.worker, 0);
        assert_eq!(summary.episodes, 2);
        assert_eq!(summary.total, Duration::from_millis(250));
    }

    #[test]
    fn test_summary_serializes_durations() {
        let summary = BackoffSummary {
            worker: 1,
            total: Duration::from_millis(1500),
            episodes: 2,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["total"], "1s 500ms");
        assert_eq!(json["episodes"], 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_backoff_reports_zero() {
        let tracker = BackoffTracker::spawn(3, None);
        let sender = tracker.sender();
        sender.send(false).await;
        sender.send(false).await;
        drop(sender);

        let summary = tracker.finish().await;
        assert_eq!(summary.worker, 3);
        assert_eq!(summary.episodes, 0);
        assert_eq!(summary.total, Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gauge_counts_open_periods() {
        let gauge = Arc::new(BackoffGauge::new());
        let tracker = BackoffTracker::spawn(1, Some(gauge.clone()));
        let sender = tracker.sender();

        sender.send(true).await;
        // Let the observer pick the event up
        tokio::task::yield_now().await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gauge.backing_off(), 1);

        let first = gauge.total();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = gauge.total();
        assert!(second > first);

        sender.send(false).await;
        drop(sender);
        let summary = tracker.finish().await;
        assert_eq!(gauge.backing_off(), 0);
        assert!(gauge.total() >= second);
        assert_eq!(summary.total, Duration::from_millis(40));
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_period_closed_on_finish() {
        let tracker = BackoffTracker::spawn(2, None);
        let sender = tracker.sender();
        sender.send(true).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(sender);

        let summary = tracker.finish().await;
        assert_eq!(summary.episodes, 1);
        assert!(summary.total >= Duration::from_millis(20));
    }
}
