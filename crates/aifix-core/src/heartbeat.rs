//! Liveness ticker for long-running test executions.
//!
//! A [`Heartbeat`] owns one background task that emits a `heartbeat`
//! progress event every interval until it is stopped, dropped, or the
//! elapsed time passes its limit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::events::{ProgressEvent, ProgressSink, ProgressStatus};

/// Default tick interval.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Handle to a running heartbeat task.
pub struct Heartbeat {
    stop_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl Heartbeat {
    /// Spawn the ticker. Must be called from within a tokio runtime.
    pub fn start(sink: Arc<dyn ProgressSink>, interval: Duration, limit: Duration) -> Self {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let interval = interval.max(Duration::from_millis(1));

        let handle = tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = interval_at(started + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        let elapsed = started.elapsed();
                        if elapsed > limit {
                            break;
                        }
                        let secs = elapsed.as_secs();
                        sink.emit(
                            ProgressEvent::new(
                                ProgressStatus::Heartbeat,
                                format!("Tests still running... ({secs}s elapsed)"),
                            )
                            .with_payload(serde_json::json!({ "elapsed_secs": secs })),
                        );
                    }
                }
            }
        });

        Self {
            stop_tx,
            handle: Some(handle),
        }
    }

    /// Signal the task and wait for it to finish.
    pub async fn stop(mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                tracing::debug!(error = %e, "heartbeat task ended abnormally");
            }
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::RecordingSink;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_until_stopped() {
        let sink = Arc::new(RecordingSink::new());
        let hb = Heartbeat::start(sink.clone(), Duration::from_secs(10), Duration::from_secs(120));

        tokio::time::sleep(Duration::from_secs(35)).await;
        hb.stop().await;

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert!(events
            .iter()
            .all(|e| e.status == ProgressStatus::Heartbeat));
        assert_eq!(events[0].message, "Tests still running... (10s elapsed)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_by_limit() {
        let sink = Arc::new(RecordingSink::new());
        let hb = Heartbeat::start(sink.clone(), Duration::from_secs(10), Duration::from_secs(25));

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(sink.events().len(), 2);
        hb.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_stops_ticker() {
        let sink = Arc::new(RecordingSink::new());
        let hb = Heartbeat::start(sink.clone(), Duration::from_secs(10), Duration::from_secs(120));
        tokio::time::sleep(Duration::from_secs(15)).await;
        drop(hb);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(sink.events().len(), 1);
    }
}
