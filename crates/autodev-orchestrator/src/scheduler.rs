use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Whether the scheduling loop is live. Only `start()`/`stop()` change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SystemState {
    Stopped,
    Running,
}

/// Owns the system state and the periodic tick loop.
///
/// The state is published through a `watch` channel; the loop listens on it
/// and exits as soon as it observes `Stopped`.
pub struct Scheduler {
    state_tx: watch::Sender<SystemState>,
    interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(SystemState::Stopped);
        Self {
            state_tx,
            interval,
            handle: Mutex::new(None),
        }
    }

    pub fn state(&self) -> SystemState {
        *self.state_tx.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SystemState::Running
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SystemState> {
        self.state_tx.subscribe()
    }

    /// Move to `next`. Returns false if already there.
    pub fn transition(&self, next: SystemState) -> bool {
        self.state_tx.send_if_modified(|state| {
            if *state == next {
                false
            } else {
                *state = next;
                true
            }
        })
    }

    /// Start the background loop. The first tick fires one interval from now.
    ///
    /// `tick` returns `false` when its owner is gone, which also ends the loop.
    pub fn spawn<F, Fut>(&self, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let mut state_rx = self.state_tx.subscribe();
        let period = self.interval;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval_ms = period.as_millis() as u64, "Scheduler loop started");

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if !tick().await {
                            debug!("Scheduler owner dropped, ending loop");
                            break;
                        }
                    }
                    changed = state_rx.changed() => {
                        if changed.is_err() || *state_rx.borrow() == SystemState::Stopped {
                            info!("Scheduler loop stopping");
                            break;
                        }
                    }
                }
            }
        });

        if let Some(previous) = self.handle.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Wait for the loop to exit. Callers set `Stopped` first.
    pub async fn halt(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(error = %e, "Scheduler loop ended abnormally");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_starts_stopped() {
        let scheduler = Scheduler::new(Duration::from_secs(1));
        assert_eq!(scheduler.state(), SystemState::Stopped);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_transition_reports_change() {
        let scheduler = Scheduler::new(Duration::from_secs(1));
        assert!(scheduler.transition(SystemState::Running));
        assert!(!scheduler.transition(SystemState::Running));
        assert!(scheduler.transition(SystemState::Stopped));
        assert!(!scheduler.transition(SystemState::Stopped));
    }

    #[tokio::test]
    async fn test_subscribers_observe_changes() {
        let scheduler = Scheduler::new(Duration::from_secs(1));
        let mut rx = scheduler.subscribe();
        scheduler.transition(SystemState::Running);
        rx.changed().await.ok();
        assert_eq!(*rx.borrow(), SystemState::Running);
    }

    #[tokio::test]
    async fn test_loop_ticks_until_stopped() {
        let scheduler = Scheduler::new(Duration::from_millis(10));
        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = ticks.clone();

        scheduler.transition(SystemState::Running);
        scheduler.spawn(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                true
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        scheduler.transition(SystemState::Stopped);
        scheduler.halt().await;

        let seen = ticks.load(Ordering::SeqCst);
        assert!(seen >= 1);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), seen);
    }

    #[tokio::test]
    async fn test_loop_ends_when_tick_declines() {
        let scheduler = Scheduler::new(Duration::from_millis(5));
        scheduler.transition(SystemState::Running);
        scheduler.spawn(|| async { false });
        tokio::time::timeout(Duration::from_secs(2), scheduler.halt())
            .await
            .ok();
        assert!(scheduler.handle.lock().is_none());
    }

    #[tokio::test]
    async fn test_halt_without_loop_is_noop() {
        let scheduler = Scheduler::new(Duration::from_secs(1));
        scheduler.halt().await;
        assert_eq!(scheduler.state(), SystemState::Stopped);
    }
}
