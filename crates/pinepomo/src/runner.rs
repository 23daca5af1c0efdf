//! Session runner
//!
//! The orchestrator that sits between a [`Timer`] and the outside world: it
//! drives `tick()` on a fixed cadence, applies user controls as they arrive,
//! and saves every state-changing transition through a [`StoragePort`].
//! Tick events are not persisted; the stored record only changes on
//! start/pause/resume/complete/cancel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::events::Subscription;
use crate::session::{StartOptions, TimerEventType, TimerSession};
use crate::shared::Timer;
use crate::storage::{StoragePort, StorageResult};

/// User actions a runner accepts while a session is live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Pause,
    Resume,
    Cancel,
    Complete,
}

impl Control {
    /// Parse a one-letter (or spelled out) interactive command
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "p" | "pause" => Some(Control::Pause),
            "r" | "resume" => Some(Control::Resume),
            "c" | "cancel" | "q" | "quit" => Some(Control::Cancel),
            "d" | "done" | "complete" => Some(Control::Complete),
            _ => None,
        }
    }

    fn apply(self, timer: &Timer) -> Option<TimerEventType> {
        match self {
            Control::Pause => timer.pause(),
            Control::Resume => timer.resume(),
            Control::Cancel => timer.cancel(),
            Control::Complete => timer.complete(),
        }
    }
}

/// Drives one session of a shared timer to a terminal state
pub struct Runner<S> {
    timer: Arc<Timer>,
    storage: Arc<S>,
    period: Duration,
}

impl<S: StoragePort> Runner<S> {
    pub fn new(timer: Arc<Timer>, storage: Arc<S>) -> Self {
        Self {
            timer,
            storage,
            period: Duration::from_secs(1),
        }
    }

    /// Time between ticks (one second unless overridden)
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    /// Start a session and run it until it completes or is cancelled.
    ///
    /// If the timer is already running, the existing session is driven
    /// instead. Returns the final session record, or `None` when there was
    /// nothing to run.
    pub async fn run(
        &self,
        options: StartOptions,
        mut controls: mpsc::UnboundedReceiver<Control>,
    ) -> StorageResult<Option<TimerSession>> {
        let (tx, mut pending) = mpsc::unbounded_channel::<TimerSession>();
        let subscriptions = self.persist_transitions(tx);

        let result = self.drive(options, &mut controls, &mut pending).await;

        for subscription in subscriptions {
            subscription.unsubscribe();
        }
        result
    }

    async fn drive(
        &self,
        options: StartOptions,
        controls: &mut mpsc::UnboundedReceiver<Control>,
        pending: &mut mpsc::UnboundedReceiver<TimerSession>,
    ) -> StorageResult<Option<TimerSession>> {
        self.timer.start(options);
        self.flush(pending).await?;

        let mut ticker = time::interval_at(Instant::now() + self.period, self.period);
        // Missed ticks are caught up so the countdown tracks wall time
        ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
        let mut controls_open = true;

        loop {
            match self.timer.snapshot().session {
                Some(ref session) if session.is_live() => {}
                _ => break,
            }

            tokio::select! {
                _ = ticker.tick() => {
                    self.timer.tick();
                }
                control = controls.recv(), if controls_open => match control {
                    Some(control) => {
                        if control.apply(&self.timer).is_none() {
                            debug!(?control, "control ignored in current state");
                        }
                    }
                    None => controls_open = false,
                },
            }

            self.flush(pending).await?;
        }

        Ok(self.timer.snapshot().session)
    }

    fn persist_transitions(&self, tx: mpsc::UnboundedSender<TimerSession>) -> Vec<Subscription> {
        TimerEventType::ALL
            .into_iter()
            .filter(|kind| *kind != TimerEventType::Tick)
            .map(|kind| {
                let tx = tx.clone();
                self.timer.events().on(kind, move |event| {
                    tx.send(event.session.clone())
                        .map_err(|_| anyhow::anyhow!("session runner stopped"))
                })
            })
            .collect()
    }

    async fn flush(&self, pending: &mut mpsc::UnboundedReceiver<TimerSession>) -> StorageResult<()> {
        while let Ok(session) = pending.try_recv() {
            self.storage.save_session(&session).await?;
            info!(id = %session.id, status = session.status.as_str(), "session saved");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{TimerConfig, TimerStatus};
    use crate::storage::MemoryStorage;
    use pinepomo_core::StaticDeviceIdentity;

    fn runner() -> (Runner<MemoryStorage>, Arc<Timer>, Arc<MemoryStorage>) {
        let timer = Arc::new(Timer::new(
            Arc::new(StaticDeviceIdentity("runner".to_string())),
            TimerConfig::default(),
        ));
        let storage = Arc::new(MemoryStorage::new());
        let runner = Runner::new(Arc::clone(&timer), Arc::clone(&storage))
            .with_period(Duration::from_millis(1));
        (runner, timer, storage)
    }

    #[test]
    fn test_control_parse() {
        assert_eq!(Control::parse("p"), Some(Control::Pause));
        assert_eq!(Control::parse(" Resume \n"), Some(Control::Resume));
        assert_eq!(Control::parse("q"), Some(Control::Cancel));
        assert_eq!(Control::parse("done"), Some(Control::Complete));
        assert_eq!(Control::parse("x"), None);
    }

    #[tokio::test]
    async fn test_runs_to_completion() {
        let (runner, timer, storage) = runner();
        let (_tx, rx) = mpsc::unbounded_channel();

        let session = runner
            .run(StartOptions::work().with_duration(1).with_task("write"), rx)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(session.status, TimerStatus::Completed);
        assert!(session.ended_at.is_some());
        assert_eq!(timer.snapshot().remaining_seconds, 0);

        let stored = storage.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(stored, session);
        for kind in TimerEventType::ALL {
            assert_eq!(timer.events().listener_count(kind), 0);
        }
    }

    #[tokio::test]
    async fn test_cancel_control() {
        let (runner, _timer, storage) = runner();
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(Control::Pause).unwrap();
        tx.send(Control::Complete).unwrap();
        tx.send(Control::Cancel).unwrap();

        let session = runner
            .run(StartOptions::work(), rx)
            .await
            .unwrap()
            .unwrap();

        // Complete is ignored while paused, so cancel wins
        assert_eq!(session.status, TimerStatus::Cancelled);
        let current = storage.get_current_session().await.unwrap();
        assert!(current.is_none());
        let stored = storage.get_session(&session.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TimerStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_closed_controls_keep_ticking() {
        let (runner, _timer, _storage) = runner();
        let (tx, rx) = mpsc::unbounded_channel();
        drop(tx);

        let session = runner
            .run(StartOptions::work().with_duration(1), rx)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.status, TimerStatus::Completed);
    }
}
