//! Thread-safe timer handle
//!
//! Wires a [`TimerMachine`] to a [`TimerEventEmitter`]. Every action runs
//! under one lock and queues its event there, so the queue holds events in
//! the order the actions took effect. Events are delivered outside that lock
//! by one thread at a time, draining the queue front to back. A thread that
//! finds delivery already in progress (another thread, or a listener firing
//! an action on this one) leaves its event to the thread delivering.
//! No-op actions queue nothing.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use pinepomo_core::DeviceIdentity;

use crate::events::TimerEventEmitter;
use crate::session::{StartOptions, TimerConfig, TimerConfigPatch, TimerEventType, TimerSession};
use crate::timer::{TimerMachine, TimerState};

/// A timer instance shared between a tick driver and user input
pub struct Timer {
    inner: Mutex<Inner>,
    delivering: Mutex<()>,
    events: TimerEventEmitter,
}

struct Inner {
    machine: TimerMachine,
    pending: VecDeque<PendingEvent>,
}

struct PendingEvent {
    kind: TimerEventType,
    session: TimerSession,
    remaining_seconds: u32,
}

impl Timer {
    pub fn new(device: Arc<dyn DeviceIdentity>, config: TimerConfig) -> Self {
        Self::from_machine(TimerMachine::with_config(device, config))
    }

    pub fn from_machine(machine: TimerMachine) -> Self {
        Self {
            inner: Mutex::new(Inner {
                machine,
                pending: VecDeque::new(),
            }),
            delivering: Mutex::new(()),
            events: TimerEventEmitter::new(),
        }
    }

    /// The emitter observers subscribe to
    pub fn events(&self) -> &TimerEventEmitter {
        &self.events
    }

    pub fn snapshot(&self) -> TimerState {
        self.lock().machine.snapshot()
    }

    pub fn start(&self, options: StartOptions) -> Option<TimerEventType> {
        self.dispatch(|m| m.start(options))
    }

    pub fn pause(&self) -> Option<TimerEventType> {
        self.dispatch(TimerMachine::pause)
    }

    pub fn resume(&self) -> Option<TimerEventType> {
        self.dispatch(TimerMachine::resume)
    }

    pub fn cancel(&self) -> Option<TimerEventType> {
        self.dispatch(TimerMachine::cancel)
    }

    pub fn complete(&self) -> Option<TimerEventType> {
        self.dispatch(TimerMachine::complete)
    }

    pub fn tick(&self) -> Option<TimerEventType> {
        self.dispatch(TimerMachine::tick)
    }

    pub fn reset(&self) {
        self.lock().machine.reset();
    }

    /// Merge a partial config and return the result
    pub fn set_config(&self, patch: &TimerConfigPatch) -> TimerConfig {
        let mut inner = self.lock();
        inner.machine.set_config(patch);
        *inner.machine.config()
    }

    fn dispatch<F>(&self, action: F) -> Option<TimerEventType>
    where
        F: FnOnce(&mut TimerMachine) -> Option<TimerEventType>,
    {
        let kind = {
            let mut inner = self.lock();
            let kind = action(&mut inner.machine)?;
            let session = inner.machine.session()?.clone();
            let remaining_seconds = inner.machine.remaining_seconds();
            inner.pending.push_back(PendingEvent {
                kind,
                session,
                remaining_seconds,
            });
            kind
        };

        self.deliver();
        Some(kind)
    }

    fn deliver(&self) {
        loop {
            let delivering = match self.delivering.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };

            loop {
                let Some(event) = self.lock().pending.pop_front() else {
                    break;
                };
                self.events
                    .publish(event.kind, &event.session, event.remaining_seconds);
            }
            drop(delivering);

            // An action may have queued after the last pop but before the
            // delivery lock was released, and seen it still held
            let idle = self.lock().pending.is_empty();
            if idle {
                return;
            }
        }
    }

    // Actions are single synchronous mutations, so a lock poisoned by a
    // panicking caller still guards a consistent machine.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{TimerEvent, TimerStatus};
    use pinepomo_core::StaticDeviceIdentity;
    use std::thread;

    fn timer() -> Timer {
        Timer::new(
            Arc::new(StaticDeviceIdentity("shared".to_string())),
            TimerConfig::default(),
        )
    }

    fn record_all(timer: &Timer) -> Arc<Mutex<Vec<(TimerEventType, u32)>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        for kind in TimerEventType::ALL {
            let log = Arc::clone(&log);
            timer.events().on(kind, move |event: &TimerEvent| {
                log.lock().unwrap().push((event.kind, event.remaining_seconds));
                Ok(())
            });
        }
        log
    }

    #[test]
    fn test_actions_publish_events() {
        let timer = timer();
        let log = record_all(&timer);

        timer.start(StartOptions::work().with_duration(1));
        timer.tick();
        timer.pause();
        timer.resume();
        timer.cancel();

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (TimerEventType::Started, 60),
                (TimerEventType::Tick, 59),
                (TimerEventType::Paused, 59),
                (TimerEventType::Resumed, 59),
                (TimerEventType::Cancelled, 59),
            ]
        );
    }

    #[test]
    fn test_noops_publish_nothing() {
        let timer = timer();
        let log = record_all(&timer);

        assert_eq!(timer.pause(), None);
        assert_eq!(timer.tick(), None);
        timer.start(StartOptions::work());
        assert_eq!(timer.start(StartOptions::work()), None);
        assert_eq!(timer.resume(), None);
        timer.pause();
        assert_eq!(timer.complete(), None);
        assert_eq!(timer.tick(), None);

        assert_eq!(
            *log.lock().unwrap(),
            vec![(TimerEventType::Started, 1500), (TimerEventType::Paused, 1500)]
        );
    }

    #[test]
    fn test_final_tick_publishes_completed() {
        let timer = timer();
        let log = record_all(&timer);
        timer.start(StartOptions::work().with_duration(1));
        for _ in 0..60 {
            timer.tick();
        }

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 61);
        assert_eq!(log.last(), Some(&(TimerEventType::Completed, 0)));
        assert_eq!(timer.snapshot().status(), TimerStatus::Completed);
    }

    #[test]
    fn test_listener_can_read_timer_state() {
        let timer = Arc::new(timer());
        let seen = Arc::new(Mutex::new(None));

        let observer = Arc::clone(&timer);
        let sink = Arc::clone(&seen);
        timer.events().on(TimerEventType::Paused, move |_| {
            *sink.lock().unwrap() = Some(observer.snapshot().status());
            Ok(())
        });

        timer.start(StartOptions::work());
        timer.pause();
        assert_eq!(*seen.lock().unwrap(), Some(TimerStatus::Paused));
        timer.events().clear();
    }

    #[test]
    fn test_reset_and_config() {
        let timer = timer();
        let config = timer.set_config(&TimerConfigPatch {
            daily_goal: Some(12),
            ..Default::default()
        });
        assert_eq!(config.daily_goal, 12);

        timer.start(StartOptions::work());
        timer.reset();
        let state = timer.snapshot();
        assert!(state.session.is_none());
        assert_eq!(state.remaining_seconds, 0);
        assert_eq!(state.config.daily_goal, 12);
    }

    #[test]
    fn test_listener_may_drive_the_timer() {
        let timer = Arc::new(timer());
        let log = record_all(&timer);

        let handle = Arc::clone(&timer);
        timer.events().on(TimerEventType::Paused, move |_| {
            handle.resume();
            Ok(())
        });

        timer.start(StartOptions::work().with_duration(1));
        assert_eq!(timer.pause(), Some(TimerEventType::Paused));

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (TimerEventType::Started, 60),
                (TimerEventType::Paused, 60),
                (TimerEventType::Resumed, 60),
            ]
        );
        assert_eq!(timer.snapshot().status(), TimerStatus::Running);
        timer.events().clear();
    }

    #[test]
    fn test_concurrent_ticks_publish_in_order() {
        let timer = Arc::new(timer());
        let log = record_all(&timer);
        timer.start(StartOptions::work().with_duration(1));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let timer = Arc::clone(&timer);
                thread::spawn(move || {
                    for _ in 0..25 {
                        timer.tick();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let mut expected = vec![(TimerEventType::Started, 60)];
        expected.extend((1..60).rev().map(|n| (TimerEventType::Tick, n)));
        expected.push((TimerEventType::Completed, 0));
        assert_eq!(*log.lock().unwrap(), expected);
        assert_eq!(timer.snapshot().status(), TimerStatus::Completed);
    }

    #[test]
    fn test_concurrent_ticks_serialize() {
        let timer = Arc::new(timer());
        timer.start(StartOptions::work().with_duration(2));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let timer = Arc::clone(&timer);
                thread::spawn(move || {
                    for _ in 0..25 {
                        timer.tick();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let state = timer.snapshot();
        assert_eq!(state.remaining_seconds, 20);
        assert_eq!(state.status(), TimerStatus::Running);
    }
}
