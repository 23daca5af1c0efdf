//! Session state machine
//!
//! Owns zero or one session plus the countdown. Every action either performs
//! its transition or is a silent no-op when its precondition does not hold,
//! so callers can fire actions speculatively. Actions report the event kind
//! that an orchestrator should publish, or `None` when nothing changed.
//!
//! ```text
//! idle ──start──▶ running ──pause──▶ paused
//!                  │  ▲ ◀──resume───┘   │
//!                  │  └─tick (n > 1)    │
//!   complete/tick(n ≤ 1)     cancel ◀───┘
//!                  ▼                    ▼
//!              completed            cancelled
//! ```

use std::sync::Arc;

use pinepomo_core::DeviceIdentity;
use tracing::debug;

use crate::session::{
    StartOptions, TimerConfig, TimerConfigPatch, TimerEventType, TimerSession, TimerStatus,
    MAX_DURATION_MINS,
};

/// Runtime timer state (never persisted as a whole)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerState {
    pub session: Option<TimerSession>,
    pub config: TimerConfig,
    pub remaining_seconds: u32,
}

impl TimerState {
    /// Status of the current session, `Idle` when there is none
    pub fn status(&self) -> TimerStatus {
        self.session
            .as_ref()
            .map(|s| s.status)
            .unwrap_or(TimerStatus::Idle)
    }
}

/// The timer state machine
pub struct TimerMachine {
    state: TimerState,
    device: Arc<dyn DeviceIdentity>,
}

impl TimerMachine {
    /// Create an idle machine with default configuration
    pub fn new(device: Arc<dyn DeviceIdentity>) -> Self {
        Self::with_config(device, TimerConfig::default())
    }

    /// Create an idle machine with the given configuration.
    ///
    /// Zero or oversized fields are replaced, see [`TimerConfig::normalized`].
    pub fn with_config(device: Arc<dyn DeviceIdentity>, config: TimerConfig) -> Self {
        Self {
            state: TimerState {
                config: config.normalized(),
                ..TimerState::default()
            },
            device,
        }
    }

    pub fn state(&self) -> &TimerState {
        &self.state
    }

    /// Owned copy of the current state
    pub fn snapshot(&self) -> TimerState {
        self.state.clone()
    }

    pub fn status(&self) -> TimerStatus {
        self.state.status()
    }

    pub fn session(&self) -> Option<&TimerSession> {
        self.state.session.as_ref()
    }

    pub fn config(&self) -> &TimerConfig {
        &self.state.config
    }

    pub fn remaining_seconds(&self) -> u32 {
        self.state.remaining_seconds
    }

    /// Start a new session unless one is already running.
    ///
    /// A paused or finished session is replaced by a fresh one. Durations
    /// above [`MAX_DURATION_MINS`] are capped.
    pub fn start(&mut self, options: StartOptions) -> Option<TimerEventType> {
        if self.status() == TimerStatus::Running {
            return None;
        }

        let duration_mins = options
            .duration_mins
            .filter(|mins| *mins > 0)
            .unwrap_or(self.state.config.work_mins)
            .min(MAX_DURATION_MINS);

        let session = TimerSession::new(
            self.device.device_id(),
            duration_mins,
            options.task_name,
            options.external_task_ref,
        );
        debug!(id = %session.id, duration_mins, "session started");

        self.state.remaining_seconds = session.total_seconds();
        self.state.session = Some(session);
        Some(TimerEventType::Started)
    }

    pub fn pause(&mut self) -> Option<TimerEventType> {
        let session = self.running_session()?;
        session.status = TimerStatus::Paused;
        session.touch();
        debug!(id = %session.id, "session paused");
        Some(TimerEventType::Paused)
    }

    pub fn resume(&mut self) -> Option<TimerEventType> {
        let session = self
            .state
            .session
            .as_mut()
            .filter(|s| s.status == TimerStatus::Paused)?;
        session.status = TimerStatus::Running;
        session.touch();
        debug!(id = %session.id, "session resumed");
        Some(TimerEventType::Resumed)
    }

    /// Cancel a running or paused session
    pub fn cancel(&mut self) -> Option<TimerEventType> {
        let session = self.state.session.as_mut().filter(|s| s.is_live())?;
        session.end(TimerStatus::Cancelled);
        debug!(id = %session.id, "session cancelled");
        Some(TimerEventType::Cancelled)
    }

    /// Complete a running session. A paused session must be resumed first.
    pub fn complete(&mut self) -> Option<TimerEventType> {
        let session = self.running_session()?;
        session.end(TimerStatus::Completed);
        debug!(id = %session.id, "session completed");
        self.state.remaining_seconds = 0;
        Some(TimerEventType::Completed)
    }

    /// Advance the countdown by one second
    pub fn tick(&mut self) -> Option<TimerEventType> {
        if self.status() != TimerStatus::Running {
            return None;
        }

        if self.state.remaining_seconds <= 1 {
            return self.complete();
        }

        self.state.remaining_seconds -= 1;
        Some(TimerEventType::Tick)
    }

    /// Drop the current session, keeping the configuration
    pub fn reset(&mut self) {
        self.state.session = None;
        self.state.remaining_seconds = 0;
    }

    /// Merge a partial configuration. Sessions already started keep their duration.
    pub fn set_config(&mut self, patch: &TimerConfigPatch) {
        self.state.config.merge(patch);
    }

    fn running_session(&mut self) -> Option<&mut TimerSession> {
        self.state
            .session
            .as_mut()
            .filter(|s| s.status == TimerStatus::Running)
    }
}
