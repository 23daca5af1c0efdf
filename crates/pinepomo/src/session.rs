//! Timer data model
//!
//! Sessions, their status, user configuration, and the event payload
//! observers receive on every state-changing transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    /// No session. Never stored on a session record.
    Idle,
    Running,
    Paused,
    Completed,
    Cancelled,
}

impl TimerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
            TimerStatus::Completed => "completed",
            TimerStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "idle" => Some(TimerStatus::Idle),
            "running" => Some(TimerStatus::Running),
            "paused" => Some(TimerStatus::Paused),
            "completed" => Some(TimerStatus::Completed),
            "cancelled" => Some(TimerStatus::Cancelled),
            _ => None,
        }
    }

    /// Running or paused
    pub fn is_live(&self) -> bool {
        matches!(self, TimerStatus::Running | TimerStatus::Paused)
    }

    /// Completed or cancelled
    pub fn is_terminal(&self) -> bool {
        matches!(self, TimerStatus::Completed | TimerStatus::Cancelled)
    }
}

/// Longest session the timer will run, in minutes
pub const MAX_DURATION_MINS: u32 = 24 * 60;

/// User configuration for timer durations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerConfig {
    pub work_mins: u32,
    pub break_mins: u32,
    pub long_break_mins: u32,
    pub daily_goal: u32,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_mins: 25,
            break_mins: 5,
            long_break_mins: 15,
            daily_goal: 8,
        }
    }
}

impl TimerConfig {
    /// Shallow-merge a patch. Zero values are ignored so every field stays positive.
    pub fn merge(&mut self, patch: &TimerConfigPatch) {
        fn apply(field: &mut u32, value: Option<u32>) {
            if let Some(v) = value.filter(|v| *v > 0) {
                *field = v;
            }
        }

        apply(&mut self.work_mins, patch.work_mins);
        apply(&mut self.break_mins, patch.break_mins);
        apply(&mut self.long_break_mins, patch.long_break_mins);
        apply(&mut self.daily_goal, patch.daily_goal);
        *self = self.normalized();
    }

    /// Zero fields fall back to their defaults and durations are capped at
    /// [`MAX_DURATION_MINS`]. Settings from outside the process (a saved
    /// file, a host) must pass through here before driving a timer.
    pub fn normalized(self) -> Self {
        let defaults = Self::default();
        let duration = |value: u32, default: u32| match value {
            0 => default,
            v => v.min(MAX_DURATION_MINS),
        };

        Self {
            work_mins: duration(self.work_mins, defaults.work_mins),
            break_mins: duration(self.break_mins, defaults.break_mins),
            long_break_mins: duration(self.long_break_mins, defaults.long_break_mins),
            daily_goal: match self.daily_goal {
                0 => defaults.daily_goal,
                goal => goal,
            },
        }
    }

    /// Whether every field is already in range
    pub fn is_normalized(&self) -> bool {
        *self == self.normalized()
    }
}

/// Partial update to a [`TimerConfig`]; `None` leaves a field unchanged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_mins: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub break_mins: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_break_mins: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_goal: Option<u32>,
}

impl TimerConfigPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Options for starting a new session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartOptions {
    pub task_name: Option<String>,
    /// Opaque reference into an external task tracker
    pub external_task_ref: Option<String>,
    /// Overrides the configured work duration
    pub duration_mins: Option<u32>,
}

impl StartOptions {
    /// A focus session of the configured work length
    pub fn work() -> Self {
        Self::default()
    }

    /// A short break of the configured length
    pub fn short_break(config: &TimerConfig) -> Self {
        Self {
            duration_mins: Some(config.normalized().break_mins),
            ..Self::default()
        }
    }

    /// A long break of the configured length
    pub fn long_break(config: &TimerConfig) -> Self {
        Self {
            duration_mins: Some(config.normalized().long_break_mins),
            ..Self::default()
        }
    }

    pub fn with_task(mut self, name: impl Into<String>) -> Self {
        self.task_name = Some(name.into());
        self
    }

    pub fn with_task_ref(mut self, reference: impl Into<String>) -> Self {
        self.external_task_ref = Some(reference.into());
        self
    }

    pub fn with_duration(mut self, mins: u32) -> Self {
        self.duration_mins = Some(mins);
        self
    }
}

/// One timed focus or break attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSession {
    pub id: String,
    /// Correlation id for external event logs
    pub event_id: String,
    pub device_id: String,
    /// Set by a sync collaborator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub started_at: DateTime<Utc>,
    /// Set exactly once, on completion or cancellation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_mins: u32,
    pub status: TimerStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_task_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TimerSession {
    /// Create a running session with fresh identifiers
    pub fn new(
        device_id: String,
        duration_mins: u32,
        task_name: Option<String>,
        external_task_ref: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            event_id: Uuid::new_v4().to_string(),
            device_id,
            user_id: None,
            started_at: now,
            ended_at: None,
            duration_mins,
            status: TimerStatus::Running,
            task_name,
            external_task_ref,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_live(&self) -> bool {
        self.status.is_live()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Total length of the session in seconds
    pub fn total_seconds(&self) -> u32 {
        self.duration_mins.saturating_mul(60)
    }

    /// Seconds counted down so far, given the machine's remaining counter
    pub fn elapsed_seconds(&self, remaining_seconds: u32) -> u32 {
        self.total_seconds().saturating_sub(remaining_seconds)
    }

    /// Progress as a percentage (0-100)
    pub fn progress_percent(&self, remaining_seconds: u32) -> u32 {
        let total = self.total_seconds();
        if total == 0 {
            return 100;
        }
        ((self.elapsed_seconds(remaining_seconds) as u64 * 100) / total as u64).min(100) as u32
    }

    /// Cancel a live record outside a running timer, such as one left behind
    /// by an interrupted process. Terminal records are left alone.
    pub fn abandon(&mut self) -> bool {
        if !self.is_live() {
            return false;
        }
        self.end(TimerStatus::Cancelled);
        true
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub(crate) fn end(&mut self, status: TimerStatus) {
        let now = Utc::now();
        self.status = status;
        self.ended_at = Some(now);
        self.updated_at = now;
    }
}

/// Kinds of timer events observers can subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerEventType {
    Started,
    Paused,
    Resumed,
    Completed,
    Cancelled,
    Tick,
}

impl TimerEventType {
    pub const ALL: [TimerEventType; 6] = [
        TimerEventType::Started,
        TimerEventType::Paused,
        TimerEventType::Resumed,
        TimerEventType::Completed,
        TimerEventType::Cancelled,
        TimerEventType::Tick,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimerEventType::Started => "timer:started",
            TimerEventType::Paused => "timer:paused",
            TimerEventType::Resumed => "timer:resumed",
            TimerEventType::Completed => "timer:completed",
            TimerEventType::Cancelled => "timer:cancelled",
            TimerEventType::Tick => "timer:tick",
        }
    }
}

/// Payload delivered to event listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerEvent {
    #[serde(rename = "type")]
    pub kind: TimerEventType,
    pub session: TimerSession,
    pub remaining_seconds: u32,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = TimerConfig::default();
        assert_eq!(config.work_mins, 25);
        assert_eq!(config.break_mins, 5);
        assert_eq!(config.long_break_mins, 15);
        assert_eq!(config.daily_goal, 8);
    }

    #[test]
    fn test_config_merge_keeps_unspecified() {
        let mut config = TimerConfig::default();
        config.merge(&TimerConfigPatch {
            work_mins: Some(30),
            ..Default::default()
        });
        assert_eq!(config.work_mins, 30);
        assert_eq!(config.break_mins, 5);
        assert_eq!(config.long_break_mins, 15);
        assert_eq!(config.daily_goal, 8);
    }

    #[test]
    fn test_config_merge_ignores_zero() {
        let mut config = TimerConfig::default();
        config.merge(&TimerConfigPatch {
            break_mins: Some(0),
            daily_goal: Some(4),
            ..Default::default()
        });
        assert_eq!(config.break_mins, 5);
        assert_eq!(config.daily_goal, 4);
    }

    #[test]
    fn test_config_normalized_replaces_zero_and_caps() {
        let config = TimerConfig {
            work_mins: 0,
            break_mins: 0,
            long_break_mins: u32::MAX,
            daily_goal: 0,
        };
        assert!(!config.is_normalized());

        let fixed = config.normalized();
        assert_eq!(
            fixed,
            TimerConfig {
                work_mins: 25,
                break_mins: 5,
                long_break_mins: MAX_DURATION_MINS,
                daily_goal: 8,
            }
        );
        assert!(fixed.is_normalized());
        assert!(TimerConfig::default().is_normalized());
    }

    #[test]
    fn test_config_merge_caps_durations() {
        let mut config = TimerConfig::default();
        config.merge(&TimerConfigPatch {
            work_mins: Some(100_000_000),
            ..Default::default()
        });
        assert_eq!(config.work_mins, MAX_DURATION_MINS);
    }

    #[test]
    fn test_break_presets_never_pass_zero() {
        let config = TimerConfig {
            break_mins: 0,
            long_break_mins: 0,
            ..TimerConfig::default()
        };
        assert_eq!(StartOptions::short_break(&config).duration_mins, Some(5));
        assert_eq!(StartOptions::long_break(&config).duration_mins, Some(15));
    }

    #[test]
    fn test_config_wire_format() {
        let json = serde_json::to_string(&TimerConfig::default()).unwrap();
        assert_eq!(
            json,
            r#"{"workMins":25,"breakMins":5,"longBreakMins":15,"dailyGoal":8}"#
        );
    }

    #[test]
    fn test_status_strings() {
        for status in [
            TimerStatus::Idle,
            TimerStatus::Running,
            TimerStatus::Paused,
            TimerStatus::Completed,
            TimerStatus::Cancelled,
        ] {
            assert_eq!(TimerStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(TimerStatus::from_str("RUNNING"), Some(TimerStatus::Running));
        assert_eq!(TimerStatus::from_str("stopped"), None);
    }

    #[test]
    fn test_new_session() {
        let session = TimerSession::new("dev".to_string(), 25, Some("Write".to_string()), None);
        assert_eq!(session.status, TimerStatus::Running);
        assert!(session.ended_at.is_none());
        assert_ne!(session.id, session.event_id);
        assert_eq!(session.started_at, session.created_at);
        assert_eq!(session.created_at, session.updated_at);
        assert_eq!(session.total_seconds(), 1500);
        assert_eq!(session.progress_percent(1500), 0);
        assert_eq!(session.progress_percent(750), 50);
        assert_eq!(session.elapsed_seconds(1400), 100);
    }

    #[test]
    fn test_abandon() {
        let mut session = TimerSession::new("dev".to_string(), 25, None, None);
        assert!(session.abandon());
        assert_eq!(session.status, TimerStatus::Cancelled);
        let ended = session.ended_at;
        assert!(ended.is_some());

        assert!(!session.abandon());
        assert_eq!(session.ended_at, ended);
    }

    #[test]
    fn test_session_omits_empty_optionals() {
        let session = TimerSession::new("dev".to_string(), 5, None, None);
        let json = serde_json::to_value(&session).unwrap();
        assert!(json.get("endedAt").is_none());
        assert!(json.get("taskName").is_none());
        assert_eq!(json["status"], "running");
        assert_eq!(json["durationMins"], 5);
    }

    #[test]
    fn test_start_option_presets() {
        let config = TimerConfig::default();
        assert_eq!(StartOptions::work().duration_mins, None);
        assert_eq!(StartOptions::short_break(&config).duration_mins, Some(5));
        assert_eq!(StartOptions::long_break(&config).duration_mins, Some(15));

        let opts = StartOptions::work().with_task("Docs").with_task_ref("todo-42");
        assert_eq!(opts.task_name.as_deref(), Some("Docs"));
        assert_eq!(opts.external_task_ref.as_deref(), Some("todo-42"));
    }
}
