//! Storage port
//!
//! The timer core never calls storage itself; an orchestrator saves session
//! snapshots and settings through this trait. Adapters report failures
//! through [`StorageError`] and do not retry.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use chrono::NaiveDate;
use thiserror::Error;

use crate::session::{TimerConfig, TimerSession};

/// Storage-specific errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Corrupt record in {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Persistence contract for sessions and settings
pub trait StoragePort: Send + Sync {
    /// Insert or replace a session (keyed by id)
    fn save_session(&self, session: &TimerSession) -> impl Future<Output = StorageResult<()>> + Send;

    fn get_session(&self, id: &str) -> impl Future<Output = StorageResult<Option<TimerSession>>> + Send;

    /// Most recently updated running or paused session
    fn get_current_session(&self) -> impl Future<Output = StorageResult<Option<TimerSession>>> + Send;

    /// Sessions whose start falls on `date` (UTC)
    fn get_sessions_by_date(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = StorageResult<Vec<TimerSession>>> + Send;

    fn get_all_sessions(&self) -> impl Future<Output = StorageResult<Vec<TimerSession>>> + Send;

    /// Saved settings, or defaults when none were saved
    fn get_settings(&self) -> impl Future<Output = StorageResult<TimerConfig>> + Send;

    fn save_settings(&self, config: &TimerConfig) -> impl Future<Output = StorageResult<()>> + Send;
}

/// Pick the most recently updated live session
pub(crate) fn latest_live<'a, I>(sessions: I) -> Option<TimerSession>
where
    I: IntoIterator<Item = &'a TimerSession>,
{
    sessions
        .into_iter()
        .filter(|s| s.is_live())
        .max_by_key(|s| s.updated_at)
        .cloned()
}

/// In-memory adapter, for tests and hosts without a disk
#[derive(Default)]
pub struct MemoryStorage {
    sessions: Mutex<HashMap<String, TimerSession>>,
    config: Mutex<Option<TimerConfig>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, HashMap<String, TimerSession>> {
        self.sessions.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl StoragePort for MemoryStorage {
    async fn save_session(&self, session: &TimerSession) -> StorageResult<()> {
        self.sessions().insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn get_session(&self, id: &str) -> StorageResult<Option<TimerSession>> {
        Ok(self.sessions().get(id).cloned())
    }

    async fn get_current_session(&self) -> StorageResult<Option<TimerSession>> {
        Ok(latest_live(self.sessions().values()))
    }

    async fn get_sessions_by_date(&self, date: NaiveDate) -> StorageResult<Vec<TimerSession>> {
        let mut sessions: Vec<TimerSession> = self
            .sessions()
            .values()
            .filter(|s| s.started_at.date_naive() == date)
            .cloned()
            .collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    async fn get_all_sessions(&self) -> StorageResult<Vec<TimerSession>> {
        let mut sessions: Vec<TimerSession> = self.sessions().values().cloned().collect();
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    async fn get_settings(&self) -> StorageResult<TimerConfig> {
        let config = self.config.lock().unwrap_or_else(|p| p.into_inner());
        Ok(config.unwrap_or_default().normalized())
    }

    async fn save_settings(&self, config: &TimerConfig) -> StorageResult<()> {
        *self.config.lock().unwrap_or_else(|p| p.into_inner()) = Some(*config);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::TimerStatus;
    use chrono::{Duration, TimeZone, Utc};

    fn session_at(year: i32, month: u32, day: u32, status: TimerStatus) -> TimerSession {
        let mut session = TimerSession::new("dev".to_string(), 25, None, None);
        let at = Utc.with_ymd_and_hms(year, month, day, 9, 0, 0).unwrap();
        session.started_at = at;
        session.created_at = at;
        session.updated_at = at;
        session.status = status;
        if status.is_terminal() {
            session.ended_at = Some(at + Duration::minutes(25));
        }
        session
    }

    #[tokio::test]
    async fn test_save_and_get_session() {
        let storage = MemoryStorage::new();
        let session = session_at(2026, 3, 1, TimerStatus::Running);
        storage.save_session(&session).await.unwrap();

        let loaded = storage.get_session(&session.id).await.unwrap();
        assert_eq!(loaded, Some(session));
        assert!(storage.get_session("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_replaces_by_id() {
        let storage = MemoryStorage::new();
        let mut session = session_at(2026, 3, 1, TimerStatus::Running);
        storage.save_session(&session).await.unwrap();

        session.status = TimerStatus::Completed;
        session.ended_at = Some(session.started_at + Duration::minutes(25));
        storage.save_session(&session).await.unwrap();

        let all = storage.get_all_sessions().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].status, TimerStatus::Completed);
    }

    #[tokio::test]
    async fn test_current_session_is_latest_live() {
        let storage = MemoryStorage::new();
        assert!(storage.get_current_session().await.unwrap().is_none());

        let old = session_at(2026, 3, 1, TimerStatus::Paused);
        let newer = session_at(2026, 3, 2, TimerStatus::Running);
        let done = session_at(2026, 3, 3, TimerStatus::Completed);
        for s in [&old, &newer, &done] {
            storage.save_session(s).await.unwrap();
        }

        let current = storage.get_current_session().await.unwrap().unwrap();
        assert_eq!(current.id, newer.id);
    }

    #[tokio::test]
    async fn test_sessions_by_date() {
        let storage = MemoryStorage::new();
        let a = session_at(2026, 3, 1, TimerStatus::Completed);
        let b = session_at(2026, 3, 2, TimerStatus::Cancelled);
        storage.save_session(&a).await.unwrap();
        storage.save_session(&b).await.unwrap();

        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let sessions = storage.get_sessions_by_date(day).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, b.id);
    }

    #[tokio::test]
    async fn test_settings_default_until_saved() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get_settings().await.unwrap(), TimerConfig::default());

        let config = TimerConfig {
            work_mins: 50,
            ..TimerConfig::default()
        };
        storage.save_settings(&config).await.unwrap();
        assert_eq!(storage.get_settings().await.unwrap(), config);
    }

    #[tokio::test]
    async fn test_zero_settings_are_normalized() {
        let storage = MemoryStorage::new();
        let config = TimerConfig {
            work_mins: 0,
            break_mins: 0,
            ..TimerConfig::default()
        };
        storage.save_settings(&config).await.unwrap();
        assert_eq!(storage.get_settings().await.unwrap(), TimerConfig::default());
    }
}
