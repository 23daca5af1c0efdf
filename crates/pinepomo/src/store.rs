//! File-backed session storage
//!
//! Layout under the sessions directory:
//! - sessions-YYYY-MM-DD.jsonl: one JSON record per save, keyed by the UTC
//!   start date. A session is appended again on every change; the last
//!   record for an id wins.
//! - settings.json: the saved timer configuration

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tokio::fs;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::session::{TimerConfig, TimerSession};
use crate::storage::{latest_live, StorageError, StoragePort, StorageResult};

const LOG_PREFIX: &str = "sessions-";
const LOG_SUFFIX: &str = ".jsonl";

/// JSONL session store
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Open a store rooted at `dir`, creating the directory if needed
    pub async fn open(dir: &Path) -> StorageResult<Self> {
        fs::create_dir_all(dir).await?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn settings_path(&self) -> PathBuf {
        self.dir.join("settings.json")
    }

    fn session_log_path(&self, date: &NaiveDate) -> PathBuf {
        self.dir.join(format!("{}{}{}", LOG_PREFIX, date, LOG_SUFFIX))
    }

    /// Read one daily log, collapsing repeated records to the latest per id
    async fn read_log(&self, path: &Path) -> StorageResult<Vec<TimerSession>> {
        let file = match fs::File::open(path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut lines = BufReader::new(file).lines();
        let mut order: Vec<String> = Vec::new();
        let mut latest: HashMap<String, TimerSession> = HashMap::new();
        let mut line_num = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_num += 1;
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<TimerSession>(&line) {
                Ok(session) => {
                    if !latest.contains_key(&session.id) {
                        order.push(session.id.clone());
                    }
                    latest.insert(session.id.clone(), session);
                }
                Err(e) => {
                    // Skip the line, keep the rest of the log usable
                    tracing::warn!(
                        path = %path.display(),
                        line = line_num,
                        error = %e,
                        "skipping malformed session record"
                    );
                }
            }
        }

        Ok(order
            .into_iter()
            .filter_map(|id| latest.remove(&id))
            .collect())
    }

    /// All daily log files, oldest date first
    async fn log_files(&self) -> StorageResult<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&self.dir).await?;
        let mut logs: Vec<(NaiveDate, PathBuf)> = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let date = name
                .strip_prefix(LOG_PREFIX)
                .and_then(|rest| rest.strip_suffix(LOG_SUFFIX))
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
            if let Some(date) = date {
                logs.push((date, entry.path()));
            }
        }

        logs.sort_by_key(|(date, _)| *date);
        Ok(logs.into_iter().map(|(_, path)| path).collect())
    }
}

impl StoragePort for FileStorage {
    async fn save_session(&self, session: &TimerSession) -> StorageResult<()> {
        let path = self.session_log_path(&session.started_at.date_naive());
        let mut line = serde_json::to_string(session)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn get_session(&self, id: &str) -> StorageResult<Option<TimerSession>> {
        // Newest logs first: live sessions are almost always recent
        for path in self.log_files().await?.iter().rev() {
            if let Some(session) = self.read_log(path).await?.into_iter().find(|s| s.id == id) {
                return Ok(Some(session));
            }
        }
        Ok(None)
    }

    async fn get_current_session(&self) -> StorageResult<Option<TimerSession>> {
        let sessions = self.get_all_sessions().await?;
        Ok(latest_live(&sessions))
    }

    async fn get_sessions_by_date(&self, date: NaiveDate) -> StorageResult<Vec<TimerSession>> {
        let mut sessions = self.read_log(&self.session_log_path(&date)).await?;
        sessions.sort_by_key(|s| s.started_at);
        Ok(sessions)
    }

    async fn get_all_sessions(&self) -> StorageResult<Vec<TimerSession>> {
        let mut all = Vec::new();
        for path in self.log_files().await? {
            all.extend(self.read_log(&path).await?);
        }
        all.sort_by_key(|s| s.started_at);
        Ok(all)
    }

    async fn get_settings(&self) -> StorageResult<TimerConfig> {
        let path = self.settings_path();
        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(TimerConfig::default()),
            Err(e) => return Err(e.into()),
        };

        let config: TimerConfig =
            serde_json::from_str(&content).map_err(|e| StorageError::Corrupt {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;

        if !config.is_normalized() {
            tracing::warn!(
                path = %path.display(),
                ?config,
                "settings out of range, replacing zero and oversized fields"
            );
        }
        Ok(config.normalized())
    }

    async fn save_settings(&self, config: &TimerConfig) -> StorageResult<()> {
        let path = self.settings_path();
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(config)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }
}
