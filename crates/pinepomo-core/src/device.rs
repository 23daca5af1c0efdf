//! Device identity
//!
//! Every session records which installation created it. The identifier is a
//! UUID generated on first use and cached for the life of the installation.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use uuid::Uuid;

/// Source of a stable per-installation identifier
pub trait DeviceIdentity: Send + Sync {
    fn device_id(&self) -> String;
}

/// Identifier persisted to a file, created lazily on first use
pub struct FileDeviceIdentity {
    path: PathBuf,
    cached: OnceLock<String>,
}

impl FileDeviceIdentity {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            cached: OnceLock::new(),
        }
    }

    fn load_or_create(&self) -> String {
        if let Ok(content) = fs::read_to_string(&self.path) {
            let id = content.trim();
            if !id.is_empty() {
                return id.to_string();
            }
        }

        let id = Uuid::new_v4().to_string();
        if let Err(e) = self.persist(&id) {
            // Still usable for this process, just not stable across runs
            tracing::warn!(path = %self.path.display(), error = %e, "failed to persist device id");
        }
        id
    }

    fn persist(&self, id: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, id)
    }
}

impl DeviceIdentity for FileDeviceIdentity {
    fn device_id(&self) -> String {
        self.cached.get_or_init(|| self.load_or_create()).clone()
    }
}

/// Fixed identifier supplied by the host
pub struct StaticDeviceIdentity(pub String);

impl DeviceIdentity for StaticDeviceIdentity {
    fn device_id(&self) -> String {
        self.0.clone()
    }
}
