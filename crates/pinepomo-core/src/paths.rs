//! Standard paths used by pinepomo

use std::path::{Path, PathBuf};

/// Environment variable that overrides the data directory
pub const DATA_DIR_ENV: &str = "PINEPOMO_DATA_DIR";

/// Standard pinepomo paths
#[derive(Debug, Clone)]
pub struct Paths {
    /// Data directory (~/.local/share/pinepomo)
    pub data: PathBuf,
    /// Config directory (~/.config/pinepomo)
    pub config: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

impl Paths {
    pub fn new() -> Self {
        let data = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("pinepomo"),
        };

        let config = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("pinepomo");

        Self { data, config }
    }

    /// Paths rooted at an explicit data directory
    pub fn with_data_dir(data: &Path) -> Self {
        Self {
            data: data.to_path_buf(),
            ..Self::new()
        }
    }

    /// Directory holding session logs and saved settings
    pub fn sessions(&self) -> PathBuf {
        self.data.join("sessions")
    }

    /// File holding the cached device identifier
    pub fn device_id(&self) -> PathBuf {
        self.data.join("device_id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_data_dir() {
        let paths = Paths::with_data_dir(Path::new("/tmp/pomo-data"));
        assert_eq!(paths.data, PathBuf::from("/tmp/pomo-data"));
        assert_eq!(paths.sessions(), PathBuf::from("/tmp/pomo-data/sessions"));
        assert_eq!(paths.device_id(), PathBuf::from("/tmp/pomo-data/device_id"));
    }
}
