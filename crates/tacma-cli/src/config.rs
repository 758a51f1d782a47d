//! Configuration loading and management.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tacma_core::TrackerConfig;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// Path to the backup copy; defaults to the database path with a
    /// `.backup` suffix.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,

    /// Minimum age of the backup before a save refreshes it. 0 disables
    /// automatic backups.
    pub backup_interval_minutes: u64,

    /// Archive once the live history is older than this many weeks.
    pub archive_after_weeks: u32,

    /// Weeks of history kept live after archiving.
    pub keep_weeks: u32,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        let tracker = TrackerConfig::default();
        Self {
            database_path: data_dir.join("tacma.db"),
            backup_path: None,
            backup_interval_minutes: 20,
            archive_after_weeks: tracker.archive_after_weeks,
            keep_weeks: tracker.keep_weeks,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // TACMA_DATABASE_PATH, TACMA_KEEP_WEEKS, ...
        figment = figment.merge(Env::prefixed("TACMA_"));

        figment.extract()
    }

    pub fn backup_path(&self) -> PathBuf {
        self.backup_path.clone().unwrap_or_else(|| {
            let mut name = self.database_path.as_os_str().to_os_string();
            name.push(".backup");
            PathBuf::from(name)
        })
    }

    pub const fn backup_interval(&self) -> Option<Duration> {
        if self.backup_interval_minutes == 0 {
            None
        } else {
            Some(Duration::from_secs(self.backup_interval_minutes * 60))
        }
    }

    pub const fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            archive_after_weeks: self.archive_after_weeks,
            keep_weeks: self.keep_weeks,
        }
    }
}

/// Returns the platform-specific config directory for tacma.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tacma"))
}

/// Returns the platform-specific data directory for tacma.
///
/// On Linux: `~/.local/share/tacma`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tacma"))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_tacma() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "tacma");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("tacma.db"));
        assert_eq!(config.backup_interval_minutes, 20);
        assert_eq!(config.tracker_config(), TrackerConfig::default());
    }

    #[test]
    fn test_backup_path_defaults_next_to_database() {
        let config = Config {
            database_path: PathBuf::from("/data/tacma.db"),
            ..Config::default()
        };
        assert_eq!(config.backup_path(), PathBuf::from("/data/tacma.db.backup"));

        let config = Config {
            backup_path: Some(PathBuf::from("/elsewhere/copy.db")),
            ..config
        };
        assert_eq!(config.backup_path(), PathBuf::from("/elsewhere/copy.db"));
    }

    #[test]
    fn test_zero_interval_disables_backups() {
        let config = Config {
            backup_interval_minutes: 0,
            ..Config::default()
        };
        assert_eq!(config.backup_interval(), None);
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "database_path = \"/tmp/custom.db\"\nkeep_weeks = 2\nbackup_interval_minutes = 5"
        )
        .unwrap();

        let config = Config::load_from(Some(file.path())).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/custom.db"));
        assert_eq!(config.keep_weeks, 2);
        assert_eq!(config.archive_after_weeks, 20);
        assert_eq!(config.backup_interval(), Some(Duration::from_secs(300)));
    }
}
