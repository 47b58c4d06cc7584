//! Configuration module for MotionSaver
//!
//! Handles:
//! - Locating `userconfig.json`
//! - Application settings read by the lock screen
//! - Timing constants for the blocker and blackout loops

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::ConfigError;

/// Settings file name, searched under a `config` directory
pub const USER_CONFIG_FILE: &str = "userconfig.json";

/// Configuration result type
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Application settings consumed by the lock screen.
///
/// The settings file is shared with the settings GUI and widgets; only the
/// keys below are read here. Writes go through the credential store, which
/// preserves every key it does not own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Arm hotkey suppression, the hook watchdog and the secure desktop detector
    #[serde(default)]
    pub run_as_admin: bool,

    /// Video shown by the presentation surface
    #[serde(default)]
    pub video_path: Option<String>,

    /// Override for the log directory
    #[serde(default)]
    pub logs_path: Option<String>,

    /// Keys owned by other components, kept verbatim
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

impl AppSettings {
    /// Load settings from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let settings: AppSettings = serde_json::from_str(&content)?;
        Ok(settings)
    }

    /// Load settings, falling back to defaults on any failure
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(settings) => settings,
            Err(ConfigError::NotFound(p)) => {
                tracing::info!("Settings file not found at {:?}, using defaults", p);
                Self::default()
            }
            Err(e) => {
                tracing::error!("Error loading settings from {:?}: {}. Using defaults.", path, e);
                Self::default()
            }
        }
    }

    /// Non-empty log directory override
    pub fn logs_dir(&self) -> Option<PathBuf> {
        self.logs_path
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}

/// Timing and threshold knobs for the blocking loops.
///
/// None of these are contracts; the secure desktop thresholds in particular
/// are heuristics.
#[derive(Debug, Clone)]
pub struct LockTuning {
    /// Hook watchdog poll period
    pub watchdog_interval: Duration,
    /// Bound on joining a background thread at stop
    pub join_timeout: Duration,
    /// Secure desktop detector tick
    pub detector_tick: Duration,
    /// Minimum spacing between login-manager samples
    pub login_manager_period: Duration,
    /// Minimum spacing between security-process samples
    pub security_process_period: Duration,
    /// CPU percent above which the login manager counts as active
    pub login_manager_threshold: f32,
    /// CPU percent above which a security process counts as hot
    pub security_process_threshold: f32,
    /// Window over which one CPU sample is measured
    pub cpu_sample_window: Duration,
    /// Number of hot security processes that signals the secure desktop
    pub min_hot_processes: usize,
    /// Wait before re-executing after a detection
    pub restart_grace: Duration,
    /// Wait between spawning the replacement and exiting
    pub exit_delay: Duration,
    /// Delay before the first blackout refresh
    pub initial_blackout_delay: Duration,
    /// Debounce applied to display-change notifications
    pub display_change_debounce: Duration,
}

impl Default for LockTuning {
    fn default() -> Self {
        Self {
            watchdog_interval: Duration::from_millis(500),
            join_timeout: Duration::from_secs(2),
            detector_tick: Duration::from_millis(500),
            login_manager_period: Duration::from_secs(5),
            security_process_period: Duration::from_secs(10),
            login_manager_threshold: 5.0,
            security_process_threshold: 10.0,
            cpu_sample_window: Duration::from_millis(100),
            min_hot_processes: 2,
            restart_grace: Duration::from_secs(5),
            exit_delay: Duration::from_secs(2),
            initial_blackout_delay: Duration::from_millis(200),
            display_change_debounce: Duration::from_millis(50),
        }
    }
}

/// Directory holding the running executable
pub fn executable_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Locate `config/userconfig.json` by walking up from the executable directory
pub fn find_user_config_path() -> PathBuf {
    find_user_config_from(&executable_dir())
}

/// Walk up from `start` looking for `config/userconfig.json`.
///
/// Returns `start/config/userconfig.json` when no ancestor has one.
pub fn find_user_config_from(start: &Path) -> PathBuf {
    for dir in start.ancestors() {
        let candidate = dir.join("config").join(USER_CONFIG_FILE);
        if candidate.exists() {
            return candidate;
        }
    }
    start.join("config").join(USER_CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_settings_defaults() {
        let settings = AppSettings::default();
        assert!(!settings.run_as_admin);
        assert!(settings.video_path.is_none());
        assert!(settings.logs_dir().is_none());
    }

    #[test]
    fn test_settings_keep_unknown_keys() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(USER_CONFIG_FILE);
        std::fs::write(
            &path,
            r#"{"run_as_admin": true, "theme": "dark", "users": [], "logs_path": "  "}"#,
        )
        .unwrap();

        let settings = AppSettings::load(&path).unwrap();
        assert!(settings.run_as_admin);
        assert!(settings.logs_dir().is_none());
        assert_eq!(settings.other["theme"], "dark");
    }

    #[test]
    fn test_load_or_default_on_corrupt_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(USER_CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();

        assert_eq!(AppSettings::load_or_default(&path), AppSettings::default());
    }

    #[test]
    fn test_find_user_config_walks_up() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join("config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join(USER_CONFIG_FILE), "{}").unwrap();

        let nested = temp.path().join("bin").join("release");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            find_user_config_from(&nested),
            config_dir.join(USER_CONFIG_FILE)
        );
    }

    #[test]
    fn test_find_user_config_default_location() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            find_user_config_from(temp.path()),
            temp.path().join("config").join(USER_CONFIG_FILE)
        );
    }

    #[test]
    fn test_tuning_defaults() {
        let tuning = LockTuning::default();
        assert_eq!(tuning.watchdog_interval, Duration::from_millis(500));
        assert_eq!(tuning.join_timeout, Duration::from_secs(2));
        assert_eq!(tuning.min_hot_processes, 2);
        assert!(tuning.security_process_threshold > tuning.login_manager_threshold);
    }
}
