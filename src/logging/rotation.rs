//! Log rotation
//!
//! `tracing-appender` rolls the file; the rotator prunes old rolled files so
//! the log directory stays bounded.

use super::config::LOG_FILE_NAME;
use super::LoggingError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Log rotation strategy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RotationStrategy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Log rotation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationConfig {
    pub strategy: RotationStrategy,

    /// Maximum number of log files to keep
    pub max_files: usize,

    /// Maximum age of log files (in days)
    pub max_age_days: u32,

    /// Directory the rotator prunes
    pub log_directory: Option<PathBuf>,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            strategy: RotationStrategy::Daily,
            max_files: 7,
            max_age_days: 30,
            log_directory: None,
        }
    }
}

impl RotationConfig {
    pub fn production() -> Self {
        Self {
            strategy: RotationStrategy::Daily,
            max_files: 14,
            max_age_days: 30,
            log_directory: None,
        }
    }

    pub fn development() -> Self {
        Self {
            strategy: RotationStrategy::Never,
            max_files: 3,
            max_age_days: 7,
            log_directory: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogFileInfo {
    pub path: PathBuf,
    pub modified: DateTime<Utc>,
}

pub struct LogRotator {
    config: RotationConfig,
    last_rotation: Option<DateTime<Utc>>,
}

impl LogRotator {
    pub fn new(config: RotationConfig) -> Self {
        Self {
            config,
            last_rotation: None,
        }
    }

    /// Remove rolled log files beyond the count and age limits.
    ///
    /// Returns how many files were removed.
    pub fn rotate(&mut self) -> Result<usize, LoggingError> {
        let log_dir = match &self.config.log_directory {
            Some(dir) => dir.clone(),
            None => return Ok(0),
        };

        if !log_dir.exists() {
            return Ok(0);
        }

        let files = self.get_log_files(&log_dir)?;
        let removed = self.cleanup_by_count(&files)? + self.cleanup_by_age(&files)?;

        self.last_rotation = Some(Utc::now());
        Ok(removed)
    }

    /// Log files in `log_dir`, oldest first
    fn get_log_files(&self, log_dir: &Path) -> Result<Vec<LogFileInfo>, LoggingError> {
        let mut files = Vec::new();

        for entry in fs::read_dir(log_dir)?.flatten() {
            let path = entry.path();
            let is_log = path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(LOG_FILE_NAME))
                .unwrap_or(false);
            if !is_log || !path.is_file() {
                continue;
            }
            if let Ok(metadata) = fs::metadata(&path) {
                let modified = metadata
                    .modified()
                    .map(DateTime::<Utc>::from)
                    .unwrap_or_else(|_| Utc::now());
                files.push(LogFileInfo { path, modified });
            }
        }

        files.sort_by(|a, b| a.modified.cmp(&b.modified));
        Ok(files)
    }

    fn cleanup_by_count(&self, files: &[LogFileInfo]) -> Result<usize, LoggingError> {
        if files.len() <= self.config.max_files {
            return Ok(0);
        }
        let to_remove = files.len() - self.config.max_files;
        for file in files.iter().take(to_remove) {
            tracing::debug!("Removing old log file: {:?}", file.path);
            fs::remove_file(&file.path)?;
        }
        Ok(to_remove)
    }

    fn cleanup_by_age(&self, files: &[LogFileInfo]) -> Result<usize, LoggingError> {
        let cutoff = Utc::now() - Duration::days(self.config.max_age_days as i64);
        let mut removed = 0;
        for file in files.iter().filter(|f| f.modified < cutoff) {
            // Already gone if the count pass took it
            if file.path.exists() {
                tracing::debug!("Removing expired log file: {:?}", file.path);
                fs::remove_file(&file.path)?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Whether a pruning pass is due under the configured strategy
    pub fn needs_rotation(&self) -> bool {
        use chrono::Timelike;

        let last = match self.last_rotation {
            Some(last) => last,
            None => return self.config.strategy != RotationStrategy::Never,
        };
        let now = Utc::now();
        match self.config.strategy {
            RotationStrategy::Never => false,
            RotationStrategy::Daily => now.date_naive() != last.date_naive(),
            RotationStrategy::Hourly => {
                now.date_naive() != last.date_naive() || now.hour() != last.hour()
            }
        }
    }

    pub fn last_rotation(&self) -> Option<DateTime<Utc>> {
        self.last_rotation
    }

    pub fn config(&self) -> &RotationConfig {
        &self.config
    }
}
