//! Logging configuration types

use super::rotation::RotationConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::core::config::AppSettings;

/// Base name of the rolling log file
pub const LOG_FILE_NAME: &str = "motionsaver.log";

/// Log verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Level for a `-v` count: 0 info, 1 debug, 2+ trace
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// Structured JSON format for machine parsing
    Json,
}

/// Log output destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Console,
    File,
    #[default]
    Both,
}

/// Main logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: LogLevel,

    pub format: LogFormat,

    pub output: LogOutput,

    /// Directory for log files (if file output is enabled)
    pub log_directory: Option<PathBuf>,

    /// Module-specific log levels
    #[serde(default)]
    pub module_levels: HashMap<String, LogLevel>,

    #[serde(default = "default_true")]
    pub include_target: bool,

    #[serde(default)]
    pub include_thread_id: bool,

    #[serde(default)]
    pub include_file_info: bool,

    #[serde(default)]
    pub rotation: RotationConfig,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            output: LogOutput::Both,
            log_directory: Some(default_log_directory()),
            module_levels: HashMap::new(),
            include_target: true,
            include_thread_id: false,
            include_file_info: false,
            rotation: RotationConfig::default(),
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_log_directory(mut self, dir: PathBuf) -> Self {
        self.rotation.log_directory = Some(dir.clone());
        self.log_directory = Some(dir);
        self
    }

    /// Add a module-specific log level
    pub fn with_module_level(mut self, module: impl Into<String>, level: LogLevel) -> Self {
        self.module_levels.insert(module.into(), level);
        self
    }

    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    pub fn with_thread_id(mut self, include: bool) -> Self {
        self.include_thread_id = include;
        self
    }

    pub fn with_file_info(mut self, include: bool) -> Self {
        self.include_file_info = include;
        self
    }

    pub fn with_rotation(mut self, rotation: RotationConfig) -> Self {
        self.rotation = rotation;
        self
    }

    /// Verbose console-only logging
    pub fn development() -> Self {
        Self {
            level: LogLevel::Debug,
            format: LogFormat::Text,
            output: LogOutput::Console,
            log_directory: None,
            module_levels: HashMap::new(),
            include_target: true,
            include_thread_id: true,
            include_file_info: true,
            rotation: RotationConfig::development(),
        }
    }

    /// Structured logging to console and the rolling file
    pub fn production() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            output: LogOutput::Both,
            log_directory: Some(default_log_directory()),
            module_levels: HashMap::new(),
            include_target: true,
            include_thread_id: false,
            include_file_info: false,
            rotation: RotationConfig::production(),
        }
    }

    /// Settings-driven configuration: `logs_path` wins over the default
    /// directory, `-v` raises the level.
    pub fn from_settings(settings: &AppSettings, verbosity: u8) -> Self {
        let dir = resolve_log_directory(settings.logs_dir());
        Self::default()
            .with_level(LogLevel::from_verbosity(verbosity))
            .with_log_directory(dir)
    }
}

/// `configured` if given, else `<exe dir>/logs`
pub fn resolve_log_directory(configured: Option<PathBuf>) -> PathBuf {
    configured.unwrap_or_else(default_log_directory)
}

/// `<exe dir>/logs`, or the local data dir when the executable path is unknown
fn default_log_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join("logs")))
        .or_else(|| dirs::data_local_dir().map(|dir| dir.join("MotionSaver").join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"))
}
