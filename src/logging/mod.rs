//! Logging System for MotionSaver
//!
//! Provides:
//! - Structured logs with configurable verbosity levels
//! - A daily rolling `motionsaver.log` next to the executable (or `logs_path`)
//! - Pruning of old rolled files

mod config;
mod rotation;


pub use config::{resolve_log_directory, LogFormat, LogLevel, LogOutput, LoggingConfig, LOG_FILE_NAME};
pub use rotation::{LogRotator, RotationConfig, RotationStrategy};

use parking_lot::RwLock;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Logging system errors
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to initialize logging: {0}")]
    InitializationError(String),

    #[error("Failed to create log directory: {0}")]
    DirectoryCreationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type LoggingResult<T> = Result<T, LoggingError>;

/// Installed global subscriber plus the file writer guard
pub struct LoggingSystem {
    config: LoggingConfig,
    rotator: Arc<RwLock<LogRotator>>,
    _guards: Vec<WorkerGuard>,
}

impl LoggingSystem {
    /// Install the global subscriber described by `config`
    pub fn init(mut config: LoggingConfig) -> LoggingResult<Self> {
        if config.output != LogOutput::Console {
            if let Some(ref log_dir) = config.log_directory {
                std::fs::create_dir_all(log_dir).map_err(|e| {
                    LoggingError::DirectoryCreationError(format!(
                        "Failed to create log directory {:?}: {}",
                        log_dir, e
                    ))
                })?;
            }
        }
        if config.rotation.log_directory.is_none() {
            config.rotation.log_directory = config.log_directory.clone();
        }

        let mut guards = Vec::new();
        let env_filter = Self::build_env_filter(&config);
        let registry = tracing_subscriber::registry();

        match config.output {
            LogOutput::Console => {
                let console_layer = Self::create_console_layer(&config);
                registry
                    .with(env_filter)
                    .with(console_layer)
                    .try_init()
                    .map_err(|e| LoggingError::InitializationError(e.to_string()))?;
            }
            LogOutput::File => {
                let (file_layer, guard) = Self::create_file_layer(&config);
                guards.push(guard);
                registry
                    .with(env_filter)
                    .with(file_layer)
                    .try_init()
                    .map_err(|e| LoggingError::InitializationError(e.to_string()))?;
            }
            LogOutput::Both => {
                let console_layer = Self::create_console_layer(&config);
                let (file_layer, guard) = Self::create_file_layer(&config);
                guards.push(guard);
                registry
                    .with(env_filter)
                    .with(console_layer)
                    .with(file_layer)
                    .try_init()
                    .map_err(|e| LoggingError::InitializationError(e.to_string()))?;
            }
        }

        let mut rotator = LogRotator::new(config.rotation.clone());
        if rotator.needs_rotation() {
            match rotator.rotate() {
                Ok(0) => {}
                Ok(removed) => tracing::debug!("Pruned {} old log files", removed),
                Err(e) => tracing::warn!("Log pruning failed: {}", e),
            }
        }

        Ok(Self {
            config,
            rotator: Arc::new(RwLock::new(rotator)),
            _guards: guards,
        })
    }

    /// Base level plus per-module directives; `RUST_LOG` is not consulted
    pub(crate) fn build_env_filter(config: &LoggingConfig) -> EnvFilter {
        let mut filter = EnvFilter::new(config.level.as_str());
        for (module, level) in &config.module_levels {
            match format!("{}={}", module, level).parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(e) => eprintln!("Ignoring log directive for {}: {}", module, e),
            }
        }
        filter
    }

    fn create_console_layer<S>(config: &LoggingConfig) -> Box<dyn Layer<S> + Send + Sync>
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_target(config.include_target)
            .with_thread_ids(config.include_thread_id)
            .with_file(config.include_file_info)
            .with_line_number(config.include_file_info);

        if config.format == LogFormat::Json {
            layer.json().boxed()
        } else {
            layer.boxed()
        }
    }

    fn create_file_layer<S>(config: &LoggingConfig) -> (Box<dyn Layer<S> + Send + Sync>, WorkerGuard)
    where
        S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    {
        let log_dir = config
            .log_directory
            .clone()
            .unwrap_or_else(|| PathBuf::from("logs"));

        let rotation = match config.rotation.strategy {
            RotationStrategy::Daily => Rotation::DAILY,
            RotationStrategy::Hourly => Rotation::HOURLY,
            RotationStrategy::Never => Rotation::NEVER,
        };

        let file_appender = RollingFileAppender::new(rotation, &log_dir, LOG_FILE_NAME);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_target(config.include_target)
            .with_thread_ids(config.include_thread_id)
            .with_file(config.include_file_info)
            .with_line_number(config.include_file_info)
            .with_ansi(false);

        if config.format == LogFormat::Json {
            (layer.json().boxed(), guard)
        } else {
            (layer.boxed(), guard)
        }
    }

    /// Prune rolled log files now
    pub fn rotate_logs(&self) -> LoggingResult<usize> {
        self.rotator.write().rotate()
    }

    pub fn log_directory(&self) -> Option<&PathBuf> {
        self.config.log_directory.as_ref()
    }

    pub fn log_level(&self) -> LogLevel {
        self.config.level
    }
}

/// Install the configured subscriber, falling back to plain console output.
///
/// Returns the system when structured init succeeded; the fallback has no
/// guard to keep.
pub fn init_or_fallback(config: LoggingConfig) -> Option<LoggingSystem> {
    let level = config.level;
    match LoggingSystem::init(config) {
        Ok(system) => Some(system),
        Err(e) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(level.as_str()))
                .try_init();
            tracing::warn!("Structured logging unavailable, using console: {}", e);
            None
        }
    }
}
