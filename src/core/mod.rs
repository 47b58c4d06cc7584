//! MotionSaver Core Module
//!
//! This module contains:
//! - Error types and handling
//! - Settings and timing configuration
//! - Single-instance lock file

pub mod config;
pub mod error;
pub mod instance;

// Re-export commonly used items
pub use config::{find_user_config_path, AppSettings, LockTuning};
pub use error::{ConfigError, CredentialError, LockError, OsError, Result};
pub use instance::InstanceLock;
