//! Error types for MotionSaver
//!
//! OS interop failures are typed so the caller can log which primitive
//! failed and keep running in a degraded state.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for lock-screen operations
pub type Result<T> = std::result::Result<T, LockError>;

/// Main error type for MotionSaver
#[derive(Error, Debug)]
pub enum LockError {
    #[error("OS integration error: {0}")]
    Os(#[from] OsError),

    #[error("Credential error: {0}")]
    Credential(#[from] CredentialError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// OS integration errors. Every variant names the primitive that failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OsError {
    #[error("Keyboard hook failed: {reason}")]
    KeyboardHookFailed { reason: String },

    #[error("Unknown key in combination '{combination}': {key}")]
    UnknownKey { combination: String, key: String },

    #[error("Registry write failed for {path}\\{name}: {reason}")]
    RegistryFailed {
        path: String,
        name: String,
        reason: String,
    },

    #[error("Monitor enumeration failed: {reason}")]
    MonitorEnumFailed { reason: String },

    #[error("Monitor info query failed for handle {handle:#x}: {reason}")]
    MonitorInfoFailed { handle: usize, reason: String },

    #[error("Window creation failed: {reason}")]
    WindowCreateFailed { reason: String },

    #[error("Display change handling failed: {reason}")]
    DisplayChangeFailed { reason: String },

    #[error("LockWorkStation failed: {reason}")]
    LockWorkstationFailed { reason: String },

    #[error("SendInput failed: {reason}")]
    SendInputFailed { reason: String },

    #[error("Process query failed: {reason}")]
    ProcessQueryFailed { reason: String },

    #[error("Process spawn failed for {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Platform not supported: {platform}")]
    PlatformNotSupported { platform: String },
}

/// Credential store errors
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Username already exists: {0}")]
    UserExists(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Cannot delete the last user")]
    LastUser,

    #[error("Username must not be empty")]
    EmptyUsername,

    #[error("Failed to save configuration: {0}")]
    SaveFailed(String),

    #[error("Persisted store did not read back: {0}")]
    ReadBackMismatch(PathBuf),
}

/// Settings file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Another instance holds the lock file: {0}")]
    AlreadyRunning(PathBuf),
}

impl OsError {
    /// Short name of the OS primitive, used as a structured log field.
    pub fn primitive(&self) -> &'static str {
        match self {
            OsError::KeyboardHookFailed { .. } | OsError::UnknownKey { .. } => "SetWindowsHookExW",
            OsError::RegistryFailed { .. } => "Registry",
            OsError::MonitorEnumFailed { .. } => "EnumDisplayMonitors",
            OsError::MonitorInfoFailed { .. } => "GetMonitorInfoW",
            OsError::WindowCreateFailed { .. } => "CreateWindowExW",
            OsError::DisplayChangeFailed { .. } => "WM_DISPLAYCHANGE",
            OsError::LockWorkstationFailed { .. } => "LockWorkStation",
            OsError::SendInputFailed { .. } => "SendInput",
            OsError::ProcessQueryFailed { .. } => "GetProcessTimes",
            OsError::SpawnFailed { .. } => "CreateProcess",
            OsError::PlatformNotSupported { .. } => "none",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_error_converts_into_lock_error() {
        let err: LockError = OsError::LockWorkstationFailed {
            reason: "denied".to_string(),
        }
        .into();
        assert!(matches!(err, LockError::Os(_)));
        assert!(err.to_string().contains("LockWorkStation failed"));
    }

    #[test]
    fn test_primitive_names() {
        let err = OsError::RegistryFailed {
            path: "Software\\X".to_string(),
            name: "NoRun".to_string(),
            reason: "access denied".to_string(),
        };
        assert_eq!(err.primitive(), "Registry");
        assert!(err.to_string().contains("NoRun"));
    }
}
