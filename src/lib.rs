//! MotionSaver - password-gated lock screen
//!
//! This crate provides the lock-screen core:
//! - Per-user password store
//! - OS hotkey suppression with a hook watchdog and a secure desktop detector
//! - Blackout windows on every secondary monitor
//! - The lock session state machine tying them together
//! - OS integration behind traits, with Windows and stub implementations

pub mod blocker;
pub mod core;
pub mod credentials;
pub mod display;
pub mod logging;
pub mod os;
pub mod session;

// Re-export commonly used items
pub use crate::core::config::{AppSettings, LockTuning};
pub use crate::core::error::{LockError, Result};
pub use blocker::{BlockerKind, BlockerStatus, KeyBlocker};
pub use credentials::CredentialStore;
pub use display::MonitorBlackoutManager;
pub use session::{LockSessionController, SessionState, TriggerOutcome};
