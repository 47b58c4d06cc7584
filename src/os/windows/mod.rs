//! Windows-specific OS integration
//!
//! This module provides Windows-specific implementations for:
//! - Low-level keyboard hooks
//! - Registry policy
//! - Workstation lock and input injection
//! - Monitor enumeration and blackout windows
//! - Display change monitoring
//! - Process CPU sampling
//! - Elevation
//! - The lock window and the password prompt

pub mod cover;
pub mod display_listener;
pub mod elevation;
pub mod keyboard;
pub mod lock_window;
pub mod monitor;
pub mod process;
pub mod prompt;
pub mod registry;
pub mod session;

pub use display_listener::DisplayChangeListener;
pub use lock_window::{LockWindow, LockWindowHandle};
pub use prompt::password_dialog;
