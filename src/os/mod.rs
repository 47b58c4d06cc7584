//! OS Integration Layer for MotionSaver
//!
//! This module provides platform-specific functionality for:
//! - Low-level keyboard hook interception
//! - Registry policy for Task Manager and shell hotkeys
//! - Workstation lock and stuck-modifier release
//! - Monitor enumeration, blackout windows and display change notification
//! - Per-process CPU sampling
//! - Elevation checks and elevated launch
//! - The lock window and its password dialog
//!
//! The lock-screen core only talks to the traits below; `windows` implements
//! them with Win32 calls and `stub` with no-ops elsewhere.

pub mod keys;

#[cfg(windows)]
pub mod windows;

#[cfg(not(windows))]
pub mod stub;

#[cfg(test)]
pub mod fake;

use std::sync::Arc;

use crate::core::error::OsError;

pub use keys::{Key, KeyCombo, ModifierState};

#[cfg(windows)]
pub use self::windows::elevation::{is_elevated, run_elevated};
#[cfg(windows)]
pub use self::windows::keyboard::wait_for_hotkey;
#[cfg(windows)]
pub use self::windows::{password_dialog, LockWindow, LockWindowHandle};

#[cfg(not(windows))]
pub use stub::{
    is_elevated, password_dialog, run_elevated, wait_for_hotkey, LockWindow, LockWindowHandle,
};

/// OS call result
pub type OsResult<T> = std::result::Result<T, OsError>;

/// Monitor information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorInfo {
    /// Monitor handle (platform-specific)
    pub handle: usize,
    /// Monitor bounds
    pub rect: MonitorRect,
    /// Whether this is the primary monitor
    pub is_primary: bool,
}

/// Monitor rectangle bounds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MonitorRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl MonitorRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build from (left, top, right, bottom)
    pub fn from_corners(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    /// Half-open containment test
    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }
}

/// Callback invoked when a registered combination is pressed
pub type HotkeyCallback = Arc<dyn Fn() + Send + Sync>;

/// Callback invoked on a display configuration change
pub type DisplayChangeCallback = Arc<dyn Fn() + Send + Sync>;

/// Global keyboard hook.
///
/// Every registered combination is suppressed: the keystroke never reaches
/// the OS and the callback runs instead.
pub trait HotkeyHook: Send {
    /// Register a suppressing intercept for `combination`
    fn register(&mut self, combination: &str, callback: HotkeyCallback) -> OsResult<()>;

    /// Remove every intercept and the underlying hook
    fn unregister_all(&mut self);

    /// Whether the underlying hook is currently installed
    fn is_installed(&self) -> bool;
}

/// Registry root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegistryHive {
    LocalMachine,
    CurrentUser,
}

impl std::fmt::Display for RegistryHive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryHive::LocalMachine => write!(f, "HKLM"),
            RegistryHive::CurrentUser => write!(f, "HKCU"),
        }
    }
}

/// Registry access for shell policy values
pub trait PolicyRegistry: Send {
    /// Create the key if needed and write a DWORD value
    fn set_dword(&mut self, hive: RegistryHive, path: &str, name: &str, value: u32)
        -> OsResult<()>;

    /// Delete a value. Returns `false` when it was not present.
    fn delete_value(&mut self, hive: RegistryHive, path: &str, name: &str) -> OsResult<bool>;

    /// Ask the OS to re-read policy. Best-effort and non-blocking.
    fn refresh_policy(&mut self);
}

/// Session-level primitives
pub trait SessionControl: Send + Sync {
    /// Lock the interactive session immediately
    fn lock_workstation(&self) -> OsResult<()>;

    /// Send a key-up for the right Alt key
    fn release_right_alt(&self) -> OsResult<()>;
}

/// Opaque id of a blackout window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoverId(pub usize);

/// Display enumeration and blackout windows
pub trait DisplayBackend {
    /// All monitors with their OS-reported primary flag
    fn enumerate_monitors(&self) -> OsResult<Vec<MonitorInfo>>;

    /// Create an opaque, topmost, undecorated window covering `rect`
    fn create_cover(&mut self, rect: MonitorRect) -> OsResult<CoverId>;

    /// Destroy a window created by `create_cover`
    fn destroy_cover(&mut self, id: CoverId);

    /// Start delivering display change notifications
    fn subscribe_changes(&mut self, on_change: DisplayChangeCallback) -> OsResult<()>;

    /// Stop delivering display change notifications
    fn unsubscribe_changes(&mut self);
}

/// CPU usage of one process over a sample window
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSample {
    pub name: String,
    pub pid: u32,
    /// Percent of one core; may exceed 100 on multi-core machines
    pub cpu_percent: f32,
}

/// Per-process CPU sampling
pub trait ProcessSampler: Send {
    /// Sample every running process whose executable name matches one of
    /// `names` (case-insensitive). Blocks for about `window`.
    fn sample(&mut self, names: &[&str], window: std::time::Duration)
        -> OsResult<Vec<ProcessSample>>;
}

/// Input and timer events from the lock window's message loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockWindowEvent {
    /// Trigger key, click or close request
    Trigger,
    /// Another thread posted work
    Wake,
    /// Periodic timer
    Tick,
}

/// Whether the lock window loop keeps running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Quit,
}

/// How the password dialog closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogResult {
    Accepted,
    Cancelled,
}

/// Platform implementations bundled for a lock session
pub struct Platform {
    pub hook: Box<dyn HotkeyHook>,
    pub registry: Box<dyn PolicyRegistry>,
    pub session: Arc<dyn SessionControl>,
    pub display: Box<dyn DisplayBackend>,
    pub sampler: Box<dyn ProcessSampler>,
}

impl Platform {
    /// Implementations for the current OS
    #[cfg(windows)]
    pub fn native() -> Self {
        Self {
            hook: Box::new(self::windows::keyboard::WindowsHotkeyHook::new()),
            registry: Box::new(self::windows::registry::WindowsPolicyRegistry::new()),
            session: Arc::new(self::windows::session::WindowsSessionControl),
            display: Box::new(self::windows::cover::WindowsDisplayBackend::new()),
            sampler: Box::new(self::windows::process::WindowsProcessSampler),
        }
    }

    /// Implementations for the current OS
    #[cfg(not(windows))]
    pub fn native() -> Self {
        Self {
            hook: Box::new(stub::StubHotkeyHook::default()),
            registry: Box::new(stub::StubPolicyRegistry),
            session: Arc::new(stub::StubSessionControl),
            display: Box::new(stub::StubDisplayBackend::default()),
            sampler: Box::new(stub::StubProcessSampler),
        }
    }
}
