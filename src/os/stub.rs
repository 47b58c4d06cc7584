//! Stub OS layer for non-Windows platforms
//!
//! Provides no-op implementations for platforms where hotkey suppression,
//! policy and blackout windows are not supported (macOS, Linux). The core
//! still runs on top of them so it can be exercised end to end.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::core::error::OsError;
use crate::os::{
    CoverId, DialogResult, DisplayBackend, DisplayChangeCallback, HotkeyCallback, HotkeyHook,
    LockWindowEvent, LoopControl, MonitorInfo, MonitorRect, OsResult, PolicyRegistry,
    ProcessSample, ProcessSampler, RegistryHive, SessionControl,
};

fn unsupported() -> OsError {
    OsError::PlatformNotSupported {
        platform: std::env::consts::OS.to_string(),
    }
}

/// Hook that accepts registrations but never sees a keystroke
#[derive(Default)]
pub struct StubHotkeyHook {
    registered: usize,
}

impl HotkeyHook for StubHotkeyHook {
    fn register(&mut self, combination: &str, _callback: HotkeyCallback) -> OsResult<()> {
        tracing::debug!("Hotkey '{}' not interceptable on this platform", combination);
        self.registered += 1;
        Ok(())
    }

    fn unregister_all(&mut self) {
        self.registered = 0;
    }

    fn is_installed(&self) -> bool {
        self.registered > 0
    }
}

/// Registry that rejects every write
pub struct StubPolicyRegistry;

impl PolicyRegistry for StubPolicyRegistry {
    fn set_dword(&mut self, _hive: RegistryHive, _path: &str, _name: &str, _value: u32) -> OsResult<()> {
        Err(unsupported())
    }

    fn delete_value(&mut self, _hive: RegistryHive, _path: &str, _name: &str) -> OsResult<bool> {
        Ok(false)
    }

    fn refresh_policy(&mut self) {}
}

pub struct StubSessionControl;

impl SessionControl for StubSessionControl {
    fn lock_workstation(&self) -> OsResult<()> {
        Err(unsupported())
    }

    fn release_right_alt(&self) -> OsResult<()> {
        Ok(())
    }
}

/// Single 1920x1080 primary display; covers are bookkeeping only
#[derive(Default)]
pub struct StubDisplayBackend {
    next_id: usize,
}

impl DisplayBackend for StubDisplayBackend {
    fn enumerate_monitors(&self) -> OsResult<Vec<MonitorInfo>> {
        Ok(vec![MonitorInfo {
            handle: 0,
            rect: MonitorRect::new(0, 0, 1920, 1080),
            is_primary: true,
        }])
    }

    fn create_cover(&mut self, _rect: MonitorRect) -> OsResult<CoverId> {
        self.next_id += 1;
        Ok(CoverId(self.next_id))
    }

    fn destroy_cover(&mut self, _id: CoverId) {}

    fn subscribe_changes(&mut self, _on_change: DisplayChangeCallback) -> OsResult<()> {
        Ok(())
    }

    fn unsubscribe_changes(&mut self) {}
}

/// Sampler that finds no processes
pub struct StubProcessSampler;

impl ProcessSampler for StubProcessSampler {
    fn sample(&mut self, _names: &[&str], _window: Duration) -> OsResult<Vec<ProcessSample>> {
        Ok(Vec::new())
    }
}

/// There is no global keyboard hook to wait on
pub fn wait_for_hotkey(_hook: &mut dyn HotkeyHook, combination: &str) -> OsResult<()> {
    tracing::warn!("Cannot wait for '{}' on this platform", combination);
    Err(unsupported())
}

/// Never elevated off Windows
pub fn is_elevated() -> bool {
    false
}

pub fn run_elevated(program: &Path, _parameters: &str) -> OsResult<()> {
    tracing::warn!("Elevated launch of {:?} not supported", program);
    Err(unsupported())
}

/// Lock window handle; every operation is a no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockWindowHandle;

impl LockWindowHandle {
    pub fn pause(&self) {}

    pub fn resume(&self) {}

    pub fn focus(&self) {}

    pub fn close(&self) {}
}

/// The lock screen needs a Windows desktop
pub struct LockWindow;

impl LockWindow {
    pub fn create() -> OsResult<Self> {
        Err(unsupported())
    }

    pub fn handle(&self) -> LockWindowHandle {
        LockWindowHandle
    }

    pub fn rect(&self) -> MonitorRect {
        MonitorRect::new(0, 0, 1920, 1080)
    }

    pub fn waker(&self) -> Arc<dyn Fn() + Send + Sync> {
        Arc::new(|| {})
    }

    pub fn run<F>(self, _handler: F) -> OsResult<()>
    where
        F: FnMut(LockWindowEvent) -> LoopControl + 'static,
    {
        Err(unsupported())
    }
}

pub fn password_dialog(
    _owner: LockWindowHandle,
    _username: &str,
    _verify: &mut dyn FnMut(&str) -> bool,
) -> DialogResult {
    DialogResult::Cancelled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stub_hook_tracks_registration() {
        let mut hook = StubHotkeyHook::default();
        assert!(!hook.is_installed());
        hook.register("win+s", Arc::new(|| {})).unwrap();
        assert!(hook.is_installed());
        hook.unregister_all();
        assert!(!hook.is_installed());
    }

    #[test]
    fn test_stub_lock_is_unsupported() {
        assert!(matches!(
            StubSessionControl.lock_workstation(),
            Err(OsError::PlatformNotSupported { .. })
        ));
    }

    #[test]
    fn test_stub_never_elevated() {
        assert!(!is_elevated());
        assert!(run_elevated(Path::new("motion-saver"), "--min").is_err());
    }

    #[test]
    fn test_stub_lock_window_unsupported() {
        assert!(LockWindow::create().is_err());
        let mut verify = |_: &str| true;
        assert_eq!(
            password_dialog(LockWindowHandle, "User", &mut verify),
            DialogResult::Cancelled
        );
    }

    #[test]
    fn test_stub_display_single_primary() {
        let monitors = StubDisplayBackend::default().enumerate_monitors().unwrap();
        assert_eq!(monitors.len(), 1);
        assert!(monitors[0].is_primary);
    }
}
