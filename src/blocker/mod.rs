//! Key Blocker Module
//!
//! Suppresses OS hotkeys while the lock screen is up:
//! - `HotkeySuppressor`: hotkey intercepts and registry policy
//! - `HookWatchdog`: reinstalls hooks that went missing
//! - `SecureDesktopDetector`: restarts the process after a secure desktop
//!
//! Two `KeyBlocker` variants wrap them; the session picks one up front.
//!
//! Cross-thread signalling goes through [`BlockerFlags`]. Each flag has a
//! single writer: `auto_restart_suppressed` is written only by the
//! Ctrl+Alt+Del callback and read only by the watchdog.

pub mod hotkeys;
pub mod policy;
pub mod secure_desktop;
pub mod suppressor;
pub mod watchdog;
mod worker;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::core::config::LockTuning;
use crate::os::{HotkeyHook, PolicyRegistry, ProcessSampler, SessionControl};

pub use hotkeys::{HotkeyAction, HotkeyEntry, IDLE_TRIGGER, LOCK_SCREEN_HOTKEYS};
pub use secure_desktop::{RestartHook, SecureDesktopDetector};
pub use suppressor::HotkeySuppressor;
pub use watchdog::{HookCheck, HookWatchdog, ReinstallRequest, WatchdogAction};

/// State shared between the UI thread, the watchdog and the detector
#[derive(Debug, Default)]
pub struct BlockerFlags {
    /// Hotkey intercepts are installed
    pub hooks_active: AtomicBool,
    /// Registry policy has been written and needs restoring
    pub registry_disabled: AtomicBool,
    /// `enable` has run and `disable` has not
    pub full_blocking: AtomicBool,
    /// Set on Ctrl+Alt+Del; the watchdog must not reinstall hooks
    pub auto_restart_suppressed: AtomicBool,
    /// A self-restart was scheduled; latches for the process lifetime
    pub restart_pending: AtomicBool,
    /// A scheduled restart must not run
    pub restart_cancelled: AtomicBool,
}

impl BlockerFlags {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

/// Snapshot reported by `KeyBlocker::status`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BlockerStatus {
    pub hooks_active: bool,
    pub registry_active: bool,
    pub full_blocking_active: bool,
    pub monitoring_active: bool,
    pub restart_pending: bool,
}

impl BlockerStatus {
    fn from_flags(flags: &BlockerFlags, monitoring_active: bool) -> Self {
        Self {
            hooks_active: flags.hooks_active.load(Ordering::SeqCst),
            registry_active: flags.registry_disabled.load(Ordering::SeqCst),
            full_blocking_active: flags.full_blocking.load(Ordering::SeqCst),
            monitoring_active,
            restart_pending: flags.restart_pending.load(Ordering::SeqCst),
        }
    }
}

/// Hotkey blocking as seen by the lock session
pub trait KeyBlocker {
    /// Arm blocking. Returns false if any part failed to arm; whatever did
    /// arm stays armed.
    fn start(&mut self) -> bool;

    /// Disarm everything. Idempotent.
    fn stop(&mut self);

    fn status(&self) -> BlockerStatus;

    /// Reinstall lost hooks. Runs on the UI thread at the watchdog's request.
    fn reinstall_hooks(&mut self) -> bool;

    /// Hooks installed and fully armed
    fn is_active(&self) -> bool {
        let status = self.status();
        status.hooks_active && status.full_blocking_active
    }
}

/// Hotkey suppression and policy only
pub struct BasicKeyBlocker {
    suppressor: HotkeySuppressor,
}

impl BasicKeyBlocker {
    pub fn new(suppressor: HotkeySuppressor) -> Self {
        Self { suppressor }
    }
}

impl KeyBlocker for BasicKeyBlocker {
    fn start(&mut self) -> bool {
        self.suppressor.enable(true, true)
    }

    fn stop(&mut self) {
        self.suppressor.disable();
    }

    fn status(&self) -> BlockerStatus {
        BlockerStatus::from_flags(self.suppressor.flags(), false)
    }

    fn reinstall_hooks(&mut self) -> bool {
        self.suppressor.install_hooks()
    }
}

/// Suppression plus hook watchdog and secure desktop detector
pub struct EnhancedKeyBlocker {
    suppressor: HotkeySuppressor,
    watchdog: HookWatchdog,
    detector: SecureDesktopDetector,
    reinstall: ReinstallRequest,
}

impl EnhancedKeyBlocker {
    pub fn new(
        suppressor: HotkeySuppressor,
        sampler: Box<dyn ProcessSampler>,
        tuning: &LockTuning,
        reinstall: ReinstallRequest,
        restart: RestartHook,
    ) -> Self {
        let flags = Arc::clone(suppressor.flags());
        Self {
            watchdog: HookWatchdog::new(
                Arc::clone(&flags),
                suppressor.installed_check(),
                tuning.watchdog_interval,
                tuning.join_timeout,
            ),
            detector: SecureDesktopDetector::new(flags, tuning.clone(), sampler, restart),
            suppressor,
            reinstall,
        }
    }
}

impl KeyBlocker for EnhancedKeyBlocker {
    fn start(&mut self) -> bool {
        tracing::info!("Starting enhanced key blocking");
        let enabled = self.suppressor.enable(true, true);
        let watching = self.watchdog.start(Arc::clone(&self.reinstall));
        let detecting = self.detector.start();
        enabled && watching && detecting
    }

    fn stop(&mut self) {
        tracing::info!("Stopping enhanced key blocking");
        self.watchdog.stop();
        self.detector.stop();
        self.suppressor.disable();
    }

    fn status(&self) -> BlockerStatus {
        let monitoring = self.watchdog.is_running() || self.detector.is_running();
        BlockerStatus::from_flags(self.suppressor.flags(), monitoring)
    }

    fn reinstall_hooks(&mut self) -> bool {
        let ok = self.suppressor.install_hooks();
        if ok {
            tracing::info!("Hooks reinstalled");
        } else {
            tracing::warn!("Hook reinstall incomplete");
        }
        ok
    }
}

/// Which blocker a session runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockerKind {
    /// `run_as_admin` is off
    Disabled,
    /// Not elevated: suppression and policy only
    Basic,
    /// Elevated: suppression plus watchdog and detector
    Enhanced,
}

impl BlockerKind {
    pub fn select(run_as_admin: bool, elevated: bool) -> Self {
        match (run_as_admin, elevated) {
            (false, _) => BlockerKind::Disabled,
            (true, false) => BlockerKind::Basic,
            (true, true) => BlockerKind::Enhanced,
        }
    }

    /// Assemble the blocker over the given OS primitives
    pub fn build(
        self,
        hook: Box<dyn HotkeyHook>,
        registry: Box<dyn PolicyRegistry>,
        session: Arc<dyn SessionControl>,
        sampler: Box<dyn ProcessSampler>,
        tuning: &LockTuning,
        callbacks: BlockerCallbacks,
    ) -> Option<Box<dyn KeyBlocker>> {
        let suppressor = HotkeySuppressor::new(hook, registry, session, BlockerFlags::new());
        match self {
            BlockerKind::Disabled => {
                tracing::info!("Hotkey blocking disabled by settings");
                None
            }
            BlockerKind::Basic => {
                tracing::info!("Not elevated, using basic key blocking");
                Some(Box::new(BasicKeyBlocker::new(suppressor)))
            }
            BlockerKind::Enhanced => Some(Box::new(EnhancedKeyBlocker::new(
                suppressor,
                sampler,
                tuning,
                callbacks.reinstall,
                callbacks.restart,
            ))),
        }
    }
}

/// Where the enhanced blocker's background threads report
pub struct BlockerCallbacks {
    /// Posts a hook reinstall to the UI thread
    pub reinstall: ReinstallRequest,
    /// Replaces the process after a secure desktop interruption
    pub restart: RestartHook,
}
