//! Hotkey suppressor
//!
//! Installs one suppressing intercept per table entry and flips registry
//! policy. Every hook and registry call happens on the UI thread.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::hotkeys::{HotkeyAction, HotkeyEntry, LOCK_SCREEN_HOTKEYS};
use super::policy;
use super::watchdog::HookCheck;
use super::BlockerFlags;
use crate::os::{HotkeyCallback, HotkeyHook, PolicyRegistry, SessionControl};

/// Hook shared with the callbacks it runs
pub type SharedHook = Arc<Mutex<Box<dyn HotkeyHook>>>;

pub struct HotkeySuppressor {
    hook: SharedHook,
    registry: Box<dyn PolicyRegistry>,
    session: Arc<dyn SessionControl>,
    table: &'static [HotkeyEntry],
    flags: Arc<BlockerFlags>,
}

impl HotkeySuppressor {
    pub fn new(
        hook: Box<dyn HotkeyHook>,
        registry: Box<dyn PolicyRegistry>,
        session: Arc<dyn SessionControl>,
        flags: Arc<BlockerFlags>,
    ) -> Self {
        Self {
            hook: Arc::new(Mutex::new(hook)),
            registry,
            session,
            table: LOCK_SCREEN_HOTKEYS,
            flags,
        }
    }

    /// Use a different hotkey table
    pub fn with_table(mut self, table: &'static [HotkeyEntry]) -> Self {
        self.table = table;
        self
    }

    pub fn flags(&self) -> &Arc<BlockerFlags> {
        &self.flags
    }

    /// Apply registry policy and/or install hooks.
    ///
    /// Each subsystem is attempted regardless of the other; whatever
    /// succeeded stays in place. Returns true only if both requested
    /// subsystems fully succeeded.
    pub fn enable(&mut self, use_registry: bool, use_hooks: bool) -> bool {
        tracing::info!(use_registry, use_hooks, "Enabling hotkey suppression");

        let registry_ok = !use_registry || self.apply_policy();
        let hooks_ok = !use_hooks || self.install_hooks();

        self.flags.full_blocking.store(true, Ordering::SeqCst);
        registry_ok && hooks_ok
    }

    /// Remove hooks and restore policy. Safe to call repeatedly or before
    /// any `enable`.
    pub fn disable(&mut self) {
        self.remove_hooks();
        if self.flags.registry_disabled.swap(false, Ordering::SeqCst) {
            policy::restore(self.registry.as_mut());
        }
        self.flags.full_blocking.store(false, Ordering::SeqCst);
    }

    /// Check of the live hook state, for the watchdog thread
    pub fn installed_check(&self) -> HookCheck {
        let hook = Arc::clone(&self.hook);
        Arc::new(move || hook.lock().is_installed())
    }

    /// Hooks installed and suppression fully armed
    pub fn is_active(&self) -> bool {
        self.flags.hooks_active.load(Ordering::SeqCst)
            && self.flags.full_blocking.load(Ordering::SeqCst)
    }

    fn apply_policy(&mut self) -> bool {
        let ok = policy::apply(self.registry.as_mut());
        // Partial writes still need restoring
        self.flags.registry_disabled.store(true, Ordering::SeqCst);
        ok
    }

    /// Register every table entry. A no-op while hooks are active and the
    /// OS still has the hook.
    pub fn install_hooks(&mut self) -> bool {
        let mut hook = self.hook.lock();
        if self.flags.hooks_active.load(Ordering::SeqCst) {
            if hook.is_installed() {
                return true;
            }
            tracing::warn!("Hook flagged active but not installed, reinstalling");
        }

        let mut installed = 0;
        for entry in self.table {
            let callback = make_callback(
                *entry,
                Arc::downgrade(&self.hook),
                Arc::clone(&self.session),
                Arc::clone(&self.flags),
            );
            match hook.register(entry.combination, callback) {
                Ok(()) => installed += 1,
                Err(e) => tracing::warn!(
                    primitive = e.primitive(),
                    "Failed to block {}: {}",
                    entry.label,
                    e
                ),
            }
        }
        drop(hook);

        self.flags.hooks_active.store(installed > 0, Ordering::SeqCst);
        tracing::info!("Hotkey hooks installed: {}/{}", installed, self.table.len());
        installed == self.table.len()
    }

    pub fn remove_hooks(&mut self) {
        self.hook.lock().unregister_all();
        if self.flags.hooks_active.swap(false, Ordering::SeqCst) {
            tracing::info!("Hotkey hooks removed");
        }
    }
}

/// Build the callback run when `entry` is pressed.
///
/// The hook is held weakly: it owns the callbacks.
fn make_callback(
    entry: HotkeyEntry,
    hook: Weak<Mutex<Box<dyn HotkeyHook>>>,
    session: Arc<dyn SessionControl>,
    flags: Arc<BlockerFlags>,
) -> HotkeyCallback {
    Arc::new(move || match entry.action {
        HotkeyAction::Suppress => {
            tracing::info!("Blocked: {}", entry.label);
        }
        HotkeyAction::ReleaseRightAlt => {
            tracing::info!("Blocked: {}", entry.label);
            if let Err(e) = session.release_right_alt() {
                tracing::warn!(primitive = e.primitive(), "{}", e);
            }
        }
        HotkeyAction::LockWorkstation => {
            tracing::info!("{} pressed, locking workstation", entry.label);
            flags.auto_restart_suppressed.store(true, Ordering::SeqCst);

            if let Some(hook) = hook.upgrade() {
                hook.lock().unregister_all();
            }
            flags.hooks_active.store(false, Ordering::SeqCst);

            if let Err(e) = session.lock_workstation() {
                tracing::error!(primitive = e.primitive(), "{}", e);
            }
        }
    })
}
