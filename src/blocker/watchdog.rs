//! Hook watchdog
//!
//! Polls the shared flags and the hook itself, and asks the UI thread to
//! reinstall hooks that were lost, unless auto-restart has been suppressed
//! by a deliberate workstation lock.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use super::worker::{sleep_while_running, Worker};
use super::BlockerFlags;

/// Posts a hook reinstall onto the UI thread
pub type ReinstallRequest = Arc<dyn Fn() + Send + Sync>;

/// Reports whether the OS still has the hook installed
pub type HookCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Outcome of one watchdog tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogAction {
    Healthy,
    ReinstallRequested,
    SkippedSuppressed,
}

/// Decide and act for one tick.
///
/// Hooks the OS removed behind our back count as lost: the flag is cleared
/// so the reinstall on the UI thread actually registers again.
pub fn tick(
    flags: &BlockerFlags,
    hook_installed: &HookCheck,
    reinstall: &ReinstallRequest,
) -> WatchdogAction {
    if flags.hooks_active.load(Ordering::SeqCst) {
        if hook_installed() {
            return WatchdogAction::Healthy;
        }
        tracing::warn!("Hotkey hook removed by the OS");
        flags.hooks_active.store(false, Ordering::SeqCst);
    }

    if flags.auto_restart_suppressed.load(Ordering::SeqCst) {
        tracing::debug!("Hooks inactive, auto-restart suppressed after workstation lock");
        return WatchdogAction::SkippedSuppressed;
    }

    tracing::warn!("Hotkey hooks lost, requesting reinstall");
    reinstall();
    WatchdogAction::ReinstallRequested
}

pub struct HookWatchdog {
    flags: Arc<BlockerFlags>,
    hook_installed: HookCheck,
    interval: Duration,
    join_timeout: Duration,
    worker: Option<Worker>,
}

impl HookWatchdog {
    pub fn new(
        flags: Arc<BlockerFlags>,
        hook_installed: HookCheck,
        interval: Duration,
        join_timeout: Duration,
    ) -> Self {
        Self {
            flags,
            hook_installed,
            interval,
            join_timeout,
            worker: None,
        }
    }

    pub fn start(&mut self, reinstall: ReinstallRequest) -> bool {
        if self.is_running() {
            return true;
        }

        let flags = Arc::clone(&self.flags);
        let hook_installed = Arc::clone(&self.hook_installed);
        let interval = self.interval;
        let spawned = Worker::spawn("hook-watchdog", move |running| {
            tracing::debug!("Hook watchdog started");
            while sleep_while_running(&running, interval) {
                tick(&flags, &hook_installed, &reinstall);
            }
            tracing::debug!("Hook watchdog exiting");
        });

        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                tracing::info!("Hook monitoring started");
                true
            }
            Err(e) => {
                tracing::error!("Failed to start hook watchdog: {}", e);
                false
            }
        }
    }

    pub fn stop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.stop(self.join_timeout);
            tracing::info!("Hook monitoring stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map_or(false, Worker::is_running)
    }
}

impl Drop for HookWatchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
