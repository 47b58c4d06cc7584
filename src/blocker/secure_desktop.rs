//! Secure desktop detector
//!
//! Best-effort heuristic: while the OS secure desktop (the Ctrl+Alt+Del
//! screen) is up, a few system processes burn CPU. When enough of them are
//! hot at once a self-restart is scheduled so the new process installs
//! fresh hooks. False positives cost a needless restart; false negatives
//! leave recovery to the hook watchdog.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use super::worker::{sleep_while_running, Worker};
use super::BlockerFlags;
use crate::core::config::LockTuning;
use crate::os::ProcessSampler;

/// Login manager process
pub const LOGIN_MANAGER: &str = "winlogon.exe";

/// Processes that get busy while the secure desktop is shown
pub const SECURE_DESKTOP_PROCESSES: &[&str] = &["logonui.exe", "lsass.exe", "dwm.exe", "csrss.exe"];

/// Re-executes the process; runs on the restart timer thread
pub type RestartHook = Arc<dyn Fn() + Send + Sync>;

/// Result of one detector poll
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    /// Login-manager CPU, when sampled this poll
    pub login_manager_cpu: Option<f32>,
    /// Number of hot security processes, when sampled this poll
    pub hot_processes: Option<usize>,
    /// Strong signal observed
    pub secure_desktop: bool,
}

/// Two-tier sampling schedule
pub struct DetectorState {
    tuning: LockTuning,
    last_login_check: Instant,
    last_security_check: Instant,
}

impl DetectorState {
    /// First samples are due one full period after `started`
    pub fn new(tuning: LockTuning, started: Instant) -> Self {
        Self {
            tuning,
            last_login_check: started,
            last_security_check: started,
        }
    }

    pub fn poll(&mut self, now: Instant, sampler: &mut dyn ProcessSampler) -> Detection {
        let mut detection = Detection::default();

        if now.duration_since(self.last_login_check) >= self.tuning.login_manager_period {
            self.last_login_check = now;
            let cpu = self.max_cpu(sampler, &[LOGIN_MANAGER]);
            if cpu > self.tuning.login_manager_threshold {
                tracing::info!("Login manager activity: {:.1}% CPU", cpu);
            }
            detection.login_manager_cpu = Some(cpu);
        }

        if now.duration_since(self.last_security_check) >= self.tuning.security_process_period {
            self.last_security_check = now;
            let hot = self.hot_security_processes(sampler);
            detection.secure_desktop = hot >= self.tuning.min_hot_processes;
            if detection.secure_desktop {
                tracing::warn!("{} secure desktop processes active", hot);
            }
            detection.hot_processes = Some(hot);
        }

        detection
    }

    fn max_cpu(&self, sampler: &mut dyn ProcessSampler, names: &[&str]) -> f32 {
        match sampler.sample(names, self.tuning.cpu_sample_window) {
            Ok(samples) => samples.iter().map(|s| s.cpu_percent).fold(0.0, f32::max),
            Err(e) => {
                tracing::warn!(primitive = e.primitive(), "{}", e);
                0.0
            }
        }
    }

    fn hot_security_processes(&self, sampler: &mut dyn ProcessSampler) -> usize {
        match sampler.sample(SECURE_DESKTOP_PROCESSES, self.tuning.cpu_sample_window) {
            Ok(samples) => samples
                .iter()
                .filter(|s| s.cpu_percent > self.tuning.security_process_threshold)
                .inspect(|s| {
                    tracing::debug!("Secure desktop process active: {} ({:.1}% CPU)", s.name, s.cpu_percent)
                })
                .count(),
            Err(e) => {
                tracing::warn!(primitive = e.primitive(), "{}", e);
                0
            }
        }
    }
}

/// Latch `restart_pending` and start the grace timer. Returns false when a
/// restart was already pending.
pub fn schedule_restart(flags: &Arc<BlockerFlags>, tuning: &LockTuning, restart: &RestartHook) -> bool {
    if flags.restart_pending.swap(true, Ordering::SeqCst) {
        return false;
    }

    tracing::info!("Scheduling application restart in {:?}", tuning.restart_grace);
    let flags = Arc::clone(flags);
    let grace = tuning.restart_grace;
    let restart = Arc::clone(restart);
    let spawned = std::thread::Builder::new()
        .name("restart-timer".to_string())
        .spawn(move || {
            std::thread::sleep(grace);
            if flags.restart_cancelled.load(Ordering::SeqCst) {
                tracing::info!("Scheduled restart cancelled by unlock");
                return;
            }
            restart();
        });

    if let Err(e) = spawned {
        tracing::error!("Failed to start restart timer: {}", e);
    }
    true
}

pub struct SecureDesktopDetector {
    flags: Arc<BlockerFlags>,
    tuning: LockTuning,
    sampler: Arc<Mutex<Box<dyn ProcessSampler>>>,
    restart: RestartHook,
    worker: Option<Worker>,
}

impl SecureDesktopDetector {
    pub fn new(
        flags: Arc<BlockerFlags>,
        tuning: LockTuning,
        sampler: Box<dyn ProcessSampler>,
        restart: RestartHook,
    ) -> Self {
        Self {
            flags,
            tuning,
            sampler: Arc::new(Mutex::new(sampler)),
            restart,
            worker: None,
        }
    }

    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return true;
        }

        let flags = Arc::clone(&self.flags);
        let tuning = self.tuning.clone();
        let sampler = Arc::clone(&self.sampler);
        let restart = Arc::clone(&self.restart);

        let spawned = Worker::spawn("secure-desktop-detector", move |running| {
            let mut state = DetectorState::new(tuning.clone(), Instant::now());
            while sleep_while_running(&running, tuning.detector_tick) {
                let detection = state.poll(Instant::now(), sampler.lock().as_mut());
                if detection.secure_desktop && running.load(Ordering::SeqCst) {
                    schedule_restart(&flags, &tuning, &restart);
                }
            }
        });

        match spawned {
            Ok(worker) => {
                self.worker = Some(worker);
                tracing::info!("Secure desktop monitoring started");
                true
            }
            Err(e) => {
                tracing::error!("Failed to start secure desktop detector: {}", e);
                false
            }
        }
    }

    /// Stop polling and cancel any restart still in its grace period
    pub fn stop(&mut self) {
        self.flags.restart_pending.store(true, Ordering::SeqCst);
        self.flags.restart_cancelled.store(true, Ordering::SeqCst);

        if let Some(mut worker) = self.worker.take() {
            worker.stop(self.tuning.join_timeout);
            tracing::info!("Secure desktop monitoring stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().map_or(false, Worker::is_running)
    }
}
