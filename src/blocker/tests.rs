//! Tests for the key blocker

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use proptest::prelude::*;

use super::secure_desktop::{schedule_restart, DetectorState, LOGIN_MANAGER};
use super::watchdog::tick;
use super::*;
use crate::os::fake::{FakeHook, FakeRegistry, FakeSampler, FakeSession};
use crate::os::RegistryHive;

struct Harness {
    hook: FakeHook,
    registry: FakeRegistry,
    session: Arc<FakeSession>,
    flags: Arc<BlockerFlags>,
}

impl Harness {
    fn new() -> Self {
        Self {
            hook: FakeHook::new(),
            registry: FakeRegistry::default(),
            session: Arc::new(FakeSession::default()),
            flags: BlockerFlags::new(),
        }
    }

    fn suppressor(&self) -> HotkeySuppressor {
        HotkeySuppressor::new(
            Box::new(self.hook.clone()),
            Box::new(self.registry.clone()),
            self.session.clone(),
            Arc::clone(&self.flags),
        )
    }
}

fn fast_tuning() -> LockTuning {
    LockTuning {
        watchdog_interval: Duration::from_millis(10),
        join_timeout: Duration::from_millis(500),
        detector_tick: Duration::from_millis(10),
        login_manager_period: Duration::from_millis(20),
        security_process_period: Duration::from_millis(20),
        cpu_sample_window: Duration::ZERO,
        restart_grace: Duration::from_millis(50),
        ..LockTuning::default()
    }
}

fn counter() -> (Arc<AtomicUsize>, Arc<dyn Fn() + Send + Sync>) {
    let count = Arc::new(AtomicUsize::new(0));
    let inner = Arc::clone(&count);
    let callback: Arc<dyn Fn() + Send + Sync> = Arc::new(move || {
        inner.fetch_add(1, Ordering::SeqCst);
    });
    (count, callback)
}

fn fixed_check(installed: bool) -> HookCheck {
    Arc::new(move || installed)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

// ============================================================================
// Suppressor
// ============================================================================

#[test]
fn test_enable_installs_every_hotkey() {
    let harness = Harness::new();
    let mut suppressor = harness.suppressor();

    assert!(suppressor.enable(true, true));
    assert!(suppressor.is_active());
    assert_eq!(harness.hook.registered().len(), LOCK_SCREEN_HOTKEYS.len());
    assert!(harness.flags.registry_disabled.load(Ordering::SeqCst));
    assert_eq!(
        harness.registry.get(
            RegistryHive::CurrentUser,
            "Software\\Microsoft\\Windows\\CurrentVersion\\Policies\\System",
            "DisableTaskMgr"
        ),
        Some(1)
    );
}

#[test]
fn test_enable_keeps_partial_success() {
    let harness = Harness::new();
    harness.hook.state.lock().failing = vec!["alt+tab".to_string()];
    let mut suppressor = harness.suppressor();

    assert!(!suppressor.enable(true, true));
    assert!(harness.flags.hooks_active.load(Ordering::SeqCst));
    assert!(harness.flags.full_blocking.load(Ordering::SeqCst));
    assert_eq!(harness.hook.registered().len(), LOCK_SCREEN_HOTKEYS.len() - 1);
}

#[test]
fn test_enable_hooks_only_leaves_registry_alone() {
    let harness = Harness::new();
    let mut suppressor = harness.suppressor();

    assert!(suppressor.enable(false, true));
    assert!(!harness.flags.registry_disabled.load(Ordering::SeqCst));
    assert_eq!(harness.registry.len(), 0);
}

#[test]
fn test_disable_is_idempotent() {
    let harness = Harness::new();
    let mut suppressor = harness.suppressor();

    // Before any enable
    suppressor.disable();
    assert_eq!(harness.registry.refreshes.load(Ordering::SeqCst), 0);

    suppressor.enable(true, true);
    suppressor.disable();
    let refreshes = harness.registry.refreshes.load(Ordering::SeqCst);
    let values = harness.registry.len();

    suppressor.disable();
    assert_eq!(harness.registry.refreshes.load(Ordering::SeqCst), refreshes);
    assert_eq!(harness.registry.len(), values);
    assert!(!suppressor.is_active());
    assert!(harness.hook.registered().is_empty());
}

#[test]
fn test_install_hooks_is_noop_while_active() {
    let harness = Harness::new();
    let mut suppressor = harness.suppressor();

    suppressor.enable(false, true);
    let calls = harness.hook.state.lock().register_calls;
    assert!(suppressor.install_hooks());
    assert_eq!(harness.hook.state.lock().register_calls, calls);
}

#[test]
fn test_secure_attention_locks_workstation() {
    let harness = Harness::new();
    let mut suppressor = harness.suppressor();
    suppressor.enable(true, true);

    assert!(harness.hook.fire(hotkeys::SECURE_ATTENTION_COMBINATION));

    assert!(harness.flags.auto_restart_suppressed.load(Ordering::SeqCst));
    assert!(!harness.flags.hooks_active.load(Ordering::SeqCst));
    assert!(harness.hook.registered().is_empty());
    assert_eq!(harness.session.locks(), 1);
}

#[test]
fn test_altgr_releases_right_alt() {
    let harness = Harness::new();
    let mut suppressor = harness.suppressor();
    suppressor.enable(false, true);

    assert!(harness.hook.fire("altgr"));
    assert!(harness.hook.fire("alt+tab"));

    assert_eq!(harness.session.releases(), 1);
    assert_eq!(harness.session.locks(), 0);
    assert!(harness.flags.hooks_active.load(Ordering::SeqCst));
}

// ============================================================================
// Watchdog
// ============================================================================

#[test]
fn test_watchdog_tick_healthy() {
    let flags = BlockerFlags::new();
    flags.hooks_active.store(true, Ordering::SeqCst);
    let (count, reinstall) = counter();

    assert_eq!(tick(&flags, &fixed_check(true), &reinstall), WatchdogAction::Healthy);
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_watchdog_tick_requests_reinstall() {
    let flags = BlockerFlags::new();
    let (count, reinstall) = counter();

    assert_eq!(tick(&flags, &fixed_check(true), &reinstall), WatchdogAction::ReinstallRequested);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_watchdog_tick_sees_hook_dropped_by_os() {
    let harness = Harness::new();
    let mut suppressor = harness.suppressor();
    suppressor.enable(false, true);
    let installed = suppressor.installed_check();
    let (count, reinstall) = counter();

    assert_eq!(tick(&harness.flags, &installed, &reinstall), WatchdogAction::Healthy);

    harness.hook.drop_hook();
    assert!(harness.flags.hooks_active.load(Ordering::SeqCst));
    assert_eq!(
        tick(&harness.flags, &installed, &reinstall),
        WatchdogAction::ReinstallRequested
    );
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(!harness.flags.hooks_active.load(Ordering::SeqCst));

    // The cleared flag lets the reinstall register again
    assert!(suppressor.install_hooks());
    assert_eq!(harness.hook.registered().len(), LOCK_SCREEN_HOTKEYS.len());
    assert_eq!(tick(&harness.flags, &installed, &reinstall), WatchdogAction::Healthy);
}

#[test]
fn test_watchdog_respects_suppression() {
    let harness = Harness::new();
    let mut suppressor = harness.suppressor();
    suppressor.enable(false, true);
    harness.hook.fire(hotkeys::SECURE_ATTENTION_COMBINATION);

    let installed = suppressor.installed_check();
    let (count, reinstall) = counter();
    for _ in 0..5 {
        assert_eq!(
            tick(&harness.flags, &installed, &reinstall),
            WatchdogAction::SkippedSuppressed
        );
    }
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_watchdog_thread_reinstalls_lost_hooks() {
    let flags = BlockerFlags::new();
    let (count, reinstall) = counter();
    let mut watchdog = HookWatchdog::new(
        Arc::clone(&flags),
        fixed_check(false),
        Duration::from_millis(10),
        Duration::from_millis(500),
    );

    assert!(watchdog.start(reinstall));
    assert!(watchdog.is_running());
    assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) > 0));

    watchdog.stop();
    assert!(!watchdog.is_running());
}

// ============================================================================
// Secure desktop detector
// ============================================================================

#[test]
fn test_detector_waits_a_full_period() {
    let tuning = LockTuning::default();
    let started = Instant::now();
    let mut state = DetectorState::new(tuning, started);
    let mut sampler = FakeSampler::default();

    let detection = state.poll(started + Duration::from_secs(1), &mut sampler);
    assert_eq!(detection, secure_desktop::Detection::default());
    assert_eq!(sampler.calls(), 0);
}

#[test]
fn test_detector_samples_on_schedule() {
    let tuning = LockTuning::default();
    let started = Instant::now();
    let mut state = DetectorState::new(tuning, started);
    let mut sampler = FakeSampler::default();
    sampler.set(&[(LOGIN_MANAGER, 12.0), ("lsass.exe", 1.0)]);

    let detection = state.poll(started + Duration::from_secs(5), &mut sampler);
    assert_eq!(detection.login_manager_cpu, Some(12.0));
    assert_eq!(detection.hot_processes, None);
    assert!(!detection.secure_desktop);

    let detection = state.poll(started + Duration::from_secs(10), &mut sampler);
    assert_eq!(detection.hot_processes, Some(0));
    assert!(!detection.secure_desktop);
}

#[test]
fn test_detector_needs_two_hot_processes() {
    let started = Instant::now();
    let later = started + Duration::from_secs(10);

    let mut sampler = FakeSampler::default();
    sampler.set(&[("logonui.exe", 40.0), ("dwm.exe", 3.0)]);
    let mut state = DetectorState::new(LockTuning::default(), started);
    assert!(!state.poll(later, &mut sampler).secure_desktop);

    sampler.set(&[("LogonUI.exe", 40.0), ("dwm.exe", 25.0)]);
    let mut state = DetectorState::new(LockTuning::default(), started);
    let detection = state.poll(later, &mut sampler);
    assert!(detection.secure_desktop);
    assert_eq!(detection.hot_processes, Some(2));
}

#[test]
fn test_schedule_restart_latches() {
    let flags = BlockerFlags::new();
    let (count, restart) = counter();
    let tuning = fast_tuning();

    assert!(schedule_restart(&flags, &tuning, &restart));
    assert!(!schedule_restart(&flags, &tuning, &restart));

    assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) == 1));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_cancelled_restart_does_not_run() {
    let flags = BlockerFlags::new();
    let (count, restart) = counter();
    let tuning = fast_tuning();

    assert!(schedule_restart(&flags, &tuning, &restart));
    flags.restart_cancelled.store(true, Ordering::SeqCst);

    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[test]
fn test_detector_schedules_one_restart() {
    let flags = BlockerFlags::new();
    let (count, restart) = counter();
    let sampler = FakeSampler::default();
    sampler.set(&[("logonui.exe", 50.0), ("lsass.exe", 30.0), ("csrss.exe", 20.0)]);

    let mut detector = SecureDesktopDetector::new(
        Arc::clone(&flags),
        fast_tuning(),
        Box::new(sampler.clone()),
        restart,
    );
    assert!(detector.start());

    assert!(wait_until(Duration::from_secs(2), || count.load(Ordering::SeqCst) == 1));
    std::thread::sleep(Duration::from_millis(150));
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert!(flags.restart_pending.load(Ordering::SeqCst));

    detector.stop();
    assert!(!detector.is_running());
}

#[test]
fn test_detector_stop_blocks_future_restarts() {
    let flags = BlockerFlags::new();
    let (count, restart) = counter();
    let sampler = FakeSampler::default();

    let mut detector = SecureDesktopDetector::new(
        Arc::clone(&flags),
        fast_tuning(),
        Box::new(sampler.clone()),
        Arc::clone(&restart),
    );
    detector.start();
    detector.stop();

    assert!(flags.restart_pending.load(Ordering::SeqCst));
    assert!(!schedule_restart(&flags, &fast_tuning(), &restart));
    std::thread::sleep(Duration::from_millis(100));
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

// ============================================================================
// KeyBlocker variants
// ============================================================================

#[test]
fn test_basic_blocker_status() {
    let harness = Harness::new();
    let mut blocker = BasicKeyBlocker::new(harness.suppressor());

    assert_eq!(blocker.status(), BlockerStatus::default());
    assert!(blocker.start());

    let status = blocker.status();
    assert!(status.hooks_active);
    assert!(status.registry_active);
    assert!(status.full_blocking_active);
    assert!(!status.monitoring_active);
    assert!(blocker.is_active());

    blocker.stop();
    blocker.stop();
    assert!(!blocker.is_active());
    assert!(!blocker.status().registry_active);
}

#[test]
fn test_enhanced_blocker_lifecycle() {
    let harness = Harness::new();
    let (reinstalls, reinstall) = counter();
    let (restarts, restart) = counter();
    let mut blocker = EnhancedKeyBlocker::new(
        harness.suppressor(),
        Box::new(FakeSampler::default()),
        &fast_tuning(),
        reinstall,
        restart,
    );

    assert!(blocker.start());
    assert!(blocker.status().monitoring_active);

    // A hook the OS dropped is noticed and reinstalled on the UI thread
    harness.hook.drop_hook();
    assert!(wait_until(Duration::from_millis(500), || reinstalls.load(Ordering::SeqCst) > 0));
    assert!(blocker.reinstall_hooks());
    assert_eq!(harness.hook.registered().len(), LOCK_SCREEN_HOTKEYS.len());

    blocker.stop();
    let status = blocker.status();
    assert!(!status.monitoring_active);
    assert!(!status.hooks_active);
    assert!(status.restart_pending);
    assert_eq!(restarts.load(Ordering::SeqCst), 0);
}

proptest! {
    #[test]
    fn prop_disable_after_any_sequence_is_clean(ops in proptest::collection::vec(0u8..4, 0..12)) {
        let harness = Harness::new();
        let mut suppressor = harness.suppressor();
        for op in ops {
            match op {
                0 => { suppressor.enable(true, true); }
                1 => suppressor.disable(),
                2 => { suppressor.install_hooks(); }
                _ => { harness.hook.fire(hotkeys::SECURE_ATTENTION_COMBINATION); }
            }
        }

        suppressor.disable();
        prop_assert!(!suppressor.is_active());
        prop_assert!(!harness.flags.registry_disabled.load(Ordering::SeqCst));
        prop_assert!(harness.hook.registered().is_empty());
        // Only the two preference values written back on restore may remain
        prop_assert!(harness.registry.len() <= 2);
    }
}

#[test]
fn test_blocker_kind_selection() {
    assert_eq!(BlockerKind::select(false, false), BlockerKind::Disabled);
    assert_eq!(BlockerKind::select(false, true), BlockerKind::Disabled);
    assert_eq!(BlockerKind::select(true, false), BlockerKind::Basic);
    assert_eq!(BlockerKind::select(true, true), BlockerKind::Enhanced);
}

#[test]
fn test_build_blocker_per_kind() {
    let build = |kind: BlockerKind, harness: &Harness| {
        let (_, reinstall) = counter();
        let (_, restart) = counter();
        kind.build(
            Box::new(harness.hook.clone()),
            Box::new(harness.registry.clone()),
            harness.session.clone(),
            Box::new(FakeSampler::default()),
            &fast_tuning(),
            BlockerCallbacks { reinstall, restart },
        )
    };

    let harness = Harness::new();
    assert!(build(BlockerKind::Disabled, &harness).is_none());

    let harness = Harness::new();
    let mut basic = build(BlockerKind::Basic, &harness).unwrap();
    assert!(basic.start());
    assert!(basic.is_active());
    assert!(!basic.status().monitoring_active);
    basic.stop();
    assert_eq!(harness.registry.len(), 0);

    let harness = Harness::new();
    let mut enhanced = build(BlockerKind::Enhanced, &harness).unwrap();
    assert!(enhanced.start());
    assert!(enhanced.status().monitoring_active);
    enhanced.stop();
    assert!(!enhanced.status().monitoring_active);
    assert!(harness.hook.registered().is_empty());
}
