//! Recording fakes of the OS traits for unit tests

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::*;

/// Shared state behind [`FakeHook`]
#[derive(Default)]
pub struct FakeHookState {
    pub callbacks: Vec<(String, HotkeyCallback)>,
    pub installed: bool,
    pub register_calls: usize,
    pub unregister_calls: usize,
    /// Combinations whose registration fails
    pub failing: Vec<String>,
}

/// Keyboard hook that records registrations and can fire them
#[derive(Clone, Default)]
pub struct FakeHook {
    pub state: Arc<Mutex<FakeHookState>>,
}

impl FakeHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invoke the callback of `combination` the way the OS hook would
    pub fn fire(&self, combination: &str) -> bool {
        let callback = self
            .state
            .lock()
            .callbacks
            .iter()
            .find(|(c, _)| c == combination)
            .map(|(_, cb)| cb.clone());
        match callback {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }

    /// Simulate the OS silently dropping the hook
    pub fn drop_hook(&self) {
        let mut state = self.state.lock();
        state.installed = false;
        state.callbacks.clear();
    }

    pub fn registered(&self) -> Vec<String> {
        self.state
            .lock()
            .callbacks
            .iter()
            .map(|(c, _)| c.clone())
            .collect()
    }

    pub fn unregister_calls(&self) -> usize {
        self.state.lock().unregister_calls
    }
}

impl HotkeyHook for FakeHook {
    fn register(&mut self, combination: &str, callback: HotkeyCallback) -> OsResult<()> {
        let mut state = self.state.lock();
        state.register_calls += 1;
        if state.failing.iter().any(|c| c == combination) {
            return Err(OsError::KeyboardHookFailed {
                reason: format!("refused {}", combination),
            });
        }
        state.callbacks.push((combination.to_string(), callback));
        state.installed = true;
        Ok(())
    }

    fn unregister_all(&mut self) {
        let mut state = self.state.lock();
        state.unregister_calls += 1;
        state.callbacks.clear();
        state.installed = false;
    }

    fn is_installed(&self) -> bool {
        self.state.lock().installed
    }
}

/// In-memory registry
#[derive(Clone, Default)]
pub struct FakeRegistry {
    pub values: Arc<Mutex<HashMap<(RegistryHive, String, String), u32>>>,
    pub refreshes: Arc<AtomicUsize>,
    /// Hive that rejects every write
    pub denied: Option<RegistryHive>,
}

impl FakeRegistry {
    pub fn get(&self, hive: RegistryHive, path: &str, name: &str) -> Option<u32> {
        self.values
            .lock()
            .get(&(hive, path.to_string(), name.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }
}

impl PolicyRegistry for FakeRegistry {
    fn set_dword(&mut self, hive: RegistryHive, path: &str, name: &str, value: u32) -> OsResult<()> {
        if self.denied == Some(hive) {
            return Err(OsError::RegistryFailed {
                path: format!("{}\\{}", hive, path),
                name: name.to_string(),
                reason: "access denied".to_string(),
            });
        }
        self.values
            .lock()
            .insert((hive, path.to_string(), name.to_string()), value);
        Ok(())
    }

    fn delete_value(&mut self, hive: RegistryHive, path: &str, name: &str) -> OsResult<bool> {
        Ok(self
            .values
            .lock()
            .remove(&(hive, path.to_string(), name.to_string()))
            .is_some())
    }

    fn refresh_policy(&mut self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counts session primitive calls
#[derive(Default)]
pub struct FakeSession {
    pub locks: AtomicUsize,
    pub releases: AtomicUsize,
}

impl FakeSession {
    pub fn locks(&self) -> usize {
        self.locks.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl SessionControl for FakeSession {
    fn lock_workstation(&self) -> OsResult<()> {
        self.locks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release_right_alt(&self) -> OsResult<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Shared state behind [`FakeDisplay`]
#[derive(Default)]
pub struct FakeDisplayState {
    pub monitors: Vec<MonitorInfo>,
    pub live: HashMap<CoverId, MonitorRect>,
    pub created: Vec<MonitorRect>,
    pub destroyed: Vec<CoverId>,
    pub next_id: usize,
    pub subscribed: Option<DisplayChangeCallback>,
    pub unsubscribe_calls: usize,
    pub fail_enumeration: bool,
}

/// Display backend with a scriptable topology
#[derive(Clone, Default)]
pub struct FakeDisplay {
    pub state: Arc<Mutex<FakeDisplayState>>,
}

impl FakeDisplay {
    pub fn with_monitors(monitors: Vec<MonitorInfo>) -> Self {
        let display = Self::default();
        display.set_monitors(monitors);
        display
    }

    pub fn set_monitors(&self, monitors: Vec<MonitorInfo>) {
        self.state.lock().monitors = monitors;
    }

    pub fn live_rects(&self) -> Vec<MonitorRect> {
        let mut rects: Vec<_> = self.state.lock().live.values().copied().collect();
        rects.sort_by_key(|r| (r.x, r.y));
        rects
    }

    pub fn created_count(&self) -> usize {
        self.state.lock().created.len()
    }

    pub fn destroyed_count(&self) -> usize {
        self.state.lock().destroyed.len()
    }

    /// Deliver a display change notification
    pub fn notify_change(&self) -> bool {
        let callback = self.state.lock().subscribed.clone();
        match callback {
            Some(cb) => {
                cb();
                true
            }
            None => false,
        }
    }
}

impl DisplayBackend for FakeDisplay {
    fn enumerate_monitors(&self) -> OsResult<Vec<MonitorInfo>> {
        let state = self.state.lock();
        if state.fail_enumeration {
            return Err(OsError::MonitorEnumFailed {
                reason: "scripted failure".to_string(),
            });
        }
        Ok(state.monitors.clone())
    }

    fn create_cover(&mut self, rect: MonitorRect) -> OsResult<CoverId> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = CoverId(state.next_id);
        state.live.insert(id, rect);
        state.created.push(rect);
        Ok(id)
    }

    fn destroy_cover(&mut self, id: CoverId) {
        let mut state = self.state.lock();
        state.live.remove(&id);
        state.destroyed.push(id);
    }

    fn subscribe_changes(&mut self, on_change: DisplayChangeCallback) -> OsResult<()> {
        self.state.lock().subscribed = Some(on_change);
        Ok(())
    }

    fn unsubscribe_changes(&mut self) {
        let mut state = self.state.lock();
        state.subscribed = None;
        state.unsubscribe_calls += 1;
    }
}

/// Sampler returning scripted CPU figures
#[derive(Clone, Default)]
pub struct FakeSampler {
    pub samples: Arc<Mutex<Vec<ProcessSample>>>,
    pub calls: Arc<AtomicUsize>,
}

impl FakeSampler {
    pub fn set(&self, samples: &[(&str, f32)]) {
        *self.samples.lock() = samples
            .iter()
            .enumerate()
            .map(|(i, (name, cpu))| ProcessSample {
                name: name.to_string(),
                pid: 100 + i as u32,
                cpu_percent: *cpu,
            })
            .collect();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ProcessSampler for FakeSampler {
    fn sample(&mut self, names: &[&str], _window: Duration) -> OsResult<Vec<ProcessSample>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .samples
            .lock()
            .iter()
            .filter(|s| names.iter().any(|n| n.eq_ignore_ascii_case(&s.name)))
            .cloned()
            .collect())
    }
}

/// Monitor helper for tests
pub fn monitor(handle: usize, x: i32, y: i32, w: i32, h: i32, primary: bool) -> MonitorInfo {
    MonitorInfo {
        handle,
        rect: MonitorRect::new(x, y, w, h),
        is_primary: primary,
    }
}
