//! Blackout windows on secondary monitors
//!
//! `refresh` reconciles the live cover windows against the current monitor
//! topology instead of rebuilding them, so an unchanged topology causes no
//! window churn. Every call happens on the UI thread.

use crate::os::{CoverId, DisplayBackend, DisplayChangeCallback, MonitorInfo, MonitorRect, OsResult};

use super::primary::mark_primary;

/// One live cover window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cover {
    id: CoverId,
    rect: MonitorRect,
}

/// What one refresh did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// Monitors after primary selection
    pub monitors: Vec<MonitorInfo>,
    pub created: usize,
    pub destroyed: usize,
    pub kept: usize,
}

impl RefreshReport {
    /// No window was created or destroyed
    pub fn is_unchanged(&self) -> bool {
        self.created == 0 && self.destroyed == 0
    }

    pub fn primary(&self) -> Option<&MonitorInfo> {
        self.monitors.iter().find(|m| m.is_primary)
    }
}

pub struct MonitorBlackoutManager {
    backend: Box<dyn DisplayBackend>,
    covers: Vec<Cover>,
    subscribed: bool,
}

impl MonitorBlackoutManager {
    pub fn new(backend: Box<dyn DisplayBackend>) -> Self {
        Self {
            backend,
            covers: Vec::new(),
            subscribed: false,
        }
    }

    /// Cover every non-primary monitor, reusing windows whose rect still
    /// matches exactly and destroying the rest.
    ///
    /// If enumeration fails the existing covers are left in place.
    pub fn refresh(&mut self, main_window: Option<MonitorRect>) -> RefreshReport {
        let monitors = match self.backend.enumerate_monitors() {
            Ok(monitors) => mark_primary(&monitors, main_window),
            Err(e) => {
                tracing::error!(primitive = e.primitive(), "Blackout refresh skipped: {}", e);
                return RefreshReport {
                    kept: self.covers.len(),
                    ..RefreshReport::default()
                };
            }
        };

        let mut old = std::mem::take(&mut self.covers);
        let mut report = RefreshReport::default();

        for monitor in monitors.iter().filter(|m| !m.is_primary) {
            if let Some(pos) = old.iter().position(|c| c.rect == monitor.rect) {
                self.covers.push(old.swap_remove(pos));
                report.kept += 1;
                continue;
            }

            match self.backend.create_cover(monitor.rect) {
                Ok(id) => {
                    tracing::info!(
                        "Blackout window created at {}x{}+{}+{}",
                        monitor.rect.width,
                        monitor.rect.height,
                        monitor.rect.x,
                        monitor.rect.y
                    );
                    self.covers.push(Cover {
                        id,
                        rect: monitor.rect,
                    });
                    report.created += 1;
                }
                Err(e) => {
                    tracing::error!(primitive = e.primitive(), "{}", e);
                }
            }
        }

        for cover in old {
            self.backend.destroy_cover(cover.id);
            tracing::info!("Blackout window destroyed at {:?}", cover.rect);
            report.destroyed += 1;
        }

        if !report.is_unchanged() {
            tracing::info!(
                created = report.created,
                destroyed = report.destroyed,
                kept = report.kept,
                "Blackout windows reconciled"
            );
        }

        report.monitors = monitors;
        report
    }

    /// Rects currently covered
    pub fn covered(&self) -> Vec<MonitorRect> {
        self.covers.iter().map(|c| c.rect).collect()
    }

    pub fn len(&self) -> usize {
        self.covers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.covers.is_empty()
    }

    /// Destroy every cover window
    pub fn destroy_all(&mut self) {
        let count = self.covers.len();
        for cover in self.covers.drain(..) {
            self.backend.destroy_cover(cover.id);
        }
        if count > 0 {
            tracing::info!("Destroyed {} blackout windows", count);
        }
    }

    /// Deliver display-change notifications to `on_change`
    pub fn subscribe_changes(&mut self, on_change: DisplayChangeCallback) -> OsResult<()> {
        self.backend.subscribe_changes(on_change)?;
        self.subscribed = true;
        Ok(())
    }

    pub fn unsubscribe_changes(&mut self) {
        if std::mem::replace(&mut self.subscribed, false) {
            self.backend.unsubscribe_changes();
            tracing::debug!("Display change notifications stopped");
        }
    }
}

impl Drop for MonitorBlackoutManager {
    fn drop(&mut self) {
        self.unsubscribe_changes();
        self.destroy_all();
    }
}
