//! Primary monitor selection

use crate::os::{MonitorInfo, MonitorRect};

/// Which rule picked the primary monitor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimarySource {
    /// The OS flagged it
    OsFlag,
    /// Its origin is (0, 0)
    Origin,
    /// It contains the center of the main window
    MainWindow,
    /// First enumerated monitor
    First,
}

/// Index of the primary monitor and the rule that chose it.
///
/// Rules apply in order: OS flag, origin at (0, 0), contains the center of
/// `main_window`, first monitor. `None` only for an empty list.
pub fn find_primary(
    monitors: &[MonitorInfo],
    main_window: Option<MonitorRect>,
) -> Option<(usize, PrimarySource)> {
    if monitors.is_empty() {
        return None;
    }

    if let Some(index) = monitors.iter().position(|m| m.is_primary) {
        return Some((index, PrimarySource::OsFlag));
    }

    if let Some(index) = monitors.iter().position(|m| m.rect.x == 0 && m.rect.y == 0) {
        return Some((index, PrimarySource::Origin));
    }

    if let Some(window) = main_window {
        let (cx, cy) = window.center();
        if let Some(index) = monitors.iter().position(|m| m.rect.contains(cx, cy)) {
            return Some((index, PrimarySource::MainWindow));
        }
    }

    Some((0, PrimarySource::First))
}

/// Copy of `monitors` with exactly one entry marked primary (none if empty)
pub fn mark_primary(monitors: &[MonitorInfo], main_window: Option<MonitorRect>) -> Vec<MonitorInfo> {
    let primary = find_primary(monitors, main_window);
    if let Some((index, source)) = primary {
        if source != PrimarySource::OsFlag {
            tracing::info!(
                "No monitor flagged primary, chose monitor {} by {:?}",
                index,
                source
            );
        }
    }

    monitors
        .iter()
        .enumerate()
        .map(|(i, m)| MonitorInfo {
            is_primary: primary.map_or(false, |(index, _)| index == i),
            ..m.clone()
        })
        .collect()
}
