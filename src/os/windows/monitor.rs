//! Windows Monitor Enumeration

use windows::Win32::Foundation::{BOOL, LPARAM, RECT};
use windows::Win32::Graphics::Gdi::{
    EnumDisplayMonitors, GetMonitorInfoW, HDC, HMONITOR, MONITORINFO,
};

use crate::core::error::OsError;
use crate::os::{MonitorInfo, MonitorRect, OsResult};

/// `MONITORINFOF_PRIMARY`
const MONITOR_PRIMARY_FLAG: u32 = 1;

/// Enumeration accumulator passed through `LPARAM`
#[derive(Default)]
struct Collected {
    monitors: Vec<MonitorInfo>,
    failures: Vec<OsError>,
}

/// Enumerate all connected monitors.
///
/// A monitor whose info query fails is skipped and logged.
pub fn enumerate_monitors() -> OsResult<Vec<MonitorInfo>> {
    let mut collected = Collected::default();
    let collected_ptr = &mut collected as *mut Collected;

    let ok = unsafe {
        EnumDisplayMonitors(
            HDC::default(),
            None,
            Some(monitor_enum_callback),
            LPARAM(collected_ptr as isize),
        )
    };
    if !ok.as_bool() {
        return Err(OsError::MonitorEnumFailed {
            reason: "EnumDisplayMonitors returned FALSE".to_string(),
        });
    }

    for failure in &collected.failures {
        tracing::warn!(primitive = failure.primitive(), "{}", failure);
    }
    tracing::debug!("Enumerated {} monitors", collected.monitors.len());
    Ok(collected.monitors)
}

unsafe extern "system" fn monitor_enum_callback(
    hmonitor: HMONITOR,
    _hdc: HDC,
    _lprect: *mut RECT,
    lparam: LPARAM,
) -> BOOL {
    let collected = &mut *(lparam.0 as *mut Collected);

    let mut info = MONITORINFO {
        cbSize: std::mem::size_of::<MONITORINFO>() as u32,
        ..Default::default()
    };

    if GetMonitorInfoW(hmonitor, &mut info).as_bool() {
        let rect = info.rcMonitor;
        collected.monitors.push(MonitorInfo {
            handle: hmonitor.0 as usize,
            rect: MonitorRect::from_corners(rect.left, rect.top, rect.right, rect.bottom),
            is_primary: (info.dwFlags & MONITOR_PRIMARY_FLAG) != 0,
        });
    } else {
        collected.failures.push(OsError::MonitorInfoFailed {
            handle: hmonitor.0 as usize,
            reason: "GetMonitorInfoW returned FALSE".to_string(),
        });
    }

    BOOL::from(true)
}
