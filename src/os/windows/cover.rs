//! Blackout cover windows
//!
//! Opaque black popups placed over non-primary monitors while the lock
//! screen is up. They are topmost and frameless. They never take activation,
//! so keyboard focus stays on the lock window, and they ignore close requests.

use std::sync::Once;

use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::{GetStockObject, BLACK_BRUSH, HBRUSH};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, LoadCursorW, RegisterClassW, SetWindowPos,
    HWND_TOPMOST, IDC_ARROW, MA_NOACTIVATE, SC_CLOSE, SWP_NOACTIVATE, SWP_SHOWWINDOW, WM_CLOSE,
    WM_MOUSEACTIVATE, WM_SYSCOMMAND, WNDCLASSW, WS_EX_NOACTIVATE, WS_EX_TOOLWINDOW, WS_EX_TOPMOST,
    WS_POPUP, WS_VISIBLE,
};

use super::display_listener::DisplayChangeListener;
use super::monitor;
use crate::core::error::OsError;
use crate::os::{
    CoverId, DisplayBackend, DisplayChangeCallback, MonitorInfo, MonitorRect, OsResult,
};

const COVER_CLASS: PCWSTR = w!("MotionSaverBlackout");

static REGISTER_CLASS: Once = Once::new();

/// Display backend over Win32 monitors and popup windows
pub struct WindowsDisplayBackend {
    listener: DisplayChangeListener,
}

impl WindowsDisplayBackend {
    pub fn new() -> Self {
        Self {
            listener: DisplayChangeListener::new(),
        }
    }

    fn register_class() -> OsResult<()> {
        let mut result = Ok(());
        REGISTER_CLASS.call_once(|| unsafe {
            let hinstance = match GetModuleHandleW(None) {
                Ok(h) => h,
                Err(e) => {
                    result = Err(OsError::WindowCreateFailed {
                        reason: format!("GetModuleHandleW failed: {:?}", e),
                    });
                    return;
                }
            };
            let wc = WNDCLASSW {
                lpfnWndProc: Some(cover_window_proc),
                hInstance: hinstance.into(),
                hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
                hbrBackground: HBRUSH(GetStockObject(BLACK_BRUSH).0),
                lpszClassName: COVER_CLASS,
                ..Default::default()
            };
            if RegisterClassW(&wc) == 0 {
                result = Err(OsError::WindowCreateFailed {
                    reason: "RegisterClassW failed for blackout class".to_string(),
                });
            }
        });
        result
    }
}

impl Default for WindowsDisplayBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplayBackend for WindowsDisplayBackend {
    fn enumerate_monitors(&self) -> OsResult<Vec<MonitorInfo>> {
        monitor::enumerate_monitors()
    }

    fn create_cover(&mut self, rect: MonitorRect) -> OsResult<CoverId> {
        Self::register_class()?;

        unsafe {
            let hinstance = GetModuleHandleW(None).map_err(|e| OsError::WindowCreateFailed {
                reason: format!("GetModuleHandleW failed: {:?}", e),
            })?;

            let hwnd = CreateWindowExW(
                WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                COVER_CLASS,
                w!("MotionSaver Blackout"),
                WS_POPUP | WS_VISIBLE,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                None,
                None,
                hinstance,
                None,
            );
            if hwnd.0 == 0 {
                return Err(OsError::WindowCreateFailed {
                    reason: format!("CreateWindowExW failed for {:?}", rect),
                });
            }

            if let Err(e) = SetWindowPos(
                hwnd,
                HWND_TOPMOST,
                rect.x,
                rect.y,
                rect.width,
                rect.height,
                SWP_SHOWWINDOW | SWP_NOACTIVATE,
            ) {
                tracing::warn!("SetWindowPos failed for blackout window: {:?}", e);
            }

            Ok(CoverId(hwnd.0 as usize))
        }
    }

    fn destroy_cover(&mut self, id: CoverId) {
        unsafe {
            if let Err(e) = DestroyWindow(HWND(id.0 as isize)) {
                tracing::warn!("DestroyWindow failed for blackout window {:#x}: {:?}", id.0, e);
            }
        }
    }

    fn subscribe_changes(&mut self, on_change: DisplayChangeCallback) -> OsResult<()> {
        self.listener.start(on_change)
    }

    fn unsubscribe_changes(&mut self) {
        self.listener.stop();
    }
}

/// Messages a cover answers itself instead of passing to `DefWindowProcW`
fn cover_reply(msg: u32, wparam: WPARAM) -> Option<LRESULT> {
    match msg {
        WM_MOUSEACTIVATE => Some(LRESULT(MA_NOACTIVATE as isize)),
        WM_CLOSE => Some(LRESULT(0)),
        WM_SYSCOMMAND if (wparam.0 & 0xFFF0) as u32 == SC_CLOSE => Some(LRESULT(0)),
        _ => None,
    }
}

unsafe extern "system" fn cover_window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match cover_reply(msg, wparam) {
        Some(result) => result,
        None => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use windows::Win32::UI::WindowsAndMessaging::{SC_MINIMIZE, WM_LBUTTONDOWN};

    #[test]
    fn test_click_does_not_activate_cover() {
        assert_eq!(
            cover_reply(WM_MOUSEACTIVATE, WPARAM(0)),
            Some(LRESULT(MA_NOACTIVATE as isize))
        );
        assert_eq!(cover_reply(WM_LBUTTONDOWN, WPARAM(0)), None);
    }

    #[test]
    fn test_close_requests_are_swallowed() {
        assert_eq!(cover_reply(WM_CLOSE, WPARAM(0)), Some(LRESULT(0)));
        assert_eq!(
            cover_reply(WM_SYSCOMMAND, WPARAM(SC_CLOSE as usize)),
            Some(LRESULT(0))
        );
        assert_eq!(cover_reply(WM_SYSCOMMAND, WPARAM(SC_MINIMIZE as usize)), None);
    }
}
