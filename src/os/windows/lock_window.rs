//! Full-screen lock window
//!
//! A topmost black popup on the primary monitor showing a clock. Its message
//! loop turns input, timers and cross-thread wake-ups into
//! [`LockWindowEvent`]s for a handler living on the same thread.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once};

use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{COLORREF, FALSE, HWND, LPARAM, LRESULT, RECT, TRUE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    BeginPaint, CreateFontIndirectW, DeleteObject, DrawTextW, EndPaint, GetStockObject,
    InvalidateRect, SelectObject, SetBkMode, SetTextColor, BLACK_BRUSH, DT_CENTER, DT_SINGLELINE,
    DT_VCENTER, HBRUSH, LOGFONTW, PAINTSTRUCT, TRANSPARENT,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{SetFocus, VK_ESCAPE, VK_RETURN, VK_SPACE};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetClientRect,
    GetMessageW, GetSystemMetrics, IsWindow, KillTimer, LoadCursorW, PostMessageW,
    PostQuitMessage, RegisterClassW, SetForegroundWindow, SetTimer, TranslateMessage,
    IDC_ARROW, MSG, SC_CLOSE, SM_CXSCREEN, SM_CYSCREEN, WM_APP, WM_CLOSE, WM_DESTROY,
    WM_KEYDOWN, WM_LBUTTONDOWN, WM_PAINT, WM_SYSCOMMAND, WM_TIMER, WNDCLASSW, WS_EX_TOPMOST,
    WS_POPUP, WS_VISIBLE,
};

use crate::core::error::OsError;
use crate::os::{LockWindowEvent, LoopControl, MonitorRect, OsResult};

const LOCK_CLASS: PCWSTR = w!("MotionSaverLockScreen");

/// Posted by other threads to wake the loop
const WM_APP_WAKE: u32 = WM_APP + 1;

const TICK_TIMER: usize = 1;
const CLOCK_TIMER: usize = 2;
const TICK_MS: u32 = 25;
const CLOCK_MS: u32 = 1000;

static REGISTER_CLASS: Once = Once::new();

/// Clock frozen while a challenge is up
static PAUSED: AtomicBool = AtomicBool::new(false);

type Handler = Box<dyn FnMut(LockWindowEvent) -> LoopControl>;

thread_local! {
    static HANDLER: RefCell<Option<Handler>> = RefCell::new(None);
}

/// Copyable reference to the lock window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockWindowHandle(usize);

impl LockWindowHandle {
    pub fn hwnd(&self) -> HWND {
        HWND(self.0 as isize)
    }

    pub fn raw(&self) -> usize {
        self.0
    }

    pub fn pause(&self) {
        PAUSED.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        PAUSED.store(false, Ordering::SeqCst);
        unsafe {
            let _ = InvalidateRect(self.hwnd(), None, FALSE);
        }
    }

    pub fn focus(&self) {
        unsafe {
            let _ = SetForegroundWindow(self.hwnd());
            SetFocus(self.hwnd());
        }
    }

    /// Destroy the window, which ends the message loop
    pub fn close(&self) {
        unsafe {
            if IsWindow(self.hwnd()).as_bool() {
                if let Err(e) = DestroyWindow(self.hwnd()) {
                    tracing::warn!("DestroyWindow failed for lock window: {:?}", e);
                }
            }
        }
    }
}

pub struct LockWindow {
    handle: LockWindowHandle,
    rect: MonitorRect,
}

impl LockWindow {
    /// Create the window over the primary monitor
    pub fn create() -> OsResult<Self> {
        register_class()?;

        unsafe {
            let hinstance = GetModuleHandleW(None).map_err(|e| OsError::WindowCreateFailed {
                reason: format!("GetModuleHandleW failed: {:?}", e),
            })?;

            let rect = MonitorRect::new(
                0,
                0,
                GetSystemMetrics(SM_CXSCREEN),
                GetSystemMetrics(SM_CYSCREEN),
            );

            let hwnd = CreateWindowExW(
                WS_EX_TOPMOST,
                LOCK_CLASS,
                w!("MotionSaver"),
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
                    reason: "CreateWindowExW failed for lock window".to_string(),
                });
            }

            let handle = LockWindowHandle(hwnd.0 as usize);
            handle.focus();
            PAUSED.store(false, Ordering::SeqCst);

            tracing::info!("Lock window created ({}x{})", rect.width, rect.height);
            Ok(Self { handle, rect })
        }
    }

    pub fn handle(&self) -> LockWindowHandle {
        self.handle
    }

    pub fn rect(&self) -> MonitorRect {
        self.rect
    }

    /// Wakes the loop from any thread so it emits `Wake`
    pub fn waker(&self) -> Arc<dyn Fn() + Send + Sync> {
        let raw = self.handle.raw();
        Arc::new(move || unsafe {
            let _ = PostMessageW(HWND(raw as isize), WM_APP_WAKE, WPARAM(0), LPARAM(0));
        })
    }

    /// Pump messages until `handler` asks to quit or the window is destroyed
    pub fn run<F>(self, handler: F) -> OsResult<()>
    where
        F: FnMut(LockWindowEvent) -> LoopControl + 'static,
    {
        let hwnd = self.handle.hwnd();
        HANDLER.with(|cell| *cell.borrow_mut() = Some(Box::new(handler)));

        unsafe {
            if SetTimer(hwnd, TICK_TIMER, TICK_MS, None) == 0
                || SetTimer(hwnd, CLOCK_TIMER, CLOCK_MS, None) == 0
            {
                tracing::warn!("SetTimer failed for lock window");
            }

            let mut msg = MSG::default();
            loop {
                let ret = GetMessageW(&mut msg, None, 0, 0);
                if ret.0 == 0 {
                    break;
                }
                if ret.0 == -1 {
                    tracing::error!("GetMessageW failed in lock window loop");
                    break;
                }
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        // Dropped outside the borrow; its destructors may touch windows
        let handler = HANDLER.with(|cell| cell.borrow_mut().take());
        drop(handler);
        Ok(())
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
            lpfnWndProc: Some(lock_window_proc),
            hInstance: hinstance.into(),
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            hbrBackground: HBRUSH(GetStockObject(BLACK_BRUSH).0),
            lpszClassName: LOCK_CLASS,
            ..Default::default()
        };
        if RegisterClassW(&wc) == 0 {
            result = Err(OsError::WindowCreateFailed {
                reason: "RegisterClassW failed for lock window class".to_string(),
            });
        }
    });
    result
}

/// Hand `event` to the handler. While the handler itself is running (a
/// modal prompt pumps messages from inside it) the event is dropped; queued
/// work is picked up by the next wake or tick.
fn dispatch(hwnd: HWND, event: LockWindowEvent) {
    let control = HANDLER.with(|cell| match cell.try_borrow_mut() {
        Ok(mut slot) => slot.as_mut().map(|handler| handler(event)),
        Err(_) => None,
    });

    if control == Some(LoopControl::Quit) {
        unsafe {
            let _ = KillTimer(hwnd, TICK_TIMER);
            let _ = KillTimer(hwnd, CLOCK_TIMER);
            if IsWindow(hwnd).as_bool() {
                let _ = DestroyWindow(hwnd);
            } else {
                PostQuitMessage(0);
            }
        }
    }
}

fn is_trigger_key(vk: u16) -> bool {
    vk == VK_ESCAPE.0 || vk == VK_RETURN.0 || vk == VK_SPACE.0
}

unsafe fn paint_clock(hwnd: HWND) {
    let mut ps = PAINTSTRUCT::default();
    let hdc = BeginPaint(hwnd, &mut ps);

    let mut rect = RECT::default();
    if GetClientRect(hwnd, &mut rect).is_ok() {
        let mut face = [0u16; 32];
        for (slot, unit) in face.iter_mut().zip("Segoe UI Light".encode_utf16()) {
            *slot = unit;
        }
        let font = CreateFontIndirectW(&LOGFONTW {
            lfHeight: (rect.bottom - rect.top) / 6,
            lfFaceName: face,
            ..Default::default()
        });
        let previous = SelectObject(hdc, font);
        SetBkMode(hdc, TRANSPARENT);
        SetTextColor(hdc, COLORREF(0x00FF_FFFF));

        let text = chrono::Local::now().format("%H:%M").to_string();
        let mut wide: Vec<u16> = text.encode_utf16().collect();
        DrawTextW(hdc, &mut wide, &mut rect, DT_CENTER | DT_VCENTER | DT_SINGLELINE);

        SelectObject(hdc, previous);
        let _ = DeleteObject(font);
    }

    let _ = EndPaint(hwnd, &ps);
}

unsafe extern "system" fn lock_window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    match msg {
        WM_KEYDOWN if is_trigger_key(wparam.0 as u16) => {
            dispatch(hwnd, LockWindowEvent::Trigger);
            LRESULT(0)
        }
        WM_LBUTTONDOWN | WM_CLOSE => {
            dispatch(hwnd, LockWindowEvent::Trigger);
            LRESULT(0)
        }
        WM_SYSCOMMAND if (wparam.0 & 0xFFF0) as u32 == SC_CLOSE => {
            dispatch(hwnd, LockWindowEvent::Trigger);
            LRESULT(0)
        }
        WM_APP_WAKE => {
            dispatch(hwnd, LockWindowEvent::Wake);
            LRESULT(0)
        }
        WM_TIMER if wparam.0 == TICK_TIMER => {
            dispatch(hwnd, LockWindowEvent::Tick);
            LRESULT(0)
        }
        WM_TIMER if wparam.0 == CLOCK_TIMER => {
            if !PAUSED.load(Ordering::SeqCst) {
                let _ = InvalidateRect(hwnd, None, TRUE);
            }
            LRESULT(0)
        }
        WM_PAINT => {
            paint_clock(hwnd);
            LRESULT(0)
        }
        WM_DESTROY => {
            PostQuitMessage(0);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
