//! Modal password dialog
//!
//! A small topmost box with a masked edit control. Enter submits, Escape
//! cancels, a rejected password shakes the box and clears the input. The
//! owner window is disabled for the duration.

use std::cell::Cell;
use std::sync::Once;
use std::time::Duration;

use windows::core::{w, HSTRING, PCWSTR};
use windows::Win32::Foundation::{FALSE, HWND, LPARAM, LRESULT, RECT, TRUE, WPARAM};
use windows::Win32::Graphics::Gdi::{GetStockObject, COLOR_WINDOW, DEFAULT_GUI_FONT, HBRUSH};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{EnableWindow, SetFocus, VK_ESCAPE, VK_RETURN};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    GetSystemMetrics, GetWindowRect, GetWindowTextLengthW, GetWindowTextW, LoadCursorW,
    PostQuitMessage, RegisterClassW, SendMessageW, SetForegroundWindow, SetWindowPos,
    SetWindowTextW, TranslateMessage, ES_AUTOHSCROLL, ES_PASSWORD, HWND_TOPMOST, IDC_ARROW, MSG,
    SM_CXSCREEN, SM_CYSCREEN, SWP_NOSIZE, SWP_NOZORDER, WINDOW_EX_STYLE, WINDOW_STYLE, WM_CLOSE,
    WM_KEYDOWN, WM_SETFONT, WNDCLASSW, WS_BORDER, WS_CAPTION, WS_CHILD, WS_EX_CLIENTEDGE,
    WS_EX_TOPMOST, WS_POPUP, WS_TABSTOP, WS_VISIBLE,
};

use super::lock_window::LockWindowHandle;
use crate::core::error::OsError;
use crate::os::{DialogResult, OsResult};

const PROMPT_CLASS: PCWSTR = w!("MotionSaverPasswordPrompt");

const WIDTH: i32 = 360;
const HEIGHT: i32 = 150;

/// Horizontal offsets of the wrong-password shake, 50ms apart
const SHAKE_OFFSETS: [i32; 7] = [15, -15, 10, -10, 5, -5, 0];
const SHAKE_STEP: Duration = Duration::from_millis(50);

static REGISTER_CLASS: Once = Once::new();

thread_local! {
    static CLOSE_REQUESTED: Cell<bool> = Cell::new(false);
}

/// Ask for `username`'s password until `verify` accepts one or the user
/// cancels. Runs a nested message loop on the calling (UI) thread.
pub fn password_dialog(
    owner: LockWindowHandle,
    username: &str,
    verify: &mut dyn FnMut(&str) -> bool,
) -> DialogResult {
    match run_dialog(owner, username, verify) {
        Ok(result) => result,
        Err(e) => {
            tracing::error!(primitive = e.primitive(), "Password prompt failed: {}", e);
            DialogResult::Cancelled
        }
    }
}

fn run_dialog(
    owner: LockWindowHandle,
    username: &str,
    verify: &mut dyn FnMut(&str) -> bool,
) -> OsResult<DialogResult> {
    register_class()?;
    CLOSE_REQUESTED.with(|c| c.set(false));

    let (dialog, edit) = unsafe { create_controls(owner, username)? };

    unsafe {
        EnableWindow(owner.hwnd(), FALSE);
        let _ = SetForegroundWindow(dialog);
        SetFocus(edit);
    }

    let result = unsafe { modal_loop(dialog, edit, verify) };

    unsafe {
        EnableWindow(owner.hwnd(), TRUE);
        let _ = DestroyWindow(dialog);
    }
    Ok(result)
}

unsafe fn create_controls(owner: LockWindowHandle, username: &str) -> OsResult<(HWND, HWND)> {
    let hinstance = GetModuleHandleW(None).map_err(|e| OsError::WindowCreateFailed {
        reason: format!("GetModuleHandleW failed: {:?}", e),
    })?;

    let x = (GetSystemMetrics(SM_CXSCREEN) - WIDTH) / 2;
    let y = (GetSystemMetrics(SM_CYSCREEN) - HEIGHT) / 2;

    let dialog = CreateWindowExW(
        WS_EX_TOPMOST,
        PROMPT_CLASS,
        w!("Unlock"),
        WS_POPUP | WS_CAPTION | WS_BORDER | WS_VISIBLE,
        x,
        y,
        WIDTH,
        HEIGHT,
        owner.hwnd(),
        None,
        hinstance,
        None,
    );
    if dialog.0 == 0 {
        return Err(OsError::WindowCreateFailed {
            reason: "CreateWindowExW failed for password prompt".to_string(),
        });
    }

    let label = CreateWindowExW(
        WINDOW_EX_STYLE(0),
        w!("STATIC"),
        &HSTRING::from(format!("Password for {}", username)),
        WS_CHILD | WS_VISIBLE,
        20,
        20,
        WIDTH - 40,
        20,
        dialog,
        None,
        hinstance,
        None,
    );

    let edit = CreateWindowExW(
        WS_EX_CLIENTEDGE,
        w!("EDIT"),
        w!(""),
        WS_CHILD | WS_VISIBLE | WS_TABSTOP | WINDOW_STYLE((ES_PASSWORD | ES_AUTOHSCROLL) as u32),
        20,
        50,
        WIDTH - 50,
        26,
        dialog,
        None,
        hinstance,
        None,
    );
    if edit.0 == 0 {
        let _ = DestroyWindow(dialog);
        return Err(OsError::WindowCreateFailed {
            reason: "CreateWindowExW failed for password field".to_string(),
        });
    }

    let font = GetStockObject(DEFAULT_GUI_FONT);
    for control in [label, edit] {
        SendMessageW(control, WM_SETFONT, WPARAM(font.0 as usize), LPARAM(1));
    }

    let _ = SetWindowPos(dialog, HWND_TOPMOST, x, y, 0, 0, SWP_NOSIZE);

    Ok((dialog, edit))
}

unsafe fn modal_loop(dialog: HWND, edit: HWND, verify: &mut dyn FnMut(&str) -> bool) -> DialogResult {
    let mut msg = MSG::default();
    loop {
        if CLOSE_REQUESTED.with(Cell::get) {
            return DialogResult::Cancelled;
        }

        let ret = GetMessageW(&mut msg, None, 0, 0);
        if ret.0 == 0 {
            // Leave WM_QUIT for the outer loop
            PostQuitMessage(msg.wParam.0 as i32);
            return DialogResult::Cancelled;
        }
        if ret.0 == -1 {
            return DialogResult::Cancelled;
        }

        if msg.message == WM_KEYDOWN && (msg.hwnd == edit || msg.hwnd == dialog) {
            let vk = msg.wParam.0 as u16;
            if vk == VK_ESCAPE.0 {
                tracing::info!("Password prompt cancelled");
                return DialogResult::Cancelled;
            }
            if vk == VK_RETURN.0 {
                let attempt = read_text(edit);
                if verify(&attempt) {
                    return DialogResult::Accepted;
                }
                tracing::info!("Incorrect password entered");
                shake(dialog);
                let _ = SetWindowTextW(edit, w!(""));
                SetFocus(edit);
                continue;
            }
        }

        TranslateMessage(&msg);
        DispatchMessageW(&msg);
    }
}

unsafe fn read_text(edit: HWND) -> String {
    let len = GetWindowTextLengthW(edit);
    if len <= 0 {
        return String::new();
    }
    let mut buffer = vec![0u16; len as usize + 1];
    let copied = GetWindowTextW(edit, &mut buffer);
    String::from_utf16_lossy(&buffer[..copied.max(0) as usize])
}

unsafe fn shake(dialog: HWND) {
    let mut rect = RECT::default();
    if GetWindowRect(dialog, &mut rect).is_err() {
        return;
    }
    for offset in SHAKE_OFFSETS {
        let _ = SetWindowPos(
            dialog,
            HWND(0),
            rect.left + offset,
            rect.top,
            0,
            0,
            SWP_NOSIZE | SWP_NOZORDER,
        );
        std::thread::sleep(SHAKE_STEP);
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
            lpfnWndProc: Some(prompt_window_proc),
            hInstance: hinstance.into(),
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            hbrBackground: HBRUSH((COLOR_WINDOW.0 + 1) as isize),
            lpszClassName: PROMPT_CLASS,
            ..Default::default()
        };
        if RegisterClassW(&wc) == 0 {
            result = Err(OsError::WindowCreateFailed {
                reason: "RegisterClassW failed for password prompt class".to_string(),
            });
        }
    });
    result
}

unsafe extern "system" fn prompt_window_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    if msg == WM_CLOSE {
        CLOSE_REQUESTED.with(|c| c.set(true));
        return LRESULT(0);
    }
    DefWindowProcW(hwnd, msg, wparam, lparam)
}
