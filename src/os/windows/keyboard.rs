//! Windows Keyboard Hook
//!
//! Implements a low-level keyboard hook that swallows registered hotkey
//! combinations and runs their callbacks instead.
//!
//! The hook procedure runs on the thread that installed the hook, inside
//! that thread's message loop.

use std::sync::atomic::{AtomicUsize, Ordering};

use lazy_static::lazy_static;
use parking_lot::Mutex;
use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::GetAsyncKeyState;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PostThreadMessageW, SetWindowsHookExW,
    TranslateMessage, UnhookWindowsHookEx, HHOOK, KBDLLHOOKSTRUCT, LLKHF_INJECTED, MSG, WM_APP,
    WH_KEYBOARD_LL, WM_KEYDOWN, WM_KEYUP, WM_SYSKEYDOWN, WM_SYSKEYUP,
};

use crate::core::error::OsError;
use crate::os::keys::{self, KeyCombo, ModifierState};
use crate::os::{HotkeyCallback, HotkeyHook, OsResult};

/// Thread message posted when the awaited hotkey fires
const WM_APP_HOTKEY: u32 = WM_APP + 2;

/// Global hook handle storage
static KEYBOARD_HOOK: AtomicUsize = AtomicUsize::new(0);

lazy_static! {
    /// Registered combinations, read by the extern hook procedure
    static ref INTERCEPTS: Mutex<Vec<(KeyCombo, HotkeyCallback)>> = Mutex::new(Vec::new());
}

/// Low-level keyboard hook for hotkey suppression
pub struct WindowsHotkeyHook;

impl WindowsHotkeyHook {
    pub fn new() -> Self {
        Self
    }

    fn install() -> OsResult<()> {
        if KEYBOARD_HOOK.load(Ordering::SeqCst) != 0 {
            return Ok(());
        }

        unsafe {
            let module = GetModuleHandleW(None).map_err(|e| OsError::KeyboardHookFailed {
                reason: format!("GetModuleHandleW failed: {:?}", e),
            })?;
            let hook = SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), module, 0)
                .map_err(|e| OsError::KeyboardHookFailed {
                    reason: format!("SetWindowsHookExW failed: {:?}", e),
                })?;
            KEYBOARD_HOOK.store(hook.0 as usize, Ordering::SeqCst);
        }

        tracing::info!("Low-level keyboard hook installed");
        Ok(())
    }
}

impl Default for WindowsHotkeyHook {
    fn default() -> Self {
        Self::new()
    }
}

impl HotkeyHook for WindowsHotkeyHook {
    fn register(&mut self, combination: &str, callback: HotkeyCallback) -> OsResult<()> {
        let combo = KeyCombo::parse(combination)?;
        INTERCEPTS.lock().push((combo, callback));
        Self::install()
    }

    fn unregister_all(&mut self) {
        INTERCEPTS.lock().clear();

        let hook_value = KEYBOARD_HOOK.swap(0, Ordering::SeqCst);
        if hook_value != 0 {
            unsafe {
                if let Err(e) = UnhookWindowsHookEx(HHOOK(hook_value as isize)) {
                    tracing::warn!("UnhookWindowsHookEx failed: {:?}", e);
                }
            }
            tracing::info!("Low-level keyboard hook removed");
        }
    }

    fn is_installed(&self) -> bool {
        KEYBOARD_HOOK.load(Ordering::SeqCst) != 0
    }
}

/// Install `combination` on `hook` and pump this thread's messages until it
/// is pressed. The hook is removed again before returning.
pub fn wait_for_hotkey(hook: &mut dyn HotkeyHook, combination: &str) -> OsResult<()> {
    let thread_id = unsafe { GetCurrentThreadId() };
    hook.register(
        combination,
        std::sync::Arc::new(move || unsafe {
            let _ = PostThreadMessageW(thread_id, WM_APP_HOTKEY, WPARAM(0), LPARAM(0));
        }),
    )?;
    tracing::info!("Waiting for '{}'", combination);

    let mut result = Ok(());
    unsafe {
        let mut msg = MSG::default();
        loop {
            let ret = GetMessageW(&mut msg, None, 0, 0);
            if ret.0 == 0 {
                break;
            }
            if ret.0 == -1 {
                result = Err(OsError::KeyboardHookFailed {
                    reason: "GetMessageW failed while waiting for hotkey".to_string(),
                });
                break;
            }
            if msg.hwnd.0 == 0 && msg.message == WM_APP_HOTKEY {
                break;
            }
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    hook.unregister_all();
    result
}

fn key_held(vk: u16) -> bool {
    unsafe { GetAsyncKeyState(vk as i32) < 0 }
}

fn current_modifiers() -> ModifierState {
    ModifierState {
        ctrl: key_held(keys::VK_LCONTROL) || key_held(keys::VK_RCONTROL),
        alt: key_held(keys::VK_LMENU),
        altgr: key_held(keys::VK_RMENU),
        shift: key_held(keys::VK_LSHIFT) || key_held(keys::VK_RSHIFT),
        win: key_held(keys::VK_LWIN) || key_held(keys::VK_RWIN),
    }
}

/// Low-level keyboard hook procedure
///
/// Key-down of a registered combination runs its callback and is swallowed.
/// Key-up of a bare modifier combination is swallowed as well so the shell
/// never sees half a press. Injected input is passed through untouched.
unsafe extern "system" fn keyboard_hook_proc(code: i32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if code >= 0 {
        let kb = &*(lparam.0 as *const KBDLLHOOKSTRUCT);
        let msg = wparam.0 as u32;
        let key_down = msg == WM_KEYDOWN || msg == WM_SYSKEYDOWN;
        let key_up = msg == WM_KEYUP || msg == WM_SYSKEYUP;
        let injected = (kb.flags.0 & LLKHF_INJECTED.0) != 0;

        if (key_down || key_up) && !injected {
            let vk = kb.vkCode as u16;
            let state = current_modifiers();

            // Clone out so the callback may unregister without deadlocking
            let hit = INTERCEPTS
                .lock()
                .iter()
                .find(|(combo, _)| combo.matches(vk, &state))
                .map(|(combo, callback)| (combo.is_modifier_only(), callback.clone()));

            if let Some((modifier_only, callback)) = hit {
                if key_down {
                    callback();
                    return LRESULT(1);
                }
                if modifier_only {
                    return LRESULT(1);
                }
            }
        }
    }

    let hook_value = KEYBOARD_HOOK.load(Ordering::SeqCst);
    CallNextHookEx(HHOOK(hook_value as isize), code, wparam, lparam)
}
