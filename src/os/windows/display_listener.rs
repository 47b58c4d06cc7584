//! Display Change Listener
//!
//! Owns a hidden top-level window on its own thread to receive
//! `WM_DISPLAYCHANGE` broadcasts and forwards each one to a callback. The
//! callback runs on the listener thread; consumers hop to their own thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use lazy_static::lazy_static;
use parking_lot::Mutex;
use windows::core::{w, PCWSTR};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DispatchMessageW, GetMessageW, PostMessageW,
    PostQuitMessage, RegisterClassW, TranslateMessage, CW_USEDEFAULT, MSG, WM_CLOSE,
    WM_DESTROY, WM_DISPLAYCHANGE, WNDCLASSW, WS_OVERLAPPEDWINDOW,
};

use crate::core::error::OsError;
use crate::os::{DisplayChangeCallback, OsResult};

const LISTENER_CLASS: PCWSTR = w!("MotionSaverDisplayListener");

/// Listener window handle, 0 when not running
static LISTENER_HWND: AtomicUsize = AtomicUsize::new(0);

lazy_static! {
    static ref DISPLAY_CALLBACK: Mutex<Option<DisplayChangeCallback>> = Mutex::new(None);
}

/// Display Change Listener
pub struct DisplayChangeListener {
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl DisplayChangeListener {
    pub fn new() -> Self {
        Self {
            thread_handle: None,
        }
    }

    /// Start listening for display changes
    pub fn start(&mut self, callback: DisplayChangeCallback) -> OsResult<()> {
        if self.thread_handle.is_some() {
            *DISPLAY_CALLBACK.lock() = Some(callback);
            return Ok(());
        }

        *DISPLAY_CALLBACK.lock() = Some(callback);

        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let handle = thread::Builder::new()
            .name("display-listener".to_string())
            .spawn(move || {
                if let Err(e) = run_message_loop(ready_tx) {
                    tracing::error!(primitive = e.primitive(), "Display listener error: {}", e);
                }
            })
            .map_err(|e| OsError::DisplayChangeFailed {
                reason: format!("failed to spawn listener thread: {}", e),
            })?;

        // Wait for the window so that stop() can always reach it
        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                *DISPLAY_CALLBACK.lock() = None;
                return Err(e);
            }
            Err(_) => {
                *DISPLAY_CALLBACK.lock() = None;
                return Err(OsError::DisplayChangeFailed {
                    reason: "listener thread exited before start".to_string(),
                });
            }
        }

        self.thread_handle = Some(handle);
        tracing::info!("Display change listener started");
        Ok(())
    }

    /// Stop listening. Safe to call when not running.
    pub fn stop(&mut self) {
        *DISPLAY_CALLBACK.lock() = None;

        let Some(handle) = self.thread_handle.take() else {
            return;
        };

        let hwnd_value = LISTENER_HWND.load(Ordering::SeqCst);
        if hwnd_value != 0 {
            unsafe {
                if let Err(e) = PostMessageW(HWND(hwnd_value as isize), WM_CLOSE, WPARAM(0), LPARAM(0)) {
                    tracing::warn!("PostMessageW to display listener failed: {:?}", e);
                }
            }
        }

        if handle.join().is_err() {
            tracing::warn!("Display listener thread panicked");
        }
        tracing::info!("Display change listener stopped");
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle.is_some()
    }
}

impl Default for DisplayChangeListener {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DisplayChangeListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_message_loop(ready: std::sync::mpsc::Sender<OsResult<()>>) -> OsResult<()> {
    let hwnd = match create_listener_window() {
        Ok(hwnd) => {
            let _ = ready.send(Ok(()));
            hwnd
        }
        Err(e) => {
            let _ = ready.send(Err(e.clone()));
            return Err(e);
        }
    };

    LISTENER_HWND.store(hwnd.0 as usize, Ordering::SeqCst);

    unsafe {
        let mut msg = MSG::default();
        loop {
            let result = GetMessageW(&mut msg, None, 0, 0);
            if result.0 <= 0 {
                break;
            }
            TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    LISTENER_HWND.store(0, Ordering::SeqCst);
    Ok(())
}

fn create_listener_window() -> OsResult<HWND> {
    unsafe {
        let hinstance = GetModuleHandleW(None).map_err(|e| OsError::DisplayChangeFailed {
            reason: format!("GetModuleHandleW failed: {:?}", e),
        })?;

        let wc = WNDCLASSW {
            lpfnWndProc: Some(window_proc),
            hInstance: hinstance.into(),
            lpszClassName: LISTENER_CLASS,
            ..Default::default()
        };
        // A second start re-registers the same class, which fails harmlessly
        RegisterClassW(&wc);

        // Hidden top-level window; message-only windows miss broadcasts
        let hwnd = CreateWindowExW(
            Default::default(),
            LISTENER_CLASS,
            PCWSTR::null(),
            WS_OVERLAPPEDWINDOW,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            CW_USEDEFAULT,
            None,
            None,
            hinstance,
            None,
        );

        if hwnd.0 == 0 {
            return Err(OsError::DisplayChangeFailed {
                reason: "CreateWindowExW failed for listener window".to_string(),
            });
        }
        Ok(hwnd)
    }
}

unsafe extern "system" fn window_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match msg {
        WM_DISPLAYCHANGE => {
            let width = (lparam.0 & 0xFFFF) as u32;
            let height = ((lparam.0 >> 16) & 0xFFFF) as u32;
            tracing::debug!("Display change detected: {}x{} @ {} bpp", width, height, wparam.0);

            let callback = DISPLAY_CALLBACK.lock().clone();
            if let Some(callback) = callback {
                callback();
            }
            LRESULT(0)
        }
        WM_DESTROY => {
            PostQuitMessage(0);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_listener_creation() {
        let listener = DisplayChangeListener::new();
        assert!(!listener.is_running());
    }

    #[test]
    fn test_stop_without_start_is_noop() {
        let mut listener = DisplayChangeListener::default();
        listener.stop();
        listener.stop();
        assert!(!listener.is_running());
    }
}
