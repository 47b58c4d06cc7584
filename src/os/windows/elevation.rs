//! Administrator elevation

use std::path::Path;

use windows::core::{w, HSTRING, PCWSTR};
use windows::Win32::Foundation::HWND;
use windows::Win32::UI::Shell::{IsUserAnAdmin, ShellExecuteW};
use windows::Win32::UI::WindowsAndMessaging::SW_HIDE;

use crate::core::error::OsError;
use crate::os::OsResult;

/// Whether this process runs with administrator rights
pub fn is_elevated() -> bool {
    unsafe { IsUserAnAdmin().as_bool() }
}

/// Start `program` through the `runas` verb with a hidden window.
///
/// `parameters` is a single pre-quoted command line.
pub fn run_elevated(program: &Path, parameters: &str) -> OsResult<()> {
    let file = HSTRING::from(program.as_os_str());
    let params = HSTRING::from(parameters);

    let instance = unsafe {
        ShellExecuteW(
            HWND(0),
            w!("runas"),
            &file,
            &params,
            PCWSTR::null(),
            SW_HIDE,
        )
    };

    // Values up to 32 are error codes
    if instance.0 <= 32 {
        return Err(OsError::SpawnFailed {
            program: program.display().to_string(),
            reason: format!("ShellExecuteW returned {}", instance.0),
        });
    }
    Ok(())
}
