//! Workstation lock and key release

use windows::Win32::System::Shutdown::LockWorkStation;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, KEYBDINPUT, KEYEVENTF_EXTENDEDKEY, KEYEVENTF_KEYUP,
    VIRTUAL_KEY,
};

use crate::core::error::OsError;
use crate::os::keys::VK_RMENU;
use crate::os::{OsResult, SessionControl};

pub struct WindowsSessionControl;

impl SessionControl for WindowsSessionControl {
    fn lock_workstation(&self) -> OsResult<()> {
        unsafe { LockWorkStation() }.map_err(|e| OsError::LockWorkstationFailed {
            reason: format!("{:?}", e),
        })?;
        tracing::info!("Workstation locked");
        Ok(())
    }

    fn release_right_alt(&self) -> OsResult<()> {
        let input = INPUT {
            r#type: INPUT_KEYBOARD,
            Anonymous: INPUT_0 {
                ki: KEYBDINPUT {
                    wVk: VIRTUAL_KEY(VK_RMENU),
                    wScan: 0,
                    dwFlags: KEYEVENTF_KEYUP | KEYEVENTF_EXTENDEDKEY,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        };

        let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
        if sent != 1 {
            return Err(OsError::SendInputFailed {
                reason: format!("{} of 1 events inserted", sent),
            });
        }
        Ok(())
    }
}
