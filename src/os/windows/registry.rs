//! Windows registry policy writes

use std::os::windows::process::CommandExt;
use std::process::{Command, Stdio};

use windows::core::{HSTRING, PCWSTR};
use windows::Win32::Foundation::{ERROR_FILE_NOT_FOUND, WIN32_ERROR};
use windows::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegDeleteValueW, RegOpenKeyExW, RegSetValueExW, HKEY,
    HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_SET_VALUE, REG_DWORD, REG_OPTION_NON_VOLATILE,
};
use windows::Win32::System::Threading::CREATE_NO_WINDOW;

use crate::core::error::OsError;
use crate::os::{OsResult, PolicyRegistry, RegistryHive};

/// Registry access through the Win32 API
pub struct WindowsPolicyRegistry;

impl WindowsPolicyRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl Default for WindowsPolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn root(hive: RegistryHive) -> HKEY {
    match hive {
        RegistryHive::LocalMachine => HKEY_LOCAL_MACHINE,
        RegistryHive::CurrentUser => HKEY_CURRENT_USER,
    }
}

fn failure(hive: RegistryHive, path: &str, name: &str, step: &str, code: WIN32_ERROR) -> OsError {
    OsError::RegistryFailed {
        path: format!("{}\\{}", hive, path),
        name: name.to_string(),
        reason: format!("{} returned {}", step, code.0),
    }
}

impl PolicyRegistry for WindowsPolicyRegistry {
    fn set_dword(&mut self, hive: RegistryHive, path: &str, name: &str, value: u32) -> OsResult<()> {
        unsafe {
            let mut key = HKEY::default();
            let code = RegCreateKeyExW(
                root(hive),
                &HSTRING::from(path),
                0,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_SET_VALUE,
                None,
                &mut key,
                None,
            );
            if code.is_err() {
                return Err(failure(hive, path, name, "RegCreateKeyExW", code));
            }

            let data = value.to_le_bytes();
            let code = RegSetValueExW(key, &HSTRING::from(name), 0, REG_DWORD, Some(&data));
            let _ = RegCloseKey(key);
            if code.is_err() {
                return Err(failure(hive, path, name, "RegSetValueExW", code));
            }
        }
        Ok(())
    }

    fn delete_value(&mut self, hive: RegistryHive, path: &str, name: &str) -> OsResult<bool> {
        unsafe {
            let mut key = HKEY::default();
            let code = RegOpenKeyExW(root(hive), &HSTRING::from(path), 0, KEY_SET_VALUE, &mut key);
            if code == ERROR_FILE_NOT_FOUND {
                return Ok(false);
            }
            if code.is_err() {
                return Err(failure(hive, path, name, "RegOpenKeyExW", code));
            }

            let code = RegDeleteValueW(key, &HSTRING::from(name));
            let _ = RegCloseKey(key);
            if code == ERROR_FILE_NOT_FOUND {
                return Ok(false);
            }
            if code.is_err() {
                return Err(failure(hive, path, name, "RegDeleteValueW", code));
            }
        }
        Ok(true)
    }

    fn refresh_policy(&mut self) {
        let spawned = Command::new("gpupdate")
            .arg("/force")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .creation_flags(CREATE_NO_WINDOW.0)
            .spawn();
        match spawned {
            Ok(_) => tracing::debug!("gpupdate /force started"),
            Err(e) => tracing::warn!("Failed to start gpupdate: {}", e),
        }
    }
}
