//! Per-process CPU sampling via Toolhelp and GetProcessTimes

use std::time::{Duration, Instant};

use windows::Win32::Foundation::{CloseHandle, FILETIME, HANDLE};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W, TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    GetProcessTimes, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
};

use crate::core::error::OsError;
use crate::os::{OsResult, ProcessSample, ProcessSampler};

pub struct WindowsProcessSampler;

/// Open process handle closed on drop
struct ProcessHandle(HANDLE);

impl Drop for ProcessHandle {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

fn filetime_ticks(ft: &FILETIME) -> u64 {
    ((ft.dwHighDateTime as u64) << 32) | ft.dwLowDateTime as u64
}

/// Kernel plus user time in 100ns ticks
fn cpu_ticks(handle: &ProcessHandle) -> Option<u64> {
    let mut creation = FILETIME::default();
    let mut exit = FILETIME::default();
    let mut kernel = FILETIME::default();
    let mut user = FILETIME::default();
    unsafe { GetProcessTimes(handle.0, &mut creation, &mut exit, &mut kernel, &mut user) }.ok()?;
    Some(filetime_ticks(&kernel) + filetime_ticks(&user))
}

/// Running processes as (pid, executable name)
fn list_processes() -> OsResult<Vec<(u32, String)>> {
    let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }.map_err(|e| {
        OsError::ProcessQueryFailed {
            reason: format!("CreateToolhelp32Snapshot failed: {:?}", e),
        }
    })?;
    let snapshot = ProcessHandle(snapshot);

    let mut processes = Vec::new();
    let mut entry = PROCESSENTRY32W {
        dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
        ..Default::default()
    };

    unsafe {
        if Process32FirstW(snapshot.0, &mut entry).is_err() {
            return Ok(processes);
        }
        loop {
            let len = entry
                .szExeFile
                .iter()
                .position(|&c| c == 0)
                .unwrap_or(entry.szExeFile.len());
            processes.push((
                entry.th32ProcessID,
                String::from_utf16_lossy(&entry.szExeFile[..len]),
            ));
            if Process32NextW(snapshot.0, &mut entry).is_err() {
                break;
            }
        }
    }
    Ok(processes)
}

impl ProcessSampler for WindowsProcessSampler {
    fn sample(&mut self, names: &[&str], window: Duration) -> OsResult<Vec<ProcessSample>> {
        let targets: Vec<(u32, String, ProcessHandle)> = list_processes()?
            .into_iter()
            .filter(|(_, name)| names.iter().any(|n| n.eq_ignore_ascii_case(name)))
            .filter_map(|(pid, name)| {
                match unsafe { OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid) } {
                    Ok(handle) => Some((pid, name, ProcessHandle(handle))),
                    Err(e) => {
                        tracing::debug!("Cannot open {} ({}): {:?}", name, pid, e);
                        None
                    }
                }
            })
            .collect();

        if targets.is_empty() {
            return Ok(Vec::new());
        }

        let before: Vec<Option<u64>> = targets.iter().map(|(_, _, h)| cpu_ticks(h)).collect();
        let started = Instant::now();
        std::thread::sleep(window);
        let elapsed_ticks = (started.elapsed().as_nanos() / 100).max(1) as f64;

        let samples = targets
            .iter()
            .zip(before)
            .filter_map(|((pid, name, handle), before)| {
                let delta = cpu_ticks(handle)?.saturating_sub(before?);
                Some(ProcessSample {
                    name: name.clone(),
                    pid: *pid,
                    cpu_percent: (delta as f64 / elapsed_ticks * 100.0) as f32,
                })
            })
            .collect();
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filetime_ticks() {
        let ft = FILETIME {
            dwLowDateTime: 5,
            dwHighDateTime: 1,
        };
        assert_eq!(filetime_ticks(&ft), (1u64 << 32) + 5);
    }

    #[test]
    fn test_sample_unknown_process_is_empty() {
        let samples = WindowsProcessSampler
            .sample(&["no-such-process-motionsaver.exe"], Duration::from_millis(1))
            .unwrap();
        assert!(samples.is_empty());
    }
}
