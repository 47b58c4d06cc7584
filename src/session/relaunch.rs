//! Process relaunch
//!
//! Command construction is pure; only `spawn` touches the OS.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::error::OsError;
use crate::core::instance::InstanceLock;
use crate::os::{self, OsResult};

/// Flags passed to the idle-mode process started after unlock
pub const IDLE_ARGS: &[&str] = &["--min", "--no-elevate"];

/// Why the process is being relaunched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchKind {
    /// Return to idle mode after a successful unlock
    Idle,
    /// Re-run the lock screen after a secure desktop interruption
    Restart,
}

/// A fully specified replacement process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaunchCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Start through the elevation prompt so the new process keeps admin rights
    pub elevated: bool,
    pub kind: LaunchKind,
}

impl RelaunchCommand {
    /// Idle-mode relaunch after unlock
    pub fn idle(program: impl Into<PathBuf>, elevated: bool) -> Self {
        Self {
            program: program.into(),
            args: IDLE_ARGS.iter().map(|a| a.to_string()).collect(),
            elevated,
            kind: LaunchKind::Idle,
        }
    }

    /// Re-execute with the current arguments
    pub fn restart(program: impl Into<PathBuf>, args: &[String], elevated: bool) -> Self {
        Self {
            program: program.into(),
            args: args.to_vec(),
            elevated,
            kind: LaunchKind::Restart,
        }
    }

    /// Restart of the running executable with its own arguments, minus
    /// `--min` so the new process locks straight away
    pub fn restart_current(elevated: bool) -> std::io::Result<Self> {
        let program = std::env::current_exe()?;
        Ok(Self::restart(program, &lock_args(std::env::args().skip(1)), elevated))
    }

    /// Append `flag` unless it is already present
    pub fn with_flag(mut self, flag: &str) -> Self {
        if !self.args.iter().any(|a| a == flag) {
            self.args.push(flag.to_string());
        }
        self
    }

    /// Arguments joined into one command line, quoting where needed
    pub fn parameters(&self) -> String {
        self.args
            .iter()
            .map(|a| quote(a))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Start the replacement process
    pub fn spawn(&self) -> OsResult<()> {
        tracing::info!(
            kind = ?self.kind,
            elevated = self.elevated,
            "Launching {} {}",
            self.program.display(),
            self.parameters()
        );

        if self.elevated {
            return os::run_elevated(&self.program, &self.parameters());
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            cmd.creation_flags(match self.kind {
                LaunchKind::Idle => CREATE_NO_WINDOW,
                LaunchKind::Restart => CREATE_NEW_PROCESS_GROUP,
            });
        }

        let child = cmd.spawn().map_err(|e| spawn_failed(&self.program, e))?;
        tracing::debug!("Replacement process started with pid {}", child.id());
        Ok(())
    }
}

/// What the current process does after trying to start its replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterRestart {
    /// The replacement is running; this process must exit
    Exit,
    /// Nothing was started; keep the current session armed
    StayLocked,
}

impl AfterRestart {
    pub fn from_spawn<E>(result: &Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Exit,
            Err(_) => Self::StayLocked,
        }
    }
}

/// Free the instance lock for the replacement started by `start`.
///
/// The lock is taken back when `start` fails, so the running session keeps
/// its single-instance guarantee.
pub fn hand_over<E: std::fmt::Display>(
    instance: &mut InstanceLock,
    start: impl FnOnce() -> Result<(), E>,
) -> AfterRestart {
    instance.release();
    let result = start();
    if let Err(e) = &result {
        tracing::error!("Restart failed, staying locked: {}", e);
        if let Err(e) = instance.reacquire() {
            tracing::error!("Cannot take the instance lock back: {}", e);
        }
    }
    AfterRestart::from_spawn(&result)
}

fn spawn_failed(program: &Path, e: std::io::Error) -> OsError {
    OsError::SpawnFailed {
        program: program.display().to_string(),
        reason: e.to_string(),
    }
}

fn lock_args(args: impl Iterator<Item = String>) -> Vec<String> {
    args.filter(|a| a != "--min").collect()
}

/// Quote one argument for a Windows command line
fn quote(arg: &str) -> String {
    if !arg.is_empty() && !arg.contains([' ', '\t', '"']) {
        return arg.to_string();
    }
    format!("\"{}\"", arg.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::instance::LOCK_FILE_NAME;
    use tempfile::TempDir;

    #[test]
    fn test_idle_command() {
        let cmd = RelaunchCommand::idle(r"C:\Apps\motion-saver.exe", true);
        assert_eq!(cmd.args, vec!["--min", "--no-elevate"]);
        assert_eq!(cmd.kind, LaunchKind::Idle);
        assert!(cmd.elevated);
        assert_eq!(cmd.parameters(), "--min --no-elevate");
    }

    #[test]
    fn test_restart_keeps_arguments() {
        let args = vec!["--video".to_string(), r"D:\My Videos\loop.mp4".to_string()];
        let cmd = RelaunchCommand::restart("motion-saver", &args, false);
        assert_eq!(cmd.args, args);
        assert_eq!(cmd.kind, LaunchKind::Restart);
        assert_eq!(cmd.parameters(), r#"--video "D:\My Videos\loop.mp4""#);
    }

    #[test]
    fn test_restart_drops_idle_flag() {
        let args = ["--min", "--no-elevate", "-v"].map(String::from);
        assert_eq!(lock_args(args.into_iter()), vec!["--no-elevate", "-v"]);
    }

    #[test]
    fn test_with_flag_is_idempotent() {
        let cmd = RelaunchCommand::restart("motion-saver", &["lock".to_string()], true)
            .with_flag("--no-elevate")
            .with_flag("--no-elevate");
        assert_eq!(cmd.parameters(), "lock --no-elevate");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("--min"), "--min");
        assert_eq!(quote(""), "\"\"");
        assert_eq!(quote("say \"hi\""), "\"say \\\"hi\\\"\"");
    }

    #[test]
    fn test_spawn_missing_program_fails() {
        let cmd = RelaunchCommand::idle("/nonexistent/motion-saver-binary", false);
        assert!(matches!(cmd.spawn(), Err(OsError::SpawnFailed { .. })));
    }

    #[test]
    fn test_after_restart_exits_only_on_success() {
        assert_eq!(AfterRestart::from_spawn::<OsError>(&Ok(())), AfterRestart::Exit);
        let failed: OsResult<()> = Err(OsError::SpawnFailed {
            program: "motion-saver".to_string(),
            reason: "The operation was canceled by the user.".to_string(),
        });
        assert_eq!(AfterRestart::from_spawn(&failed), AfterRestart::StayLocked);
    }

    #[test]
    fn test_hand_over_frees_lock_for_replacement() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCK_FILE_NAME);
        let mut instance = InstanceLock::acquire(&path).unwrap();

        let next = hand_over(&mut instance, || {
            assert!(!path.exists());
            Ok::<(), OsError>(())
        });

        assert_eq!(next, AfterRestart::Exit);
        assert!(!instance.is_held());
        assert!(!path.exists());
    }

    #[test]
    fn test_failed_hand_over_keeps_lock() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCK_FILE_NAME);
        let mut instance = InstanceLock::acquire(&path).unwrap();

        let cmd = RelaunchCommand::restart("/nonexistent/motion-saver-binary", &[], false);
        let next = hand_over(&mut instance, || cmd.spawn());

        assert_eq!(next, AfterRestart::StayLocked);
        assert!(instance.is_held());
        assert!(path.exists());
    }
}
