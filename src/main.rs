//! MotionSaver - password-gated lock screen
//!
//! Main entry point.

#![cfg_attr(
    all(not(debug_assertions), target_os = "windows"),
    windows_subsystem = "windows"
)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;

use motion_saver::blocker::{BlockerCallbacks, BlockerKind, RestartHook, IDLE_TRIGGER};
use motion_saver::core::{find_user_config_path, AppSettings, InstanceLock, LockTuning};
use motion_saver::credentials::CredentialStore;
use motion_saver::display::MonitorBlackoutManager;
use motion_saver::logging::{init_or_fallback, LoggingConfig};
use motion_saver::os::{self, LockWindow, LockWindowEvent, LoopControl, Platform};
use motion_saver::session::dispatch::channel;
use motion_saver::session::{
    hand_over, AfterRestart, DialogPrompt, LockSessionController, RelaunchCommand, SessionParts,
    TriggerOutcome, UiEvent, WindowSurface,
};

#[derive(Parser, Debug)]
#[command(name = "motion-saver", version, about = "Password-gated lock screen")]
struct Cli {
    /// Start in the background and lock on Win+S
    #[arg(long)]
    min: bool,

    /// Do not relaunch through the elevation prompt
    #[arg(long)]
    no_elevate: bool,

    /// Video for the lock screen, overrides `video_path`
    #[arg(long, value_name = "PATH")]
    video: Option<String>,

    /// Settings file [default: config/userconfig.json above the executable]
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lock the screen now
    Lock,
    /// Manage the users allowed to unlock
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
}

#[derive(Subcommand, Debug)]
enum UsersAction {
    /// List users, marking the one challenged on unlock
    List,
    Add {
        username: String,
        password: String,
    },
    Delete {
        username: String,
    },
    /// Change a password
    Passwd {
        username: String,
        old_password: String,
        new_password: String,
    },
    /// Challenge this user on unlock
    SetDefault {
        username: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(find_user_config_path);
    let settings = AppSettings::load_or_default(&config_path);

    // Kept alive for the process lifetime so the file writer flushes
    let _logging_system = init_or_fallback(LoggingConfig::from_settings(&settings, cli.verbose));
    tracing::info!("Starting MotionSaver {}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("Settings file: {:?}", config_path);

    let idle = cli.min && cli.command.is_none();
    if let Some(Command::Users { action }) = cli.command {
        return run_users(&config_path, action);
    }

    let elevated = os::is_elevated();
    if settings.run_as_admin && !cli.no_elevate && !elevated {
        match relaunch_elevated() {
            Ok(()) => {
                tracing::info!("Relaunched with elevation, exiting");
                return Ok(());
            }
            Err(e) => tracing::warn!("Elevation failed, continuing without: {:#}", e),
        }
    }

    let instance = InstanceLock::acquire_default().context("MotionSaver is already running")?;
    let instance = Arc::new(Mutex::new(instance));

    if idle {
        wait_for_idle_trigger()?;
    }

    let video = cli.video.or_else(|| settings.video_path.clone());
    let tuning = LockTuning::default();
    let relaunch = run_lock(&config_path, &settings, video, elevated, &tuning, &instance)?;

    instance.lock().release();
    if let Some(cmd) = relaunch {
        if let Err(e) = cmd.spawn() {
            tracing::error!(primitive = e.primitive(), "Idle relaunch failed: {}", e);
        }
        std::thread::sleep(Duration::from_secs(1));
    }

    tracing::info!("MotionSaver exiting");
    Ok(())
}

/// Start an elevated copy that will not try to elevate again
fn relaunch_elevated() -> anyhow::Result<()> {
    let exe = std::env::current_exe().context("cannot resolve the running executable")?;
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cmd = RelaunchCommand::restart(exe, &args, true).with_flag("--no-elevate");
    cmd.spawn()?;
    Ok(())
}

/// Idle mode: block until Win+S
fn wait_for_idle_trigger() -> anyhow::Result<()> {
    tracing::info!("Idle mode, press {} to lock", IDLE_TRIGGER.label);
    let mut hook = Platform::native().hook;
    os::wait_for_hotkey(hook.as_mut(), IDLE_TRIGGER.combination)
        .context("cannot wait for the lock hotkey")?;
    Ok(())
}

/// Show the lock screen until a verified unlock; returns the process to start next
fn run_lock(
    config_path: &Path,
    settings: &AppSettings,
    video: Option<String>,
    elevated: bool,
    tuning: &LockTuning,
    instance: &Arc<Mutex<InstanceLock>>,
) -> anyhow::Result<Option<RelaunchCommand>> {
    let window = LockWindow::create().context("cannot create the lock window")?;
    let (ui, queue) = channel(Some(window.waker()));

    let Platform {
        hook,
        registry,
        session,
        display,
        sampler,
    } = Platform::native();

    let kind = BlockerKind::select(settings.run_as_admin, elevated);
    let callbacks = BlockerCallbacks {
        reinstall: ui.poster(UiEvent::ReinstallHooks),
        restart: restart_hook(Arc::clone(instance), elevated, tuning.exit_delay),
    };
    let blocker = kind.build(hook, registry, session, sampler, tuning, callbacks);

    let relaunch = std::env::current_exe()
        .map(|exe| RelaunchCommand::idle(exe, elevated))
        .map_err(|e| tracing::warn!("No idle relaunch, executable unknown: {}", e))
        .ok();

    let mut controller = LockSessionController::new(SessionParts {
        surface: Box::new(WindowSurface::new(window.handle(), video)),
        blocker,
        blackout: MonitorBlackoutManager::new(display),
        credentials: Arc::new(CredentialStore::load(config_path)),
        prompt: Box::new(DialogPrompt::new(window.handle())),
        ui,
        tuning: tuning.clone(),
        relaunch,
    });
    controller.set_main_window(window.rect());
    controller.arm(Instant::now());

    let outcome: Arc<Mutex<Option<RelaunchCommand>>> = Arc::new(Mutex::new(None));
    let result = Arc::clone(&outcome);

    window.run(move |event| match event {
        LockWindowEvent::Trigger => match controller.trigger() {
            TriggerOutcome::Unlocked(cmd) => {
                *result.lock() = cmd;
                LoopControl::Quit
            }
            TriggerOutcome::Ignored | TriggerOutcome::ResumedLocked => LoopControl::Continue,
        },
        LockWindowEvent::Wake | LockWindowEvent::Tick => {
            controller.pump(&queue, Instant::now());
            LoopControl::Continue
        }
    })?;

    let relaunch = outcome.lock().take();
    Ok(relaunch)
}

/// Process restart after a secure desktop interruption.
///
/// Exits only once the replacement is running; otherwise the lock screen
/// stays up with the instance lock taken back.
fn restart_hook(
    instance: Arc<Mutex<InstanceLock>>,
    elevated: bool,
    exit_delay: Duration,
) -> RestartHook {
    Arc::new(move || {
        let next = hand_over(&mut instance.lock(), || -> anyhow::Result<()> {
            let cmd = RelaunchCommand::restart_current(elevated)
                .context("cannot resolve executable for restart")?;
            cmd.spawn()?;
            Ok(())
        });
        if next == AfterRestart::StayLocked {
            return;
        }
        std::thread::sleep(exit_delay);
        tracing::info!("Exiting for restart");
        std::process::exit(0);
    })
}

fn run_users(config_path: &Path, action: UsersAction) -> anyhow::Result<()> {
    let store = CredentialStore::load(config_path);

    match action {
        UsersAction::List => {
            let default_user = store.default_display_user();
            for name in store.usernames() {
                let marker = if name == default_user { "*" } else { " " };
                println!("{} {}", marker, name);
            }
        }
        UsersAction::Add { username, password } => {
            store.add_user(&username, &password)?;
            println!("Added {}", username);
        }
        UsersAction::Delete { username } => {
            store.delete_user(&username)?;
            println!("Deleted {}", username);
        }
        UsersAction::Passwd {
            username,
            old_password,
            new_password,
        } => {
            if !store.change_password(&username, &old_password, &new_password) {
                anyhow::bail!("password for {} was not changed", username);
            }
            println!("Password changed for {}", username);
        }
        UsersAction::SetDefault { username } => {
            store.set_default_display_user(&username)?;
            println!("{} is now challenged on unlock", username);
        }
    }
    Ok(())
}
