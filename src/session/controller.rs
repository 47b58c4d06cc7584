//! Lock session controller
//!
//! States: `Idle -> Armed -> ChallengePending -> Unlocked`, with a failed or
//! cancelled challenge resuming back to `Armed`. Unlock teardown runs once;
//! any later call is a no-op.

use std::sync::Arc;
use std::time::Instant;

use crate::blocker::KeyBlocker;
use crate::core::config::LockTuning;
use crate::credentials::CredentialStore;
use crate::display::MonitorBlackoutManager;
use crate::os::MonitorRect;

use super::dispatch::{UiEvent, UiQueue, UiSender};
use super::relaunch::RelaunchCommand;
use super::{CredentialPrompt, PresentationSurface, PromptOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Armed,
    ChallengePending,
    Unlocked,
}

/// Result of a trigger input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerOutcome {
    /// Not armed; nothing happened
    Ignored,
    /// Challenge failed or was cancelled; still locked
    ResumedLocked,
    /// Verified and torn down. Carries the replacement process to start,
    /// present only on the first teardown.
    Unlocked(Option<RelaunchCommand>),
}

/// Everything a session owns
pub struct SessionParts {
    pub surface: Box<dyn PresentationSurface>,
    /// `None` when hotkey blocking is disabled by settings
    pub blocker: Option<Box<dyn KeyBlocker>>,
    pub blackout: MonitorBlackoutManager,
    pub credentials: Arc<CredentialStore>,
    pub prompt: Box<dyn CredentialPrompt>,
    pub ui: UiSender,
    pub tuning: LockTuning,
    /// Process to start after unlock
    pub relaunch: Option<RelaunchCommand>,
}

pub struct LockSessionController {
    state: SessionState,
    surface: Option<Box<dyn PresentationSurface>>,
    blocker: Option<Box<dyn KeyBlocker>>,
    blackout: Option<MonitorBlackoutManager>,
    credentials: Arc<CredentialStore>,
    prompt: Box<dyn CredentialPrompt>,
    ui: UiSender,
    tuning: LockTuning,
    relaunch: Option<RelaunchCommand>,
    main_window: Option<MonitorRect>,
    refresh_due: Option<Instant>,
    torn_down: bool,
}

impl LockSessionController {
    pub fn new(parts: SessionParts) -> Self {
        Self {
            state: SessionState::Idle,
            surface: Some(parts.surface),
            blocker: parts.blocker,
            blackout: Some(parts.blackout),
            credentials: parts.credentials,
            prompt: parts.prompt,
            ui: parts.ui,
            tuning: parts.tuning,
            relaunch: parts.relaunch,
            main_window: None,
            refresh_due: None,
            torn_down: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Bounds of the lock window, used when no monitor is flagged primary
    pub fn set_main_window(&mut self, rect: MonitorRect) {
        self.main_window = Some(rect);
    }

    /// Start blocking and schedule the first blackout refresh
    pub fn arm(&mut self, now: Instant) -> bool {
        if self.state != SessionState::Idle {
            tracing::warn!("Arm ignored in state {:?}", self.state);
            return false;
        }

        if let Some(blocker) = self.blocker.as_mut() {
            if blocker.start() {
                tracing::info!("Key blocking enabled");
            } else {
                tracing::warn!("Key blocking only partially enabled");
            }
            tracing::info!("Blocking status: {:?}", blocker.status());
        }

        if let Some(blackout) = self.blackout.as_mut() {
            let on_change = self.ui.poster(UiEvent::DisplayChanged);
            if let Err(e) = blackout.subscribe_changes(on_change) {
                tracing::error!(primitive = e.primitive(), "{}", e);
            }
        }

        self.refresh_due = Some(now + self.tuning.initial_blackout_delay);
        self.state = SessionState::Armed;
        tracing::info!("Lock session armed");
        true
    }

    /// Handle an event posted by a background thread
    pub fn handle(&mut self, event: UiEvent, now: Instant) {
        if self.torn_down {
            return;
        }
        match event {
            UiEvent::ReinstallHooks => {
                if let Some(blocker) = self.blocker.as_mut() {
                    blocker.reinstall_hooks();
                }
            }
            UiEvent::DisplayChanged => {
                tracing::debug!("Display configuration changed");
                self.refresh_due = Some(now + self.tuning.display_change_debounce);
            }
        }
    }

    /// Handle everything queued, then run due timed work. Runs on every
    /// wake and timer tick, so an event whose wake was swallowed by a modal
    /// prompt is still picked up. Returns the number of events handled.
    pub fn pump(&mut self, queue: &UiQueue, now: Instant) -> usize {
        let events = queue.drain();
        let handled = events.len();
        for event in events {
            self.handle(event, now);
        }
        self.tick(now);
        handled
    }

    /// Next time `tick` has work to do
    pub fn next_deadline(&self) -> Option<Instant> {
        self.refresh_due
    }

    /// Run timed work that is due
    pub fn tick(&mut self, now: Instant) {
        match self.refresh_due {
            Some(due) if due <= now => {
                self.refresh_due = None;
                self.refresh_blackout();
            }
            _ => {}
        }
    }

    fn refresh_blackout(&mut self) {
        if let Some(blackout) = self.blackout.as_mut() {
            blackout.refresh(self.main_window);
        }
    }

    /// Key press or click on the lock screen: challenge for the password
    pub fn trigger(&mut self) -> TriggerOutcome {
        if self.state != SessionState::Armed {
            return TriggerOutcome::Ignored;
        }

        self.state = SessionState::ChallengePending;
        if let Some(surface) = self.surface.as_mut() {
            surface.pause();
        }

        let username = self.challenged_user();
        let credentials = Arc::clone(&self.credentials);
        let mut verify = |password: &str| credentials.verify(&username, password);
        let outcome = self.prompt.challenge(&username, &mut verify);

        match outcome {
            PromptOutcome::Verified => {
                tracing::info!("Password verified for '{}'", username);
                TriggerOutcome::Unlocked(self.teardown())
            }
            PromptOutcome::Rejected | PromptOutcome::Cancelled => {
                tracing::info!("Unlock {:?}, resuming", outcome);
                if let Some(surface) = self.surface.as_mut() {
                    surface.resume();
                    surface.focus();
                }
                self.state = SessionState::Armed;
                TriggerOutcome::ResumedLocked
            }
        }
    }

    fn challenged_user(&self) -> String {
        let user = self.credentials.default_display_user();
        if !user.is_empty() {
            return user;
        }
        self.credentials
            .usernames()
            .into_iter()
            .next()
            .unwrap_or_default()
    }

    /// Tear everything down after a verified unlock.
    ///
    /// Only the first call does anything; it returns the relaunch command.
    pub fn teardown(&mut self) -> Option<RelaunchCommand> {
        if std::mem::replace(&mut self.torn_down, true) {
            tracing::debug!("Teardown already done");
            return None;
        }

        if let Some(mut surface) = self.surface.take() {
            surface.close();
        }
        if let Some(blackout) = self.blackout.as_mut() {
            blackout.unsubscribe_changes();
        }
        if let Some(mut blocker) = self.blocker.take() {
            blocker.stop();
        }
        if let Some(mut blackout) = self.blackout.take() {
            blackout.destroy_all();
        }
        self.refresh_due = None;
        self.state = SessionState::Unlocked;

        tracing::info!("Lock session torn down");
        self.relaunch.take()
    }
}

impl Drop for LockSessionController {
    fn drop(&mut self) {
        // Leaving without unlock still puts registry policy back
        if let Some(mut blocker) = self.blocker.take() {
            tracing::warn!("Lock session dropped while armed, stopping key blocking");
            blocker.stop();
        }
    }
}
