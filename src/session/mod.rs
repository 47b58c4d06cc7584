//! Lock session
//!
//! Wires hotkey blocking, blackout windows, the presentation surface and the
//! credential prompt into one lock/unlock cycle driven from the UI thread.

pub mod controller;
pub mod dispatch;
pub mod platform;
pub mod relaunch;


pub use controller::{LockSessionController, SessionParts, SessionState, TriggerOutcome};
pub use dispatch::{UiEvent, UiQueue, UiSender};
pub use platform::{DialogPrompt, WindowSurface};
pub use relaunch::{hand_over, AfterRestart, LaunchKind, RelaunchCommand};

/// What the lock screen shows while armed (video, clock, profile).
///
/// Every method is called on the UI thread and may be called repeatedly.
pub trait PresentationSurface {
    fn pause(&mut self);

    fn resume(&mut self);

    fn close(&mut self);

    /// Take keyboard focus back after the prompt closes
    fn focus(&mut self) {}
}

/// How a credential challenge ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptOutcome {
    Verified,
    /// Attempts exhausted without a match
    Rejected,
    /// Dismissed by the user
    Cancelled,
}

/// Modal password challenge
pub trait CredentialPrompt {
    /// Ask for `username`'s password until `verify` accepts one or the user
    /// gives up. Blocks the caller; the UI thread keeps pumping messages.
    fn challenge(&mut self, username: &str, verify: &mut dyn FnMut(&str) -> bool) -> PromptOutcome;
}
