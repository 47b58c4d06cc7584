//! Session traits over the native lock window and password dialog

use crate::os::{self, DialogResult, LockWindowHandle};

use super::{CredentialPrompt, PresentationSurface, PromptOutcome};

/// The lock window as a presentation surface
pub struct WindowSurface {
    window: LockWindowHandle,
    video_path: Option<String>,
}

impl WindowSurface {
    pub fn new(window: LockWindowHandle, video_path: Option<String>) -> Self {
        if let Some(path) = &video_path {
            tracing::info!("Presentation video: {}", path);
        }
        Self { window, video_path }
    }

    pub fn video_path(&self) -> Option<&str> {
        self.video_path.as_deref()
    }
}

impl PresentationSurface for WindowSurface {
    fn pause(&mut self) {
        self.window.pause();
    }

    fn resume(&mut self) {
        self.window.resume();
    }

    fn close(&mut self) {
        self.window.close();
    }

    fn focus(&mut self) {
        self.window.focus();
    }
}

/// Native modal password box owned by the lock window
pub struct DialogPrompt {
    owner: LockWindowHandle,
}

impl DialogPrompt {
    pub fn new(owner: LockWindowHandle) -> Self {
        Self { owner }
    }
}

impl CredentialPrompt for DialogPrompt {
    fn challenge(&mut self, username: &str, verify: &mut dyn FnMut(&str) -> bool) -> PromptOutcome {
        match os::password_dialog(self.owner, username, verify) {
            DialogResult::Accepted => PromptOutcome::Verified,
            DialogResult::Cancelled => PromptOutcome::Cancelled,
        }
    }
}
