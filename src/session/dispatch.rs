//! Posting work from background threads onto the UI thread
//!
//! Background threads never touch hooks or windows. They send a [`UiEvent`]
//! and wake the UI thread, which drains the queue from its message loop.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Wakes the UI thread's message loop
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Work the UI thread performs on behalf of another thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    /// The hook watchdog found the hotkey hooks gone
    ReinstallHooks,
    /// The display configuration changed
    DisplayChanged,
}

/// Cloneable sending half
#[derive(Clone)]
pub struct UiSender {
    tx: Sender<UiEvent>,
    waker: Option<Waker>,
}

impl UiSender {
    /// Queue `event`. Returns false once the UI thread is gone.
    pub fn post(&self, event: UiEvent) -> bool {
        if self.tx.send(event).is_err() {
            tracing::debug!("UI queue closed, dropped {:?}", event);
            return false;
        }
        if let Some(wake) = &self.waker {
            wake();
        }
        true
    }

    /// Callback that posts `event`, for APIs taking a plain closure
    pub fn poster(&self, event: UiEvent) -> Arc<dyn Fn() + Send + Sync> {
        let sender = self.clone();
        Arc::new(move || {
            sender.post(event);
        })
    }
}

/// Receiving half, owned by the UI thread
pub struct UiQueue {
    rx: Receiver<UiEvent>,
}

impl UiQueue {
    /// Everything queued so far, without blocking
    pub fn drain(&self) -> Vec<UiEvent> {
        self.rx.try_iter().collect()
    }
}

/// Create a queue. `waker`, when given, runs after every post.
pub fn channel(waker: Option<Waker>) -> (UiSender, UiQueue) {
    let (tx, rx) = mpsc::channel();
    (UiSender { tx, waker }, UiQueue { rx })
}
