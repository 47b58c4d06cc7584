//! Background poll thread with a cooperative stop flag and a bounded join

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Handle to a running poll thread
pub struct Worker {
    name: String,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    finished: Option<Receiver<()>>,
}

impl Worker {
    /// Spawn `body` on a named thread. `body` must return soon after the
    /// flag it receives turns false.
    pub fn spawn<F>(name: &str, body: F) -> std::io::Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>) + Send + 'static,
    {
        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, done_rx) = mpsc::channel();

        let thread_running = Arc::clone(&running);
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                body(thread_running);
                let _ = done_tx.send(());
            })?;

        Ok(Self {
            name: name.to_string(),
            running,
            thread_handle: Some(handle),
            finished: Some(done_rx),
        })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst) && self.thread_handle.is_some()
    }

    /// Clear the flag and wait up to `timeout`. A thread that does not
    /// finish in time is left to die with the process.
    pub fn stop(&mut self, timeout: Duration) {
        self.running.store(false, Ordering::SeqCst);

        let (Some(handle), Some(finished)) = (self.thread_handle.take(), self.finished.take())
        else {
            return;
        };

        if handle.thread().id() == thread::current().id() {
            tracing::debug!("{} stopping itself, not joining", self.name);
            return;
        }

        match finished.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if handle.join().is_err() {
                    tracing::warn!("{} thread panicked", self.name);
                }
                tracing::debug!("{} thread stopped", self.name);
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    "{} thread did not stop within {:?}, abandoning it",
                    self.name,
                    timeout
                );
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Sleep up to `duration` in short steps, returning early once `running`
/// turns false. Returns whether still running.
pub fn sleep_while_running(running: &AtomicBool, duration: Duration) -> bool {
    const STEP: Duration = Duration::from_millis(50);
    let mut remaining = duration;
    while !remaining.is_zero() {
        if !running.load(Ordering::SeqCst) {
            return false;
        }
        let step = remaining.min(STEP);
        thread::sleep(step);
        remaining -= step;
    }
    running.load(Ordering::SeqCst)
}
