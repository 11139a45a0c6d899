//! Where dispatch callbacks run.
//!
//! # Design
//! The transport completes on a pool thread. A `CallbackContext` decides
//! which thread then runs the caller's callback. `Inline` runs it right
//! there. `MainQueue` posts it to a `MainLoop` that the caller drains from
//! one designated thread (typically the main or UI thread), so callbacks
//! never arrive anywhere else.

use std::time::{Duration, Instant};

use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::warn;

/// A callback ready to run.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

pub trait CallbackContext: Send + Sync {
    fn schedule(&self, job: Job);
}

/// Runs callbacks on whichever thread completed the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inline;

impl CallbackContext for Inline {
    fn schedule(&self, job: Job) {
        job()
    }
}

/// Sending half of a main-thread callback queue. Cheap to clone; hand one to
/// every builder whose callbacks belong on the loop's thread.
#[derive(Debug, Clone)]
pub struct MainQueue {
    tx: mpsc::UnboundedSender<Job>,
}

/// Receiving half of a main-thread callback queue. Owned by the thread that
/// should run the callbacks.
#[derive(Debug)]
pub struct MainLoop {
    rx: mpsc::UnboundedReceiver<Job>,
}

const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Create a connected queue and loop.
pub fn main_queue() -> (MainQueue, MainLoop) {
    let (tx, rx) = mpsc::unbounded_channel();
    (MainQueue { tx }, MainLoop { rx })
}

impl CallbackContext for MainQueue {
    fn schedule(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!("main loop dropped, discarding callback");
        }
    }
}

impl MainLoop {
    /// Run every callback that is ready now. Returns how many ran.
    pub fn pump(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Block until one callback is available and run it.
    ///
    /// Returns `false` once every `MainQueue` handle has been dropped and the
    /// queue is empty. Must not be called from inside an async context.
    pub fn blocking_run_one(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Like `blocking_run_one`, but gives up after `timeout`. Returns whether
    /// a callback ran.
    pub fn run_one_timeout(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.rx.try_recv() {
                Ok(job) => {
                    job();
                    return true;
                }
                Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    std::thread::sleep((deadline - now).min(POLL_INTERVAL));
                }
            }
        }
    }

    /// Async variant of `blocking_run_one`.
    pub async fn run_one(&mut self) -> bool {
        match self.rx.recv().await {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }
}
