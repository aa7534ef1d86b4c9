//! Periodic Flush Scheduler
//!
//! A dedicated background thread that runs a task, waiting a fixed interval
//! between the end of one run and the start of the next.
//! `LogStorage` uses it to save every registered map once per cycle.
//!
//! ## State Machine
//! ```text
//!   Running ──stop()──▶ Stopping ──next wake──▶ Stopped
//! ```
//!
//! ## Shutdown Latency
//! `stop()` only flips the state; it never interrupts the wait in progress.
//! The worker notices on its next wake and exits without running the task,
//! so it can outlive `stop()` by up to one full interval. Stopping does not
//! flush: callers wanting a final save must commit themselves.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel;

use crate::error::Result;

/// Lifecycle state of the scheduler thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SchedulerState {
    Running = 0,
    Stopping = 1,
    Stopped = 2,
}

impl SchedulerState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => SchedulerState::Running,
            1 => SchedulerState::Stopping,
            _ => SchedulerState::Stopped,
        }
    }
}

/// Runs a closure every `interval` on its own thread
pub struct FlushScheduler {
    state: Arc<AtomicU8>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl FlushScheduler {
    /// Default thread name
    pub const THREAD_NAME: &'static str = "atlaslog-flush";

    /// Start the worker thread
    ///
    /// The first run of `task` happens one `interval` after spawning; each
    /// later run starts one `interval` after the previous one finished.
    pub fn spawn<F>(name: impl Into<String>, interval: Duration, mut task: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let state = Arc::new(AtomicU8::new(SchedulerState::Running as u8));
        let worker_state = Arc::clone(&state);
        let name = name.into();

        let handle = thread::Builder::new().name(name.clone()).spawn(move || {
            loop {
                // Fresh timer each cycle: the full interval passes between the
                // end of one run and the start of the next. A failed wait
                // counts as a spurious wake.
                let woke = channel::after(interval).recv().is_ok();

                if worker_state.load(Ordering::Acquire) != SchedulerState::Running as u8 {
                    break;
                }

                if woke {
                    task();
                }
            }

            worker_state.store(SchedulerState::Stopped as u8, Ordering::Release);
            tracing::debug!("Flush scheduler stopped");
        })?;

        tracing::debug!("Started flush scheduler '{}' every {:?}", name, interval);

        Ok(Self {
            state,
            interval,
            handle: Some(handle),
        })
    }

    /// Request termination on the next wake
    ///
    /// Returns `false` if the scheduler was already stopping or stopped.
    pub fn stop(&self) -> bool {
        self.state
            .compare_exchange(
                SchedulerState::Running as u8,
                SchedulerState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Request termination and wait for the thread to exit
    ///
    /// Blocks for up to one interval.
    pub fn join(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Flush scheduler thread panicked");
            }
        }
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        SchedulerState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Sleep between cycles
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        // Detach: the thread exits on its own at the next wake.
        self.stop();
    }
}
