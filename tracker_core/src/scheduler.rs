//! Change-driven scheduler.
//!
//! One watcher thread waits on a coalescing [`ChangeSignal`] and runs the
//! update cycle once per wake. Signals raised while a cycle runs collapse into
//! a single pending wake, so no cycle is lost and none overlap.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};

use crate::error::TrackerError;

/// "Something changed" flag with room for exactly one pending wake.
#[derive(Debug, Clone)]
pub struct ChangeSignal {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl Default for ChangeSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeSignal {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(1);
        Self { sender, receiver }
    }

    /// Raise the signal. A signal that is already raised stays raised once.
    pub fn notify(&self) {
        let _ = self.sender.try_send(());
    }

    pub fn is_raised(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Wait up to `timeout` and clear the signal. `true` if it was raised.
    pub fn wait(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(()) => true,
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }
}

/// Shared cancellation flag observed by the watcher and the cycle.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStats {
    pub cycles: u64,
    pub failures: u64,
    pub panics: u64,
}

/// Run the watcher loop on the current thread until `shutdown` is set.
pub fn run_watcher<F>(
    signal: &ChangeSignal,
    shutdown: &ShutdownFlag,
    poll: Duration,
    mut cycle: F,
) -> WatcherStats
where
    F: FnMut() -> Result<(), TrackerError>,
{
    let mut stats = WatcherStats::default();
    while !shutdown.is_set() {
        if !signal.wait(poll) {
            continue;
        }
        if shutdown.is_set() {
            break;
        }
        stats.cycles += 1;
        match panic::catch_unwind(AssertUnwindSafe(&mut cycle)) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                stats.failures += 1;
                tracing::error!(target: "tracker::scheduler", error = %err, "cycle.failed");
            }
            Err(payload) => {
                stats.panics += 1;
                let err = TrackerError::Panicked(panic_message(payload.as_ref()));
                tracing::error!(target: "tracker::scheduler", error = %err, "cycle.panicked");
            }
        }
    }
    tracing::info!(
        target: "tracker::scheduler",
        cycles = stats.cycles,
        failures = stats.failures,
        panics = stats.panics,
        "watcher.stopped"
    );
    stats
}

pub fn spawn_watcher<F>(
    signal: ChangeSignal,
    shutdown: ShutdownFlag,
    poll: Duration,
    cycle: F,
) -> JoinHandle<WatcherStats>
where
    F: FnMut() -> Result<(), TrackerError> + Send + 'static,
{
    thread::spawn(move || run_watcher(&signal, &shutdown, poll, cycle))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
