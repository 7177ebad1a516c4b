//! Ingest session: drains collector events into the recorder.
//!
//! A single worker thread is the only writer to the recorder. It receives
//! events from the collector's channel, applies the target program filter
//! and records whatever passes.

use crate::collector::types::InputEvent;
use crate::core::recorder::ActivityRecorder;
use crate::target::TargetFilter;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// How long the worker waits for an event before re-checking its stop flag.
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Counters describing what the ingest worker has done.
#[derive(Debug, Default)]
pub struct IngestStats {
    events_received: AtomicU64,
    events_filtered: AtomicU64,
    actions_recorded: AtomicU64,
    effective_recorded: AtomicU64,
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestSnapshot {
    pub events_received: u64,
    pub events_filtered: u64,
    pub actions_recorded: u64,
    pub effective_recorded: u64,
}

impl IngestStats {
    pub fn snapshot(&self) -> IngestSnapshot {
        IngestSnapshot {
            events_received: self.events_received.load(Ordering::Relaxed),
            events_filtered: self.events_filtered.load(Ordering::Relaxed),
            actions_recorded: self.actions_recorded.load(Ordering::Relaxed),
            effective_recorded: self.effective_recorded.load(Ordering::Relaxed),
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Input events received: {}\n\
             - Events outside the target program: {}\n\
             - Actions counted: {}\n\
             - Effective actions counted: {}",
            stats.events_received,
            stats.events_filtered,
            stats.actions_recorded,
            stats.effective_recorded
        )
    }
}

/// A running ingest worker.
pub struct Session {
    recorder: Arc<ActivityRecorder>,
    filter: Arc<Mutex<TargetFilter>>,
    stats: Arc<IngestStats>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl Session {
    /// Start a worker that feeds events from `receiver` into `recorder`.
    pub fn spawn(
        recorder: Arc<ActivityRecorder>,
        receiver: Receiver<InputEvent>,
        filter: TargetFilter,
    ) -> Self {
        let filter = Arc::new(Mutex::new(filter));
        let stats = Arc::new(IngestStats::default());
        let running = Arc::new(AtomicBool::new(true));

        let worker = Worker {
            recorder: recorder.clone(),
            filter: filter.clone(),
            stats: stats.clone(),
            running: running.clone(),
        };
        let handle = thread::spawn(move || worker.run(receiver));

        Self {
            recorder,
            filter,
            stats,
            running,
            thread_handle: Some(handle),
        }
    }

    pub fn recorder(&self) -> &Arc<ActivityRecorder> {
        &self.recorder
    }

    pub fn stats(&self) -> IngestSnapshot {
        self.stats.snapshot()
    }

    pub fn summary(&self) -> String {
        self.stats.summary()
    }

    /// Change the target program while running.
    pub fn set_target(&self, target: Option<&str>) {
        let mut filter = self.filter.lock().unwrap_or_else(PoisonError::into_inner);
        filter.set_target(target);
        info!(program = ?filter.target(), "target program changed");
    }

    pub fn target(&self) -> Option<String> {
        let filter = self.filter.lock().unwrap_or_else(PoisonError::into_inner);
        filter.target().map(str::to_string)
    }

    /// Whether the worker thread is still consuming events.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal the worker to stop and wait for it to exit.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                warn!("ingest worker panicked");
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Worker {
    recorder: Arc<ActivityRecorder>,
    filter: Arc<Mutex<TargetFilter>>,
    stats: Arc<IngestStats>,
    running: Arc<AtomicBool>,
}

impl Worker {
    fn run(self, receiver: Receiver<InputEvent>) {
        debug!("ingest worker started");

        while self.running.load(Ordering::SeqCst) {
            match receiver.recv_timeout(RECV_TIMEOUT) {
                Ok(event) => self.ingest(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("event source disconnected");
                    break;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        debug!("ingest worker stopped");
    }

    fn ingest(&self, event: InputEvent) {
        self.stats.events_received.fetch_add(1, Ordering::Relaxed);

        let active = self
            .filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_target_active(Instant::now());
        if !active {
            self.stats.events_filtered.fetch_add(1, Ordering::Relaxed);
            return;
        }

        let outcome = self.recorder.record(event.category, event.timestamp);
        trace!(category = %event.category, raw = outcome.raw, effective = outcome.effective, "recorded");

        if outcome.raw {
            self.stats.actions_recorded.fetch_add(1, Ordering::Relaxed);
        }
        if outcome.effective {
            self.stats.effective_recorded.fetch_add(1, Ordering::Relaxed);
        }
    }
}
