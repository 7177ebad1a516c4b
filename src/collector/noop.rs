//! Fallback collector for platforms without a global input hook.
//!
//! The binary still builds and runs here; readouts simply stay at zero.

use crate::collector::types::InputEvent;
use crate::collector::{CollectorConfig, CollectorError, EVENT_CHANNEL_CAPACITY};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::warn;

/// A collector that never emits events.
pub struct NoopCollector {
    _config: CollectorConfig,
    _sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    running: Arc<AtomicBool>,
}

impl NoopCollector {
    /// Create a new noop collector.
    pub fn new(config: CollectorConfig) -> Self {
        let (sender, receiver) = bounded(EVENT_CHANNEL_CAPACITY);
        Self {
            _config: config,
            _sender: sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start capturing events.
    ///
    /// This only marks the collector as running.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }
        warn!("no global input hook on this platform; no events will be captured");
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop capturing events.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Check if the collector is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the receiver for input events.
    pub fn receiver(&self) -> &Receiver<InputEvent> {
        &self.receiver
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<InputEvent> {
        self.receiver.try_recv().ok()
    }
}

/// There is no permission gate on these platforms.
pub fn check_permission() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_lifecycle() {
        let mut collector = NoopCollector::new(CollectorConfig::default());
        assert!(!collector.is_running());

        collector.start().unwrap();
        assert!(collector.is_running());
        assert!(matches!(
            collector.start(),
            Err(CollectorError::AlreadyRunning)
        ));
        assert!(collector.try_recv().is_none());

        collector.stop();
        assert!(!collector.is_running());
    }
}
