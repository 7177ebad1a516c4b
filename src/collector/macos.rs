//! macOS implementation of event collection using CGEvent tap.
//!
//! This module captures keyboard and mouse events at the system level using
//! macOS's Core Graphics event tap API. It requires Input Monitoring permission.

use crate::collector::types::{ActionCategory, InputEvent};
use crate::collector::{CollectorConfig, CollectorError, EVENT_CHANNEL_CAPACITY};
use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
use core_graphics::event::{
    CGEventFlags, CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement,
    CGEventType, CallbackResult,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error};

/// The macOS event collector using CGEvent tap.
pub struct MacOSCollector {
    config: CollectorConfig,
    sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl MacOSCollector {
    /// Create a new macOS collector with the given configuration.
    pub fn new(config: CollectorConfig) -> Self {
        let (sender, receiver) = bounded(EVENT_CHANNEL_CAPACITY);

        Self {
            config,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }
    }

    /// Start capturing events in a background thread.
    ///
    /// Returns an error if the collector is already running. A missing
    /// Input Monitoring permission surfaces asynchronously: the tap thread
    /// logs the failure and the collector stops reporting as running.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let config = self.config.clone();

        let handle = thread::spawn(move || {
            if let Err(e) = run_event_loop(sender, running.clone(), config) {
                error!("event tap loop failed: {e}");
            }
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop capturing events.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            // The run loop wakes every 100ms and sees the cleared flag
            let _ = handle.join();
        }
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

impl Drop for MacOSCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Build a list of event types to capture based on configuration.
fn build_event_types(config: &CollectorConfig) -> Vec<CGEventType> {
    let mut types = Vec::new();

    if config.capture_keyboard {
        types.push(CGEventType::KeyDown);
        types.push(CGEventType::FlagsChanged);
    }

    if config.capture_mouse {
        types.push(CGEventType::LeftMouseDown);
        types.push(CGEventType::RightMouseDown);
        types.push(CGEventType::OtherMouseDown);
        types.push(CGEventType::MouseMoved);
        types.push(CGEventType::LeftMouseDragged);
        types.push(CGEventType::RightMouseDragged);
    }

    types
}

/// Run the Core Graphics event loop until `running` is cleared.
fn run_event_loop(
    sender: Sender<InputEvent>,
    running: Arc<AtomicBool>,
    config: CollectorConfig,
) -> Result<(), CollectorError> {
    let event_types = build_event_types(&config);
    // FlagsChanged fires on press and release; only the press counts
    let previous_flags = AtomicU64::new(0);

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        event_types,
        move |_proxy, event_type, event| {
            let category = match event_type {
                CGEventType::FlagsChanged => {
                    let flags = event.get_flags().bits();
                    let previous = previous_flags.swap(flags, Ordering::Relaxed);
                    is_modifier_press(previous, flags).then_some(ActionCategory::Keyboard)
                }
                other => categorize(other),
            };
            if let Some(category) = category {
                // Never block the tap; drop the event if the channel is full
                let _ = sender.try_send(InputEvent::new(category));
            }
            CallbackResult::Keep
        },
    )
    .map_err(|_| CollectorError::TapCreationFailed)?;

    let source = tap
        .mach_port()
        .create_runloop_source(0)
        .map_err(|_| CollectorError::RunLoopSourceFailed)?;

    let run_loop = CFRunLoop::get_current();
    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }

    tap.enable();
    debug!("event tap enabled");

    while running.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(
            unsafe { kCFRunLoopCommonModes },
            Duration::from_millis(100),
            false,
        );
    }

    // The tap is disabled when dropped
    Ok(())
}

/// Modifier bits whose rising edge counts as a key press.
fn modifier_mask() -> u64 {
    (CGEventFlags::CGEventFlagAlphaShift
        | CGEventFlags::CGEventFlagShift
        | CGEventFlags::CGEventFlagControl
        | CGEventFlags::CGEventFlagAlternate
        | CGEventFlags::CGEventFlagCommand
        | CGEventFlags::CGEventFlagSecondaryFn)
        .bits()
}

/// Whether a FlagsChanged event set a modifier bit that was clear before.
fn is_modifier_press(previous: u64, current: u64) -> bool {
    current & !previous & modifier_mask() != 0
}

/// Map a CoreGraphics event type onto an action category.
///
/// `FlagsChanged` is handled by the tap callback, which needs the flags.
fn categorize(event_type: CGEventType) -> Option<ActionCategory> {
    use core_graphics::event::CGEventType::*;

    match event_type {
        KeyDown => Some(ActionCategory::Keyboard),
        LeftMouseDown | RightMouseDown | OtherMouseDown => Some(ActionCategory::MouseClick),
        MouseMoved | LeftMouseDragged | RightMouseDragged => Some(ActionCategory::PointerMove),
        _ => None,
    }
}

/// Check if the application has Input Monitoring permission.
///
/// macOS has no direct query; creating a passive tap fails without it.
pub fn check_permission() -> bool {
    let result = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        |_proxy, _type, _event| CallbackResult::Keep,
    );

    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_creation() {
        let collector = MacOSCollector::new(CollectorConfig::default());
        assert!(!collector.is_running());
    }

    #[test]
    fn test_event_types_follow_config() {
        let keyboard_only = CollectorConfig {
            capture_keyboard: true,
            capture_mouse: false,
        };
        assert_eq!(build_event_types(&keyboard_only).len(), 2);
        assert_eq!(build_event_types(&CollectorConfig::default()).len(), 8);
    }

    #[test]
    fn test_categorize() {
        assert_eq!(
            categorize(CGEventType::KeyDown),
            Some(ActionCategory::Keyboard)
        );
        assert_eq!(
            categorize(CGEventType::RightMouseDown),
            Some(ActionCategory::MouseClick)
        );
        assert_eq!(
            categorize(CGEventType::MouseMoved),
            Some(ActionCategory::PointerMove)
        );
        assert_eq!(categorize(CGEventType::KeyUp), None);
        assert_eq!(categorize(CGEventType::FlagsChanged), None);
    }

    #[test]
    fn test_modifier_tap_counts_once() {
        let shift = CGEventFlags::CGEventFlagShift.bits();
        let command = CGEventFlags::CGEventFlagCommand.bits();

        // Shift down, Shift up
        assert!(is_modifier_press(0, shift));
        assert!(!is_modifier_press(shift, 0));

        // Command pressed while Shift is held, then both released one by one
        assert!(is_modifier_press(shift, shift | command));
        assert!(!is_modifier_press(shift | command, command));
        assert!(!is_modifier_press(command, 0));
    }
}
