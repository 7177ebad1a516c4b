//! Windows implementation of event collection using Windows Hooks.
//!
//! This module captures keyboard and mouse events at the system level using
//! the low-level hook API (SetWindowsHookEx). The hooks only run while the
//! installing thread pumps messages, so the collector owns a dedicated
//! thread and wakes it with `WM_QUIT` on shutdown.

use crate::collector::types::{ActionCategory, InputEvent};
use crate::collector::{CollectorConfig, CollectorError, EVENT_CHANNEL_CAPACITY};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};
use windows::Win32::Foundation::{HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, GetMessageW, PostThreadMessageW, SetWindowsHookExW, UnhookWindowsHookEx,
    HHOOK, MSG, WH_KEYBOARD_LL, WH_MOUSE_LL, WM_KEYDOWN, WM_LBUTTONDOWN, WM_MBUTTONDOWN,
    WM_MOUSEMOVE, WM_QUIT, WM_RBUTTONDOWN, WM_SYSKEYDOWN, WM_XBUTTONDOWN,
};

/// The Windows event collector using Windows Hooks.
pub struct WindowsCollector {
    config: CollectorConfig,
    sender: Sender<InputEvent>,
    receiver: Receiver<InputEvent>,
    running: Arc<AtomicBool>,
    /// Id of the hook thread, 0 while it is not pumping messages
    hook_thread_id: Arc<AtomicU32>,
    thread_handle: Option<JoinHandle<()>>,
}

impl WindowsCollector {
    /// Create a new Windows collector with the given configuration.
    pub fn new(config: CollectorConfig) -> Self {
        let (sender, receiver) = bounded(EVENT_CHANNEL_CAPACITY);

        Self {
            config,
            sender,
            receiver,
            running: Arc::new(AtomicBool::new(false)),
            hook_thread_id: Arc::new(AtomicU32::new(0)),
            thread_handle: None,
        }
    }

    /// Start capturing events in a background thread.
    ///
    /// Returns an error if the collector is already running.
    pub fn start(&mut self) -> Result<(), CollectorError> {
        if self.running.load(Ordering::SeqCst) {
            return Err(CollectorError::AlreadyRunning);
        }

        self.running.store(true, Ordering::SeqCst);

        let sender = self.sender.clone();
        let running = self.running.clone();
        let thread_id = self.hook_thread_id.clone();
        let config = self.config.clone();

        let handle = thread::spawn(move || {
            if let Err(e) = run_hook_loop(sender, running.clone(), thread_id.clone(), config) {
                error!("hook loop failed: {e}");
            }
            thread_id.store(0, Ordering::SeqCst);
            running.store(false, Ordering::SeqCst);
        });

        self.thread_handle = Some(handle);
        Ok(())
    }

    /// Stop capturing events.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);

        let thread_id = self.hook_thread_id.load(Ordering::SeqCst);
        if thread_id != 0 {
            // GetMessageW blocks until a message arrives
            let posted = unsafe { PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0)) };
            if let Err(e) = posted {
                warn!("could not wake hook thread: {e}");
            }
        }

        if let Some(handle) = self.thread_handle.take() {
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

impl Drop for WindowsCollector {
    fn drop(&mut self) {
        self.stop();
    }
}

// Hook procedures cannot capture state, so the sender lives in the hook
// thread's thread-local storage.
thread_local! {
    static EVENT_SENDER: RefCell<Option<Sender<InputEvent>>> = const { RefCell::new(None) };
}

fn send_event(category: ActionCategory) {
    EVENT_SENDER.with(|sender| {
        if let Some(ref s) = *sender.borrow() {
            let _ = s.try_send(InputEvent::new(category));
        }
    });
}

/// Map a keyboard hook message onto an action category.
fn categorize_keyboard(message: u32) -> Option<ActionCategory> {
    match message {
        WM_KEYDOWN | WM_SYSKEYDOWN => Some(ActionCategory::Keyboard),
        _ => None,
    }
}

/// Map a mouse hook message onto an action category.
fn categorize_mouse(message: u32) -> Option<ActionCategory> {
    match message {
        WM_LBUTTONDOWN | WM_RBUTTONDOWN | WM_MBUTTONDOWN | WM_XBUTTONDOWN => {
            Some(ActionCategory::MouseClick)
        }
        WM_MOUSEMOVE => Some(ActionCategory::PointerMove),
        _ => None,
    }
}

/// Low-level keyboard hook callback.
unsafe extern "system" fn keyboard_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        if let Some(category) = categorize_keyboard(w_param.0 as u32) {
            send_event(category);
        }
    }

    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

/// Low-level mouse hook callback.
unsafe extern "system" fn mouse_hook_proc(
    n_code: i32,
    w_param: WPARAM,
    l_param: LPARAM,
) -> LRESULT {
    if n_code >= 0 {
        if let Some(category) = categorize_mouse(w_param.0 as u32) {
            send_event(category);
        }
    }

    CallNextHookEx(HHOOK::default(), n_code, w_param, l_param)
}

fn unhook_all(hooks: Vec<HHOOK>) {
    for hook in hooks {
        let _ = unsafe { UnhookWindowsHookEx(hook) };
    }
}

/// Install the hooks and pump messages until `WM_QUIT`.
fn run_hook_loop(
    sender: Sender<InputEvent>,
    running: Arc<AtomicBool>,
    thread_id: Arc<AtomicU32>,
    config: CollectorConfig,
) -> Result<(), CollectorError> {
    EVENT_SENDER.with(|s| {
        *s.borrow_mut() = Some(sender);
    });

    let mut hooks: Vec<HHOOK> = Vec::new();

    if config.capture_keyboard {
        match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) } {
            Ok(hook) => hooks.push(hook),
            Err(e) => {
                debug!("keyboard hook rejected: {e}");
                unhook_all(hooks);
                return Err(CollectorError::HookInstallationFailed);
            }
        }
    }

    if config.capture_mouse {
        match unsafe { SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), None, 0) } {
            Ok(hook) => hooks.push(hook),
            Err(e) => {
                debug!("mouse hook rejected: {e}");
                unhook_all(hooks);
                return Err(CollectorError::HookInstallationFailed);
            }
        }
    }

    thread_id.store(unsafe { GetCurrentThreadId() }, Ordering::SeqCst);
    debug!(hooks = hooks.len(), "input hooks installed");

    let mut msg = MSG::default();
    while running.load(Ordering::SeqCst) {
        // 0 means WM_QUIT, -1 an error
        let result = unsafe { GetMessageW(&mut msg, HWND::default(), 0, 0) };
        if result.0 <= 0 {
            break;
        }
    }

    unhook_all(hooks);
    EVENT_SENDER.with(|s| {
        *s.borrow_mut() = None;
    });

    Ok(())
}

/// Check if the application can install a low-level hook.
///
/// Low-level hooks generally work without explicit permission, so this
/// installs a temporary hook and removes it again.
pub fn check_permission() -> bool {
    match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), None, 0) } {
        Ok(hook) => {
            let _ = unsafe { UnhookWindowsHookEx(hook) };
            true
        }
        Err(_) => false,
    }
}
