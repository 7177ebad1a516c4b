//! Target program filter.
//!
//! When a target program is configured, actions are only recorded while
//! that program owns the foreground window. Looking up the foreground
//! process can be slow, so the answer is cached for a short interval
//! instead of being queried for every keystroke.

use std::time::{Duration, Instant};
use sysinfo::{ProcessesToUpdate, System};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from foreground-window lookups.
#[derive(Debug, Error)]
pub enum TargetError {
    #[error("foreground window lookup is not supported on this platform")]
    Unsupported,
    #[error("no foreground window")]
    NoForegroundWindow,
    #[error("process {0} not found")]
    ProcessNotFound(u32),
}

/// Answers which process currently owns the foreground window.
pub trait ForegroundProbe: Send {
    fn foreground_process(&mut self) -> Result<String, TargetError>;
}

/// Probe for platforms without a foreground-window lookup.
#[derive(Debug, Default)]
pub struct UnsupportedProbe;

impl ForegroundProbe for UnsupportedProbe {
    fn foreground_process(&mut self) -> Result<String, TargetError> {
        Err(TargetError::Unsupported)
    }
}

#[cfg(target_os = "windows")]
pub use self::win::WindowsForegroundProbe;

#[cfg(target_os = "windows")]
mod win {
    use super::{ForegroundProbe, TargetError};
    use sysinfo::{Pid, ProcessesToUpdate, System};
    use windows::Win32::UI::WindowsAndMessaging::{GetForegroundWindow, GetWindowThreadProcessId};

    /// Looks up the foreground window's process through Win32 and sysinfo.
    pub struct WindowsForegroundProbe {
        system: System,
    }

    impl WindowsForegroundProbe {
        pub fn new() -> Self {
            Self {
                system: System::new(),
            }
        }
    }

    impl Default for WindowsForegroundProbe {
        fn default() -> Self {
            Self::new()
        }
    }

    impl ForegroundProbe for WindowsForegroundProbe {
        fn foreground_process(&mut self) -> Result<String, TargetError> {
            let hwnd = unsafe { GetForegroundWindow() };
            if hwnd.0.is_null() {
                return Err(TargetError::NoForegroundWindow);
            }

            let mut pid = 0u32;
            unsafe { GetWindowThreadProcessId(hwnd, Some(&mut pid)) };
            if pid == 0 {
                return Err(TargetError::NoForegroundWindow);
            }

            let pid = Pid::from_u32(pid);
            self.system
                .refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
            let process = self
                .system
                .process(pid)
                .ok_or(TargetError::ProcessNotFound(pid.as_u32()))?;

            Ok(process.name().to_string_lossy().into_owned())
        }
    }
}

/// The best foreground probe for this platform.
pub fn default_probe() -> Box<dyn ForegroundProbe> {
    #[cfg(target_os = "windows")]
    {
        Box::new(WindowsForegroundProbe::new())
    }
    #[cfg(not(target_os = "windows"))]
    {
        Box::new(UnsupportedProbe)
    }
}

/// Normalize a user-supplied program name for matching.
///
/// Window titles like `"game.exe — Details"` keep only the part before the
/// separator; the result is trimmed and lower-cased.
pub fn normalize_target(name: &str) -> String {
    let program = name.split(" — ").next().unwrap_or(name);
    program.trim().to_lowercase()
}

/// Names of all running programs, sorted and de-duplicated.
pub fn running_programs() -> Vec<String> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let mut names: Vec<String> = system
        .processes()
        .values()
        .map(|p| p.name().to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
        .collect();
    names.sort();
    names.dedup();
    debug!(count = names.len(), "listed running programs");
    names
}

/// Decides whether input should be recorded right now.
pub struct TargetFilter {
    target: Option<String>,
    probe: Box<dyn ForegroundProbe>,
    check_interval: Duration,
    last_check: Option<Instant>,
    last_state: bool,
    /// Set once the probe reports it cannot work on this platform
    unsupported: bool,
}

impl TargetFilter {
    pub fn new(
        target: Option<&str>,
        probe: Box<dyn ForegroundProbe>,
        check_interval: Duration,
    ) -> Self {
        let mut filter = Self {
            target: None,
            probe,
            check_interval,
            last_check: None,
            last_state: true,
            unsupported: false,
        };
        filter.set_target(target);
        filter
    }

    /// A filter that lets every action through.
    pub fn unfiltered() -> Self {
        Self::new(None, Box::new(UnsupportedProbe), Duration::from_secs(1))
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Change the target program; `None` or an empty name disables filtering.
    pub fn set_target(&mut self, target: Option<&str>) {
        self.target = target
            .map(normalize_target)
            .filter(|name| !name.is_empty());
        self.last_check = None;
        self.last_state = true;
    }

    /// Whether the target program (if any) is in the foreground.
    ///
    /// A lookup error skips input until the next check. A platform without
    /// foreground lookups disables the filter for the rest of the session.
    pub fn is_target_active(&mut self, now: Instant) -> bool {
        let Some(target) = &self.target else {
            return true;
        };
        if self.unsupported {
            return true;
        }

        if let Some(last) = self.last_check {
            if now.duration_since(last) < self.check_interval {
                return self.last_state;
            }
        }
        self.last_check = Some(now);

        self.last_state = match self.probe.foreground_process() {
            Ok(name) => name.to_lowercase().contains(target.as_str()),
            Err(TargetError::Unsupported) => {
                warn!(
                    program = %target,
                    "target program filter is not supported here; recording all input"
                );
                self.unsupported = true;
                true
            }
            Err(e) => {
                warn!("could not query foreground program: {e}");
                false
            }
        };
        self.last_state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct ScriptedProbe {
        answers: VecDeque<Result<String, TargetError>>,
        calls: Arc<AtomicUsize>,
    }

    impl ForegroundProbe for ScriptedProbe {
        fn foreground_process(&mut self) -> Result<String, TargetError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answers
                .pop_front()
                .unwrap_or(Err(TargetError::NoForegroundWindow))
        }
    }

    fn scripted(
        answers: Vec<Result<String, TargetError>>,
    ) -> (Box<dyn ForegroundProbe>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = ScriptedProbe {
            answers: answers.into(),
            calls: calls.clone(),
        };
        (Box::new(probe), calls)
    }

    #[test]
    fn test_normalize_target() {
        assert_eq!(normalize_target("  SC2.exe "), "sc2.exe");
        assert_eq!(normalize_target("Notepad — Untitled"), "notepad");
    }

    #[test]
    fn test_no_target_records_everything() {
        let (probe, calls) = scripted(vec![]);
        let mut filter = TargetFilter::new(Some("  "), probe, Duration::from_secs(1));
        assert_eq!(filter.target(), None);
        assert!(filter.is_target_active(Instant::now()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_substring_match_is_case_insensitive() {
        let (probe, _) = scripted(vec![Ok("SC2_x64.exe".to_string())]);
        let mut filter = TargetFilter::new(Some("sc2"), probe, Duration::from_secs(1));
        assert!(filter.is_target_active(Instant::now()));
    }

    #[test]
    fn test_lookup_is_cached() {
        let (probe, calls) = scripted(vec![
            Ok("game.exe".to_string()),
            Ok("browser.exe".to_string()),
        ]);
        let mut filter = TargetFilter::new(Some("game.exe"), probe, Duration::from_secs(1));

        let start = Instant::now();
        assert!(filter.is_target_active(start));
        assert!(filter.is_target_active(start + Duration::from_millis(500)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert!(!filter.is_target_active(start + Duration::from_millis(1_500)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_lookup_error_skips_until_next_check() {
        let (probe, _) = scripted(vec![
            Err(TargetError::ProcessNotFound(42)),
            Ok("game.exe".to_string()),
        ]);
        let mut filter = TargetFilter::new(Some("game.exe"), probe, Duration::from_secs(1));

        let start = Instant::now();
        assert!(!filter.is_target_active(start));
        assert!(filter.is_target_active(start + Duration::from_secs(2)));
    }

    #[test]
    fn test_unsupported_platform_disables_filter() {
        let (probe, calls) = scripted(vec![Err(TargetError::Unsupported)]);
        let mut filter = TargetFilter::new(Some("game.exe"), probe, Duration::from_secs(1));

        let start = Instant::now();
        assert!(filter.is_target_active(start));
        assert!(filter.is_target_active(start + Duration::from_secs(5)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_changing_target_invalidates_cache() {
        let (probe, calls) = scripted(vec![Ok("a.exe".to_string()), Ok("a.exe".to_string())]);
        let mut filter = TargetFilter::new(Some("a.exe"), probe, Duration::from_secs(60));

        let now = Instant::now();
        assert!(filter.is_target_active(now));
        filter.set_target(Some("b.exe"));
        assert!(!filter.is_target_active(now));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
