//! The activity recorder: ingests actions and answers rate queries.
//!
//! One recorder is shared between the ingest worker (the only writer) and
//! the polling display loop. Every call takes the recorder's single lock
//! for its whole duration, so readers never observe a half-applied
//! `record`.

use crate::collector::types::ActionCategory;
use crate::config::Settings;
use crate::core::activity::ActivityBins;
use crate::core::classifier::{ClassifierState, EffectivenessClassifier};
use crate::core::history::{ActionHistory, DEFAULT_HISTORY_CAPACITY};
use crate::core::rates::{average_rate, current_rate, PeakTracker, RateReport};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Thresholds used by the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecorderConfig {
    /// Minimum gap between raw actions
    pub action_cooldown: Duration,
    /// Minimum gap between effective actions
    pub eapm_cooldown: Duration,
    /// Capacity of each history
    pub history_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            action_cooldown: Duration::milliseconds(50),
            eapm_cooldown: Duration::milliseconds(500),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl RecorderConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            action_cooldown: duration_from_secs(settings.action_cooldown),
            eapm_cooldown: duration_from_secs(settings.eapm_cooldown),
            history_capacity: settings.history_capacity,
        }
    }
}

/// Convert a (non-negative) number of seconds to a chrono duration.
pub fn duration_from_secs(secs: f64) -> Duration {
    Duration::microseconds((secs.max(0.0) * 1_000_000.0).round() as i64)
}

/// What a single `record` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// The action was appended to the raw history
    pub raw: bool,
    /// The action was appended to the effective history
    pub effective: bool,
}

/// Copy of both histories taken under one lock.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySnapshot {
    pub started_at: DateTime<Utc>,
    pub actions: Vec<DateTime<Utc>>,
    pub effective_actions: Vec<DateTime<Utc>>,
}

#[derive(Debug)]
struct RecorderState {
    config: RecorderConfig,
    started_at: DateTime<Utc>,
    actions: ActionHistory,
    effective_actions: ActionHistory,
    last_raw_action: Option<DateTime<Utc>>,
    classifier: EffectivenessClassifier,
    peaks: PeakTracker,
}

impl RecorderState {
    fn new(config: RecorderConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            config,
            started_at,
            actions: ActionHistory::new(config.history_capacity),
            effective_actions: ActionHistory::new(config.history_capacity),
            last_raw_action: None,
            classifier: EffectivenessClassifier::new(config.eapm_cooldown),
            peaks: PeakTracker::default(),
        }
    }

    fn record(&mut self, category: ActionCategory, timestamp: DateTime<Utc>) -> RecordOutcome {
        let mut outcome = RecordOutcome::default();

        if category.is_discrete() {
            let cooled_down = match self.last_raw_action {
                Some(last) => timestamp - last >= self.config.action_cooldown,
                None => true,
            };
            if cooled_down {
                self.actions.push(timestamp);
                self.last_raw_action = Some(timestamp);
                outcome.raw = true;
            }
        }

        if self.classifier.observe(category, timestamp) {
            self.effective_actions.push(timestamp);
            outcome.effective = true;
        }

        outcome
    }
}

/// Records actions into bounded histories and computes APM/eAPM.
#[derive(Debug)]
pub struct ActivityRecorder {
    state: Mutex<RecorderState>,
}

impl ActivityRecorder {
    /// Create a recorder whose session starts now.
    pub fn new(config: RecorderConfig) -> Self {
        Self::starting_at(config, Utc::now())
    }

    /// Create a recorder with an explicit session start.
    pub fn starting_at(config: RecorderConfig, started_at: DateTime<Utc>) -> Self {
        Self {
            state: Mutex::new(RecorderState::new(config, started_at)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        // The state stays consistent even if a holder panicked mid-call
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ingest one action.
    ///
    /// Keyboard and click actions count toward APM once the action cooldown
    /// has elapsed since the last counted one. Every category is offered to
    /// the effectiveness classifier for eAPM.
    pub fn record(&self, category: ActionCategory, timestamp: DateTime<Utc>) -> RecordOutcome {
        self.lock().record(category, timestamp)
    }

    /// Ingest one action named by text, such as `"keyboard"` or `"selection"`.
    ///
    /// An unknown name is dropped without touching any state.
    pub fn record_named(&self, category: &str, timestamp: DateTime<Utc>) -> Option<RecordOutcome> {
        match category.parse::<ActionCategory>() {
            Ok(category) => Some(self.record(category, timestamp)),
            Err(e) => {
                debug!("dropping action: {e}");
                None
            }
        }
    }

    /// Actions in the trailing minute.
    pub fn current_apm(&self, now: DateTime<Utc>) -> usize {
        current_rate(&self.lock().actions, now)
    }

    /// Effective actions in the trailing minute.
    pub fn current_eapm(&self, now: DateTime<Utc>) -> usize {
        current_rate(&self.lock().effective_actions, now)
    }

    /// Lifetime average APM since the session started.
    pub fn average_apm(&self, now: DateTime<Utc>) -> f64 {
        let state = self.lock();
        average_rate(&state.actions, now, state.started_at)
    }

    /// Lifetime average eAPM since the session started.
    pub fn average_eapm(&self, now: DateTime<Utc>) -> f64 {
        let state = self.lock();
        average_rate(&state.effective_actions, now, state.started_at)
    }

    /// Compute every rate at once and raise the peak counters.
    pub fn poll(&self, now: DateTime<Utc>) -> RateReport {
        let mut state = self.lock();

        let current_apm = current_rate(&state.actions, now);
        let current_eapm = current_rate(&state.effective_actions, now);
        state.peaks.observe(current_apm, current_eapm);

        RateReport {
            current_apm,
            current_eapm,
            average_apm: average_rate(&state.actions, now, state.started_at),
            average_eapm: average_rate(&state.effective_actions, now, state.started_at),
            peak_apm: state.peaks.apm,
            peak_eapm: state.peaks.eapm,
        }
    }

    /// Per-second bins of the last `range_secs` seconds.
    pub fn activity(&self, now: DateTime<Utc>, range_secs: usize) -> ActivityBins {
        let state = self.lock();
        ActivityBins::compute(
            state.actions.iter(),
            state.effective_actions.iter(),
            now,
            range_secs,
        )
    }

    /// Copy both histories.
    pub fn snapshot(&self) -> HistorySnapshot {
        let state = self.lock();
        HistorySnapshot {
            started_at: state.started_at,
            actions: state.actions.to_vec(),
            effective_actions: state.effective_actions.to_vec(),
        }
    }

    /// Apply new thresholds. A smaller capacity keeps the newest entries.
    pub fn reconfigure(&self, config: RecorderConfig) {
        let mut state = self.lock();
        state.actions.set_capacity(config.history_capacity);
        state.effective_actions.set_capacity(config.history_capacity);
        state.classifier.set_cooldown(config.eapm_cooldown);
        state.config = config;
    }

    /// Drop all recorded data and restart the session clock.
    pub fn reset(&self, now: DateTime<Utc>) {
        let mut state = self.lock();
        let config = state.config;
        *state = RecorderState::new(config, now);
    }

    pub fn config(&self) -> RecorderConfig {
        self.lock().config
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.lock().started_at
    }

    pub fn classifier_state(&self) -> ClassifierState {
        self.lock().classifier.state()
    }

    pub fn peaks(&self) -> PeakTracker {
        self.lock().peaks
    }

    /// Number of entries in the raw and effective histories.
    pub fn history_lens(&self) -> (usize, usize) {
        let state = self.lock();
        (state.actions.len(), state.effective_actions.len())
    }
}

impl Default for ActivityRecorder {
    fn default() -> Self {
        Self::new(RecorderConfig::default())
    }
}
