//! Core functionality for the APM tracker.
//!
//! This module contains:
//! - Bounded action histories
//! - The effectiveness classifier behind eAPM
//! - Rate computation and the shared activity recorder
//! - Per-second activity bins for charting

pub mod activity;
pub mod classifier;
pub mod history;
pub mod rates;
pub mod recorder;

// Re-export commonly used types
pub use activity::{ActivityBins, ActivitySummary, GRAPH_TIME_RANGE_OPTIONS};
pub use classifier::{ClassifierState, EffectivenessClassifier};
pub use history::{ActionHistory, DEFAULT_HISTORY_CAPACITY, MAX_HISTORY_CAPACITY};
pub use rates::{average_rate, current_rate, PeakTracker, RateReport, RATE_WINDOW_SECS};
pub use recorder::{ActivityRecorder, HistorySnapshot, RecordOutcome, RecorderConfig};
