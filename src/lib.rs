//! APM Tracker - actions-per-minute and effective-APM measurement.
//!
//! This library turns a stream of keyboard, click and pointer events into
//! two rates: raw APM (every counted keypress or click) and eAPM, which only
//! counts actions that change what the player is doing.
//!
//! # What is recorded
//!
//! - **Only timing and category**: which key or where the pointer went is never seen
//! - **In memory only**: histories are bounded and discarded on exit
//! - **Export on request**: a session is written to disk only when asked for
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         APM Tracker                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Collector  │──▶│   Session   │──▶│  Recorder   │       │
//! │  │ (OS hooks)  │   │  (+ target) │   │ (+ eAPM)    │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                             │              │
//! │                          ┌──────────────────┼──────┐       │
//! │                          ▼                  ▼      ▼       │
//! │                   ┌─────────────┐   ┌──────────┐ ┌──────┐ │
//! │                   │    Rates    │   │ Activity │ │Export│ │
//! │                   │ (60s / avg) │   │  (bins)  │ │      │ │
//! │                   └─────────────┘   └──────────┘ └──────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use apm_tracker::{ActionCategory, ActivityRecorder};
//! use chrono::Utc;
//!
//! let recorder = ActivityRecorder::default();
//! recorder.record(ActionCategory::Keyboard, Utc::now());
//!
//! let report = recorder.poll(Utc::now());
//! println!("APM: {} | eAPM: {}", report.current_apm, report.current_eapm);
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod export;
pub mod logging;
pub mod render;
pub mod session;
pub mod target;

// Re-export key types at crate root for convenience
pub use collector::types::{ActionCategory, InputEvent, InvalidCategory};
pub use collector::{Collector, CollectorConfig, CollectorError};
pub use config::{ConfigError, Settings, SourceConfig};
pub use core::{
    ActivityBins, ActivityRecorder, ActivitySummary, ClassifierState, EffectivenessClassifier,
    HistorySnapshot, RateReport, RecordOutcome, RecorderConfig,
};
pub use export::{ExportError, ExportFormat, SessionExport};
pub use session::{IngestSnapshot, Session};
pub use target::{ForegroundProbe, TargetError, TargetFilter};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
