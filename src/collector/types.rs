//! Input event types delivered by the collectors.
//!
//! Events carry only a category and a timestamp. Key codes and cursor
//! coordinates are never captured.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// The kind of input that produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionCategory {
    /// Any key press
    Keyboard,
    /// Any mouse button press
    MouseClick,
    /// Pointer movement (counted as a "selection" for eAPM)
    PointerMove,
}

impl ActionCategory {
    /// Whether this category counts toward raw APM.
    pub fn is_discrete(self) -> bool {
        matches!(self, ActionCategory::Keyboard | ActionCategory::MouseClick)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionCategory::Keyboard => "keyboard",
            ActionCategory::MouseClick => "mouse_click",
            ActionCategory::PointerMove => "pointer_move",
        }
    }
}

impl fmt::Display for ActionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when text does not name a known action category.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid action category: {0:?}")]
pub struct InvalidCategory(pub String);

impl FromStr for ActionCategory {
    type Err = InvalidCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyboard" => Ok(ActionCategory::Keyboard),
            "mouse_click" => Ok(ActionCategory::MouseClick),
            "pointer_move" | "selection" => Ok(ActionCategory::PointerMove),
            _ => Err(InvalidCategory(s.to_string())),
        }
    }
}

/// A single observed input action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub category: ActionCategory,
    pub timestamp: DateTime<Utc>,
}

impl InputEvent {
    /// Create an event stamped with the current time.
    pub fn new(category: ActionCategory) -> Self {
        Self::at(category, Utc::now())
    }

    /// Create an event with an explicit timestamp.
    pub fn at(category: ActionCategory, timestamp: DateTime<Utc>) -> Self {
        Self {
            category,
            timestamp,
        }
    }

    pub fn keyboard() -> Self {
        Self::new(ActionCategory::Keyboard)
    }

    pub fn mouse_click() -> Self {
        Self::new(ActionCategory::MouseClick)
    }

    pub fn pointer_move() -> Self {
        Self::new(ActionCategory::PointerMove)
    }
}
