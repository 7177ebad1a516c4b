//! Effectiveness classifier for eAPM.
//!
//! An action is "effective" when it looks like a distinct decision rather
//! than noise: it must come after a global cooldown and differ in category
//! from the previous effective action.

use crate::collector::types::ActionCategory;
use chrono::{DateTime, Duration, Utc};

/// Default minimum gap between effective actions.
pub const DEFAULT_EAPM_COOLDOWN_MS: i64 = 500;

/// Memory the classifier carries between events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifierState {
    /// Timestamp of the last accepted effective action
    pub last_effective: Option<DateTime<Utc>>,
    /// Category of the last accepted effective action
    pub last_category: Option<ActionCategory>,
}

/// Decides which actions count toward eAPM.
#[derive(Debug, Clone)]
pub struct EffectivenessClassifier {
    cooldown: Duration,
    state: ClassifierState,
}

impl EffectivenessClassifier {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            state: ClassifierState::default(),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn set_cooldown(&mut self, cooldown: Duration) {
        self.cooldown = cooldown;
    }

    pub fn state(&self) -> ClassifierState {
        self.state
    }

    pub fn reset(&mut self) {
        self.state = ClassifierState::default();
    }

    /// Evaluate an action without changing state.
    ///
    /// The rules are order-sensitive: the cooldown check runs first, then
    /// same-category suppression, then the per-category accept rules.
    pub fn is_effective(&self, category: ActionCategory, timestamp: DateTime<Utc>) -> bool {
        if let Some(last) = self.state.last_effective {
            if timestamp - last < self.cooldown {
                return false;
            }
        }

        if self.state.last_category == Some(category) {
            return false;
        }

        match category {
            ActionCategory::Keyboard | ActionCategory::MouseClick => true,
            ActionCategory::PointerMove => {
                self.state.last_category != Some(ActionCategory::PointerMove)
            }
        }
    }

    /// Evaluate an action and, if it is effective, remember it.
    pub fn observe(&mut self, category: ActionCategory, timestamp: DateTime<Utc>) -> bool {
        let effective = self.is_effective(category, timestamp);
        if effective {
            self.state.last_effective = Some(timestamp);
            self.state.last_category = Some(category);
        }
        effective
    }
}

impl Default for EffectivenessClassifier {
    fn default() -> Self {
        Self::new(Duration::milliseconds(DEFAULT_EAPM_COOLDOWN_MS))
    }
}
