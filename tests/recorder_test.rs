//! Integration tests for the activity recorder.

use apm_tracker::core::{
    average_rate, current_rate, ActionHistory, ActivityRecorder, EffectivenessClassifier,
    RecorderConfig,
};
use apm_tracker::ActionCategory;
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use std::thread;

fn at_ms(offset_ms: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap() + Duration::milliseconds(offset_ms)
}

fn recorder() -> ActivityRecorder {
    ActivityRecorder::starting_at(RecorderConfig::default(), at_ms(0))
}

#[test]
fn test_burst_inside_action_cooldown_counts_once() {
    // Every burst stays within 50ms of its first action
    for len in [2, 3, 5] {
        let recorder = recorder();
        for i in 0..len {
            let category = if i % 2 == 0 {
                ActionCategory::Keyboard
            } else {
                ActionCategory::MouseClick
            };
            recorder.record(category, at_ms(i * 10));
        }
        assert_eq!(recorder.history_lens().0, 1, "burst of {len}");
    }
}

#[test]
fn test_eapm_cooldown_ordering() {
    let mut classifier = EffectivenessClassifier::new(Duration::milliseconds(500));
    assert!(classifier.observe(ActionCategory::Keyboard, at_ms(0)));
    assert!(!classifier.observe(ActionCategory::MouseClick, at_ms(300)));

    let mut classifier = EffectivenessClassifier::new(Duration::milliseconds(500));
    assert!(classifier.observe(ActionCategory::Keyboard, at_ms(0)));
    assert!(classifier.observe(ActionCategory::MouseClick, at_ms(600)));
}

#[test]
fn test_repeated_category_needs_a_different_one_in_between() {
    let mut classifier = EffectivenessClassifier::default();
    assert!(classifier.observe(ActionCategory::Keyboard, at_ms(0)));
    assert!(!classifier.observe(ActionCategory::Keyboard, at_ms(600)));
    assert!(!classifier.observe(ActionCategory::Keyboard, at_ms(10_000)));

    assert!(classifier.observe(ActionCategory::MouseClick, at_ms(10_600)));
    assert!(classifier.observe(ActionCategory::Keyboard, at_ms(11_200)));
}

#[test]
fn test_consecutive_pointer_moves() {
    let recorder = recorder();
    assert!(recorder.record(ActionCategory::PointerMove, at_ms(0)).effective);
    assert!(!recorder.record(ActionCategory::PointerMove, at_ms(1_000)).effective);
    assert!(recorder.record(ActionCategory::MouseClick, at_ms(2_000)).effective);
    assert!(recorder.record(ActionCategory::PointerMove, at_ms(3_000)).effective);
}

#[test]
fn test_bounded_history_keeps_newest() {
    let capacity = 8;
    let k = 5;
    let mut history = ActionHistory::new(capacity);
    for i in 0..(capacity + k) as i64 {
        history.push(at_ms(i * 1_000));
    }

    let expected: Vec<_> = (k as i64..(capacity + k) as i64)
        .map(|i| at_ms(i * 1_000))
        .collect();
    assert_eq!(history.to_vec(), expected);

    let recorder = ActivityRecorder::starting_at(
        RecorderConfig {
            history_capacity: capacity,
            ..RecorderConfig::default()
        },
        at_ms(0),
    );
    for i in 0..(capacity + k) as i64 {
        let category = if i % 2 == 0 {
            ActionCategory::Keyboard
        } else {
            ActionCategory::MouseClick
        };
        recorder.record(category, at_ms(i * 1_000));
    }
    let snapshot = recorder.snapshot();
    assert_eq!(snapshot.actions, expected);
    assert_eq!(snapshot.effective_actions, expected);
}

#[test]
fn test_current_rate_uses_trailing_minute() {
    let now = at_ms(100_000);
    let mut history = ActionHistory::new(16);
    for secs in [65, 40, 10] {
        history.push(now - Duration::seconds(secs));
    }
    assert_eq!(current_rate(&history, now), 2);
}

#[test]
fn test_average_at_session_start_is_zero() {
    let recorder = recorder();
    recorder.record(ActionCategory::Keyboard, at_ms(0));
    assert_eq!(recorder.average_apm(at_ms(0)), 0.0);
    assert_eq!(recorder.average_eapm(at_ms(0)), 0.0);

    let history = ActionHistory::new(4);
    assert_eq!(average_rate(&history, at_ms(0), at_ms(0)), 0.0);
}

#[test]
fn test_keyboard_scenario() {
    let recorder = recorder();
    recorder.record(ActionCategory::Keyboard, at_ms(0));
    recorder.record(ActionCategory::Keyboard, at_ms(20));
    recorder.record(ActionCategory::Keyboard, at_ms(100));

    let snapshot = recorder.snapshot();
    assert_eq!(snapshot.actions, vec![at_ms(0), at_ms(100)]);
    assert_eq!(snapshot.effective_actions, vec![at_ms(0)]);
}

#[test]
fn test_concurrent_record_and_poll() {
    let recorder = Arc::new(recorder());
    let producer = {
        let recorder = recorder.clone();
        thread::spawn(move || {
            for i in 0..2_000 {
                let category = if i % 2 == 0 {
                    ActionCategory::Keyboard
                } else {
                    ActionCategory::MouseClick
                };
                recorder.record(category, at_ms(i * 100));
            }
        })
    };

    for _ in 0..200 {
        let report = recorder.poll(at_ms(200_000));
        // 60s of 100ms spacing is at most 600 raw actions
        assert!(report.current_apm <= 600);
        assert!(report.current_eapm <= report.current_apm.max(120));
        let snapshot = recorder.snapshot();
        assert!(snapshot.actions.windows(2).all(|w| w[0] <= w[1]));
    }

    producer.join().unwrap();
    let (raw, effective) = recorder.history_lens();
    assert_eq!(raw, 2_000);
    assert_eq!(effective, 2_000 / 5);
}
