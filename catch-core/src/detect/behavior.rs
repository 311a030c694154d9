use std::collections::HashSet;

use crate::constants::{
    BOT_GRID_PX, BOT_GRID_SHARE_LIMIT, BOT_MIN_INPUT_EVENTS, BOT_TIMING_CV_LIMIT,
    DEVICE_WINDOW_MS, MAX_DEVICES_PER_WINDOW, MAX_IPS_PER_WINDOW, PATTERN_BASE_CONFIDENCE,
    PATTERN_MAX_CONFIDENCE, PATTERN_MIN_GAMES, PATTERN_Z_SCORE_LIMIT, PERFECT_MIN_COLLECTIONS,
    PERFECT_SHARE_LIMIT,
};
use crate::error::CheatFlag;

use super::{mean_and_std, DetectionInput, Detector, DetectorKind, ValidationResult};

/// Compares the round against the player's own history.
pub struct PatternAnomalyDetector;

impl Detector for PatternAnomalyDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::PatternAnomaly
    }

    fn inspect(&self, input: &DetectionInput<'_>) -> ValidationResult {
        let mut result = ValidationResult::clean(self.kind());

        if input.completed_scores.len() >= PATTERN_MIN_GAMES {
            let history: Vec<f64> = input.completed_scores.iter().map(|&s| s as f64).collect();
            if let Some((mean, std)) = mean_and_std(&history) {
                // A flat history has no spread to measure against.
                if std > 0.0 {
                    let z = (input.checkpoint.score as f64 - mean) / std;
                    if z > PATTERN_Z_SCORE_LIMIT {
                        let confidence = (PATTERN_BASE_CONFIDENCE + (z - PATTERN_Z_SCORE_LIMIT))
                            .min(PATTERN_MAX_CONFIDENCE);
                        result.flag(
                            CheatFlag::ScoreOutlier,
                            confidence,
                            format!("score is {z:.1} standard deviations above history"),
                        );
                    }
                }
            }
        }

        let (total, perfect) = input
            .collections()
            .fold((0usize, 0usize), |(total, perfect), item| {
                (total + 1, perfect + usize::from(item.perfect))
            });
        if total >= PERFECT_MIN_COLLECTIONS {
            let share = perfect as f64 / total as f64;
            if share > PERFECT_SHARE_LIMIT {
                result.flag(
                    CheatFlag::PerfectCollectionRate,
                    0.85,
                    format!("{perfect} of {total} collections perfect"),
                );
            }
        }

        result
    }
}

/// Machine-like input: metronomic timing or positions snapped to a grid.
pub struct BotBehaviorDetector;

impl Detector for BotBehaviorDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::BotBehavior
    }

    fn inspect(&self, input: &DetectionInput<'_>) -> ValidationResult {
        let mut result = ValidationResult::clean(self.kind());
        let events = input.input_events;
        if events.len() < BOT_MIN_INPUT_EVENTS {
            return result;
        }

        let intervals: Vec<f64> = events
            .windows(2)
            .map(|pair| pair[1].timestamp_ms.saturating_sub(pair[0].timestamp_ms) as f64)
            .collect();
        if let Some((mean, std)) = mean_and_std(&intervals) {
            if mean > 0.0 {
                let cv = std / mean;
                if cv < BOT_TIMING_CV_LIMIT {
                    result.flag(
                        CheatFlag::UniformInputTiming,
                        0.85,
                        format!("input interval variation {cv:.3}"),
                    );
                }
            }
        }

        let on_grid = events
            .iter()
            .filter(|event| event.x % BOT_GRID_PX == 0.0 && event.y % BOT_GRID_PX == 0.0)
            .count();
        let share = on_grid as f64 / events.len() as f64;
        if share > BOT_GRID_SHARE_LIMIT {
            result.flag(
                CheatFlag::GridAlignedInput,
                0.75,
                format!("{on_grid} of {} inputs on the 10px grid", events.len()),
            );
        }

        result
    }
}

/// Many devices or networks on one account within an hour.
pub struct MultipleDevicesDetector;

impl Detector for MultipleDevicesDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::MultipleDevices
    }

    fn inspect(&self, input: &DetectionInput<'_>) -> ValidationResult {
        let mut result = ValidationResult::clean(self.kind());
        let window_start = input.now_ms - DEVICE_WINDOW_MS;

        let mut devices = HashSet::new();
        let mut ips = HashSet::new();
        for login in input
            .recent_logins
            .iter()
            .filter(|login| login.seen_at_ms >= window_start)
        {
            devices.insert(login.device_fingerprint.as_str());
            ips.insert(login.ip.as_str());
        }

        if devices.len() > MAX_DEVICES_PER_WINDOW {
            result.flag(
                CheatFlag::TooManyDevices,
                0.7,
                format!("{} devices in the last hour", devices.len()),
            );
        }
        if ips.len() > MAX_IPS_PER_WINDOW {
            result.flag(
                CheatFlag::TooManyIps,
                0.6,
                format!("{} IP addresses in the last hour", ips.len()),
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::super::{DeviceLogin, InputEvent};
    use super::*;
    use crate::checkpoint::ItemCollection;

    #[test]
    fn score_far_above_history() {
        let history = [1_000, 1_100, 900, 1_050, 950, 1_000, 1_020, 980, 1_000, 1_000];
        let current = checkpoint(600_000, 5_000);
        let mut snapshot = input(&current, &[]);
        snapshot.completed_scores = &history;
        let result = PatternAnomalyDetector.inspect(&snapshot);
        assert_eq!(result.flags, vec![CheatFlag::ScoreOutlier]);
        assert_eq!(result.confidence, 0.95);
    }

    #[test]
    fn short_history_is_ignored() {
        let history = [1_000, 1_100, 900];
        let current = checkpoint(600_000, 50_000);
        let mut snapshot = input(&current, &[]);
        snapshot.completed_scores = &history;
        assert!(PatternAnomalyDetector.inspect(&snapshot).is_valid);
    }

    #[test]
    fn near_perfect_collections() {
        let mut current = checkpoint(120_000, 6_000);
        current.item_collections = (0..60)
            .map(|i| ItemCollection {
                item_type: "coin".to_string(),
                perfect: i != 0,
                timestamp_ms: START + i * 1_000,
            })
            .collect();
        let result = PatternAnomalyDetector.inspect(&input(&current, &[]));
        assert_eq!(result.flags, vec![CheatFlag::PerfectCollectionRate]);

        current.item_collections.truncate(40);
        assert!(PatternAnomalyDetector.inspect(&input(&current, &[])).is_valid);
    }

    fn taps(interval: impl Fn(i64) -> i64, position: impl Fn(i64) -> (f64, f64)) -> Vec<InputEvent> {
        let mut at = START;
        (0..20)
            .map(|i| {
                at += interval(i);
                let (x, y) = position(i);
                InputEvent {
                    timestamp_ms: at,
                    x,
                    y,
                }
            })
            .collect()
    }

    #[test]
    fn metronomic_input() {
        let events = taps(|_| 250, |i| (13.0 + i as f64 * 7.3, 401.7));
        let current = checkpoint(10_000, 500);
        let mut snapshot = input(&current, &[]);
        snapshot.input_events = &events;
        let result = BotBehaviorDetector.inspect(&snapshot);
        assert_eq!(result.flags, vec![CheatFlag::UniformInputTiming]);
    }

    #[test]
    fn grid_snapped_input() {
        let events = taps(|i| 150 + (i * 97) % 400, |i| (i as f64 * 20.0, 300.0));
        let current = checkpoint(10_000, 500);
        let mut snapshot = input(&current, &[]);
        snapshot.input_events = &events;
        let result = BotBehaviorDetector.inspect(&snapshot);
        assert_eq!(result.flags, vec![CheatFlag::GridAlignedInput]);
        assert_eq!(result.confidence, 0.75);
    }

    #[test]
    fn human_input_passes() {
        let events = taps(|i| 150 + (i * 97) % 400, |i| (13.0 + i as f64 * 7.3, 401.7));
        let current = checkpoint(10_000, 500);
        let mut snapshot = input(&current, &[]);
        snapshot.input_events = &events;
        assert!(BotBehaviorDetector.inspect(&snapshot).is_valid);
    }

    #[test]
    fn devices_and_ips_in_window() {
        let current = checkpoint(0, 0);
        let logins: Vec<DeviceLogin> = (0..6)
            .map(|i| DeviceLogin {
                device_fingerprint: format!("device-{}", i % 4),
                ip: format!("10.0.0.{i}"),
                seen_at_ms: current.timestamp_ms - i * 60_000,
            })
            .collect();
        let mut snapshot = input(&current, &[]);
        snapshot.recent_logins = &logins;
        let result = MultipleDevicesDetector.inspect(&snapshot);
        assert_eq!(
            result.flags,
            vec![CheatFlag::TooManyDevices, CheatFlag::TooManyIps]
        );
        assert_eq!(result.confidence, 0.7);

        // Logins older than an hour are ignored.
        let stale: Vec<DeviceLogin> = logins
            .iter()
            .cloned()
            .map(|mut login| {
                login.seen_at_ms -= 2 * 60 * 60 * 1000;
                login
            })
            .collect();
        snapshot.recent_logins = &stale;
        assert!(MultipleDevicesDetector.inspect(&snapshot).is_valid);
    }
}
