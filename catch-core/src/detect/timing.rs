use crate::constants::{
    MAX_CLIENT_FUTURE_MS, MAX_CLOCK_DRIFT_MS, SPEED_HACK_DELTA_RATIO,
    SPEED_HACK_MIN_HISTORY_DELTAS, SUPERHUMAN_REACTION_MS, SUPERHUMAN_REACTION_SHARE,
};
use crate::error::CheatFlag;

use super::{DetectionInput, Detector, DetectorKind, ValidationResult};

/// Checkpoints arriving much faster than the session's own cadence, or
/// reaction times no human produces.
pub struct SpeedHackDetector;

impl Detector for SpeedHackDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::SpeedHack
    }

    fn inspect(&self, input: &DetectionInput<'_>) -> ValidationResult {
        let mut result = ValidationResult::clean(self.kind());

        let deltas: Vec<i64> = input
            .previous
            .windows(2)
            .map(|pair| pair[1].timestamp_ms.saturating_sub(pair[0].timestamp_ms))
            .collect();
        if deltas.len() >= SPEED_HACK_MIN_HISTORY_DELTAS {
            if let Some(last) = input.last_checkpoint() {
                let average = deltas.iter().map(|&delta| delta as f64).sum::<f64>() / deltas.len() as f64;
                let current = input
                    .checkpoint
                    .timestamp_ms
                    .saturating_sub(last.timestamp_ms) as f64;
                if average > 0.0 && current < average * SPEED_HACK_DELTA_RATIO {
                    result.flag(
                        CheatFlag::TimeAcceleration,
                        0.9,
                        format!("checkpoint delta {current:.0} ms vs average {average:.0} ms"),
                    );
                }
            }
        }

        let reactions = &input.checkpoint.reaction_times_ms;
        if !reactions.is_empty() {
            let fast = reactions
                .iter()
                .filter(|&&ms| ms < SUPERHUMAN_REACTION_MS)
                .count();
            let share = fast as f64 / reactions.len() as f64;
            if share > SUPERHUMAN_REACTION_SHARE {
                result.flag(
                    CheatFlag::SuperhumanReactions,
                    0.85,
                    format!("{fast} of {} reactions under 100 ms", reactions.len()),
                );
            }
        }

        result
    }
}

pub struct ClockManipulationDetector;

impl Detector for ClockManipulationDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::ClockManipulation
    }

    fn inspect(&self, input: &DetectionInput<'_>) -> ValidationResult {
        let mut result = ValidationResult::clean(self.kind());
        let ahead_ms = input.checkpoint.timestamp_ms.saturating_sub(input.now_ms);

        if ahead_ms.saturating_abs() > MAX_CLOCK_DRIFT_MS {
            result.flag(
                CheatFlag::ClockDrift,
                0.9,
                format!("client clock drift {ahead_ms} ms"),
            );
        }
        if ahead_ms > MAX_CLIENT_FUTURE_MS {
            result.flag(
                CheatFlag::FutureTimestamp,
                1.0,
                format!("client timestamp {ahead_ms} ms in the future"),
            );
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    fn steady_history() -> Vec<crate::checkpoint::Checkpoint> {
        (1..=4).map(|i| checkpoint(i * 10_000, i * 500)).collect()
    }

    #[test]
    fn fast_checkpoint_is_time_acceleration() {
        let previous = steady_history();
        let current = checkpoint(43_000, 2_200);
        let result = SpeedHackDetector.inspect(&input(&current, &previous));
        assert!(!result.is_valid);
        assert_eq!(result.flags, vec![CheatFlag::TimeAcceleration]);
        assert_eq!(result.confidence, 0.9);
    }

    #[test]
    fn regular_cadence_passes() {
        let previous = steady_history();
        let current = checkpoint(50_000, 2_500);
        assert!(SpeedHackDetector.inspect(&input(&current, &previous)).is_valid);
    }

    #[test]
    fn short_history_skips_delta_check() {
        let previous: Vec<_> = steady_history().into_iter().take(3).collect();
        let current = checkpoint(30_500, 1_600);
        assert!(SpeedHackDetector.inspect(&input(&current, &previous)).is_valid);
    }

    #[test]
    fn superhuman_reactions() {
        let mut current = checkpoint(10_000, 500);
        current.reaction_times_ms = vec![40.0, 60.0, 80.0, 300.0];
        let result = SpeedHackDetector.inspect(&input(&current, &[]));
        assert_eq!(result.flags, vec![CheatFlag::SuperhumanReactions]);
        assert_eq!(result.confidence, 0.85);

        current.reaction_times_ms = vec![40.0, 60.0, 300.0, 320.0];
        assert!(SpeedHackDetector.inspect(&input(&current, &[])).is_valid);
    }

    #[test]
    fn future_timestamp_and_drift() {
        let current = checkpoint(0, 0);
        let mut snapshot = input(&current, &[]);

        snapshot.now_ms = current.timestamp_ms - 90_000;
        let result = ClockManipulationDetector.inspect(&snapshot);
        assert_eq!(result.flags, vec![CheatFlag::FutureTimestamp]);
        assert_eq!(result.confidence, 1.0);

        snapshot.now_ms = current.timestamp_ms + 400_000;
        let result = ClockManipulationDetector.inspect(&snapshot);
        assert_eq!(result.flags, vec![CheatFlag::ClockDrift]);
        assert_eq!(result.confidence, 0.9);

        snapshot.now_ms = current.timestamp_ms - 400_000;
        let result = ClockManipulationDetector.inspect(&snapshot);
        assert_eq!(
            result.flags,
            vec![CheatFlag::ClockDrift, CheatFlag::FutureTimestamp]
        );
    }
}
