use crate::constants::{
    MAX_COINS_PER_CHECKPOINT, MAX_LEVEL_DEVIATION, MAX_SCORE_PER_ITEM, MAX_SCORE_PER_SECOND,
    MIN_SCORE_PER_ITEM, SAFE_VALUE_CEILING, SCORE_PER_LEVEL,
};
use crate::error::CheatFlag;

use super::{DetectionInput, Detector, DetectorKind, ValidationResult};

/// Values a legitimate client cannot reach: negative or overflowing counters
/// and oversized single-step coin gains.
pub struct MemoryManipulationDetector;

impl Detector for MemoryManipulationDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::MemoryManipulation
    }

    fn inspect(&self, input: &DetectionInput<'_>) -> ValidationResult {
        let mut result = ValidationResult::clean(self.kind());
        let checkpoint = input.checkpoint;

        let previous_coins = input.last_checkpoint().map_or(0, |last| last.coins);
        let coin_gain = checkpoint.coins.saturating_sub(previous_coins);
        if coin_gain > MAX_COINS_PER_CHECKPOINT {
            result.flag(
                CheatFlag::ImpossibleCoinGain,
                0.95,
                format!("coins jumped by {coin_gain} in one checkpoint"),
            );
        }

        let values = [
            ("score", checkpoint.score),
            ("coins", checkpoint.coins),
            ("gems", checkpoint.gems),
        ];
        if let Some((field, value)) = values.iter().find(|(_, value)| *value < 0) {
            result.flag(CheatFlag::NegativeValue, 1.0, format!("negative {field}: {value}"));
        }
        if let Some((field, value)) = values.iter().find(|(_, value)| *value > SAFE_VALUE_CEILING) {
            result.flag(
                CheatFlag::ValueOverflow,
                1.0,
                format!("{field} beyond safe ceiling: {value}"),
            );
        }

        result
    }
}

/// Scores that do not fit the time played, the items caught or the level
/// reported.
pub struct ImpossibleScoreDetector;

impl Detector for ImpossibleScoreDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::ImpossibleScore
    }

    fn inspect(&self, input: &DetectionInput<'_>) -> ValidationResult {
        let mut result = ValidationResult::clean(self.kind());
        let score = input.checkpoint.score;

        let elapsed_secs = input
            .checkpoint
            .timestamp_ms
            .saturating_sub(input.session_started_ms)
            .max(0) as f64
            / 1000.0;
        let ceiling = elapsed_secs * MAX_SCORE_PER_SECOND;
        if score as f64 > ceiling {
            result.flag(
                CheatFlag::ScoreRateImpossible,
                1.0,
                format!("score {score} after {elapsed_secs:.1}s exceeds {ceiling:.0}"),
            );
        }

        let items = input.collections().count();
        if items > 0 {
            let ratio = score as f64 / items as f64;
            if !(MIN_SCORE_PER_ITEM..=MAX_SCORE_PER_ITEM).contains(&ratio) {
                result.flag(
                    CheatFlag::ScorePerItemOutOfRange,
                    0.9,
                    format!("{ratio:.1} points per item over {items} items"),
                );
            }
        }

        let expected_level = score.max(0) / SCORE_PER_LEVEL + 1;
        let deviation = input
            .checkpoint
            .level
            .saturating_sub(expected_level)
            .saturating_abs();
        if deviation > MAX_LEVEL_DEVIATION {
            result.flag(
                CheatFlag::LevelMismatch,
                0.8,
                format!(
                    "level {} but score implies {expected_level}",
                    input.checkpoint.level
                ),
            );
        }

        result
    }
}
