//! Server-side cheat detection.
//!
//! Each [`Detector`] inspects one round snapshot independently and returns a
//! [`ValidationResult`]. [`CheatDetector`] runs the standard seven and folds
//! the results into a [`CheatVerdict`] carrying the enforcement decision.

mod behavior;
mod timing;
mod values;

use serde::{Deserialize, Serialize};

use crate::checkpoint::{Checkpoint, ItemCollection};
use crate::constants::{AUTO_BAN_CONFIDENCE, AUTO_BAN_SECS, CHEAT_CONFIDENCE_THRESHOLD};
use crate::error::CheatFlag;

pub use behavior::{BotBehaviorDetector, MultipleDevicesDetector, PatternAnomalyDetector};
pub use timing::{ClockManipulationDetector, SpeedHackDetector};
pub use values::{ImpossibleScoreDetector, MemoryManipulationDetector};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    SpeedHack,
    MemoryManipulation,
    PatternAnomaly,
    ImpossibleScore,
    BotBehavior,
    MultipleDevices,
    ClockManipulation,
}

impl DetectorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SpeedHack => "speed_hack",
            Self::MemoryManipulation => "memory_manipulation",
            Self::PatternAnomaly => "pattern_anomaly",
            Self::ImpossibleScore => "impossible_score",
            Self::BotBehavior => "bot_behavior",
            Self::MultipleDevices => "multiple_devices",
            Self::ClockManipulation => "clock_manipulation",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub timestamp_ms: i64,
    pub x: f64,
    pub y: f64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceLogin {
    pub device_fingerprint: String,
    pub ip: String,
    pub seen_at_ms: i64,
}

/// Everything the detectors look at for one submitted checkpoint.
#[derive(Clone, Copy, Debug)]
pub struct DetectionInput<'a> {
    /// Server clock.
    pub now_ms: i64,
    pub session_started_ms: i64,
    pub checkpoint: &'a Checkpoint,
    /// Previously accepted checkpoints of the same session, oldest first.
    pub previous: &'a [Checkpoint],
    pub input_events: &'a [InputEvent],
    /// Final scores of the player's earlier completed sessions.
    pub completed_scores: &'a [i64],
    pub recent_logins: &'a [DeviceLogin],
}

impl<'a> DetectionInput<'a> {
    pub fn last_checkpoint(&self) -> Option<&'a Checkpoint> {
        self.previous.last()
    }

    /// Collections across the whole session, including this checkpoint.
    pub fn collections(&self) -> impl Iterator<Item = &'a ItemCollection> + 'a {
        self.previous
            .iter()
            .chain(core::iter::once(self.checkpoint))
            .flat_map(|checkpoint| checkpoint.item_collections.iter())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationResult {
    pub detector: DetectorKind,
    pub is_valid: bool,
    pub reason: Option<String>,
    pub confidence: f64,
    pub flags: Vec<CheatFlag>,
}

impl ValidationResult {
    pub fn clean(detector: DetectorKind) -> Self {
        Self {
            detector,
            is_valid: true,
            reason: None,
            confidence: 0.0,
            flags: Vec::new(),
        }
    }

    /// Marks the result invalid. Confidence is the maximum over all flags.
    pub fn flag(&mut self, flag: CheatFlag, confidence: f64, reason: impl Into<String>) {
        self.is_valid = false;
        self.confidence = self.confidence.max(confidence);
        self.flags.push(flag);
        let reason = reason.into();
        self.reason = Some(match self.reason.take() {
            Some(existing) => format!("{existing}; {reason}"),
            None => reason,
        });
    }
}

pub trait Detector: Send + Sync {
    fn kind(&self) -> DetectorKind;
    fn inspect(&self, input: &DetectionInput<'_>) -> ValidationResult;
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Enforcement {
    AutoBan { duration_secs: u64 },
    ManualReview,
}

impl Enforcement {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AutoBan { .. } => "auto_ban",
            Self::ManualReview => "manual_review",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CheatVerdict {
    pub cheating: bool,
    pub max_confidence: f64,
    pub enforcement: Option<Enforcement>,
    pub results: Vec<ValidationResult>,
}

impl CheatVerdict {
    pub fn from_results(results: Vec<ValidationResult>) -> Self {
        let max_confidence = results
            .iter()
            .filter(|result| !result.is_valid)
            .map(|result| result.confidence)
            .fold(0.0_f64, f64::max);
        let cheating = results
            .iter()
            .any(|result| !result.is_valid && result.confidence > CHEAT_CONFIDENCE_THRESHOLD);
        let enforcement = cheating.then(|| {
            if max_confidence > AUTO_BAN_CONFIDENCE {
                Enforcement::AutoBan {
                    duration_secs: AUTO_BAN_SECS,
                }
            } else {
                Enforcement::ManualReview
            }
        });
        Self {
            cheating,
            max_confidence,
            enforcement,
            results,
        }
    }

    /// Any detector failed, even below the cheating threshold.
    pub fn suspicious(&self) -> bool {
        self.results.iter().any(|result| !result.is_valid)
    }

    pub fn flags(&self) -> impl Iterator<Item = (DetectorKind, CheatFlag)> + '_ {
        self.results
            .iter()
            .flat_map(|result| result.flags.iter().map(move |flag| (result.detector, *flag)))
    }

    pub fn failed(&self) -> impl Iterator<Item = &ValidationResult> {
        self.results.iter().filter(|result| !result.is_valid)
    }
}

pub struct CheatDetector {
    detectors: Vec<Box<dyn Detector>>,
}

impl CheatDetector {
    pub fn standard() -> Self {
        Self::with_detectors(vec![
            Box::new(SpeedHackDetector),
            Box::new(MemoryManipulationDetector),
            Box::new(PatternAnomalyDetector),
            Box::new(ImpossibleScoreDetector),
            Box::new(BotBehaviorDetector),
            Box::new(MultipleDevicesDetector),
            Box::new(ClockManipulationDetector),
        ])
    }

    /// Detectors that still mean something for a final score. Cadence,
    /// reaction, input and client-clock checks have no data at session end.
    pub fn final_score() -> Self {
        Self::with_detectors(vec![
            Box::new(MemoryManipulationDetector),
            Box::new(PatternAnomalyDetector),
            Box::new(ImpossibleScoreDetector),
            Box::new(MultipleDevicesDetector),
        ])
    }

    pub fn with_detectors(detectors: Vec<Box<dyn Detector>>) -> Self {
        Self { detectors }
    }

    pub fn kinds(&self) -> Vec<DetectorKind> {
        self.detectors.iter().map(|detector| detector.kind()).collect()
    }

    pub fn run(&self, input: &DetectionInput<'_>) -> Vec<ValidationResult> {
        self.detectors
            .iter()
            .map(|detector| detector.inspect(input))
            .collect()
    }

    pub fn detect(&self, input: &DetectionInput<'_>) -> CheatVerdict {
        CheatVerdict::from_results(self.run(input))
    }
}

impl Default for CheatDetector {
    fn default() -> Self {
        Self::standard()
    }
}

pub fn detect_cheating(input: &DetectionInput<'_>) -> CheatVerdict {
    CheatDetector::standard().detect(input)
}

/// Population mean and standard deviation.
pub(crate) fn mean_and_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, variance.sqrt()))
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    fn failed(detector: DetectorKind, confidence: f64) -> ValidationResult {
        let mut result = ValidationResult::clean(detector);
        result.flag(CheatFlag::ClockDrift, confidence, "test");
        result
    }

    #[test]
    fn standard_runs_all_seven() {
        let kinds = CheatDetector::standard().kinds();
        assert_eq!(kinds.len(), 7);
        assert!(kinds.contains(&DetectorKind::ClockManipulation));
    }

    #[test]
    fn extreme_client_values_are_flagged_without_overflow() {
        let previous: Vec<Checkpoint> =
            (1..=4).map(|i| checkpoint(i * 10_000, i * 300)).collect();
        let mut current = checkpoint(50_000, 1_500);
        current.timestamp_ms = i64::MIN;
        current.level = i64::MIN;
        let events: Vec<InputEvent> = (0..12)
            .map(|i| InputEvent {
                timestamp_ms: if i % 2 == 0 { i64::MIN } else { i64::MAX },
                x: 3.0,
                y: 7.0,
            })
            .collect();
        let snapshot = DetectionInput {
            input_events: &events,
            now_ms: START + 50_000,
            ..input(&current, &previous)
        };

        let verdict = detect_cheating(&snapshot);
        assert!(verdict.cheating);
        assert!(verdict.flags().any(|(_, flag)| flag == CheatFlag::ClockDrift));

        current.timestamp_ms = i64::MAX;
        current.score = i64::MIN;
        let verdict = detect_cheating(&input(&current, &previous));
        assert!(verdict.flags().any(|(_, flag)| flag == CheatFlag::NegativeValue));
    }

    #[test]
    fn final_score_set_skips_cadence_checks() {
        let kinds = CheatDetector::final_score().kinds();
        assert_eq!(kinds.len(), 4);
        assert!(!kinds.contains(&DetectorKind::SpeedHack));
        assert!(!kinds.contains(&DetectorKind::ClockManipulation));

        // Ending right after the last checkpoint is not a time jump.
        let previous: Vec<Checkpoint> =
            (1..=4).map(|i| checkpoint(i * 30_000, i * 600)).collect();
        let current = checkpoint(121_000, 2_400);
        let verdict = CheatDetector::final_score().detect(&input(&current, &previous));
        assert!(!verdict.suspicious());
        assert!(detect_cheating(&input(&current, &previous)).suspicious());
    }

    #[test]
    fn clean_round_is_not_cheating() {
        let previous = vec![checkpoint(10_000, 400), checkpoint(20_000, 900)];
        let current = checkpoint(30_000, 1_500);
        let verdict = detect_cheating(&input(&current, &previous));
        assert!(!verdict.cheating);
        assert!(!verdict.suspicious());
        assert_eq!(verdict.enforcement, None);
    }

    #[test]
    fn high_confidence_bans() {
        let verdict = CheatVerdict::from_results(vec![
            ValidationResult::clean(DetectorKind::SpeedHack),
            failed(DetectorKind::MemoryManipulation, 0.95),
        ]);
        assert!(verdict.cheating);
        assert_eq!(
            verdict.enforcement,
            Some(Enforcement::AutoBan {
                duration_secs: 86_400
            })
        );
    }

    #[test]
    fn moderate_confidence_goes_to_review() {
        let verdict = CheatVerdict::from_results(vec![failed(DetectorKind::BotBehavior, 0.85)]);
        assert!(verdict.cheating);
        assert_eq!(verdict.enforcement, Some(Enforcement::ManualReview));
    }

    #[test]
    fn low_confidence_is_only_suspicious() {
        let verdict = CheatVerdict::from_results(vec![failed(DetectorKind::MultipleDevices, 0.7)]);
        assert!(!verdict.cheating);
        assert!(verdict.suspicious());
        assert_eq!(verdict.enforcement, None);
        assert_eq!(verdict.max_confidence, 0.7);
    }

    #[test]
    fn exactly_threshold_is_not_cheating() {
        let verdict = CheatVerdict::from_results(vec![failed(DetectorKind::ImpossibleScore, 0.8)]);
        assert!(!verdict.cheating);
    }

    #[test]
    fn flag_keeps_max_confidence_and_joins_reasons() {
        let mut result = ValidationResult::clean(DetectorKind::ClockManipulation);
        result.flag(CheatFlag::FutureTimestamp, 1.0, "future");
        result.flag(CheatFlag::ClockDrift, 0.9, "drift");
        assert_eq!(result.confidence, 1.0);
        assert_eq!(result.reason.as_deref(), Some("future; drift"));
        assert_eq!(result.flags.len(), 2);
    }

    #[test]
    fn mean_and_std_population() {
        let (mean, std) = mean_and_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(mean, 5.0);
        assert_eq!(std, 2.0);
        assert!(mean_and_std(&[]).is_none());
    }
}
