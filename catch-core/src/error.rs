use core::fmt;

use serde::{Serialize, Serializer};

use crate::checkpoint::SessionStatus;

/// Machine-readable code attached to a failed detector check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CheatFlag {
    TimeAcceleration,
    SuperhumanReactions,
    ImpossibleCoinGain,
    NegativeValue,
    ValueOverflow,
    ScoreOutlier,
    PerfectCollectionRate,
    ScoreRateImpossible,
    ScorePerItemOutOfRange,
    LevelMismatch,
    UniformInputTiming,
    GridAlignedInput,
    TooManyDevices,
    TooManyIps,
    ClockDrift,
    FutureTimestamp,
}

impl fmt::Display for CheatFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimeAcceleration => write!(f, "TIME_ACCELERATION"),
            Self::SuperhumanReactions => write!(f, "SUPERHUMAN_REACTIONS"),
            Self::ImpossibleCoinGain => write!(f, "IMPOSSIBLE_COIN_GAIN"),
            Self::NegativeValue => write!(f, "NEGATIVE_VALUE"),
            Self::ValueOverflow => write!(f, "VALUE_OVERFLOW"),
            Self::ScoreOutlier => write!(f, "SCORE_OUTLIER"),
            Self::PerfectCollectionRate => write!(f, "PERFECT_COLLECTION_RATE"),
            Self::ScoreRateImpossible => write!(f, "SCORE_RATE_IMPOSSIBLE"),
            Self::ScorePerItemOutOfRange => write!(f, "SCORE_PER_ITEM_OUT_OF_RANGE"),
            Self::LevelMismatch => write!(f, "LEVEL_MISMATCH"),
            Self::UniformInputTiming => write!(f, "UNIFORM_INPUT_TIMING"),
            Self::GridAlignedInput => write!(f, "GRID_ALIGNED_INPUT"),
            Self::TooManyDevices => write!(f, "TOO_MANY_DEVICES"),
            Self::TooManyIps => write!(f, "TOO_MANY_IPS"),
            Self::ClockDrift => write!(f, "CLOCK_DRIFT"),
            Self::FutureTimestamp => write!(f, "FUTURE_TIMESTAMP"),
        }
    }
}

impl Serialize for CheatFlag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CheckpointError {
    SessionNotActive {
        status: SessionStatus,
    },
    TimestampSkew {
        drift_ms: i64,
    },
    ScoreDecreased {
        previous: i64,
        submitted: i64,
    },
    CurrencyDecreased {
        field: &'static str,
        previous: i64,
        submitted: i64,
    },
    ScoreRateExceeded {
        points_per_sec: f64,
    },
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotActive { status } => {
                write!(f, "session is not active (status: {})", status.as_str())
            }
            Self::TimestampSkew { drift_ms } => {
                write!(f, "checkpoint timestamp off by {drift_ms} ms")
            }
            Self::ScoreDecreased {
                previous,
                submitted,
            } => write!(
                f,
                "score decreased: previous={previous}, submitted={submitted}"
            ),
            Self::CurrencyDecreased {
                field,
                previous,
                submitted,
            } => write!(
                f,
                "{field} decreased: previous={previous}, submitted={submitted}"
            ),
            Self::ScoreRateExceeded { points_per_sec } => {
                if points_per_sec.is_finite() {
                    write!(f, "score rate too high: {points_per_sec:.1} points/sec")
                } else {
                    write!(f, "score increased with no elapsed time")
                }
            }
        }
    }
}

impl std::error::Error for CheckpointError {}

/// Reasons a final score is refused at session end.
#[derive(Clone, Debug, PartialEq)]
pub enum ScoreRejection {
    SessionNotActive { status: SessionStatus },
    NegativeScore { score: i64 },
    BelowLastCheckpoint { last_checkpoint: i64, submitted: i64 },
    ScoreRateExceeded { points_per_sec: f64 },
    ScorePerItemOutOfRange { ratio: f64 },
}

impl fmt::Display for ScoreRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotActive { status } => {
                write!(f, "session is not active (status: {})", status.as_str())
            }
            Self::NegativeScore { score } => write!(f, "negative final score: {score}"),
            Self::BelowLastCheckpoint {
                last_checkpoint,
                submitted,
            } => write!(
                f,
                "final score {submitted} is below last checkpoint score {last_checkpoint}"
            ),
            Self::ScoreRateExceeded { points_per_sec } => {
                if points_per_sec.is_finite() {
                    write!(f, "final score rate too high: {points_per_sec:.1} points/sec")
                } else {
                    write!(f, "final score reported for a zero-length session")
                }
            }
            Self::ScorePerItemOutOfRange { ratio } => {
                write!(f, "score per collected item out of range: {ratio:.1}")
            }
        }
    }
}

impl std::error::Error for ScoreRejection {}
