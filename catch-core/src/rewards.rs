use serde::{Deserialize, Serialize};

use crate::checkpoint::{GameSession, SessionStatus};
use crate::constants::{
    COINS_PER_SCORE, GEMS_PER_SCORE, LONG_SESSION_SECS, MAX_SCORE_PER_ITEM, MAX_SCORE_PER_SECOND,
    MIN_SCORE_PER_ITEM, XP_PER_SCORE,
};
use crate::error::ScoreRejection;

/// Client-reported round summary sent with the final score.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionStats {
    pub max_combo: u32,
    pub duration_secs: u64,
    pub items_collected: u64,
    pub items_missed: u64,
    pub obstacles_hit: u64,
}

impl SessionStats {
    pub fn is_perfect(&self) -> bool {
        self.items_missed == 0 && self.obstacles_hit == 0
    }

    /// Caps the reported duration at what the server actually observed.
    pub fn clamp_duration(&mut self, observed_secs: u64) {
        self.duration_secs = self.duration_secs.min(observed_secs);
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rewards {
    pub coins: u64,
    pub gems: u64,
    pub xp: u64,
}

type Ratio = (u64, u64);

const ONE: Ratio = (1, 1);

fn combo_multipliers(max_combo: u32) -> (Ratio, Ratio) {
    match max_combo {
        50.. => ((2, 1), (3, 2)),
        20.. => ((3, 2), (6, 5)),
        10.. => ((6, 5), ONE),
        _ => (ONE, ONE),
    }
}

/// Multiplies in exact rational arithmetic and floors once at the end.
fn scale(base: u64, factors: &[Ratio]) -> u64 {
    let (numerator, denominator) = factors
        .iter()
        .fold((u128::from(base), 1u128), |(n, d), &(fn_, fd)| {
            (n * u128::from(fn_), d * u128::from(fd))
        });
    u64::try_from(numerator / denominator).unwrap_or(u64::MAX)
}

pub fn calculate_rewards(final_score: u64, stats: &SessionStats) -> Rewards {
    let (combo_coins, combo_gems) = combo_multipliers(stats.max_combo);
    let time = if stats.duration_secs > LONG_SESSION_SECS {
        (13, 10)
    } else {
        ONE
    };
    let perfect = if stats.is_perfect() { (2, 1) } else { ONE };

    Rewards {
        coins: scale(final_score / COINS_PER_SCORE, &[combo_coins, time, perfect]),
        gems: scale(final_score / GEMS_PER_SCORE, &[combo_gems, perfect]),
        xp: final_score / XP_PER_SCORE,
    }
}

/// Checks a final score against the session before rewards are committed.
/// `observed_secs` is the server-measured session length.
pub fn validate_final_score(
    final_score: i64,
    stats: &SessionStats,
    session: &GameSession,
    observed_secs: u64,
) -> Result<u64, ScoreRejection> {
    if session.status != SessionStatus::Active {
        return Err(ScoreRejection::SessionNotActive {
            status: session.status,
        });
    }
    let score = u64::try_from(final_score)
        .map_err(|_| ScoreRejection::NegativeScore { score: final_score })?;

    let last_checkpoint = session.score();
    if final_score < last_checkpoint {
        return Err(ScoreRejection::BelowLastCheckpoint {
            last_checkpoint,
            submitted: final_score,
        });
    }

    if score > 0 {
        let points_per_sec = if observed_secs > 0 {
            score as f64 / observed_secs as f64
        } else {
            f64::INFINITY
        };
        if points_per_sec > MAX_SCORE_PER_SECOND {
            return Err(ScoreRejection::ScoreRateExceeded { points_per_sec });
        }
    }

    if stats.items_collected > 0 {
        let ratio = score as f64 / stats.items_collected as f64;
        if !(MIN_SCORE_PER_ITEM..=MAX_SCORE_PER_ITEM).contains(&ratio) {
            return Err(ScoreRejection::ScorePerItemOutOfRange { ratio });
        }
    }

    Ok(score)
}
