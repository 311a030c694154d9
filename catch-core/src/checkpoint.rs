use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{CHECKPOINT_MAX_CLOCK_SKEW_MS, CHECKPOINT_MAX_SCORE_PER_SEC};
use crate::error::CheckpointError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Invalidated,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Invalidated => "invalidated",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(Self::Active),
            "completed" => Ok(Self::Completed),
            "invalidated" => Ok(Self::Invalidated),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemCollection {
    pub item_type: String,
    #[serde(default)]
    pub perfect: bool,
    #[serde(default)]
    pub timestamp_ms: i64,
}

/// Client snapshot of an in-progress round. Values are signed so tampered
/// negative payloads can be recognised instead of failing to parse.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub timestamp_ms: i64,
    pub score: i64,
    pub coins: i64,
    pub gems: i64,
    pub level: i64,
    #[serde(default)]
    pub reaction_times_ms: Vec<f64>,
    /// Collections since the previous checkpoint.
    #[serde(default)]
    pub item_collections: Vec<ItemCollection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timestamp_ms: Option<i64>,
}

/// Server-side record of one round.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    pub session_id: String,
    pub user_id: String,
    pub platform: String,
    pub status: SessionStatus,
    pub started_at_ms: i64,
    pub checkpoints: Vec<Checkpoint>,
}

impl GameSession {
    pub fn new(
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        platform: impl Into<String>,
        started_at_ms: i64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user_id.into(),
            platform: platform.into(),
            status: SessionStatus::Active,
            started_at_ms,
            checkpoints: Vec::new(),
        }
    }

    pub fn last_checkpoint(&self) -> Option<&Checkpoint> {
        self.checkpoints.last()
    }

    pub fn score(&self) -> i64 {
        self.last_checkpoint().map_or(0, |last| last.score)
    }

    pub fn coins(&self) -> i64 {
        self.last_checkpoint().map_or(0, |last| last.coins)
    }

    pub fn gems(&self) -> i64 {
        self.last_checkpoint().map_or(0, |last| last.gems)
    }

    /// Client timestamp of the last accepted checkpoint, or the session start.
    pub fn last_timestamp_ms(&self) -> i64 {
        self.last_checkpoint()
            .map_or(self.started_at_ms, |last| last.timestamp_ms)
    }

    /// Validates, stamps with the server time and appends.
    pub fn accept_checkpoint(
        &mut self,
        mut checkpoint: Checkpoint,
        now_ms: i64,
    ) -> Result<&Checkpoint, CheckpointError> {
        validate_checkpoint(&checkpoint, self, now_ms)?;
        checkpoint.server_timestamp_ms = Some(now_ms);
        self.checkpoints.push(checkpoint);
        Ok(&self.checkpoints[self.checkpoints.len() - 1])
    }
}

pub fn validate_checkpoint(
    checkpoint: &Checkpoint,
    session: &GameSession,
    now_ms: i64,
) -> Result<(), CheckpointError> {
    if session.status != SessionStatus::Active {
        return Err(CheckpointError::SessionNotActive {
            status: session.status,
        });
    }

    let drift_ms = now_ms.saturating_sub(checkpoint.timestamp_ms);
    if drift_ms.saturating_abs() > CHECKPOINT_MAX_CLOCK_SKEW_MS {
        return Err(CheckpointError::TimestampSkew { drift_ms });
    }

    let previous_score = session.score();
    if checkpoint.score < previous_score {
        return Err(CheckpointError::ScoreDecreased {
            previous: previous_score,
            submitted: checkpoint.score,
        });
    }
    for (field, previous, submitted) in [
        ("coins", session.coins(), checkpoint.coins),
        ("gems", session.gems(), checkpoint.gems),
    ] {
        if submitted < previous {
            return Err(CheckpointError::CurrencyDecreased {
                field,
                previous,
                submitted,
            });
        }
    }

    let gained = checkpoint.score.saturating_sub(previous_score);
    if gained > 0 {
        let elapsed_ms = checkpoint
            .timestamp_ms
            .saturating_sub(session.last_timestamp_ms());
        let points_per_sec = if elapsed_ms > 0 {
            gained as f64 * 1000.0 / elapsed_ms as f64
        } else {
            f64::INFINITY
        };
        if points_per_sec > CHECKPOINT_MAX_SCORE_PER_SEC {
            return Err(CheckpointError::ScoreRateExceeded { points_per_sec });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: i64 = 1_700_000_000_000;

    fn checkpoint(offset_ms: i64, score: i64) -> Checkpoint {
        Checkpoint {
            timestamp_ms: START + offset_ms,
            score,
            coins: score / 10,
            gems: 0,
            level: score / 1000 + 1,
            reaction_times_ms: Vec::new(),
            item_collections: Vec::new(),
            server_timestamp_ms: None,
        }
    }

    fn session() -> GameSession {
        GameSession::new("s-1", "u-1", "ios", START)
    }

    #[test]
    fn accepts_and_stamps_server_time() {
        let mut session = session();
        let accepted = session
            .accept_checkpoint(checkpoint(10_000, 500), START + 10_500)
            .unwrap();
        assert_eq!(accepted.server_timestamp_ms, Some(START + 10_500));
        assert_eq!(session.score(), 500);
        assert_eq!(session.checkpoints.len(), 1);
    }

    #[test]
    fn rejects_stale_or_future_timestamps() {
        let session = session();
        let err = validate_checkpoint(&checkpoint(0, 0), &session, START + 61_000).unwrap_err();
        assert_eq!(err, CheckpointError::TimestampSkew { drift_ms: 61_000 });
        let err = validate_checkpoint(&checkpoint(70_000, 0), &session, START).unwrap_err();
        assert!(matches!(err, CheckpointError::TimestampSkew { drift_ms: -70_000 }));
        assert!(validate_checkpoint(&checkpoint(0, 0), &session, START + 60_000).is_ok());
    }

    #[test]
    fn extreme_timestamps_are_skew_not_overflow() {
        let session = session();
        let mut early = checkpoint(0, 0);
        early.timestamp_ms = i64::MIN;
        assert!(matches!(
            validate_checkpoint(&early, &session, START),
            Err(CheckpointError::TimestampSkew { .. })
        ));

        let mut late = checkpoint(0, 0);
        late.timestamp_ms = i64::MAX;
        assert!(matches!(
            validate_checkpoint(&late, &session, START),
            Err(CheckpointError::TimestampSkew { .. })
        ));
    }

    #[test]
    fn rejects_score_decrease() {
        let mut session = session();
        session
            .accept_checkpoint(checkpoint(10_000, 800), START + 10_000)
            .unwrap();
        let err = session
            .accept_checkpoint(checkpoint(20_000, 600), START + 20_000)
            .unwrap_err();
        assert_eq!(
            err,
            CheckpointError::ScoreDecreased {
                previous: 800,
                submitted: 600
            }
        );
        assert_eq!(session.checkpoints.len(), 1);
    }

    #[test]
    fn rejects_coin_decrease() {
        let mut session = session();
        session
            .accept_checkpoint(checkpoint(10_000, 800), START + 10_000)
            .unwrap();
        let mut next = checkpoint(20_000, 900);
        next.coins = 10;
        let err = session.accept_checkpoint(next, START + 20_000).unwrap_err();
        assert!(matches!(
            err,
            CheckpointError::CurrencyDecreased { field: "coins", .. }
        ));
    }

    #[test]
    fn score_rate_ceiling() {
        let mut session = session();
        // 10_000 points in 10 s is exactly 1000/s.
        assert!(session
            .accept_checkpoint(checkpoint(10_000, 10_000), START + 10_000)
            .is_ok());
        let err = session
            .accept_checkpoint(checkpoint(20_000, 20_001), START + 20_000)
            .unwrap_err();
        assert!(matches!(err, CheckpointError::ScoreRateExceeded { .. }));
    }

    #[test]
    fn score_gain_without_elapsed_time_is_rejected() {
        let mut session = session();
        session
            .accept_checkpoint(checkpoint(5_000, 100), START + 5_000)
            .unwrap();
        let err = session
            .accept_checkpoint(checkpoint(5_000, 200), START + 5_000)
            .unwrap_err();
        assert_eq!(err.to_string(), "score increased with no elapsed time");
        // An unchanged score at the same instant is fine.
        assert!(session
            .accept_checkpoint(checkpoint(5_000, 100), START + 5_000)
            .is_ok());
    }

    #[test]
    fn closed_sessions_reject_checkpoints() {
        let mut session = session();
        session.status = SessionStatus::Completed;
        let err = validate_checkpoint(&checkpoint(0, 0), &session, START).unwrap_err();
        assert!(matches!(err, CheckpointError::SessionNotActive { .. }));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            SessionStatus::Active,
            SessionStatus::Completed,
            SessionStatus::Invalidated,
        ] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
    }
}
