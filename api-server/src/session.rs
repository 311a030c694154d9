//! Request flows behind the gameplay endpoints.
//!
//! Handlers resolve the caller and the clock, then hand over to these
//! functions. Everything here is synchronous and talks to the store directly.

use std::str::FromStr;

use catch_core::constants::{DEVICE_WINDOW_MS, OBSTACLE_VIP_REDUCTION, SCORE_PER_LEVEL};
use catch_core::events::active_events;
use catch_core::pool::vip_legendary_multiplier;
use catch_core::{
    calculate_rewards, validate_final_score, Catalog, CheatVerdict, Checkpoint, DetectionInput,
    Enforcement, GameSession, LeaderboardScope, PlayerProfile, ScoreRejection, SessionStatus,
    SpawnPool, SpawnPoolBuilder, VipTier,
};
use chrono::{DateTime, Datelike, Utc};
use uuid::Uuid;

use crate::auth::Caller;
use crate::config::{AppState, SCORE_HISTORY_LIMIT};
use crate::leaderboard::{expires_at_ms, normalize_country, period_key};
use crate::response::ApiError;
use crate::store::{AppendOutcome, CompleteOutcome, SecurityEvent, StoredSession};
use crate::types::{
    EndSessionRequest, EndSessionResponse, LeaderboardQuery, LeaderboardResponse, SpawnConfig,
    SpawnRate, StartSessionRequest, StartSessionResponse, UpdateProgressRequest,
    UpdateProgressResponse,
};

const MAX_PLATFORM_LEN: usize = 32;

pub(crate) fn start_session(
    state: &AppState,
    caller: &Caller,
    request: StartSessionRequest,
    now: DateTime<Utc>,
) -> Result<StartSessionResponse, ApiError> {
    let now_ms = now.timestamp_millis();
    let platform = request.platform.trim();
    if platform.is_empty() || platform.len() > MAX_PLATFORM_LEN {
        return Err(ApiError::InvalidArgument(format!(
            "platform must be 1..={MAX_PLATFORM_LEN} characters"
        )));
    }
    let country = match request.country.as_deref() {
        Some(code) => Some(normalize_country(code).ok_or_else(|| {
            ApiError::InvalidArgument(format!("invalid country code: {code}"))
        })?),
        None => None,
    };

    let user = state
        .store
        .ensure_user(&caller.user_id, country.as_deref(), now_ms)
        .map_err(|e| ApiError::internal("ensure_user", e))?;
    if user.is_banned(now_ms) {
        tracing::warn!(user_id = %caller.user_id, "banned user tried to start a session");
        return Err(ApiError::PermissionDenied("account suspended".to_string()));
    }
    state
        .store
        .record_login(&caller.user_id, &caller.device_id, &caller.ip, now_ms)
        .map_err(|e| ApiError::internal("record_login", e))?;

    let mut profile = user.profile;
    profile.active_events = active_events(now.month(), now.day())
        .into_iter()
        .map(str::to_string)
        .collect();
    let pool = SpawnPoolBuilder::new(&state.catalog).build(&profile);
    let config = spawn_config(&state.catalog, &pool, &profile);

    let session_id = Uuid::new_v4();
    let session = GameSession::new(
        session_id.to_string(),
        caller.user_id.as_str(),
        platform,
        now_ms,
    );
    state
        .store
        .create_session(&session)
        .map_err(|e| ApiError::internal("create_session", e))?;

    tracing::info!(
        session_id = %session_id,
        user_id = %caller.user_id,
        platform,
        pool_items = pool.len(),
        active_events = ?profile.active_events,
        "session started"
    );

    Ok(StartSessionResponse {
        success: true,
        session_id,
        server_time: now_ms,
        config,
    })
}

/// Rate table the client spawns from, in item key order.
pub(crate) fn spawn_config(
    catalog: &Catalog,
    pool: &SpawnPool,
    profile: &PlayerProfile,
) -> SpawnConfig {
    let spawn_rates = pool
        .iter()
        .filter_map(|(item_type, weight)| {
            let item = catalog.get(item_type)?;
            Some(SpawnRate {
                item_type: item_type.to_string(),
                category: item.category,
                rarity: item.rarity,
                weight,
                probability: pool.probability(item_type),
            })
        })
        .collect();
    let obstacle_multiplier = if profile.vip_tier >= VipTier::BRONZE {
        OBSTACLE_VIP_REDUCTION
    } else {
        1.0
    };

    SpawnConfig {
        spawn_rates,
        active_events: profile.active_events.clone(),
        vip_tier: profile.vip_tier.level(),
        vip_tier_name: profile.vip_tier.name().to_string(),
        vip_legendary_multiplier: vip_legendary_multiplier(profile.vip_tier),
        obstacle_multiplier,
    }
}

/// Loads the session and checks the caller owns it.
fn owned_session(
    state: &AppState,
    caller: &Caller,
    session_id: &str,
) -> Result<StoredSession, ApiError> {
    let stored = state
        .store
        .load_session(session_id)
        .map_err(|e| ApiError::internal("load_session", e))?
        .ok_or_else(|| ApiError::NotFound(format!("session not found: {session_id}")))?;
    if stored.session.user_id != caller.user_id {
        tracing::warn!(
            session_id,
            user_id = %caller.user_id,
            owner = %stored.session.user_id,
            "caller does not own session"
        );
        return Err(ApiError::PermissionDenied(
            "session belongs to another user".to_string(),
        ));
    }
    Ok(stored)
}

fn require_active(session: &GameSession) -> Result<(), ApiError> {
    if session.status == SessionStatus::Active {
        return Ok(());
    }
    Err(ApiError::FailedPrecondition(format!(
        "session is {}",
        session.status.as_str()
    )))
}

pub(crate) fn update_progress(
    state: &AppState,
    caller: &Caller,
    session_id: &str,
    request: UpdateProgressRequest,
    now_ms: i64,
) -> Result<UpdateProgressResponse, ApiError> {
    let StoredSession { mut session, .. } = owned_session(state, caller, session_id)?;
    require_active(&session)?;

    let banned = state
        .store
        .get_user(&caller.user_id)
        .map_err(|e| ApiError::internal("get_user", e))?
        .is_some_and(|user| user.is_banned(now_ms));
    if banned {
        return Err(ApiError::PermissionDenied("account suspended".to_string()));
    }

    state
        .store
        .record_login(&caller.user_id, &caller.device_id, &caller.ip, now_ms)
        .map_err(|e| ApiError::internal("record_login", e))?;
    let recent_logins = state
        .store
        .recent_logins(&caller.user_id, now_ms - DEVICE_WINDOW_MS)
        .map_err(|e| ApiError::internal("recent_logins", e))?;
    let completed_scores = state
        .store
        .completed_scores(&caller.user_id, SCORE_HISTORY_LIMIT)
        .map_err(|e| ApiError::internal("completed_scores", e))?;

    let verdict = state.detector.detect(&DetectionInput {
        now_ms,
        session_started_ms: session.started_at_ms,
        checkpoint: &request.checkpoint,
        previous: &session.checkpoints,
        input_events: &request.input_events,
        completed_scores: &completed_scores,
        recent_logins: &recent_logins,
    });
    log_detector_failures(&session, &verdict);
    if verdict.cheating {
        enforce(state, &session, &verdict, now_ms)?;
        return Err(ApiError::InvalidArgument("checkpoint rejected".to_string()));
    }

    let expected_len = session.checkpoints.len();
    let accepted = match session.accept_checkpoint(request.checkpoint, now_ms) {
        Ok(accepted) => accepted.clone(),
        Err(err) => {
            tracing::warn!(
                session_id,
                user_id = %caller.user_id,
                checkpoints = expected_len,
                "checkpoint rejected: {err}"
            );
            return Err(ApiError::InvalidArgument("checkpoint rejected".to_string()));
        }
    };

    match state
        .store
        .append_checkpoint(session_id, expected_len, &accepted, now_ms)
        .map_err(|e| ApiError::internal("append_checkpoint", e))?
    {
        AppendOutcome::Appended => {}
        AppendOutcome::Missing => {
            return Err(ApiError::NotFound(format!("session not found: {session_id}")))
        }
        AppendOutcome::NotActive(status) => {
            return Err(ApiError::FailedPrecondition(format!(
                "session is {}",
                status.as_str()
            )))
        }
        AppendOutcome::Conflict { stored } => {
            tracing::warn!(
                session_id,
                expected = expected_len,
                stored,
                "concurrent checkpoint submission"
            );
            return Err(ApiError::FailedPrecondition(
                "another checkpoint was recorded first".to_string(),
            ));
        }
    }

    tracing::debug!(
        session_id,
        score = accepted.score,
        checkpoints = expected_len + 1,
        "checkpoint accepted"
    );
    Ok(UpdateProgressResponse {
        success: true,
        validated: true,
        server_time: now_ms,
    })
}

fn log_detector_failures(session: &GameSession, verdict: &CheatVerdict) {
    for result in verdict.failed() {
        tracing::warn!(
            session_id = %session.session_id,
            user_id = %session.user_id,
            detector = result.detector.as_str(),
            confidence = result.confidence,
            flags = ?result.flags,
            reason = result.reason.as_deref().unwrap_or(""),
            "detector flagged checkpoint"
        );
    }
}

/// Records the verdict for review and applies an automatic ban when called for.
fn enforce(
    state: &AppState,
    session: &GameSession,
    verdict: &CheatVerdict,
    now_ms: i64,
) -> Result<(), ApiError> {
    let Some(enforcement) = verdict.enforcement else {
        return Ok(());
    };
    let ban_until_ms = match enforcement {
        Enforcement::AutoBan { duration_secs } => {
            Some(now_ms.saturating_add((duration_secs as i64).saturating_mul(1000)))
        }
        Enforcement::ManualReview => None,
    };
    let flags: Vec<String> = verdict
        .flags()
        .map(|(detector, flag)| format!("{}:{flag}", detector.as_str()))
        .collect();

    tracing::error!(
        session_id = %session.session_id,
        user_id = %session.user_id,
        action = enforcement.as_str(),
        max_confidence = verdict.max_confidence,
        flags = ?flags,
        "cheating detected"
    );

    state
        .store
        .record_security_event(
            &SecurityEvent {
                user_id: session.user_id.clone(),
                session_id: Some(session.session_id.clone()),
                action: enforcement.as_str().to_string(),
                max_confidence: verdict.max_confidence,
                flags,
                created_at_ms: now_ms,
            },
            ban_until_ms,
        )
        .map_err(|e| ApiError::internal("record_security_event", e))
}

pub(crate) fn end_session(
    state: &AppState,
    caller: &Caller,
    session_id: &str,
    request: EndSessionRequest,
    now: DateTime<Utc>,
) -> Result<EndSessionResponse, ApiError> {
    let now_ms = now.timestamp_millis();
    let StoredSession { session, .. } = owned_session(state, caller, session_id)?;
    require_active(&session)?;

    let observed_secs = (now_ms.saturating_sub(session.started_at_ms).max(0) / 1000) as u64;
    let EndSessionRequest {
        final_score,
        mut stats,
    } = request;

    let recent_logins = state
        .store
        .recent_logins(&caller.user_id, now_ms - DEVICE_WINDOW_MS)
        .map_err(|e| ApiError::internal("recent_logins", e))?;
    let completed_scores = state
        .store
        .completed_scores(&caller.user_id, SCORE_HISTORY_LIMIT)
        .map_err(|e| ApiError::internal("completed_scores", e))?;
    let final_checkpoint = Checkpoint {
        timestamp_ms: now_ms,
        score: final_score,
        coins: session.coins(),
        gems: session.gems(),
        level: final_score.max(0) / SCORE_PER_LEVEL + 1,
        reaction_times_ms: Vec::new(),
        item_collections: Vec::new(),
        server_timestamp_ms: Some(now_ms),
    };
    let verdict = state.final_detector.detect(&DetectionInput {
        now_ms,
        session_started_ms: session.started_at_ms,
        checkpoint: &final_checkpoint,
        previous: &session.checkpoints,
        input_events: &[],
        completed_scores: &completed_scores,
        recent_logins: &recent_logins,
    });
    log_detector_failures(&session, &verdict);
    if verdict.cheating {
        enforce(state, &session, &verdict, now_ms)?;
        close_rejected(state, session_id, "cheating_detected", now_ms)?;
        return Err(ApiError::InvalidArgument("score rejected".to_string()));
    }

    let score = match validate_final_score(final_score, &stats, &session, observed_secs) {
        Ok(score) => score,
        Err(err @ ScoreRejection::SessionNotActive { .. }) => {
            return Err(ApiError::FailedPrecondition(err.to_string()))
        }
        Err(err) => {
            tracing::warn!(
                session_id,
                user_id = %caller.user_id,
                final_score,
                observed_secs,
                "final score rejected: {err}"
            );
            close_rejected(state, session_id, "score_rejected", now_ms)?;
            return Err(ApiError::InvalidArgument("score rejected".to_string()));
        }
    };

    stats.clamp_duration(observed_secs);
    let rewards = calculate_rewards(score, &stats);

    let new_high_score = match state
        .store
        .complete_session(session_id, score, &rewards, now_ms)
        .map_err(|e| ApiError::internal("complete_session", e))?
    {
        CompleteOutcome::Completed { new_high_score } => new_high_score,
        CompleteOutcome::Missing => {
            return Err(ApiError::NotFound(format!("session not found: {session_id}")))
        }
        CompleteOutcome::NotActive(status) => {
            tracing::warn!(session_id, "duplicate end-session request");
            return Err(ApiError::FailedPrecondition(format!(
                "session is {}",
                status.as_str()
            )));
        }
    };

    tracing::info!(
        session_id,
        user_id = %caller.user_id,
        score,
        coins = rewards.coins,
        gems = rewards.gems,
        xp = rewards.xp,
        new_high_score,
        "session completed"
    );

    let metadata = serde_json::json!({
        "session_id": session_id,
        "platform": session.platform,
        "max_combo": stats.max_combo,
        "duration_secs": stats.duration_secs,
    });
    publish_score(state, &caller.user_id, score, &metadata, now);

    Ok(EndSessionResponse {
        success: true,
        rewards,
        new_high_score,
        server_time: now_ms,
    })
}

/// A rejected end-session request seals the session without rewards.
fn close_rejected(
    state: &AppState,
    session_id: &str,
    reason: &str,
    now_ms: i64,
) -> Result<(), ApiError> {
    let closed = state
        .store
        .invalidate_session(session_id, reason, now_ms)
        .map_err(|e| ApiError::internal("invalidate_session", e))?;
    if closed {
        tracing::info!(session_id, reason, "session invalidated");
    }
    Ok(())
}

/// Pushes a committed score to every board. Failures are logged and dropped.
pub(crate) fn publish_score(
    state: &AppState,
    user_id: &str,
    score: u64,
    metadata: &serde_json::Value,
    now: DateTime<Utc>,
) {
    let now_ms = now.timestamp_millis();
    let country = match state.store.get_user(user_id) {
        Ok(user) => user.and_then(|user| user.country),
        Err(e) => {
            tracing::warn!(user_id, "leaderboard publish skipped country lookup: {e}");
            None
        }
    };

    for scope in LeaderboardScope::ALL {
        let Some(period) = period_key(scope, now, country.as_deref()) else {
            continue;
        };
        let result = state.store.submit_score(
            scope,
            &period,
            user_id,
            score,
            metadata,
            now_ms,
            expires_at_ms(scope, now_ms),
        );
        match result {
            Ok(true) => tracing::debug!(user_id, %scope, period, score, "leaderboard updated"),
            Ok(false) => {}
            Err(e) => tracing::warn!(user_id, %scope, period, "leaderboard publish failed: {e}"),
        }
    }
}

pub(crate) fn get_leaderboard(
    state: &AppState,
    caller: &Caller,
    scope: &str,
    query: &LeaderboardQuery,
    now: DateTime<Utc>,
) -> Result<LeaderboardResponse, ApiError> {
    let now_ms = now.timestamp_millis();
    let scope = LeaderboardScope::from_str(scope).map_err(ApiError::InvalidArgument)?;

    let country = match (scope, query.country.as_deref()) {
        (LeaderboardScope::Country, Some(code)) => Some(code.to_string()),
        (LeaderboardScope::Country, None) => state
            .store
            .get_user(&caller.user_id)
            .map_err(|e| ApiError::internal("get_user", e))?
            .and_then(|user| user.country),
        _ => None,
    };
    let period = period_key(scope, now, country.as_deref()).ok_or_else(|| {
        ApiError::InvalidArgument("country leaderboard needs a two-letter country code".to_string())
    })?;

    let offset = query.offset.unwrap_or(0);
    let limit = state.policy.page_limit(query.limit);
    let entries = state
        .store
        .leaderboard_page(scope, &period, offset, limit, now_ms)
        .map_err(|e| ApiError::internal("leaderboard_page", e))?;
    let user_rank = state
        .store
        .leaderboard_rank(scope, &period, &caller.user_id, now_ms)
        .map_err(|e| ApiError::internal("leaderboard_rank", e))?;
    let total_players = state
        .store
        .leaderboard_size(scope, &period, now_ms)
        .map_err(|e| ApiError::internal("leaderboard_size", e))?;

    Ok(LeaderboardResponse {
        success: true,
        scope: scope.as_str().to_string(),
        period,
        entries,
        user_rank,
        total_players,
    })
}
