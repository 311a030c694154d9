use std::str::FromStr;

use catch_core::{Checkpoint, Difficulty, GameSession, PlayerProfile, SessionStatus, VipTier};
use rusqlite::{params, Connection, OptionalExtension};

use super::GameStore;

/// Persisted player record. Profile fields are written by progression
/// systems outside this service.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct UserRecord {
    pub(crate) user_id: String,
    pub(crate) profile: PlayerProfile,
    pub(crate) country: Option<String>,
    pub(crate) coins: i64,
    pub(crate) gems: i64,
    pub(crate) xp: i64,
    pub(crate) high_score: i64,
    pub(crate) games_played: i64,
    pub(crate) banned_until_ms: Option<i64>,
    pub(crate) security_flags: i64,
}

impl UserRecord {
    pub(crate) fn is_banned(&self, now_ms: i64) -> bool {
        self.banned_until_ms.is_some_and(|until| until > now_ms)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredSession {
    pub(crate) session: GameSession,
    pub(crate) last_activity_ms: i64,
    pub(crate) final_score: Option<i64>,
    pub(crate) end_reason: Option<String>,
}

struct RawUserRow {
    user_id: String,
    level: i64,
    vip_tier: i64,
    subscribed: bool,
    streak_days: i64,
    retention_days: i64,
    has_purchased: bool,
    ad_watch_rate: f64,
    difficulty: String,
    coins: i64,
    gems: i64,
    xp: i64,
    high_score: i64,
    games_played: i64,
    banned_until_ms: Option<i64>,
    country: Option<String>,
    security_flags: i64,
}

struct RawSessionRow {
    session_id: String,
    user_id: String,
    platform: String,
    status: String,
    started_at_ms: i64,
    last_activity_ms: i64,
    final_score: Option<i64>,
    end_reason: Option<String>,
}

impl GameStore {
    pub fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, String> {
        let row = {
            let conn = self.conn()?;
            conn.query_row(
                "SELECT user_id, level, vip_tier, subscribed, streak_days, retention_days,
                        has_purchased, ad_watch_rate, difficulty, coins, gems, xp,
                        high_score, games_played, banned_until_ms, country, security_flags
                 FROM users WHERE user_id = ?1",
                params![user_id],
                |row| {
                    Ok(RawUserRow {
                        user_id: row.get(0)?,
                        level: row.get(1)?,
                        vip_tier: row.get(2)?,
                        subscribed: row.get(3)?,
                        streak_days: row.get(4)?,
                        retention_days: row.get(5)?,
                        has_purchased: row.get(6)?,
                        ad_watch_rate: row.get(7)?,
                        difficulty: row.get(8)?,
                        coins: row.get(9)?,
                        gems: row.get(10)?,
                        xp: row.get(11)?,
                        high_score: row.get(12)?,
                        games_played: row.get(13)?,
                        banned_until_ms: row.get(14)?,
                        country: row.get(15)?,
                        security_flags: row.get(16)?,
                    })
                },
            )
            .optional()
            .map_err(|e| format!("get_user failed: {e}"))?
        };

        row.map(row_to_user).transpose()
    }

    /// Loads a session with its checkpoints in submission order.
    pub fn load_session(&self, session_id: &str) -> Result<Option<StoredSession>, String> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT session_id, user_id, platform, status, started_at_ms, last_activity_ms,
                        final_score, end_reason
                 FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| {
                    Ok(RawSessionRow {
                        session_id: row.get(0)?,
                        user_id: row.get(1)?,
                        platform: row.get(2)?,
                        status: row.get(3)?,
                        started_at_ms: row.get(4)?,
                        last_activity_ms: row.get(5)?,
                        final_score: row.get(6)?,
                        end_reason: row.get(7)?,
                    })
                },
            )
            .optional()
            .map_err(|e| format!("load_session failed: {e}"))?;
        let Some(row) = row else {
            return Ok(None);
        };

        let mut stmt = conn
            .prepare("SELECT payload FROM checkpoints WHERE session_id = ?1 ORDER BY seq ASC")
            .map_err(|e| format!("load_session checkpoints prepare: {e}"))?;
        let payloads = stmt
            .query_map(params![session_id], |row| row.get::<_, String>(0))
            .map_err(|e| format!("load_session checkpoints query: {e}"))?;
        let mut checkpoints = Vec::new();
        for payload in payloads {
            let payload = payload.map_err(|e| format!("load_session checkpoint row: {e}"))?;
            let checkpoint: Checkpoint = serde_json::from_str(&payload)
                .map_err(|e| format!("bad checkpoint payload in db for {session_id}: {e}"))?;
            checkpoints.push(checkpoint);
        }

        Ok(Some(StoredSession {
            session: GameSession {
                session_id: row.session_id,
                user_id: row.user_id,
                platform: row.platform,
                status: parse_status(&row.status)?,
                started_at_ms: row.started_at_ms,
                checkpoints,
            },
            last_activity_ms: row.last_activity_ms,
            final_score: row.final_score,
            end_reason: row.end_reason,
        }))
    }
}

fn row_to_user(r: RawUserRow) -> Result<UserRecord, String> {
    let difficulty = Difficulty::from_str(&r.difficulty)
        .map_err(|e| format!("bad difficulty in db: {e}"))?;
    let vip_tier = u8::try_from(r.vip_tier).map_err(|e| format!("bad vip_tier in db: {e}"))?;

    Ok(UserRecord {
        user_id: r.user_id,
        profile: PlayerProfile {
            level: r.level.clamp(1, i64::from(u32::MAX)) as u32,
            vip_tier: VipTier::new(vip_tier),
            subscribed: r.subscribed,
            streak_days: r.streak_days.max(0) as u32,
            retention_days: r.retention_days.max(0) as u32,
            has_purchased: r.has_purchased,
            ad_watch_rate: r.ad_watch_rate,
            difficulty,
            active_events: Vec::new(),
        },
        country: r.country,
        coins: r.coins,
        gems: r.gems,
        xp: r.xp,
        high_score: r.high_score,
        games_played: r.games_played,
        banned_until_ms: r.banned_until_ms,
        security_flags: r.security_flags,
    })
}

pub(super) fn parse_status(s: &str) -> Result<SessionStatus, String> {
    SessionStatus::from_str(s).map_err(|e| format!("bad session status in db: {e}"))
}

pub(super) fn session_status(
    conn: &Connection,
    session_id: &str,
) -> Result<Option<SessionStatus>, String> {
    let status: Option<String> = conn
        .query_row(
            "SELECT status FROM sessions WHERE session_id = ?1",
            params![session_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| format!("session status lookup failed: {e}"))?;
    status.as_deref().map(parse_status).transpose()
}
