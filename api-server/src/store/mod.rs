mod db;
mod ranking;
mod security;

use std::{
    fs,
    path::Path,
    sync::{Mutex, MutexGuard},
};

use catch_core::{Checkpoint, GameSession, Rewards, SessionStatus};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

pub(crate) use db::{StoredSession, UserRecord};
pub(crate) use security::SecurityEvent;

/// Outcome of appending a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AppendOutcome {
    Appended,
    Missing,
    NotActive(SessionStatus),
    /// Another checkpoint landed since the caller loaded the session.
    Conflict { stored: usize },
}

/// Outcome of sealing a session with its final score.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CompleteOutcome {
    Completed { new_high_score: bool },
    Missing,
    NotActive(SessionStatus),
}

/// SQLite-backed persistent game store.
///
/// One connection behind a mutex. Multi-row updates (checkpoint append,
/// reward commit) run in `IMMEDIATE` transactions so duplicate submissions
/// serialize on the write lock and see each other's effects.
pub struct GameStore {
    conn: Mutex<Connection>,
}

impl GameStore {
    /// Open (or create) `catch.db` under `data_dir`.
    pub fn open(data_dir: &Path) -> Result<Self, String> {
        fs::create_dir_all(data_dir)
            .map_err(|e| format!("failed to create data dir {}: {e}", data_dir.display()))?;

        let db_path = data_dir.join("catch.db");
        let conn = Connection::open(&db_path)
            .map_err(|e| format!("failed to open SQLite at {}: {e}", db_path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;
             PRAGMA synchronous=NORMAL;",
        )
        .map_err(|e| format!("failed to set pragmas: {e}"))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                user_id          TEXT PRIMARY KEY,
                created_at_ms    INTEGER NOT NULL,
                level            INTEGER NOT NULL DEFAULT 1,
                vip_tier         INTEGER NOT NULL DEFAULT 0,
                subscribed       INTEGER NOT NULL DEFAULT 0,
                streak_days      INTEGER NOT NULL DEFAULT 0,
                retention_days   INTEGER NOT NULL DEFAULT 0,
                has_purchased    INTEGER NOT NULL DEFAULT 0,
                ad_watch_rate    REAL NOT NULL DEFAULT 0,
                difficulty       TEXT NOT NULL DEFAULT 'normal',
                coins            INTEGER NOT NULL DEFAULT 0,
                gems             INTEGER NOT NULL DEFAULT 0,
                xp               INTEGER NOT NULL DEFAULT 0,
                high_score       INTEGER NOT NULL DEFAULT 0,
                games_played     INTEGER NOT NULL DEFAULT 0,
                banned_until_ms  INTEGER,
                country          TEXT,
                security_flags   INTEGER NOT NULL DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS sessions (
                session_id       TEXT PRIMARY KEY,
                user_id          TEXT NOT NULL,
                platform         TEXT NOT NULL,
                status           TEXT NOT NULL,
                started_at_ms    INTEGER NOT NULL,
                last_activity_ms INTEGER NOT NULL,
                ended_at_ms      INTEGER,
                final_score      INTEGER,
                end_reason       TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_sessions_status_activity
                ON sessions(status, last_activity_ms);
             CREATE TABLE IF NOT EXISTS checkpoints (
                session_id       TEXT NOT NULL,
                seq              INTEGER NOT NULL,
                score            INTEGER NOT NULL,
                client_ts_ms     INTEGER NOT NULL,
                server_ts_ms     INTEGER NOT NULL,
                payload          TEXT NOT NULL,
                PRIMARY KEY (session_id, seq)
             );
             CREATE TABLE IF NOT EXISTS game_scores (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id          TEXT NOT NULL,
                session_id       TEXT NOT NULL UNIQUE,
                score            INTEGER NOT NULL,
                completed_at_ms  INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_game_scores_user
                ON game_scores(user_id, completed_at_ms);
             CREATE TABLE IF NOT EXISTS device_logins (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id            TEXT NOT NULL,
                device_fingerprint TEXT NOT NULL,
                ip                 TEXT NOT NULL,
                seen_at_ms         INTEGER NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_device_logins_user
                ON device_logins(user_id, seen_at_ms);
             CREATE TABLE IF NOT EXISTS security_events (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id          TEXT NOT NULL,
                session_id       TEXT,
                action           TEXT NOT NULL,
                max_confidence   REAL NOT NULL,
                flags            TEXT NOT NULL,
                created_at_ms    INTEGER NOT NULL,
                reviewed         INTEGER NOT NULL DEFAULT 0
             );
             CREATE TABLE IF NOT EXISTS leaderboard (
                scope            TEXT NOT NULL,
                period           TEXT NOT NULL,
                user_id          TEXT NOT NULL,
                score            INTEGER NOT NULL,
                seq              INTEGER NOT NULL,
                metadata         TEXT NOT NULL,
                updated_at_ms    INTEGER NOT NULL,
                expires_at_ms    INTEGER,
                PRIMARY KEY (scope, period, user_id)
             );
             CREATE INDEX IF NOT EXISTS idx_leaderboard_rank
                ON leaderboard(scope, period, score DESC, seq ASC);
             CREATE INDEX IF NOT EXISTS idx_leaderboard_expiry
                ON leaderboard(expires_at_ms);",
        )
        .map_err(|e| format!("failed to create schema: {e}"))?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, String> {
        self.conn
            .lock()
            .map_err(|_| "store connection mutex poisoned".to_string())
    }

    /// Creates the user on first sight and returns the current record. A
    /// supplied country replaces the stored one.
    pub fn ensure_user(
        &self,
        user_id: &str,
        country: Option<&str>,
        now_ms: i64,
    ) -> Result<UserRecord, String> {
        {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO users (user_id, created_at_ms, country) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET country = COALESCE(excluded.country, users.country)",
                params![user_id, now_ms, country],
            )
            .map_err(|e| format!("ensure_user failed: {e}"))?;
        }
        self.get_user(user_id)?
            .ok_or_else(|| format!("user {user_id} missing after insert"))
    }

    #[cfg(test)]
    pub fn set_profile(
        &self,
        user_id: &str,
        profile: &catch_core::PlayerProfile,
    ) -> Result<(), String> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET level = ?1, vip_tier = ?2, subscribed = ?3, streak_days = ?4,
                    retention_days = ?5, has_purchased = ?6, ad_watch_rate = ?7, difficulty = ?8
             WHERE user_id = ?9",
            params![
                profile.level,
                profile.vip_tier.level(),
                profile.subscribed,
                profile.streak_days,
                profile.retention_days,
                profile.has_purchased,
                profile.ad_watch_rate,
                profile.difficulty.as_str(),
                user_id,
            ],
        )
        .map_err(|e| format!("set_profile failed: {e}"))?;
        Ok(())
    }

    pub fn create_session(&self, session: &GameSession) -> Result<(), String> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sessions (session_id, user_id, platform, status, started_at_ms, last_activity_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                session.session_id,
                session.user_id,
                session.platform,
                session.status.as_str(),
                session.started_at_ms,
            ],
        )
        .map_err(|e| format!("create_session failed: {e}"))?;
        Ok(())
    }

    /// Appends a stamped checkpoint if the session is still active and holds
    /// exactly `expected_len` checkpoints.
    pub fn append_checkpoint(
        &self,
        session_id: &str,
        expected_len: usize,
        checkpoint: &Checkpoint,
        now_ms: i64,
    ) -> Result<AppendOutcome, String> {
        let payload = serde_json::to_string(checkpoint)
            .map_err(|e| format!("failed to serialize checkpoint: {e}"))?;

        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| format!("append_checkpoint begin: {e}"))?;

        let Some(status) = db::session_status(&tx, session_id)? else {
            return Ok(AppendOutcome::Missing);
        };
        if status != SessionStatus::Active {
            return Ok(AppendOutcome::NotActive(status));
        }

        let stored: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM checkpoints WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .map_err(|e| format!("append_checkpoint count: {e}"))?;
        if stored as usize != expected_len {
            return Ok(AppendOutcome::Conflict {
                stored: stored as usize,
            });
        }

        tx.execute(
            "INSERT INTO checkpoints (session_id, seq, score, client_ts_ms, server_ts_ms, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session_id,
                expected_len as i64,
                checkpoint.score,
                checkpoint.timestamp_ms,
                checkpoint.server_timestamp_ms.unwrap_or(now_ms),
                payload,
            ],
        )
        .map_err(|e| format!("append_checkpoint insert: {e}"))?;
        tx.execute(
            "UPDATE sessions SET last_activity_ms = ?1 WHERE session_id = ?2",
            params![now_ms, session_id],
        )
        .map_err(|e| format!("append_checkpoint touch: {e}"))?;
        tx.commit()
            .map_err(|e| format!("append_checkpoint commit: {e}"))?;

        Ok(AppendOutcome::Appended)
    }

    /// Seals the session and grants rewards in one transaction. A session
    /// that is no longer active is left untouched, so retries grant nothing.
    pub fn complete_session(
        &self,
        session_id: &str,
        final_score: u64,
        rewards: &Rewards,
        now_ms: i64,
    ) -> Result<CompleteOutcome, String> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| format!("complete_session begin: {e}"))?;

        let row: Option<(String, String)> = tx
            .query_row(
                "SELECT status, user_id FROM sessions WHERE session_id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| format!("complete_session lookup: {e}"))?;
        let Some((status, user_id)) = row else {
            return Ok(CompleteOutcome::Missing);
        };
        let status = db::parse_status(&status)?;
        if status != SessionStatus::Active {
            return Ok(CompleteOutcome::NotActive(status));
        }

        let score = i64::try_from(final_score).map_err(|_| "final score overflows".to_string())?;
        let previous_high: i64 = tx
            .query_row(
                "SELECT high_score FROM users WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| format!("complete_session high score: {e}"))?
            .unwrap_or(0);

        tx.execute(
            "UPDATE sessions SET status = 'completed', ended_at_ms = ?1, last_activity_ms = ?1,
                    final_score = ?2, end_reason = 'completed'
             WHERE session_id = ?3",
            params![now_ms, score, session_id],
        )
        .map_err(|e| format!("complete_session seal: {e}"))?;
        tx.execute(
            "UPDATE users SET coins = coins + ?1, gems = gems + ?2, xp = xp + ?3,
                    games_played = games_played + 1, high_score = MAX(high_score, ?4)
             WHERE user_id = ?5",
            params![
                rewards.coins as i64,
                rewards.gems as i64,
                rewards.xp as i64,
                score,
                user_id
            ],
        )
        .map_err(|e| format!("complete_session rewards: {e}"))?;
        tx.execute(
            "INSERT INTO game_scores (user_id, session_id, score, completed_at_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, session_id, score, now_ms],
        )
        .map_err(|e| format!("complete_session history: {e}"))?;
        tx.commit()
            .map_err(|e| format!("complete_session commit: {e}"))?;

        Ok(CompleteOutcome::Completed {
            new_high_score: score > previous_high,
        })
    }

    /// Marks an active session invalidated. Returns false if it was not active.
    pub fn invalidate_session(
        &self,
        session_id: &str,
        reason: &str,
        now_ms: i64,
    ) -> Result<bool, String> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE sessions SET status = 'invalidated', ended_at_ms = ?1, end_reason = ?2
                 WHERE session_id = ?3 AND status = 'active'",
                params![now_ms, reason, session_id],
            )
            .map_err(|e| format!("invalidate_session failed: {e}"))?;
        Ok(updated > 0)
    }

    /// Invalidates active sessions idle since before `cutoff_ms`.
    pub fn invalidate_idle_sessions(&self, cutoff_ms: i64, now_ms: i64) -> Result<usize, String> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE sessions SET status = 'invalidated', ended_at_ms = ?1, end_reason = 'idle_timeout'
             WHERE status = 'active' AND last_activity_ms < ?2",
            params![now_ms, cutoff_ms],
        )
        .map_err(|e| format!("invalidate_idle_sessions failed: {e}"))
    }

    pub fn count_active_sessions(&self) -> Result<usize, String> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sessions WHERE status = 'active'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| format!("count_active_sessions failed: {e}"))?;
        Ok(count as usize)
    }

    /// Final scores of the user's most recent completed games, newest first.
    pub fn completed_scores(&self, user_id: &str, limit: usize) -> Result<Vec<i64>, String> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT score FROM game_scores WHERE user_id = ?1
                 ORDER BY completed_at_ms DESC, id DESC LIMIT ?2",
            )
            .map_err(|e| format!("completed_scores prepare: {e}"))?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], |row| row.get(0))
            .map_err(|e| format!("completed_scores query: {e}"))?;
        rows.collect::<Result<Vec<i64>, _>>()
            .map_err(|e| format!("completed_scores row: {e}"))
    }
}
