use catch_core::{should_replace, LeaderboardScope};
use rusqlite::{params, OptionalExtension};

use super::GameStore;
use crate::types::LeaderboardEntry;

// Rows past their expiry are invisible until the sweeper deletes them.
const LIVE: &str = "(expires_at_ms IS NULL OR expires_at_ms > ?3)";

impl GameStore {
    /// Applies the scope's update policy. Returns whether the stored score
    /// changed. Every write draws a fresh sequence number, which orders
    /// tied scores by who reached them first.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_score(
        &self,
        scope: LeaderboardScope,
        period: &str,
        user_id: &str,
        score: u64,
        metadata: &serde_json::Value,
        now_ms: i64,
        expires_at_ms: Option<i64>,
    ) -> Result<bool, String> {
        let score = i64::try_from(score).map_err(|_| "score overflows".to_string())?;
        let metadata =
            serde_json::to_string(metadata).map_err(|e| format!("bad leaderboard metadata: {e}"))?;

        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| format!("submit_score begin: {e}"))?;

        let stored: Option<i64> = tx
            .query_row(
                &format!(
                    "SELECT score FROM leaderboard
                     WHERE scope = ?1 AND period = ?2 AND user_id = ?4 AND {LIVE}"
                ),
                params![scope.as_str(), period, now_ms, user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| format!("submit_score lookup: {e}"))?;
        if !should_replace(scope.policy(), stored.map(|s| s.max(0) as u64), score as u64) {
            return Ok(false);
        }

        let seq: i64 = tx
            .query_row("SELECT COALESCE(MAX(seq), 0) + 1 FROM leaderboard", [], |row| {
                row.get(0)
            })
            .map_err(|e| format!("submit_score seq: {e}"))?;
        tx.execute(
            "INSERT INTO leaderboard (scope, period, user_id, score, seq, metadata, updated_at_ms, expires_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(scope, period, user_id) DO UPDATE SET
                score = excluded.score,
                seq = excluded.seq,
                metadata = excluded.metadata,
                updated_at_ms = excluded.updated_at_ms,
                expires_at_ms = excluded.expires_at_ms",
            params![
                scope.as_str(),
                period,
                user_id,
                score,
                seq,
                metadata,
                now_ms,
                expires_at_ms
            ],
        )
        .map_err(|e| format!("submit_score upsert: {e}"))?;
        tx.commit().map_err(|e| format!("submit_score commit: {e}"))?;
        Ok(true)
    }

    /// Ranked page: score descending, then update order, then user id.
    pub fn leaderboard_page(
        &self,
        scope: LeaderboardScope,
        period: &str,
        offset: u32,
        limit: u32,
        now_ms: i64,
    ) -> Result<Vec<LeaderboardEntry>, String> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT user_id, score, metadata FROM leaderboard
                 WHERE scope = ?1 AND period = ?2 AND {LIVE}
                 ORDER BY score DESC, seq ASC, user_id ASC
                 LIMIT ?4 OFFSET ?5"
            ))
            .map_err(|e| format!("leaderboard_page prepare: {e}"))?;
        let rows = stmt
            .query_map(
                params![scope.as_str(), period, now_ms, limit, offset],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .map_err(|e| format!("leaderboard_page query: {e}"))?;

        let mut entries = Vec::new();
        for (index, row) in rows.enumerate() {
            let (user_id, score, metadata) =
                row.map_err(|e| format!("leaderboard_page row: {e}"))?;
            entries.push(LeaderboardEntry {
                user_id,
                score: score.max(0) as u64,
                rank: u64::from(offset) + index as u64 + 1,
                metadata: serde_json::from_str(&metadata)
                    .map_err(|e| format!("bad leaderboard metadata in db: {e}"))?,
            });
        }
        Ok(entries)
    }

    /// 1-indexed rank of the user, if they are on the board.
    pub fn leaderboard_rank(
        &self,
        scope: LeaderboardScope,
        period: &str,
        user_id: &str,
        now_ms: i64,
    ) -> Result<Option<u64>, String> {
        let conn = self.conn()?;
        let mine: Option<(i64, i64)> = conn
            .query_row(
                &format!(
                    "SELECT score, seq FROM leaderboard
                     WHERE scope = ?1 AND period = ?2 AND user_id = ?4 AND {LIVE}"
                ),
                params![scope.as_str(), period, now_ms, user_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| format!("leaderboard_rank lookup: {e}"))?;
        let Some((score, seq)) = mine else {
            return Ok(None);
        };

        let ahead: i64 = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM leaderboard
                     WHERE scope = ?1 AND period = ?2 AND {LIVE}
                       AND (score > ?4
                            OR (score = ?4 AND seq < ?5)
                            OR (score = ?4 AND seq = ?5 AND user_id < ?6))"
                ),
                params![scope.as_str(), period, now_ms, score, seq, user_id],
                |row| row.get(0),
            )
            .map_err(|e| format!("leaderboard_rank count: {e}"))?;
        Ok(Some(ahead as u64 + 1))
    }

    pub fn leaderboard_size(
        &self,
        scope: LeaderboardScope,
        period: &str,
        now_ms: i64,
    ) -> Result<u64, String> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row(
                &format!(
                    "SELECT COUNT(*) FROM leaderboard WHERE scope = ?1 AND period = ?2 AND {LIVE}"
                ),
                params![scope.as_str(), period, now_ms],
                |row| row.get(0),
            )
            .map_err(|e| format!("leaderboard_size failed: {e}"))?;
        Ok(count as u64)
    }

    pub fn sweep_expired_leaderboard(&self, now_ms: i64) -> Result<usize, String> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM leaderboard WHERE expires_at_ms IS NOT NULL AND expires_at_ms <= ?1",
            params![now_ms],
        )
        .map_err(|e| format!("sweep_expired_leaderboard failed: {e}"))
    }
}
