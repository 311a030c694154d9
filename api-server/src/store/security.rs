use catch_core::DeviceLogin;
use rusqlite::params;

use super::GameStore;

/// One declared-cheating verdict queued for review.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SecurityEvent {
    pub(crate) user_id: String,
    pub(crate) session_id: Option<String>,
    pub(crate) action: String,
    pub(crate) max_confidence: f64,
    /// `DETECTOR:FLAG` pairs.
    pub(crate) flags: Vec<String>,
    pub(crate) created_at_ms: i64,
}

impl GameStore {
    pub fn record_login(
        &self,
        user_id: &str,
        device_fingerprint: &str,
        ip: &str,
        now_ms: i64,
    ) -> Result<(), String> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO device_logins (user_id, device_fingerprint, ip, seen_at_ms)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, device_fingerprint, ip, now_ms],
        )
        .map_err(|e| format!("record_login failed: {e}"))?;
        Ok(())
    }

    pub fn recent_logins(&self, user_id: &str, since_ms: i64) -> Result<Vec<DeviceLogin>, String> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT device_fingerprint, ip, seen_at_ms FROM device_logins
                 WHERE user_id = ?1 AND seen_at_ms >= ?2 ORDER BY seen_at_ms ASC",
            )
            .map_err(|e| format!("recent_logins prepare: {e}"))?;
        let rows = stmt
            .query_map(params![user_id, since_ms], |row| {
                Ok(DeviceLogin {
                    device_fingerprint: row.get(0)?,
                    ip: row.get(1)?,
                    seen_at_ms: row.get(2)?,
                })
            })
            .map_err(|e| format!("recent_logins query: {e}"))?;
        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("recent_logins row: {e}"))
    }

    pub fn prune_logins(&self, before_ms: i64) -> Result<usize, String> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM device_logins WHERE seen_at_ms < ?1",
            params![before_ms],
        )
        .map_err(|e| format!("prune_logins failed: {e}"))
    }

    /// Stores the event and bumps the user's flag counter. With `ban_until_ms`
    /// the user is banned in the same transaction.
    pub fn record_security_event(
        &self,
        event: &SecurityEvent,
        ban_until_ms: Option<i64>,
    ) -> Result<(), String> {
        let flags = serde_json::to_string(&event.flags)
            .map_err(|e| format!("failed to serialize flags: {e}"))?;

        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e| format!("record_security_event begin: {e}"))?;
        tx.execute(
            "INSERT INTO security_events (user_id, session_id, action, max_confidence, flags, created_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.user_id,
                event.session_id,
                event.action,
                event.max_confidence,
                flags,
                event.created_at_ms,
            ],
        )
        .map_err(|e| format!("record_security_event insert: {e}"))?;
        tx.execute(
            "UPDATE users SET security_flags = security_flags + 1,
                    banned_until_ms = CASE
                        WHEN ?1 IS NULL THEN banned_until_ms
                        ELSE MAX(COALESCE(banned_until_ms, 0), ?1)
                    END
             WHERE user_id = ?2",
            params![ban_until_ms, event.user_id],
        )
        .map_err(|e| format!("record_security_event user: {e}"))?;
        tx.commit()
            .map_err(|e| format!("record_security_event commit: {e}"))
    }

    #[cfg(test)]
    pub fn security_events(&self, user_id: &str) -> Result<Vec<SecurityEvent>, String> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT user_id, session_id, action, max_confidence, flags, created_at_ms
                 FROM security_events WHERE user_id = ?1 ORDER BY id ASC",
            )
            .map_err(|e| format!("security_events prepare: {e}"))?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                ))
            })
            .map_err(|e| format!("security_events query: {e}"))?;

        let mut events = Vec::new();
        for row in rows {
            let (user_id, session_id, action, max_confidence, flags, created_at_ms) =
                row.map_err(|e| format!("security_events row: {e}"))?;
            let flags: Vec<String> = serde_json::from_str(&flags)
                .map_err(|e| format!("bad security flags in db: {e}"))?;
            events.push(SecurityEvent {
                user_id,
                session_id,
                action,
                max_confidence,
                flags,
                created_at_ms,
            });
        }
        Ok(events)
    }
}
