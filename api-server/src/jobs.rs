use std::time::{Duration, Instant};

use catch_core::constants::DEVICE_WINDOW_MS;
use chrono::Utc;

use crate::config::AppState;

pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SweepReport {
    pub(crate) idle_sessions: usize,
    pub(crate) expired_scores: usize,
    pub(crate) stale_logins: usize,
    pub(crate) rate_limit_keys: usize,
}

/// One maintenance pass: closes idle sessions, drops expired leaderboard
/// rows and login records older than the device window, and forgets
/// rate-limit keys with no hits left in the window.
pub(crate) fn sweep_once(
    state: &AppState,
    now_ms: i64,
    now: Instant,
) -> Result<SweepReport, String> {
    let idle_cutoff_ms = now_ms.saturating_sub(
        (state.policy.session_idle_timeout_secs as i64).saturating_mul(1000),
    );
    Ok(SweepReport {
        idle_sessions: state.store.invalidate_idle_sessions(idle_cutoff_ms, now_ms)?,
        expired_scores: state.store.sweep_expired_leaderboard(now_ms)?,
        stale_logins: state.store.prune_logins(now_ms - DEVICE_WINDOW_MS)?,
        rate_limit_keys: state.limits.prune(now),
    })
}

pub(crate) fn spawn_sweeper(state: AppState, sweep_secs: u64) {
    tokio::spawn(async move {
        let sweep = Duration::from_secs(sweep_secs);
        loop {
            tokio::time::sleep(sweep).await;
            match sweep_once(&state, now_ms(), Instant::now()) {
                Ok(report) => {
                    if report.idle_sessions > 0 {
                        tracing::info!(
                            invalidated = report.idle_sessions,
                            "closed idle sessions"
                        );
                    }
                    if report.expired_scores > 0 || report.stale_logins > 0 {
                        tracing::info!(
                            reaped_scores = report.expired_scores,
                            reaped_logins = report.stale_logins,
                            "swept expired records"
                        );
                    }
                    tracing::debug!(rate_limit_keys = report.rate_limit_keys, "sweep done");
                }
                Err(e) => tracing::error!("sweep failed: {e}"),
            }
        }
    });
}
