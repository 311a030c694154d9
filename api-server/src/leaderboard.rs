use catch_core::LeaderboardScope;
use chrono::{DateTime, Datelike, Utc};

/// Key of the period a score lands in. Country boards key on the upper-cased
/// country code and have no board without one.
pub(crate) fn period_key(
    scope: LeaderboardScope,
    now: DateTime<Utc>,
    country: Option<&str>,
) -> Option<String> {
    match scope {
        LeaderboardScope::Daily => Some(now.format("%Y-%m-%d").to_string()),
        LeaderboardScope::Weekly => {
            let week = now.iso_week();
            Some(format!("{}-W{:02}", week.year(), week.week()))
        }
        LeaderboardScope::Monthly => Some(now.format("%Y-%m").to_string()),
        LeaderboardScope::AllTime => Some("all".to_string()),
        LeaderboardScope::Country => country.and_then(normalize_country),
    }
}

/// Two-letter country code, upper-cased. Anything else is rejected.
pub(crate) fn normalize_country(code: &str) -> Option<String> {
    let code = code.trim();
    (code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()))
        .then(|| code.to_ascii_uppercase())
}

pub(crate) fn expires_at_ms(scope: LeaderboardScope, now_ms: i64) -> Option<i64> {
    scope
        .ttl_secs()
        .map(|ttl| now_ms.saturating_add((ttl as i64).saturating_mul(1000)))
}
