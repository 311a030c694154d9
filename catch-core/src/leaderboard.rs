use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

const HOUR_SECS: u64 = 60 * 60;
const DAY_SECS: u64 = 24 * HOUR_SECS;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardScope {
    Daily,
    Weekly,
    Monthly,
    AllTime,
    Country,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Latest score always wins.
    Overwrite,
    /// Only a strictly greater score replaces the stored one.
    KeepMax,
}

impl LeaderboardScope {
    pub const ALL: [Self; 5] = [
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::AllTime,
        Self::Country,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::AllTime => "all_time",
            Self::Country => "country",
        }
    }

    pub fn policy(self) -> UpdatePolicy {
        match self {
            Self::Daily => UpdatePolicy::Overwrite,
            _ => UpdatePolicy::KeepMax,
        }
    }

    /// Row lifetime; `None` keeps the row forever.
    pub fn ttl_secs(self) -> Option<u64> {
        match self {
            Self::Daily => Some(25 * HOUR_SECS),
            Self::Weekly => Some(8 * DAY_SECS),
            Self::Monthly => Some(32 * DAY_SECS),
            Self::AllTime => None,
            Self::Country => Some(14 * DAY_SECS),
        }
    }
}

impl fmt::Display for LeaderboardScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeaderboardScope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "daily" => Ok(Self::Daily),
            "weekly" => Ok(Self::Weekly),
            "monthly" => Ok(Self::Monthly),
            "all_time" | "alltime" | "all-time" => Ok(Self::AllTime),
            "country" => Ok(Self::Country),
            other => Err(format!("unknown leaderboard scope: {other}")),
        }
    }
}

pub fn should_replace(policy: UpdatePolicy, stored: Option<u64>, submitted: u64) -> bool {
    match (policy, stored) {
        (_, None) | (UpdatePolicy::Overwrite, Some(_)) => true,
        (UpdatePolicy::KeepMax, Some(stored)) => submitted > stored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn daily_overwrites_others_keep_max() {
        assert!(should_replace(LeaderboardScope::Daily.policy(), Some(800), 600));
        for scope in [
            LeaderboardScope::Weekly,
            LeaderboardScope::Monthly,
            LeaderboardScope::AllTime,
            LeaderboardScope::Country,
        ] {
            assert!(!should_replace(scope.policy(), Some(800), 600));
            assert!(!should_replace(scope.policy(), Some(800), 800));
            assert!(should_replace(scope.policy(), Some(800), 801));
            assert!(should_replace(scope.policy(), None, 0));
        }
    }

    #[test]
    fn expiry_per_scope() {
        assert_eq!(LeaderboardScope::Daily.ttl_secs(), Some(90_000));
        assert_eq!(LeaderboardScope::Weekly.ttl_secs(), Some(691_200));
        assert_eq!(LeaderboardScope::AllTime.ttl_secs(), None);
    }

    #[test]
    fn parses_scope_names() {
        for scope in LeaderboardScope::ALL {
            assert_eq!(scope.as_str().parse::<LeaderboardScope>(), Ok(scope));
        }
        assert_eq!("all-time".parse(), Ok(LeaderboardScope::AllTime));
        assert!("yearly".parse::<LeaderboardScope>().is_err());
    }
}
