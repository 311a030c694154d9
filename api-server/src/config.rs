use std::{env, path::PathBuf, sync::Arc, time::Duration};

use catch_core::{Catalog, CheatDetector};

use crate::rate_limit::RateLimits;
use crate::store::GameStore;

pub(crate) const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
pub(crate) const DEFAULT_DATA_DIR: &str = "./data";
pub(crate) const DEFAULT_USER_RATE_LIMIT: usize = 120;
pub(crate) const DEFAULT_IP_RATE_LIMIT: usize = 300;
pub(crate) const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;
// Abandoned rounds are closed after six idle hours.
pub(crate) const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 6 * 60 * 60;
pub(crate) const DEFAULT_SWEEP_SECS: u64 = 60;
pub(crate) const DEFAULT_MAX_LEADERBOARD_PAGE: u32 = 100;
pub(crate) const DEFAULT_JSON_LIMIT_BYTES: usize = 256 * 1024;
/// Completed games fed to the pattern-anomaly detector.
pub(crate) const SCORE_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy)]
pub(crate) struct ServerPolicy {
    pub(crate) user_rate_limit: usize,
    pub(crate) ip_rate_limit: usize,
    pub(crate) rate_limit_window_secs: u64,
    pub(crate) session_idle_timeout_secs: u64,
    pub(crate) max_leaderboard_page: u32,
}

impl ServerPolicy {
    pub(crate) fn from_env() -> Self {
        let mut max_leaderboard_page =
            read_env_u32("MAX_LEADERBOARD_PAGE", DEFAULT_MAX_LEADERBOARD_PAGE);
        if max_leaderboard_page > DEFAULT_MAX_LEADERBOARD_PAGE {
            tracing::warn!(
                "MAX_LEADERBOARD_PAGE ({}) above {}. Falling back to default.",
                max_leaderboard_page,
                DEFAULT_MAX_LEADERBOARD_PAGE
            );
            max_leaderboard_page = DEFAULT_MAX_LEADERBOARD_PAGE;
        }

        Self {
            user_rate_limit: read_env_usize("USER_RATE_LIMIT", DEFAULT_USER_RATE_LIMIT),
            ip_rate_limit: read_env_usize("IP_RATE_LIMIT", DEFAULT_IP_RATE_LIMIT),
            rate_limit_window_secs: read_env_u64(
                "RATE_LIMIT_WINDOW_SECS",
                DEFAULT_RATE_LIMIT_WINDOW_SECS,
            ),
            session_idle_timeout_secs: read_env_u64(
                "SESSION_IDLE_TIMEOUT_SECS",
                DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
            ),
            max_leaderboard_page,
        }
    }

    pub(crate) fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Clamps a requested page size into `1..=max_leaderboard_page`.
    pub(crate) fn page_limit(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.max_leaderboard_page)
            .clamp(1, self.max_leaderboard_page)
    }
}

impl Default for ServerPolicy {
    fn default() -> Self {
        Self {
            user_rate_limit: DEFAULT_USER_RATE_LIMIT,
            ip_rate_limit: DEFAULT_IP_RATE_LIMIT,
            rate_limit_window_secs: DEFAULT_RATE_LIMIT_WINDOW_SECS,
            session_idle_timeout_secs: DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
            max_leaderboard_page: DEFAULT_MAX_LEADERBOARD_PAGE,
        }
    }
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) store: Arc<GameStore>,
    pub(crate) catalog: Arc<Catalog>,
    pub(crate) detector: Arc<CheatDetector>,
    pub(crate) final_detector: Arc<CheatDetector>,
    pub(crate) limits: Arc<RateLimits>,
    pub(crate) policy: ServerPolicy,
    pub(crate) api_key: Option<Arc<str>>,
    pub(crate) http_workers: Option<usize>,
}

impl AppState {
    pub(crate) fn new(store: GameStore, policy: ServerPolicy, api_key: Option<String>) -> Self {
        Self {
            store: Arc::new(store),
            catalog: Arc::new(Catalog::builtin()),
            detector: Arc::new(CheatDetector::standard()),
            final_detector: Arc::new(CheatDetector::final_score()),
            limits: Arc::new(RateLimits::new(&policy)),
            policy,
            api_key: api_key.map(Arc::from),
            http_workers: None,
        }
    }

    pub(crate) fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

pub(crate) fn data_dir() -> PathBuf {
    PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()))
}

pub(crate) fn read_env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn read_env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub(crate) fn read_env_optional_usize(name: &str) -> Option<usize> {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
}

pub(crate) fn read_env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

pub(crate) fn read_env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}
