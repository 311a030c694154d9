use catch_core::detect::InputEvent;
use catch_core::{Category, Checkpoint, Rarity, Rewards, SessionStats};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StartSessionRequest {
    pub(crate) platform: String,
    #[serde(default)]
    pub(crate) country: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SpawnRate {
    pub(crate) item_type: String,
    pub(crate) category: Category,
    pub(crate) rarity: Rarity,
    pub(crate) weight: f64,
    pub(crate) probability: f64,
}

/// Spawn tuning handed to the client for the round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SpawnConfig {
    pub(crate) spawn_rates: Vec<SpawnRate>,
    pub(crate) active_events: Vec<String>,
    pub(crate) vip_tier: u8,
    pub(crate) vip_tier_name: String,
    pub(crate) vip_legendary_multiplier: f64,
    pub(crate) obstacle_multiplier: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StartSessionResponse {
    pub(crate) success: bool,
    pub(crate) session_id: Uuid,
    pub(crate) server_time: i64,
    pub(crate) config: SpawnConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UpdateProgressRequest {
    pub(crate) checkpoint: Checkpoint,
    #[serde(default)]
    pub(crate) input_events: Vec<InputEvent>,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct UpdateProgressResponse {
    pub(crate) success: bool,
    pub(crate) validated: bool,
    pub(crate) server_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EndSessionRequest {
    pub(crate) final_score: i64,
    #[serde(default)]
    pub(crate) stats: SessionStats,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct EndSessionResponse {
    pub(crate) success: bool,
    pub(crate) rewards: Rewards,
    pub(crate) new_high_score: bool,
    pub(crate) server_time: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct LeaderboardQuery {
    #[serde(default)]
    pub(crate) offset: Option<u32>,
    #[serde(default)]
    pub(crate) limit: Option<u32>,
    #[serde(default)]
    pub(crate) country: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct LeaderboardEntry {
    pub(crate) user_id: String,
    pub(crate) score: u64,
    pub(crate) rank: u64,
    pub(crate) metadata: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct LeaderboardResponse {
    pub(crate) success: bool,
    pub(crate) scope: String,
    pub(crate) period: String,
    pub(crate) entries: Vec<LeaderboardEntry>,
    pub(crate) user_rank: Option<u64>,
    pub(crate) total_players: u64,
}

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) status: &'static str,
    pub(crate) service: &'static str,
    pub(crate) active_sessions: usize,
    pub(crate) catalog_items: usize,
    pub(crate) user_rate_limit: usize,
    pub(crate) ip_rate_limit: usize,
    pub(crate) rate_limit_window_secs: u64,
    pub(crate) session_idle_timeout_secs: u64,
    pub(crate) max_leaderboard_page: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) http_workers: Option<usize>,
    pub(crate) auth_required: bool,
}
