// Checkpoint validation
pub const CHECKPOINT_MAX_CLOCK_SKEW_MS: i64 = 60_000;
pub const CHECKPOINT_MAX_SCORE_PER_SEC: f64 = 1_000.0;

// Cheat detection
pub const CHEAT_CONFIDENCE_THRESHOLD: f64 = 0.8;
pub const AUTO_BAN_CONFIDENCE: f64 = 0.9;
pub const AUTO_BAN_SECS: u64 = 24 * 60 * 60;

pub const SPEED_HACK_DELTA_RATIO: f64 = 0.5;
pub const SPEED_HACK_MIN_HISTORY_DELTAS: usize = 3;
pub const SUPERHUMAN_REACTION_MS: f64 = 100.0;
pub const SUPERHUMAN_REACTION_SHARE: f64 = 0.5;

/// Most valuable catches one checkpoint interval can hold.
pub const TOP_CATCHES_PER_CHECKPOINT: i64 = 2;
pub const MAX_COINS_PER_CHECKPOINT: i64 =
    crate::catalog::BUILTIN_MAX_COIN_VALUE as i64 * TOP_CATCHES_PER_CHECKPOINT;
pub const SAFE_VALUE_CEILING: i64 = 1_000_000_000;

pub const PATTERN_MIN_GAMES: usize = 10;
pub const PATTERN_Z_SCORE_LIMIT: f64 = 5.0;
pub const PATTERN_BASE_CONFIDENCE: f64 = 0.6;
pub const PATTERN_MAX_CONFIDENCE: f64 = 0.95;
pub const PERFECT_MIN_COLLECTIONS: usize = 50;
pub const PERFECT_SHARE_LIMIT: f64 = 0.95;

pub const MAX_SCORE_PER_SECOND: f64 = 100.0;
pub const MIN_SCORE_PER_ITEM: f64 = 1.0;
pub const MAX_SCORE_PER_ITEM: f64 = 1_000.0;
pub const SCORE_PER_LEVEL: i64 = 1_000;
pub const MAX_LEVEL_DEVIATION: i64 = 2;

pub const BOT_MIN_INPUT_EVENTS: usize = 10;
pub const BOT_TIMING_CV_LIMIT: f64 = 0.1;
pub const BOT_GRID_PX: f64 = 10.0;
pub const BOT_GRID_SHARE_LIMIT: f64 = 0.8;

pub const DEVICE_WINDOW_MS: i64 = 60 * 60 * 1000;
pub const MAX_DEVICES_PER_WINDOW: usize = 3;
pub const MAX_IPS_PER_WINDOW: usize = 5;

pub const MAX_CLOCK_DRIFT_MS: i64 = 5 * 60 * 1000;
pub const MAX_CLIENT_FUTURE_MS: i64 = 60 * 1000;

// Spawn pool
pub const OBSTACLE_VIP_REDUCTION: f64 = 0.7;
pub const LEGENDARY_VIP_BONUS_PER_TIER: f64 = 0.15;
pub const EVENT_WEIGHT_BOOST: f64 = 25.0;
pub const STREAK_MIN_DAYS: u32 = 3;
pub const STREAK_BONUS_PER_DAY: f64 = 0.05;
pub const STREAK_BONUS_CAP_DAYS: u32 = 20;
pub const RETENTION_WEEK_DAYS: u32 = 7;
pub const RETENTION_MONTH_DAYS: u32 = 30;
pub const RETENTION_WEEK_BOOST: f64 = 1.2;
pub const RETENTION_MONTH_BOOST: f64 = 1.5;
pub const PURCHASER_PREMIUM_BOOST: f64 = 1.25;
pub const AD_WATCHER_RATE: f64 = 0.5;
pub const AD_WATCHER_CURRENCY_BOOST: f64 = 1.1;

// Spawner
pub const RECENT_SPAWN_WINDOW: usize = 5;
pub const RECENT_SPAWN_DAMPING: f64 = 0.3;
pub const CHAIN_COMBO_THRESHOLD: u32 = 5;
pub const CHAIN_COMBO_BOOST: f64 = 1.5;
pub const OBSTACLE_RAMP_PER_MINUTE: f64 = 0.1;
pub const OBSTACLE_RAMP_CAP: f64 = 2.0;
pub const SCORE_MILESTONE: u64 = 1_000;
pub const SCORE_MILESTONE_BOOST: f64 = 0.1;
pub const VIP_GUARANTEE_INTERVAL: u64 = 50;
pub const PITY_THRESHOLD: u32 = 100;
pub const COMBO_REWARD_STEP: u32 = 20;
pub const PERIODIC_SPECIAL_MS: u64 = 60_000;

// Rewards
pub const COINS_PER_SCORE: u64 = 10;
pub const GEMS_PER_SCORE: u64 = 1_000;
pub const XP_PER_SCORE: u64 = 5;
pub const LONG_SESSION_SECS: u64 = 300;
