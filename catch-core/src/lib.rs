pub mod catalog;
pub mod checkpoint;
pub mod constants;
pub mod detect;
pub mod error;
pub mod events;
pub mod leaderboard;
pub mod pool;
pub mod profile;
pub mod rewards;
pub mod rng;
pub mod spawner;

pub use catalog::{Catalog, Category, ItemDefinition, Rarity};
pub use checkpoint::{validate_checkpoint, Checkpoint, GameSession, ItemCollection, SessionStatus};
pub use detect::{
    detect_cheating, CheatDetector, CheatVerdict, DetectionInput, DeviceLogin, Enforcement,
    InputEvent, ValidationResult,
};
pub use error::{CheatFlag, CheckpointError, ScoreRejection};
pub use leaderboard::{should_replace, LeaderboardScope, UpdatePolicy};
pub use pool::{SpawnPool, SpawnPoolBuilder};
pub use profile::{Difficulty, PlayerProfile, VipTier};
pub use rewards::{calculate_rewards, validate_final_score, Rewards, SessionStats};
pub use spawner::{Guarantee, IntelligentSpawner, Spawn, SpawnContext, WeightedTable};
