use serde::{Deserialize, Serialize};

/// Loyalty tier 0 (none) through 10.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VipTier(u8);

impl VipTier {
    pub const NONE: VipTier = VipTier(0);
    pub const BRONZE: VipTier = VipTier(1);
    pub const SILVER: VipTier = VipTier(2);
    pub const GOLD: VipTier = VipTier(3);
    pub const PLATINUM: VipTier = VipTier(4);
    pub const DIAMOND: VipTier = VipTier(5);
    pub const MAX: VipTier = VipTier(10);

    /// Values above the top tier are clamped.
    pub fn new(tier: u8) -> Self {
        Self(tier.min(Self::MAX.0))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    pub fn name(self) -> &'static str {
        match self.0 {
            0 => "none",
            1 => "bronze",
            2 => "silver",
            3 => "gold",
            4 => "platinum",
            5 => "diamond",
            6 => "master",
            7 => "grandmaster",
            8 => "champion",
            9 => "legend",
            _ => "mythic",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Casual,
    #[default]
    Normal,
    Hardcore,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Casual => "casual",
            Self::Normal => "normal",
            Self::Hardcore => "hardcore",
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "casual" => Ok(Self::Casual),
            "normal" => Ok(Self::Normal),
            "hardcore" => Ok(Self::Hardcore),
            other => Err(format!("unknown difficulty: {other}")),
        }
    }
}

/// Snapshot of the player state the spawner reads. Owned and mutated by
/// progression systems elsewhere.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub level: u32,
    #[serde(default)]
    pub vip_tier: VipTier,
    #[serde(default)]
    pub subscribed: bool,
    #[serde(default)]
    pub streak_days: u32,
    #[serde(default)]
    pub retention_days: u32,
    #[serde(default)]
    pub has_purchased: bool,
    #[serde(default)]
    pub ad_watch_rate: f64,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub active_events: Vec<String>,
}

impl Default for PlayerProfile {
    fn default() -> Self {
        Self {
            level: 1,
            vip_tier: VipTier::NONE,
            subscribed: false,
            streak_days: 0,
            retention_days: 0,
            has_purchased: false,
            ad_watch_rate: 0.0,
            difficulty: Difficulty::Normal,
            active_events: Vec::new(),
        }
    }
}

impl PlayerProfile {
    pub fn event_active(&self, event: &str) -> bool {
        self.active_events.iter().any(|active| active == event)
    }
}
