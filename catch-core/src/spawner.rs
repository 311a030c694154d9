//! Next-item selection during a round.
//!
//! Each call derives a dynamic pool from the player's base pool and the live
//! round context, then either honours a guarantee (VIP interval, pity, combo
//! reward, periodic special) or falls back to weighted random selection.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Category, ItemDefinition, Rarity};
use crate::constants::{
    CHAIN_COMBO_BOOST, CHAIN_COMBO_THRESHOLD, COMBO_REWARD_STEP, OBSTACLE_RAMP_CAP,
    OBSTACLE_RAMP_PER_MINUTE, PERIODIC_SPECIAL_MS, PITY_THRESHOLD, RECENT_SPAWN_DAMPING,
    RECENT_SPAWN_WINDOW, SCORE_MILESTONE, SCORE_MILESTONE_BOOST, VIP_GUARANTEE_INTERVAL,
};
use crate::pool::{SpawnPool, SpawnPoolBuilder};
use crate::profile::{PlayerProfile, VipTier};
use crate::rng::SeededRng;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnContext {
    pub combo_count: u32,
    pub elapsed_ms: u64,
    pub score: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Guarantee {
    VipInterval,
    Pity,
    ComboReward,
    Periodic,
}

impl Guarantee {
    /// Checked in this order; the first one that fires wins.
    pub const PRIORITY: [Guarantee; 4] = [
        Guarantee::VipInterval,
        Guarantee::Pity,
        Guarantee::ComboReward,
        Guarantee::Periodic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::VipInterval => "vip_interval",
            Self::Pity => "pity",
            Self::ComboReward => "combo_reward",
            Self::Periodic => "periodic",
        }
    }

    fn accepts(self, item: &ItemDefinition) -> bool {
        match self {
            Self::Pity => item.rarity.is_rare_plus(),
            Self::VipInterval | Self::ComboReward | Self::Periodic => true,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Spawn {
    pub item: &'static ItemDefinition,
    pub guarantee: Option<Guarantee>,
}

/// Cumulative weight list sorted by item key, rebuilt for every draw.
#[derive(Clone, Debug, Default)]
pub struct WeightedTable {
    entries: Vec<(&'static str, f64)>,
    total: f64,
}

impl WeightedTable {
    pub fn from_pool(pool: &SpawnPool) -> Self {
        let mut entries = Vec::with_capacity(pool.len());
        let mut total = 0.0;
        for (key, weight) in pool.iter() {
            if weight <= 0.0 {
                continue;
            }
            total += weight;
            entries.push((key, total));
        }
        Self { entries, total }
    }

    pub fn total_weight(&self) -> f64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() || self.total <= 0.0
    }

    /// Draws `r` in `[0, total)` and returns the first entry whose running
    /// sum reaches it, which is the entry where subtracting weights in key
    /// order first leaves a non-positive remainder.
    pub fn pick(&self, rng: &mut SeededRng) -> Option<&'static str> {
        if self.is_empty() {
            return None;
        }
        let target = rng.next_below(self.total);
        let idx = self
            .entries
            .partition_point(|(_, cumulative)| *cumulative < target);
        let idx = idx.min(self.entries.len() - 1);
        Some(self.entries[idx].0)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct RecentRing {
    slots: [Option<&'static str>; RECENT_SPAWN_WINDOW],
    next: usize,
}

impl RecentRing {
    fn push(&mut self, item_type: &'static str) {
        self.slots[self.next] = Some(item_type);
        self.next = (self.next + 1) % RECENT_SPAWN_WINDOW;
    }

    fn contains(&self, item_type: &str) -> bool {
        self.slots.iter().flatten().any(|recent| *recent == item_type)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SpawnHistory {
    total_spawns: u64,
    per_item: BTreeMap<&'static str, u64>,
    recent: RecentRing,
    consecutive_low: u32,
    last_periodic_ms: u64,
    combo_reward_tier: u32,
}

impl SpawnHistory {
    pub fn total_spawns(&self) -> u64 {
        self.total_spawns
    }

    pub fn count(&self, item_type: &str) -> u64 {
        self.per_item.get(item_type).copied().unwrap_or(0)
    }

    pub fn per_item(&self) -> &BTreeMap<&'static str, u64> {
        &self.per_item
    }

    /// Consecutive common/uncommon spawns since the last rare-or-better one.
    pub fn consecutive_low(&self) -> u32 {
        self.consecutive_low
    }

    pub fn is_recent(&self, item_type: &str) -> bool {
        self.recent.contains(item_type)
    }

    fn record(&mut self, item: &'static ItemDefinition) {
        self.total_spawns += 1;
        *self.per_item.entry(item.item_type).or_insert(0) += 1;
        self.recent.push(item.item_type);
        if item.rarity.is_rare_plus() {
            self.consecutive_low = 0;
        } else {
            self.consecutive_low = self.consecutive_low.saturating_add(1);
        }
    }
}

pub struct IntelligentSpawner {
    catalog: Catalog,
    profile: PlayerProfile,
    pool: SpawnPool,
    rng: SeededRng,
    history: SpawnHistory,
}

impl IntelligentSpawner {
    pub fn new(catalog: Catalog, profile: PlayerProfile, seed: u32) -> Self {
        let pool = SpawnPoolBuilder::new(&catalog).build(&profile);
        Self::with_pool(catalog, profile, pool, seed)
    }

    pub fn with_pool(catalog: Catalog, profile: PlayerProfile, pool: SpawnPool, seed: u32) -> Self {
        Self {
            catalog,
            profile,
            pool,
            rng: SeededRng::new(seed),
            history: SpawnHistory::default(),
        }
    }

    /// Rebuilds the base pool from a newer profile snapshot. History is kept.
    pub fn refresh_profile(&mut self, profile: PlayerProfile) {
        self.pool = SpawnPoolBuilder::new(&self.catalog).build(&profile);
        self.profile = profile;
    }

    /// Resets per-round timers. Lifetime counters and pity carry over.
    pub fn start_round(&mut self) {
        self.history.last_periodic_ms = 0;
        self.history.combo_reward_tier = 0;
    }

    pub fn pool(&self) -> &SpawnPool {
        &self.pool
    }

    pub fn profile(&self) -> &PlayerProfile {
        &self.profile
    }

    pub fn history(&self) -> &SpawnHistory {
        &self.history
    }

    pub fn spawn_next_item(&mut self, context: &SpawnContext) -> Option<&'static ItemDefinition> {
        self.spawn_next(context).map(|spawn| spawn.item)
    }

    /// Returns `None` only when the pool is empty; the caller skips the tick.
    pub fn spawn_next(&mut self, context: &SpawnContext) -> Option<Spawn> {
        let tier = context.combo_count / COMBO_REWARD_STEP;
        if tier < self.history.combo_reward_tier {
            self.history.combo_reward_tier = tier;
        }

        let spawn = match self.forced_pick(context) {
            Some(spawn) => spawn,
            None => {
                let table = WeightedTable::from_pool(&self.dynamic_pool(context));
                let key = table.pick(&mut self.rng)?;
                Spawn {
                    item: self.catalog.get(key)?,
                    guarantee: None,
                }
            }
        };

        self.record(spawn.item);
        Some(spawn)
    }

    /// Records an externally decided spawn (replays, tests).
    pub fn record(&mut self, item: &'static ItemDefinition) {
        self.history.record(item);
    }

    pub fn dynamic_pool(&self, context: &SpawnContext) -> SpawnPool {
        let obstacle_ramp = (1.0
            + OBSTACLE_RAMP_PER_MINUTE * (context.elapsed_ms as f64 / 60_000.0))
            .min(OBSTACLE_RAMP_CAP);
        let milestone_boost =
            1.0 + SCORE_MILESTONE_BOOST * (context.score / SCORE_MILESTONE) as f64;

        let weights = self
            .pool
            .iter()
            .filter_map(|(key, base)| {
                let item = self.catalog.get(key)?;
                let mut weight = base;
                if context.combo_count > CHAIN_COMBO_THRESHOLD && item.chain_bonus {
                    weight *= CHAIN_COMBO_BOOST;
                }
                if item.category == Category::Obstacle {
                    weight *= obstacle_ramp;
                }
                if item.rarity.is_rare_plus() {
                    weight *= milestone_boost;
                }
                if self.history.is_recent(key) {
                    weight *= RECENT_SPAWN_DAMPING;
                }
                Some((key, weight))
            })
            .collect();
        SpawnPool::from_weights(weights)
    }

    fn fires(&self, guarantee: Guarantee, context: &SpawnContext) -> bool {
        match guarantee {
            Guarantee::VipInterval => {
                self.profile.vip_tier >= VipTier::GOLD
                    && (self.history.total_spawns + 1) % VIP_GUARANTEE_INTERVAL == 0
            }
            Guarantee::Pity => self.history.consecutive_low >= PITY_THRESHOLD,
            Guarantee::ComboReward => {
                context.combo_count >= COMBO_REWARD_STEP
                    && context.combo_count / COMBO_REWARD_STEP > self.history.combo_reward_tier
            }
            Guarantee::Periodic => {
                context.elapsed_ms >= self.history.last_periodic_ms + PERIODIC_SPECIAL_MS
            }
        }
    }

    fn forced_pick(&mut self, context: &SpawnContext) -> Option<Spawn> {
        for guarantee in Guarantee::PRIORITY {
            if !self.fires(guarantee, context) {
                continue;
            }
            let candidates = self.forced_candidates(guarantee);
            if candidates.is_empty() {
                continue;
            }
            let pick = candidates[self.rng.next_int(candidates.len() as u32) as usize];
            match guarantee {
                Guarantee::ComboReward => {
                    self.history.combo_reward_tier = context.combo_count / COMBO_REWARD_STEP;
                }
                Guarantee::Periodic => self.history.last_periodic_ms = context.elapsed_ms,
                Guarantee::VipInterval | Guarantee::Pity => {}
            }
            return Some(Spawn {
                item: pick,
                guarantee: Some(guarantee),
            });
        }
        None
    }

    /// VIP pool plus active event pool; epic through mythic items when both
    /// are empty, then any rare-or-better item.
    fn forced_candidates(&self, guarantee: Guarantee) -> Vec<&'static ItemDefinition> {
        let in_pool: Vec<&'static ItemDefinition> = self
            .pool
            .keys()
            .filter_map(|key| self.catalog.get(key))
            .filter(|item| guarantee.accepts(item))
            .collect();

        let special: Vec<_> = in_pool
            .iter()
            .copied()
            .filter(|item| item.is_vip_item() || item.event.is_some())
            .collect();
        if !special.is_empty() {
            return special;
        }

        let top: Vec<_> = in_pool
            .iter()
            .copied()
            .filter(|item| (Rarity::Epic..=Rarity::Mythic).contains(&item.rarity))
            .collect();
        if !top.is_empty() {
            return top;
        }

        in_pool
            .into_iter()
            .filter(|item| item.rarity.is_rare_plus())
            .collect()
    }
}
