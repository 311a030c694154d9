//! Per-player spawn pool construction.
//!
//! A pool maps item keys to effective weights. Items failing a gate are left
//! out of the map entirely rather than being stored with a zero weight.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::{Catalog, Category, ItemDefinition, Rarity};
use crate::constants::{
    AD_WATCHER_CURRENCY_BOOST, AD_WATCHER_RATE, EVENT_WEIGHT_BOOST, LEGENDARY_VIP_BONUS_PER_TIER,
    OBSTACLE_VIP_REDUCTION, PURCHASER_PREMIUM_BOOST, RETENTION_MONTH_BOOST, RETENTION_MONTH_DAYS,
    RETENTION_WEEK_BOOST, RETENTION_WEEK_DAYS, STREAK_BONUS_CAP_DAYS, STREAK_BONUS_PER_DAY,
    STREAK_MIN_DAYS,
};
use crate::profile::{Difficulty, PlayerProfile, VipTier};

/// Rarity multipliers per level bracket, indexed by `Rarity::index()`.
/// A player uses the highest bracket whose threshold is at or below their level.
pub static LEVEL_RARITY_TABLE: [(u32, [f64; 7]); 5] = [
    (1, [1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]),
    (10, [0.9, 1.0, 1.1, 1.2, 1.2, 1.1, 1.0]),
    (25, [0.8, 0.95, 1.2, 1.4, 1.5, 1.3, 1.2]),
    (50, [0.7, 0.9, 1.3, 1.6, 1.8, 1.6, 1.5]),
    (100, [0.6, 0.8, 1.4, 1.8, 2.2, 2.0, 2.0]),
];

pub fn level_rarity_multiplier(level: u32, rarity: Rarity) -> f64 {
    let row = LEVEL_RARITY_TABLE
        .iter()
        .rev()
        .find(|(threshold, _)| level >= *threshold)
        .map(|(_, row)| row)
        .unwrap_or(&LEVEL_RARITY_TABLE[0].1);
    row[rarity.index()]
}

/// Multiplier applied to legendary-or-better items for a VIP tier. Grows with the tier.
pub fn vip_legendary_multiplier(tier: VipTier) -> f64 {
    1.0 + LEGENDARY_VIP_BONUS_PER_TIER * f64::from(tier.level())
}

pub fn streak_multiplier(streak_days: u32) -> f64 {
    if streak_days < STREAK_MIN_DAYS {
        return 1.0;
    }
    1.0 + STREAK_BONUS_PER_DAY * f64::from(streak_days.min(STREAK_BONUS_CAP_DAYS))
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SpawnPool {
    weights: BTreeMap<&'static str, f64>,
}

impl SpawnPool {
    pub fn from_weights(weights: BTreeMap<&'static str, f64>) -> Self {
        let weights = weights
            .into_iter()
            .filter(|(_, weight)| weight.is_finite() && *weight > 0.0)
            .collect();
        Self { weights }
    }

    pub fn get(&self, item_type: &str) -> Option<f64> {
        self.weights.get(item_type).copied()
    }

    pub fn contains(&self, item_type: &str) -> bool {
        self.weights.contains_key(item_type)
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.weights.iter().map(|(key, weight)| (*key, *weight))
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.weights.keys().copied()
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    pub fn probability(&self, item_type: &str) -> f64 {
        let total = self.total_weight();
        if total <= 0.0 {
            return 0.0;
        }
        self.get(item_type).unwrap_or(0.0) / total
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateFailure {
    VipTier,
    Subscription,
    EventClosed,
    Level,
}

pub fn gate(item: &ItemDefinition, profile: &PlayerProfile) -> Result<(), GateFailure> {
    if profile.vip_tier.level() < item.vip_required {
        return Err(GateFailure::VipTier);
    }
    if item.subscriber_only && !profile.subscribed {
        return Err(GateFailure::Subscription);
    }
    if let Some(event) = item.event {
        if !profile.event_active(event) {
            return Err(GateFailure::EventClosed);
        }
    }
    if profile.level < item.unlock_level {
        return Err(GateFailure::Level);
    }
    Ok(())
}

pub struct SpawnPoolBuilder<'a> {
    catalog: &'a Catalog,
}

impl<'a> SpawnPoolBuilder<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Pure function of the catalog and the profile.
    pub fn build(&self, profile: &PlayerProfile) -> SpawnPool {
        let weights = self
            .catalog
            .items()
            .iter()
            .filter(|item| gate(item, profile).is_ok())
            .map(|item| (item.item_type, effective_weight(item, profile)))
            .collect();
        SpawnPool::from_weights(weights)
    }
}

fn effective_weight(item: &ItemDefinition, profile: &PlayerProfile) -> f64 {
    let mut weight = item.spawn_weight;

    if item.rarity >= Rarity::Legendary {
        weight *= vip_legendary_multiplier(profile.vip_tier);
    }
    if item.is_obstacle() && profile.vip_tier >= VipTier::BRONZE {
        weight *= OBSTACLE_VIP_REDUCTION;
    }

    // Additive so that rare event items become reliably likely during the window.
    if item.event.is_some_and(|event| profile.event_active(event)) {
        weight += EVENT_WEIGHT_BOOST;
    }

    weight *= level_rarity_multiplier(profile.level, item.rarity);

    if (Rarity::Rare..=Rarity::Legendary).contains(&item.rarity) {
        weight *= streak_multiplier(profile.streak_days);
    }

    if item.rarity.is_rare_plus() {
        if profile.retention_days >= RETENTION_MONTH_DAYS {
            weight *= RETENTION_MONTH_BOOST;
        } else if profile.retention_days >= RETENTION_WEEK_DAYS {
            weight *= RETENTION_WEEK_BOOST;
        }
    }
    if profile.has_purchased && item.is_premium() {
        weight *= PURCHASER_PREMIUM_BOOST;
    }
    if profile.ad_watch_rate >= AD_WATCHER_RATE && item.category == Category::Currency {
        weight *= AD_WATCHER_CURRENCY_BOOST;
    }

    match profile.difficulty {
        Difficulty::Casual => {
            if item.is_obstacle() {
                weight *= 0.5;
            } else if item.category == Category::Powerup {
                weight *= 1.5;
            }
        }
        Difficulty::Hardcore => {
            if item.is_obstacle() {
                weight *= 1.5;
            }
            if item.rarity.is_rare_plus() {
                weight *= 1.3;
            }
        }
        Difficulty::Normal => {}
    }

    weight
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(profile: &PlayerProfile) -> SpawnPool {
        SpawnPoolBuilder::new(&Catalog::builtin()).build(profile)
    }

    #[test]
    fn gated_items_are_absent() {
        let pool = build(&PlayerProfile::default());
        assert!(pool.contains("coin"));
        assert!(!pool.contains("vip_crown"));
        assert!(!pool.contains("royal_pass_token"));
        assert!(!pool.contains("pumpkin"));
        assert!(!pool.contains("golden_dragon"));
    }

    #[test]
    fn gates_open_with_profile() {
        let profile = PlayerProfile {
            level: 45,
            vip_tier: VipTier::GOLD,
            subscribed: true,
            active_events: vec!["halloween".to_string()],
            ..PlayerProfile::default()
        };
        let pool = build(&profile);
        for key in ["vip_crown", "vip_diamond", "royal_pass_token", "pumpkin", "golden_dragon"] {
            assert!(pool.contains(key), "{key} should be in the pool");
        }
        assert!(!pool.contains("platinum_chest"));
        assert!(!pool.contains("snowflake"));
    }

    #[test]
    fn every_weight_is_positive() {
        let profile = PlayerProfile {
            level: 100,
            vip_tier: VipTier::MAX,
            subscribed: true,
            streak_days: 50,
            retention_days: 90,
            has_purchased: true,
            ad_watch_rate: 0.9,
            difficulty: Difficulty::Hardcore,
            active_events: vec!["winter_festival".to_string()],
        };
        let pool = build(&profile);
        assert!(!pool.is_empty());
        for (key, weight) in pool.iter() {
            assert!(weight > 0.0, "{key} has weight {weight}");
        }
    }

    #[test]
    fn vip_reduces_obstacles_and_boosts_legendaries() {
        let base = PlayerProfile {
            level: 45,
            ..PlayerProfile::default()
        };
        let vip = PlayerProfile {
            vip_tier: VipTier::DIAMOND,
            ..base.clone()
        };
        let plain = build(&base);
        let boosted = build(&vip);
        let bomb = boosted.get("bomb").unwrap() / plain.get("bomb").unwrap();
        assert!((bomb - OBSTACLE_VIP_REDUCTION).abs() < 1e-9);
        let dragon = boosted.get("golden_dragon").unwrap() / plain.get("golden_dragon").unwrap();
        assert!((dragon - vip_legendary_multiplier(VipTier::DIAMOND)).abs() < 1e-9);
    }

    #[test]
    fn vip_legendary_multiplier_grows_with_tier() {
        let mut previous = 0.0;
        for tier in 0..=10 {
            let value = vip_legendary_multiplier(VipTier::new(tier));
            assert!(value > previous);
            previous = value;
        }
    }

    #[test]
    fn event_boost_is_additive() {
        let profile = PlayerProfile {
            active_events: vec!["halloween".to_string()],
            ..PlayerProfile::default()
        };
        let pool = build(&profile);
        let pumpkin = Catalog::builtin().get("pumpkin").unwrap();
        let expected = (pumpkin.spawn_weight + EVENT_WEIGHT_BOOST)
            * level_rarity_multiplier(1, pumpkin.rarity);
        assert!((pool.get("pumpkin").unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn level_brackets_shift_rarity() {
        assert_eq!(level_rarity_multiplier(1, Rarity::Common), 1.0);
        assert_eq!(level_rarity_multiplier(9, Rarity::Common), 1.0);
        assert_eq!(level_rarity_multiplier(10, Rarity::Common), 0.9);
        assert_eq!(level_rarity_multiplier(49, Rarity::Legendary), 1.5);
        assert_eq!(level_rarity_multiplier(250, Rarity::Legendary), 2.2);
        assert_eq!(level_rarity_multiplier(0, Rarity::Epic), 1.0);
        for (_, row) in LEVEL_RARITY_TABLE {
            assert!(row.iter().all(|value| *value > 0.0));
        }
    }

    #[test]
    fn streak_bonus_needs_three_days() {
        assert_eq!(streak_multiplier(2), 1.0);
        assert!((streak_multiplier(3) - 1.15).abs() < 1e-9);
        assert_eq!(streak_multiplier(100), streak_multiplier(STREAK_BONUS_CAP_DAYS));

        let base = build(&PlayerProfile::default());
        let streak = build(&PlayerProfile {
            streak_days: 10,
            ..PlayerProfile::default()
        });
        assert!(streak.get("mystery_box").unwrap() > base.get("mystery_box").unwrap());
        assert_eq!(streak.get("coin"), base.get("coin"));
    }

    #[test]
    fn retention_tiers() {
        let week = build(&PlayerProfile {
            retention_days: 7,
            ..PlayerProfile::default()
        });
        let month = build(&PlayerProfile {
            retention_days: 30,
            ..PlayerProfile::default()
        });
        let base = build(&PlayerProfile::default());
        let ratio_week = week.get("gem").unwrap() / base.get("gem").unwrap();
        let ratio_month = month.get("gem").unwrap() / base.get("gem").unwrap();
        assert!((ratio_week - RETENTION_WEEK_BOOST).abs() < 1e-9);
        assert!((ratio_month - RETENTION_MONTH_BOOST).abs() < 1e-9);
    }

    #[test]
    fn difficulty_bias() {
        let base = build(&PlayerProfile::default());
        let casual = build(&PlayerProfile {
            difficulty: Difficulty::Casual,
            ..PlayerProfile::default()
        });
        let hardcore = build(&PlayerProfile {
            difficulty: Difficulty::Hardcore,
            ..PlayerProfile::default()
        });
        assert!((casual.get("bomb").unwrap() / base.get("bomb").unwrap() - 0.5).abs() < 1e-9);
        assert!((casual.get("magnet").unwrap() / base.get("magnet").unwrap() - 1.5).abs() < 1e-9);
        assert!((hardcore.get("bomb").unwrap() / base.get("bomb").unwrap() - 1.5).abs() < 1e-9);
        assert!(
            (hardcore.get("mystery_box").unwrap() / base.get("mystery_box").unwrap() - 1.3).abs()
                < 1e-9
        );
    }

    #[test]
    fn purchasers_get_premium_boost() {
        let base = build(&PlayerProfile::default());
        let buyer = build(&PlayerProfile {
            has_purchased: true,
            ..PlayerProfile::default()
        });
        assert!((buyer.get("gem").unwrap() / base.get("gem").unwrap() - 1.25).abs() < 1e-9);
        assert_eq!(buyer.get("coin"), base.get("coin"));
    }

    #[test]
    fn from_weights_drops_non_positive_entries() {
        let mut weights = BTreeMap::new();
        weights.insert("a", 1.0);
        weights.insert("b", 0.0);
        weights.insert("c", -2.0);
        weights.insert("d", f64::NAN);
        let pool = SpawnPool::from_weights(weights);
        assert_eq!(pool.keys().collect::<Vec<_>>(), vec!["a"]);
    }
}
