//! Static item catalog. Items are defined once at load time and never mutated.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
    Mythic,
    Cosmic,
}

impl Rarity {
    pub const ALL: [Rarity; 7] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Epic,
        Rarity::Legendary,
        Rarity::Mythic,
        Rarity::Cosmic,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Uncommon => "uncommon",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
            Self::Mythic => "mythic",
            Self::Cosmic => "cosmic",
        }
    }

    /// Rare or better.
    pub fn is_rare_plus(self) -> bool {
        self >= Rarity::Rare
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Currency,
    Powerup,
    Multiplier,
    Special,
    Obstacle,
    Vip,
    Seasonal,
    Collection,
    Mystery,
    Legendary,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Currency => "currency",
            Self::Powerup => "powerup",
            Self::Multiplier => "multiplier",
            Self::Special => "special",
            Self::Obstacle => "obstacle",
            Self::Vip => "vip",
            Self::Seasonal => "seasonal",
            Self::Collection => "collection",
            Self::Mystery => "mystery",
            Self::Legendary => "legendary",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ItemDefinition {
    pub item_type: &'static str,
    pub category: Category,
    pub rarity: Rarity,
    pub score_value: u32,
    pub coin_value: u32,
    pub gem_value: u32,
    pub fall_speed: f64,
    pub spawn_weight: f64,
    /// Minimum VIP tier, 0 when open to everyone.
    pub vip_required: u8,
    pub unlock_level: u32,
    /// Calendar event the item belongs to. Excluded while the event is inactive.
    pub event: Option<&'static str>,
    pub subscriber_only: bool,
    /// Boosted while the player holds a combo chain.
    pub chain_bonus: bool,
}

impl ItemDefinition {
    pub const fn new(
        item_type: &'static str,
        category: Category,
        rarity: Rarity,
        score_value: u32,
        spawn_weight: f64,
    ) -> Self {
        Self {
            item_type,
            category,
            rarity,
            score_value,
            coin_value: 0,
            gem_value: 0,
            fall_speed: 1.0,
            spawn_weight,
            vip_required: 0,
            unlock_level: 0,
            event: None,
            subscriber_only: false,
            chain_bonus: false,
        }
    }

    pub const fn coins(self, coin_value: u32) -> Self {
        Self { coin_value, ..self }
    }

    pub const fn gems(self, gem_value: u32) -> Self {
        Self { gem_value, ..self }
    }

    pub const fn speed(self, fall_speed: f64) -> Self {
        Self { fall_speed, ..self }
    }

    pub const fn vip(self, vip_required: u8) -> Self {
        Self {
            vip_required,
            ..self
        }
    }

    pub const fn unlock_at(self, unlock_level: u32) -> Self {
        Self {
            unlock_level,
            ..self
        }
    }

    pub const fn event(self, event: &'static str) -> Self {
        Self {
            event: Some(event),
            ..self
        }
    }

    pub const fn subscriber_only(self) -> Self {
        Self {
            subscriber_only: true,
            ..self
        }
    }

    pub const fn chain_bonus(self) -> Self {
        Self {
            chain_bonus: true,
            ..self
        }
    }

    pub fn is_obstacle(&self) -> bool {
        self.category == Category::Obstacle
    }

    pub fn is_premium(&self) -> bool {
        self.gem_value > 0
    }

    pub fn is_vip_item(&self) -> bool {
        self.vip_required > 0 || self.category == Category::Vip
    }
}

use Category as C;
use Rarity as R;

pub const BUILTIN_ITEMS: &[ItemDefinition] = &[
    // currency
    ItemDefinition::new("coin", C::Currency, R::Common, 10, 100.0)
        .coins(1)
        .chain_bonus(),
    ItemDefinition::new("coin_stack", C::Currency, R::Uncommon, 25, 40.0)
        .coins(5)
        .chain_bonus(),
    ItemDefinition::new("gem", C::Currency, R::Rare, 50, 10.0).gems(1),
    ItemDefinition::new("gem_cluster", C::Currency, R::Epic, 150, 3.0)
        .gems(3)
        .unlock_at(10),
    // power-ups
    ItemDefinition::new("magnet", C::Powerup, R::Uncommon, 15, 15.0),
    ItemDefinition::new("shield", C::Powerup, R::Uncommon, 15, 12.0),
    ItemDefinition::new("slow_time", C::Powerup, R::Rare, 20, 8.0).unlock_at(5),
    ItemDefinition::new("frenzy", C::Powerup, R::Epic, 40, 3.0).unlock_at(15),
    // multipliers
    ItemDefinition::new("double_points", C::Multiplier, R::Rare, 20, 8.0).chain_bonus(),
    ItemDefinition::new("triple_points", C::Multiplier, R::Epic, 30, 2.0)
        .unlock_at(20)
        .chain_bonus(),
    // specials
    ItemDefinition::new("lucky_clover", C::Special, R::Rare, 75, 5.0).coins(10),
    ItemDefinition::new("rainbow_star", C::Special, R::Epic, 200, 2.0)
        .coins(20)
        .chain_bonus(),
    ItemDefinition::new("treasure_chest", C::Special, R::Legendary, 500, 1.0)
        .coins(100)
        .gems(5)
        .unlock_at(25),
    // obstacles
    ItemDefinition::new("bomb", C::Obstacle, R::Common, 0, 30.0).speed(1.2),
    ItemDefinition::new("spiky_ball", C::Obstacle, R::Common, 0, 20.0)
        .speed(1.4)
        .unlock_at(3),
    ItemDefinition::new("storm_cloud", C::Obstacle, R::Uncommon, 0, 10.0)
        .speed(0.8)
        .unlock_at(10),
    ItemDefinition::new("black_hole", C::Obstacle, R::Rare, 0, 4.0)
        .speed(0.6)
        .unlock_at(30),
    // vip
    ItemDefinition::new("vip_crown", C::Vip, R::Legendary, 400, 2.0)
        .coins(50)
        .vip(1),
    ItemDefinition::new("vip_diamond", C::Vip, R::Mythic, 800, 1.0)
        .gems(10)
        .vip(3),
    ItemDefinition::new("platinum_chest", C::Vip, R::Legendary, 600, 1.5)
        .coins(150)
        .gems(3)
        .vip(4),
    ItemDefinition::new("royal_pass_token", C::Special, R::Epic, 250, 3.0)
        .gems(2)
        .subscriber_only(),
    // seasonal
    ItemDefinition::new("candy_corn", C::Seasonal, R::Uncommon, 30, 3.0)
        .coins(3)
        .event("halloween"),
    ItemDefinition::new("pumpkin", C::Seasonal, R::Rare, 120, 1.0)
        .coins(15)
        .event("halloween"),
    ItemDefinition::new("snowflake", C::Seasonal, R::Rare, 120, 1.0)
        .coins(15)
        .event("winter_festival"),
    ItemDefinition::new("gift_box", C::Seasonal, R::Epic, 300, 0.5)
        .gems(2)
        .event("winter_festival"),
    ItemDefinition::new("heart_gem", C::Seasonal, R::Rare, 150, 1.0)
        .gems(1)
        .event("valentines"),
    ItemDefinition::new("sun_shard", C::Seasonal, R::Rare, 120, 1.0)
        .coins(15)
        .event("summer_splash"),
    // collection
    ItemDefinition::new("puzzle_piece", C::Collection, R::Rare, 60, 4.0).unlock_at(8),
    ItemDefinition::new("ancient_coin", C::Collection, R::Epic, 180, 1.5)
        .coins(25)
        .unlock_at(12),
    // mystery
    ItemDefinition::new("mystery_box", C::Mystery, R::Rare, 100, 4.0),
    // legendary
    ItemDefinition::new("golden_dragon", C::Legendary, R::Legendary, 1_000, 0.5)
        .coins(200)
        .gems(5)
        .unlock_at(40),
    ItemDefinition::new("phoenix_feather", C::Legendary, R::Mythic, 2_000, 0.2)
        .gems(15)
        .unlock_at(60),
    ItemDefinition::new("cosmic_orb", C::Legendary, R::Cosmic, 5_000, 0.05)
        .gems(50)
        .speed(1.8)
        .unlock_at(90),
];

/// Largest `coin_value` among `items`.
pub const fn max_coin_value(items: &[ItemDefinition]) -> u32 {
    let mut max = 0;
    let mut idx = 0;
    while idx < items.len() {
        if items[idx].coin_value > max {
            max = items[idx].coin_value;
        }
        idx += 1;
    }
    max
}

pub const BUILTIN_MAX_COIN_VALUE: u32 = max_coin_value(BUILTIN_ITEMS);

#[derive(Clone, Debug)]
pub struct Catalog {
    items: &'static [ItemDefinition],
    index: BTreeMap<&'static str, usize>,
}

impl Catalog {
    pub fn new(items: &'static [ItemDefinition]) -> Self {
        let index = items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.item_type, idx))
            .collect();
        Self { items, index }
    }

    pub fn builtin() -> Self {
        Self::new(BUILTIN_ITEMS)
    }

    pub fn get(&self, item_type: &str) -> Option<&'static ItemDefinition> {
        let items = self.items;
        self.index.get(item_type).map(|&idx| &items[idx])
    }

    pub fn items(&self) -> &'static [ItemDefinition] {
        self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn builtin_keys_are_unique() {
        let mut seen = HashSet::new();
        for item in BUILTIN_ITEMS {
            assert!(seen.insert(item.item_type), "duplicate key {}", item.item_type);
        }
        assert_eq!(Catalog::builtin().len(), BUILTIN_ITEMS.len());
    }

    #[test]
    fn builtin_weights_are_positive() {
        for item in BUILTIN_ITEMS {
            assert!(item.spawn_weight > 0.0, "{} has no weight", item.item_type);
        }
    }

    #[test]
    fn max_coin_value_scans_every_item() {
        assert_eq!(BUILTIN_MAX_COIN_VALUE, 200);
        assert_eq!(max_coin_value(&[]), 0);
        assert!(BUILTIN_ITEMS
            .iter()
            .all(|item| item.coin_value <= BUILTIN_MAX_COIN_VALUE));
    }

    #[test]
    fn builtin_covers_every_rarity() {
        for rarity in Rarity::ALL {
            assert!(
                BUILTIN_ITEMS.iter().any(|item| item.rarity == rarity),
                "no {} item",
                rarity.as_str()
            );
        }
    }

    #[test]
    fn lookup_by_key() {
        let catalog = Catalog::builtin();
        let crown = catalog.get("vip_crown").expect("crown");
        assert_eq!(crown.rarity, Rarity::Legendary);
        assert!(crown.is_vip_item());
        assert!(catalog.get("nope").is_none());
    }

    #[test]
    fn rarity_is_ordered() {
        assert!(Rarity::Common < Rarity::Uncommon);
        assert!(Rarity::Mythic < Rarity::Cosmic);
        assert!(Rarity::Rare.is_rare_plus());
        assert!(!Rarity::Uncommon.is_rare_plus());
    }
}
