use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use catch_core::catalog::{Catalog, Rarity};
use catch_core::pool::SpawnPoolBuilder;
use catch_core::profile::PlayerProfile;
use catch_core::rng::SeededRng;
use catch_core::spawner::{IntelligentSpawner, SpawnContext};
use rayon::prelude::*;
use serde::Serialize;

use crate::util::seed_to_hex;

// Player behaviour draws from its own stream so it never perturbs spawns.
const PLAYER_STREAM_SALT: u32 = 0x9E37_79B9;

#[derive(Clone, Debug)]
pub struct SimulationConfig {
    pub profile: PlayerProfile,
    pub rounds: u32,
    pub ticks_per_round: u32,
    pub tick_ms: u64,
    /// Chance the simulated player catches an item or dodges an obstacle.
    pub catch_rate: f64,
    pub seed: u32,
    pub jobs: Option<usize>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct RoundStats {
    pub seed: u32,
    pub spawns: u64,
    pub score: u64,
    pub max_combo: u32,
    pub rarity_counts: BTreeMap<&'static str, u64>,
    pub category_counts: BTreeMap<&'static str, u64>,
    pub guarantee_counts: BTreeMap<&'static str, u64>,
    /// Longest run of spawns without a rare-or-better item.
    pub longest_drought: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct SimulationReport {
    pub seed: String,
    pub rounds: u32,
    pub ticks_per_round: u32,
    pub tick_ms: u64,
    pub catch_rate: f64,
    pub jobs: Option<usize>,
    pub pool_items: usize,
    pub total_spawns: u64,
    pub avg_score: f64,
    pub best_score: u64,
    pub max_combo: u32,
    pub rarity_shares: BTreeMap<&'static str, f64>,
    pub category_shares: BTreeMap<&'static str, f64>,
    pub guarantee_counts: BTreeMap<&'static str, u64>,
    pub longest_drought: u32,
}

/// Plays one round against a fresh spawner.
pub fn simulate_round(
    catalog: &Catalog,
    profile: &PlayerProfile,
    seed: u32,
    ticks: u32,
    tick_ms: u64,
    catch_rate: f64,
) -> RoundStats {
    let mut spawner = IntelligentSpawner::new(catalog.clone(), profile.clone(), seed);
    spawner.start_round();
    let mut player = SeededRng::new(seed ^ PLAYER_STREAM_SALT);

    let mut stats = RoundStats {
        seed,
        ..RoundStats::default()
    };
    let mut combo = 0u32;
    let mut drought = 0u32;

    for tick in 0..ticks {
        let context = SpawnContext {
            combo_count: combo,
            elapsed_ms: u64::from(tick) * tick_ms,
            score: stats.score,
        };
        let Some(spawn) = spawner.spawn_next(&context) else {
            break;
        };
        let item = spawn.item;

        stats.spawns += 1;
        *stats.rarity_counts.entry(item.rarity.as_str()).or_default() += 1;
        *stats.category_counts.entry(item.category.as_str()).or_default() += 1;
        if let Some(guarantee) = spawn.guarantee {
            *stats.guarantee_counts.entry(guarantee.as_str()).or_default() += 1;
        }

        if item.rarity.is_rare_plus() {
            drought = 0;
        } else {
            drought += 1;
            stats.longest_drought = stats.longest_drought.max(drought);
        }

        let succeeded = player.next_f64() < catch_rate;
        if item.is_obstacle() {
            if !succeeded {
                combo = 0;
            }
        } else if succeeded {
            combo += 1;
            stats.score += u64::from(item.score_value);
            stats.max_combo = stats.max_combo.max(combo);
        } else {
            combo = 0;
        }
    }

    stats
}

pub fn run_simulation(config: &SimulationConfig) -> Result<SimulationReport> {
    if config.rounds == 0 {
        return Err(anyhow!("simulation requires at least one round"));
    }
    if config.ticks_per_round == 0 {
        return Err(anyhow!("simulation requires at least one tick per round"));
    }
    if !(0.0..=1.0).contains(&config.catch_rate) {
        return Err(anyhow!(
            "catch rate must be within [0, 1], got {}",
            config.catch_rate
        ));
    }
    if config.jobs == Some(0) {
        return Err(anyhow!("simulate --jobs must be >= 1 when provided"));
    }

    let catalog = Catalog::builtin();
    let pool_items = SpawnPoolBuilder::new(&catalog).build(&config.profile).len();
    if pool_items == 0 {
        return Err(anyhow!("profile has an empty spawn pool"));
    }

    let seeds: Vec<u32> = (0..config.rounds)
        .map(|round| config.seed.wrapping_add(round))
        .collect();
    let run_one = |seed: &u32| {
        simulate_round(
            &catalog,
            &config.profile,
            *seed,
            config.ticks_per_round,
            config.tick_ms,
            config.catch_rate,
        )
    };

    let rounds: Vec<RoundStats> = if let Some(jobs) = config.jobs {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("failed to build rayon threadpool")?;
        pool.install(|| seeds.par_iter().map(run_one).collect())
    } else {
        seeds.par_iter().map(run_one).collect()
    };

    Ok(aggregate(config, pool_items, &rounds))
}

fn aggregate(config: &SimulationConfig, pool_items: usize, rounds: &[RoundStats]) -> SimulationReport {
    let total_spawns: u64 = rounds.iter().map(|round| round.spawns).sum();
    let total_score: u64 = rounds.iter().map(|round| round.score).sum();

    let mut rarity_counts: BTreeMap<&'static str, u64> =
        Rarity::ALL.iter().map(|rarity| (rarity.as_str(), 0)).collect();
    let mut category_counts = BTreeMap::new();
    let mut guarantee_counts = BTreeMap::new();
    for round in rounds {
        for (rarity, count) in &round.rarity_counts {
            *rarity_counts.entry(*rarity).or_default() += count;
        }
        for (category, count) in &round.category_counts {
            *category_counts.entry(*category).or_default() += count;
        }
        for (guarantee, count) in &round.guarantee_counts {
            *guarantee_counts.entry(*guarantee).or_default() += count;
        }
    }

    let share = |count: u64| {
        if total_spawns == 0 {
            0.0
        } else {
            count as f64 / total_spawns as f64
        }
    };

    SimulationReport {
        seed: seed_to_hex(config.seed),
        rounds: config.rounds,
        ticks_per_round: config.ticks_per_round,
        tick_ms: config.tick_ms,
        catch_rate: config.catch_rate,
        jobs: config.jobs,
        pool_items,
        total_spawns,
        avg_score: total_score as f64 / rounds.len().max(1) as f64,
        best_score: rounds.iter().map(|round| round.score).max().unwrap_or(0),
        max_combo: rounds.iter().map(|round| round.max_combo).max().unwrap_or(0),
        rarity_shares: rarity_counts
            .into_iter()
            .map(|(rarity, count)| (rarity, share(count)))
            .collect(),
        category_shares: category_counts
            .into_iter()
            .map(|(category, count)| (category, share(count)))
            .collect(),
        guarantee_counts,
        longest_drought: rounds
            .iter()
            .map(|round| round.longest_drought)
            .max()
            .unwrap_or(0),
    }
}

pub fn write_report(path: &Path, report: &SimulationReport) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed creating {}", parent.display()))?;
    }
    fs::write(
        path,
        serde_json::to_vec_pretty(report).context("failed to serialize simulation report")?,
    )
    .with_context(|| format!("failed writing {}", path.display()))
}
