use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use catch_core::catalog::Catalog;
use catch_core::events::active_events;
use catch_core::pool::SpawnPoolBuilder;
use catch_core::profile::{Difficulty, PlayerProfile, VipTier};
use clap::{Args, Parser, Subcommand};
use spawn_lab::simulate::{run_simulation, write_report, SimulationConfig};
use spawn_lab::util::{parse_csv, parse_seed, seed_to_hex};

#[derive(Parser, Debug)]
#[command(name = "spawn-lab")]
#[command(about = "Inspect spawn pools and simulate spawn distributions for player profiles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the built spawn pool for a profile
    Pool {
        #[command(flatten)]
        profile: ProfileArgs,
        /// Emit JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Run many seeded rounds in parallel and report the spawn distribution
    Simulate {
        #[command(flatten)]
        profile: ProfileArgs,
        #[arg(long, default_value_t = 1_000)]
        rounds: u32,
        #[arg(long, default_value_t = 300)]
        ticks: u32,
        #[arg(long, default_value_t = 800)]
        tick_ms: u64,
        #[arg(long, default_value_t = 0.85)]
        catch_rate: f64,
        #[arg(long, default_value = "0x5eed")]
        seed: String,
        #[arg(long)]
        jobs: Option<usize>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct ProfileArgs {
    #[arg(long, default_value_t = 1)]
    level: u32,
    #[arg(long, default_value_t = 0)]
    vip: u8,
    #[arg(long, default_value_t = false)]
    subscribed: bool,
    #[arg(long, default_value_t = 0)]
    streak_days: u32,
    #[arg(long, default_value_t = 0)]
    retention_days: u32,
    #[arg(long, default_value_t = false)]
    purchased: bool,
    #[arg(long, default_value_t = 0.0)]
    ad_watch_rate: f64,
    /// casual, normal or hardcore
    #[arg(long, default_value = "normal")]
    difficulty: String,
    /// Comma-separated active events
    #[arg(long)]
    events: Option<String>,
    /// Use the events active on this `MM-DD` date instead of --events
    #[arg(long)]
    date: Option<String>,
}

impl ProfileArgs {
    fn into_profile(self) -> Result<PlayerProfile> {
        let difficulty = Difficulty::from_str(&self.difficulty).map_err(|e| anyhow!(e))?;
        let active_events = match (self.date.as_deref(), self.events.as_deref()) {
            (Some(date), _) => {
                let (month, day) = parse_month_day(date)?;
                active_events(month, day)
                    .into_iter()
                    .map(str::to_string)
                    .collect()
            }
            (None, Some(events)) => parse_csv(events),
            (None, None) => Vec::new(),
        };

        Ok(PlayerProfile {
            level: self.level.max(1),
            vip_tier: VipTier::new(self.vip),
            subscribed: self.subscribed,
            streak_days: self.streak_days,
            retention_days: self.retention_days,
            has_purchased: self.purchased,
            ad_watch_rate: self.ad_watch_rate,
            difficulty,
            active_events,
        })
    }
}

fn parse_month_day(date: &str) -> Result<(u32, u32)> {
    let (month, day) = date
        .trim()
        .split_once('-')
        .ok_or_else(|| anyhow!("expected MM-DD, got '{date}'"))?;
    let month: u32 = month.parse().map_err(|_| anyhow!("invalid month in '{date}'"))?;
    let day: u32 = day.parse().map_err(|_| anyhow!("invalid day in '{date}'"))?;
    if !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return Err(anyhow!("date out of range: '{date}'"));
    }
    Ok((month, day))
}

fn main() -> Result<()> {
    let Cli { command } = Cli::parse();

    match command {
        Commands::Pool { profile, json } => {
            let profile = profile.into_profile()?;
            let catalog = Catalog::builtin();
            let pool = SpawnPoolBuilder::new(&catalog).build(&profile);

            if json {
                println!("{}", serde_json::to_string_pretty(&pool)?);
                return Ok(());
            }

            let mut rows: Vec<_> = pool.iter().collect();
            rows.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));
            println!("vip={} level={}", profile.vip_tier.name(), profile.level);
            println!("events={}", profile.active_events.join(","));
            println!("items={} total_weight={:.3}", pool.len(), pool.total_weight());
            for (key, weight) in rows {
                let rarity = catalog.get(key).map_or("?", |item| item.rarity.as_str());
                println!(
                    "  {key:24} {rarity:10} weight={weight:9.3} p={:.4}",
                    pool.probability(key)
                );
            }
        }
        Commands::Simulate {
            profile,
            rounds,
            ticks,
            tick_ms,
            catch_rate,
            seed,
            jobs,
            output,
        } => {
            let config = SimulationConfig {
                profile: profile.into_profile()?,
                rounds,
                ticks_per_round: ticks,
                tick_ms,
                catch_rate,
                seed: parse_seed(&seed)?,
                jobs,
            };
            let report = run_simulation(&config)?;

            println!("seed={}", seed_to_hex(config.seed));
            println!("rounds={}", report.rounds);
            println!(
                "jobs={}",
                report
                    .jobs
                    .map(|value| value.to_string())
                    .unwrap_or_else(|| "auto".to_string())
            );
            println!("spawns={}", report.total_spawns);
            println!("avg_score={:.1}", report.avg_score);
            println!("longest_drought={}", report.longest_drought);
            println!("rarity shares:");
            for (rarity, share) in &report.rarity_shares {
                println!("  {rarity:10} {:6.2}%", share * 100.0);
            }
            println!("guarantees:");
            for (guarantee, count) in &report.guarantee_counts {
                println!("  {guarantee:14} {count}");
            }

            if let Some(path) = output {
                write_report(&path, &report)?;
                println!("output={}", path.display());
            }
        }
    }

    Ok(())
}
