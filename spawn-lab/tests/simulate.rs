use catch_core::catalog::Catalog;
use catch_core::profile::{PlayerProfile, VipTier};
use spawn_lab::simulate::{run_simulation, simulate_round, write_report, SimulationConfig};
use tempfile::TempDir;

fn config(profile: PlayerProfile, jobs: Option<usize>) -> SimulationConfig {
    SimulationConfig {
        profile,
        rounds: 24,
        ticks_per_round: 400,
        tick_ms: 800,
        catch_rate: 0.85,
        seed: 0x5EED,
        jobs,
    }
}

#[test]
fn report_is_independent_of_thread_count() {
    let single = run_simulation(&config(PlayerProfile::default(), Some(1))).unwrap();
    let parallel = run_simulation(&config(PlayerProfile::default(), Some(4))).unwrap();

    assert_eq!(single.total_spawns, parallel.total_spawns);
    assert_eq!(single.rarity_shares, parallel.rarity_shares);
    assert_eq!(single.guarantee_counts, parallel.guarantee_counts);
    assert_eq!(single.avg_score, parallel.avg_score);
}

#[test]
fn shares_cover_every_spawn() {
    let report = run_simulation(&config(PlayerProfile::default(), None)).unwrap();
    assert_eq!(report.total_spawns, 24 * 400);

    let rarity_total: f64 = report.rarity_shares.values().sum();
    let category_total: f64 = report.category_shares.values().sum();
    assert!((rarity_total - 1.0).abs() < 1e-9);
    assert!((category_total - 1.0).abs() < 1e-9);
    assert_eq!(report.rarity_shares.len(), 7);
    assert!(report.rarity_shares["common"] > report.rarity_shares["rare"]);
}

#[test]
fn pity_bounds_the_rare_drought() {
    let report = run_simulation(&SimulationConfig {
        rounds: 8,
        ticks_per_round: 2_000,
        ..config(PlayerProfile::default(), None)
    })
    .unwrap();
    assert!(report.longest_drought <= 100, "{}", report.longest_drought);
    assert!(!report.guarantee_counts.contains_key("vip_interval"));
}

#[test]
fn gold_vip_gets_interval_guarantees() {
    let gold = PlayerProfile {
        vip_tier: VipTier::GOLD,
        ..PlayerProfile::default()
    };
    let report = run_simulation(&config(gold, None)).unwrap();
    assert!(report.guarantee_counts.get("vip_interval").copied().unwrap_or(0) >= 24 * 8);
}

#[test]
fn rounds_replay_from_their_seed() {
    let catalog = Catalog::builtin();
    let profile = PlayerProfile::default();
    let a = simulate_round(&catalog, &profile, 7, 300, 800, 0.9);
    let b = simulate_round(&catalog, &profile, 7, 300, 800, 0.9);
    assert_eq!(a.rarity_counts, b.rarity_counts);
    assert_eq!(a.score, b.score);
    assert_eq!(a.spawns, 300);

    let perfect = simulate_round(&catalog, &profile, 7, 300, 800, 1.0);
    assert!(perfect.max_combo > 0);
    let clumsy = simulate_round(&catalog, &profile, 7, 300, 800, 0.0);
    assert_eq!(clumsy.score, 0);
    assert_eq!(clumsy.max_combo, 0);
}

#[test]
fn invalid_configs_are_rejected() {
    let base = config(PlayerProfile::default(), None);
    assert!(run_simulation(&SimulationConfig { rounds: 0, ..base.clone() }).is_err());
    assert!(run_simulation(&SimulationConfig {
        ticks_per_round: 0,
        ..base.clone()
    })
    .is_err());
    assert!(run_simulation(&SimulationConfig {
        catch_rate: 1.5,
        ..base.clone()
    })
    .is_err());
    assert!(run_simulation(&SimulationConfig { jobs: Some(0), ..base }).is_err());
}

#[test]
fn report_writes_to_nested_path() {
    let dir = TempDir::new().unwrap();
    let report = run_simulation(&SimulationConfig {
        rounds: 2,
        ticks_per_round: 50,
        ..config(PlayerProfile::default(), None)
    })
    .unwrap();
    let path = dir.path().join("reports/default.json");
    write_report(&path, &report).unwrap();

    let written: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(written["seed"], "0x00005eed");
    assert_eq!(written["total_spawns"], 100);
}
