//! # Claim Simulator
//!
//! Loads a reward configuration, runs simulated daily claims through a full
//! orchestrator with in-memory vaults, and compares what came out against
//! what the rarity table promises.

use std::process::ExitCode;
use std::sync::Arc;

use creamery_rewards::{
    AccountId, ClaimOrchestrator, Collaborators, CurrencyVault, ItemVault, ManualClock,
    OrchestratorSettings, Payout, RarityTier, RewardConfig, RewardError, RewardType, RoleRegistry,
    TokenAmount, CLAIM_COOLDOWN_SECS,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Account that deploys and configures the engine.
const OPERATOR: AccountId = 1;

/// First simulated player account.
const FIRST_PLAYER: AccountId = 1_000;

/// Simulated start of day zero.
const EPOCH: u64 = 1_700_000_000;

struct Options {
    config_path: String,
    days: u64,
    accounts: u64,
    seed: u64,
    journal: Option<String>,
    verbose: bool,
}

impl Options {
    fn parse(args: &[String]) -> Option<Self> {
        let config_path = args.get(1).filter(|a| !a.starts_with("--"))?.clone();
        let value = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
        };
        let number = |flag: &str, default: u64| {
            value(flag)
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        Some(Self {
            config_path,
            days: number("--days", 30),
            accounts: number("--accounts", 1_000),
            seed: number("--seed", 0xC0FF_EE00),
            journal: value("--journal").cloned(),
            verbose: args.iter().any(|a| a == "--verbose"),
        })
    }
}

#[derive(Default)]
struct Tally {
    by_tier: [u64; 5],
    by_type: [u64; 2],
    currency_minted: TokenAmount,
    items_granted: u128,
    grand_prizes: u64,
    cooldown_rejections: u64,
    failures: u64,
}

impl Tally {
    fn claims(&self) -> u64 {
        self.by_tier.iter().sum()
    }
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "creamery=info,creamery_rewards=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║         CREAMERY CLAIM SIMULATOR                                 ║");
    println!("║         ONE CLAIM PER ACCOUNT PER DAY                            ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    let args: Vec<String> = std::env::args().collect();
    let Some(options) = Options::parse(&args) else {
        println!("Usage: claim_simulator <rewards.toml>");
        println!();
        println!("Options:");
        println!("  --days <n>        Simulated days (default 30)");
        println!("  --accounts <n>    Claiming accounts per day (default 1000)");
        println!("  --seed <n>        Seed for the claim entropy stream");
        println!("  --journal <path>  Persist to a claim journal");
        println!("  --verbose         Print every claim");
        return ExitCode::FAILURE;
    };

    match run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            println!("Error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(options: &Options) -> Result<(), RewardError> {
    println!("Loading config: {}", options.config_path);
    let document = RewardConfig::from_toml_file(&options.config_path)?;

    let mut settings = OrchestratorSettings::default();
    if let Some(item_id) = document.grand_prize_item {
        settings = settings.with_grand_prize_item(item_id);
    }

    let currency = Arc::new(CurrencyVault::new());
    let items = Arc::new(ItemVault::new());
    let clock = Arc::new(ManualClock::new(EPOCH));
    let collaborators = Collaborators {
        authorizer: Arc::new(RoleRegistry::new(OPERATOR)),
        currency: currency.clone(),
        items,
        clock: clock.clone(),
    };

    let orchestrator = match &options.journal {
        Some(path) => ClaimOrchestrator::open(path, collaborators, settings)?,
        None => ClaimOrchestrator::with_settings(collaborators, settings),
    };
    orchestrator.apply_config(OPERATOR, &document.config)?;

    let table = orchestrator.rarity_table();
    info!(
        days = options.days,
        accounts = options.accounts,
        seed = options.seed,
        "simulation started"
    );

    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let mut tally = Tally::default();

    for day in 0..options.days {
        clock.set(EPOCH + day * CLAIM_COOLDOWN_SECS);

        for offset in 0..options.accounts {
            let account = FIRST_PLAYER + offset;
            match orchestrator.claim(account, rng.gen()) {
                Ok(result) => {
                    tally.by_tier[result.tier.index()] += 1;
                    tally.by_type[result.reward_type.index()] += 1;
                    match result.payout {
                        Payout::Currency { amount } => {
                            tally.currency_minted = tally.currency_minted.safe_add(amount)?;
                        }
                        Payout::Item { amount, .. } => {
                            tally.items_granted = tally.items_granted.saturating_add(amount);
                        }
                        Payout::GrandPrize { .. } => tally.grand_prizes += 1,
                    }
                    if options.verbose {
                        println!(
                            "  day {day:>3} account {account:>6}: {:?} {:?} {:?}",
                            result.tier, result.reward_type, result.payout
                        );
                    }
                }
                Err(RewardError::ClaimTooSoon { .. }) => tally.cooldown_rejections += 1,
                Err(err) => {
                    warn!(day, account, %err, "claim failed");
                    tally.failures += 1;
                }
            }
        }

        // Half a day later everybody is still cooling down
        clock.advance(CLAIM_COOLDOWN_SECS / 2);
        if matches!(
            orchestrator.claim(FIRST_PLAYER, rng.gen()),
            Err(RewardError::ClaimTooSoon { .. })
        ) {
            tally.cooldown_rejections += 1;
        }

        orchestrator.drain_events();
    }

    orchestrator.checkpoint()?;
    print_report(&tally, table.max_roll(), |tier| {
        let band = table.band(tier);
        band.end - band.start
    });

    println!(
        "│ Vault total supply: {}",
        currency.total_supply()
    );
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    if tally.failures == 0 {
        println!("✓ Every claim resolved");
    } else {
        println!("⚠ {} claims failed - check the reward catalog", tally.failures);
    }
    Ok(())
}

fn print_report(tally: &Tally, max_roll: u64, band_width: impl Fn(RarityTier) -> u64) {
    let claims = tally.claims().max(1);

    println!();
    println!("┌─ TIER DISTRIBUTION ──────────────────────────────────────────────┐");
    for tier in RarityTier::ALL {
        let observed = tally.by_tier[tier.index()];
        let expected_bp = band_width(tier) * 10_000 / max_roll.max(1);
        let observed_bp = observed * 10_000 / claims;
        println!(
            "│ {:<10} {:>8} claims  observed {:>3}.{:02}%  expected {:>3}.{:02}%",
            format!("{tier:?}"),
            observed,
            observed_bp / 100,
            observed_bp % 100,
            expected_bp / 100,
            expected_bp % 100,
        );
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    println!();

    println!("┌─ PAYOUTS ────────────────────────────────────────────────────────┐");
    println!("│ Claims:             {}", tally.claims());
    println!(
        "│ Currency / Item:    {} / {}",
        tally.by_type[RewardType::Currency.index()],
        tally.by_type[RewardType::Item.index()]
    );
    println!("│ Currency minted:    {}", tally.currency_minted);
    println!("│ Items granted:      {}", tally.items_granted);
    println!("│ Grand prizes:       {}", tally.grand_prizes);
    println!("│ Cooldown rejects:   {}", tally.cooldown_rejections);
    println!("│ Failed claims:      {}", tally.failures);
}
