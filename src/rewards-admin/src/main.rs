//! Rewards Admin CLI: inspect and drive a device's rewards state on disk.
//!
//! Developer tooling: exercises the same engine the app embeds, against a
//! file-backed store.

use clap::{Parser, Subcommand};
use rewards_core::config::AppConfig;
use rewards_core::loyalty::{MissingPointsClaim, RedeemOutcome, MILESTONES};
use rewards_core::SystemClock;
use rewards_loyalty::RewardsEngine;
use rewards_store::FileStore;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "rewards-admin")]
#[command(about = "Rewards state inspection and developer tooling")]
#[command(version)]
struct Cli {
    /// Store file (overrides config)
    #[arg(long, env = "REWARDS__STORE__PATH")]
    store: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show points, tier, cycle, and redeemable rewards
    Show,

    /// Record a completed purchase
    Spend {
        /// Purchase total in currency units
        amount: f64,
    },

    /// Redeem an unlocked milestone
    Redeem {
        /// Milestone threshold, e.g. 50
        points: u32,
    },

    /// Credit a purchase that was missed at checkout
    Claim {
        /// Receipt code
        #[arg(long)]
        code: String,

        /// Purchase amount, e.g. 12.34
        #[arg(long)]
        amount: String,

        /// Purchase date, YYYY-MM-DD
        #[arg(long)]
        date: String,
    },

    /// List the milestone catalog
    Milestones,

    /// Start a fresh cycle now (keeps tier)
    ResetCycle,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rewards_admin=info,rewards_loyalty=info".into()),
        )
        .json()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(path) = cli.store {
        config.store.path = path;
    }
    config.validate()?;

    info!(store = %config.store.path, "Opening rewards store");

    let store = Arc::new(FileStore::open(&config.store.path).await?);
    let engine = RewardsEngine::open(store, Arc::new(SystemClock), &config).await?;

    match cli.command {
        Commands::Show => print_state(&engine).await?,
        Commands::Spend { amount } => match engine.add_spend(amount).await? {
            Some(outcome) => {
                println!("Earned {} points at {}x", outcome.points_earned, outcome.earn_rate);
                if outcome.promoted {
                    println!(
                        "Promoted: {} -> {}",
                        outcome.previous_tier.label(),
                        outcome.tier.label()
                    );
                }
                print_state(&engine).await?;
            }
            None => println!("Ignored: amount must be a positive number"),
        },
        Commands::Redeem { points } => match engine.redeem_milestone(points).await? {
            RedeemOutcome::Redeemed { milestone } => {
                println!("You redeemed: {} ({} pts)", milestone.title, milestone.points)
            }
            RedeemOutcome::UnknownMilestone { points } => println!("{points} is not a milestone"),
            RedeemOutcome::AlreadyRedeemed { points } => {
                println!("Milestone {points} was already redeemed this cycle")
            }
            RedeemOutcome::NotEligible { required, points } => {
                println!("Milestone {required} needs {} more points", required as u64 - points)
            }
        },
        Commands::Claim { code, amount, date } => {
            let receipt = engine
                .claim_missing_points(&MissingPointsClaim {
                    code,
                    amount,
                    purchase_date: date,
                })
                .await?;
            println!(
                "Success! {} points added for ${:.2} from {}.",
                receipt.points_earned, receipt.amount, receipt.purchase_date
            );
        }
        Commands::Milestones => {
            for m in MILESTONES.iter() {
                println!("{:>5} pts  {}", m.points, m.title);
            }
        }
        Commands::ResetCycle => {
            engine.reset_cycle().await?;
            print_state(&engine).await?;
        }
    }

    Ok(())
}

async fn print_state(engine: &RewardsEngine) -> anyhow::Result<()> {
    let state = engine.snapshot().await?;
    let info = state.tier_info();
    let available: Vec<_> = state
        .available_rewards()
        .into_iter()
        .map(|m| serde_json::json!({ "points": m.points, "title": m.title }))
        .collect();

    let view = serde_json::json!({
        "tier": state.tier,
        "label": info.label,
        "blurb": info.blurb,
        "points": state.points,
        "next_tier_at": state.next_tier_threshold(),
        "remaining_to_next_tier": state.remaining_to_next_tier(),
        "tier_progress": state.tier_progress(),
        "anniversary_start": state.anniversary_start,
        "cycle_ends_at": engine.cycle_ends_at().await?,
        "redemptions": state.redemptions,
        "available_rewards": available,
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
