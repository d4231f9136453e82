use anyhow::{Context, Result};
use castboard::{build_oracle, spawn_refresh, telemetry, Platform, Settings};
use castboard_core::{
    ActionKind, Clock, Fid, NewAction, NewList, PaymentReceipt, RewardConfig, RewardList, SystemClock,
};
use castboard_verifier::{ActionOracle, VerificationSession};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "castboard")]
#[command(about = "Castboard reward lists and leaderboards", long_about = None)]
struct Cli {
    /// TOML settings file; CASTBOARD__* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed the demo lists and run participants through verification
    Simulate {
        #[arg(long, default_value_t = 5)]
        participants: u32,

        /// Verification cycles to step through (ignored with --live)
        #[arg(long, default_value_t = 10)]
        cycles: u32,

        /// Use a simulated oracle with this success rate
        #[arg(long)]
        success_rate: Option<f64>,

        #[arg(long)]
        seed: Option<u64>,

        /// Run the periodic loops until Ctrl-C instead of stepping
        #[arg(long)]
        live: bool,

        #[arg(long, default_value_t = 10)]
        top: usize,
    },

    /// Activation price of a list
    Quote {
        #[arg(long)]
        days: u32,
    },

    /// Print the effective settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("loading settings")?;
    telemetry::init(&settings.log_filter).map_err(|e| anyhow::anyhow!(e))?;

    match cli.command {
        Commands::Simulate {
            participants,
            cycles,
            success_rate,
            seed,
            live,
            top,
        } => {
            let settings = match success_rate {
                Some(rate) => settings
                    .with_simulated_oracle(rate, seed)
                    .context("--success-rate")?,
                None => settings,
            };
            let oracle: Arc<dyn ActionOracle> = build_oracle(&settings.oracle)?;
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            let platform = Arc::new(Platform::new(settings, oracle, clock)?);

            let lists = seed_demo_lists(&platform)?;
            info!(lists = lists.len(), "Demo lists seeded");

            let sessions: Vec<Arc<VerificationSession>> = (1..=participants)
                .map(|i| {
                    let session = platform.open_session(Fid::new(format!("{}", 1000 + i)), format!("user{i}"));
                    session.join_active_lists();
                    for status in session.statuses() {
                        if let Err(e) = session.start_action(&status.list_id, &status.action_id) {
                            warn!(error = %e, "Could not start action");
                        }
                    }
                    session
                })
                .collect();

            if live {
                run_live(&platform, &sessions, top).await?;
            } else {
                for cycle in 1..=cycles {
                    for session in &sessions {
                        session.run_cycle().await;
                    }
                    info!(cycle, "Cycle complete");
                }
            }

            print_report(&platform, &lists, top)?;
        }
        Commands::Quote { days } => {
            let quote = settings.platform.activation_quote(days)?;
            println!("{}", serde_json::to_string_pretty(&quote)?);
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
    }

    Ok(())
}

async fn run_live(platform: &Arc<Platform>, sessions: &[Arc<VerificationSession>], top: usize) -> Result<()> {
    let refresh = spawn_refresh(platform.clone(), top);
    let mut handles = Vec::with_capacity(sessions.len());

    for session in sessions {
        let mut events = session.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                info!(list_id = %event.list_id(), action_id = %event.action_id(), "{}", event.message());
            }
        });
        handles.push(session.spawn());
    }

    let mut snapshots = refresh.subscribe();
    tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let leader = snapshots.borrow().global.first().cloned();
            if let Some(leader) = leader {
                info!(fid = %leader.fid, points = leader.total_points, "Global leader");
            }
        }
    });

    info!("Running verification loops, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;

    for handle in handles {
        handle.shutdown().await;
    }
    refresh.shutdown().await;
    Ok(())
}

fn print_report(platform: &Platform, lists: &[RewardList], top: usize) -> Result<()> {
    let boards: Vec<_> = lists
        .iter()
        .map(|list| {
            json!({
                "list": list.name,
                "leaderboard": platform.leaderboard().list_leaderboard(&list.id, top),
            })
        })
        .collect();
    let super_admin = platform.admins().super_admin().clone();
    let report = json!({
        "lists": boards,
        "global": platform.leaderboard().global_leaderboard(top),
        "metrics": platform.metrics(&super_admin)?,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// The two showcase lists; they use project tokens, so they go straight to the store.
fn seed_demo_lists(platform: &Platform) -> Result<Vec<RewardList>> {
    let growth = NewList {
        name: "Farcaster Growth Challenge".into(),
        description: "Help grow the Farcaster ecosystem by completing social actions".into(),
        duration_days: 7,
        actions: vec![
            NewAction {
                kind: ActionKind::Cast,
                description: "Share your thoughts about Farcaster".into(),
                points: 50,
                target: None,
            },
            NewAction {
                kind: ActionKind::Follow,
                description: "Follow @farcaster".into(),
                points: 25,
                target: Some("farcaster".into()),
            },
            NewAction {
                kind: ActionKind::Recast,
                description: "Recast the announcement".into(),
                points: 30,
                target: Some("https://warpcast.com/farcaster/0x12345".into()),
            },
        ],
        rewards: vec![
            RewardConfig::token(1, 1000, "CAST"),
            RewardConfig::token(2, 500, "CAST"),
            RewardConfig::nft(3, "Bronze Badge", "https://example.com/nft/bronze"),
        ],
        creator: Fid::from("999"),
        creator_wallet: "0x1234567890123456789012345678901234567890".into(),
        payment: Some(PaymentReceipt {
            transaction_hash: "0xdemo1".into(),
            amount: 14,
        }),
    };
    let builders = NewList {
        name: "Web3 Builders Unite".into(),
        description: "Connect with other Web3 builders and share your projects".into(),
        duration_days: 3,
        actions: vec![
            NewAction {
                kind: ActionKind::Cast,
                description: "Share your latest Web3 project".into(),
                points: 75,
                target: None,
            },
            NewAction {
                kind: ActionKind::Like,
                description: "Like the featured project".into(),
                points: 15,
                target: Some("https://warpcast.com/builder/0x67890".into()),
            },
        ],
        rewards: vec![RewardConfig::token(1, 2000, "BUILD"), RewardConfig::token(2, 1000, "BUILD")],
        creator: Fid::from("888"),
        creator_wallet: "0x9876543210987654321098765432109876543210".into(),
        payment: Some(PaymentReceipt {
            transaction_hash: "0xdemo2".into(),
            amount: 6,
        }),
    };

    [growth, builders]
        .into_iter()
        .map(|spec| platform.store().create_list(spec).map_err(Into::into))
        .collect()
}
