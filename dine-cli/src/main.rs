// ABOUTME: Command-line runner for the dining simulation.
// ABOUTME: Loads the config from file and env, applies flags, then runs until Ctrl-C or a deadline.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use dine::prelude::*;

/// Frame interval used when neither the config nor the flags set one.
const DEFAULT_REPORT_MS: u64 = 200;

/// Dining simulation: N agents sharing N resources around a ring
#[derive(Parser, Debug)]
#[command(name = "dine")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "DINE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Number of agents (and resources) in the ring
    #[arg(short = 'n', long)]
    agents: Option<usize>,

    /// Upper bound of a meal, in milliseconds
    #[arg(long)]
    max_eat_ms: Option<u64>,

    /// Upper bound of a thinking pause, in milliseconds
    #[arg(long)]
    max_think_ms: Option<u64>,

    /// How long a hungry agent waits before backing off, in milliseconds
    #[arg(long)]
    max_wait_ms: Option<u64>,

    /// Time since the last meal after which an agent counts as starving
    #[arg(long)]
    max_idle_ms: Option<u64>,

    /// Fairness monitor period, in milliseconds
    #[arg(long)]
    monitor_tick_ms: Option<u64>,

    /// Fallback retry interval while hungry, in milliseconds
    #[arg(long)]
    retry_ms: Option<u64>,

    /// Status frame interval, in milliseconds
    #[arg(long)]
    report_ms: Option<u64>,

    /// Seed for reproducible pause lengths
    #[arg(long)]
    seed: Option<u64>,

    /// Stop after this many milliseconds instead of waiting for Ctrl-C
    #[arg(short, long)]
    duration_ms: Option<u64>,

    /// Print frames and the summary as JSON
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn build_config(&self) -> Result<SimulationConfig> {
        let mut config = SimulationConfig::load(self.config.as_deref())
            .context("Failed to load configuration")?;

        if let Some(n) = self.agents {
            config.num_agents = n;
        }
        if let Some(ms) = self.max_eat_ms {
            config.max_eat_ms = ms;
        }
        if let Some(ms) = self.max_think_ms {
            config.max_think_ms = ms;
        }
        if let Some(ms) = self.max_wait_ms {
            config.max_wait_ms = ms;
        }
        if let Some(ms) = self.max_idle_ms {
            config.max_idle_ms = ms;
        }
        if let Some(ms) = self.monitor_tick_ms {
            config.monitor_tick_ms = ms;
        }
        if let Some(ms) = self.retry_ms {
            config.retry_ms = ms;
        }
        if self.report_ms.is_some() {
            config.report_ms = self.report_ms;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.report_ms.get_or_insert(DEFAULT_REPORT_MS);

        // Simulation::new validates the merged result
        Ok(config)
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dine=info".into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging();

    let config = cli.build_config()?;
    let sim = Simulation::new(config)?;
    let sim = if cli.json {
        sim.with_reporter(JsonReporter)
    } else {
        sim.with_reporter(ConsoleReporter)
    };

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        let deadline = cli.duration_ms.map(Duration::from_millis);
        tokio::spawn(async move {
            match deadline {
                Some(after) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
                        _ = tokio::time::sleep(after) => {}
                    }
                }
                None => {
                    if tokio::signal::ctrl_c().await.is_ok() {
                        info!("Interrupted");
                    }
                }
            }
            cancel.cancel();
        });
    }

    let summary = sim.run(cancel).await?;

    if cli.json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!("Ran for {:.2?}", summary.elapsed);
    println!("{:<8}{:>8}{:>10}{:>8}", "agent", "meals", "back-offs", "grants");
    for report in &summary.agents {
        println!(
            "{:<8}{:>8}{:>10}{:>8}",
            report.id.to_string(),
            report.meals,
            report.backoffs,
            report.grants
        );
    }
    println!("Total meals: {}", summary.total_meals());

    let starved = summary.starved();
    if !starved.is_empty() {
        let ids: Vec<String> = starved.iter().map(ToString::to_string).collect();
        println!("Never ate: {}", ids.join(", "));
    }
}
