// In app/src/main.rs

use anyhow::{Context, Result};
use app_config::{LiveConfig, Settings};
use chrono::{TimeZone, Utc};
use clap::{Parser, Subcommand};
use core_types::{HistoryFilter, Kline};
use engine::{Engine, LoopReport};
use exchange::{AccountService, ExchangeServices, PositionService, SimulatedExchange};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strategies::Strategy;
use tokio::sync::watch;
use tracing_subscriber::prelude::*;

// --- Command-Line Interface Definition ---

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = "A risk-sized, leveraged signal pipeline.")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replays historical klines through every configured strategy on a paper account.
    Replay {
        /// Directory holding `<BASE><QUOTE>_<interval>.json` kline files.
        #[arg(short, long)]
        data: PathBuf,

        /// The portfolio file listing pairs and their strategies.
        #[arg(long, default_value = "config/live.toml")]
        live_config: PathBuf,

        /// Stop at the first candle closing after this time (epoch milliseconds).
        #[arg(long)]
        end_time: Option<i64>,

        /// Klines per file treated as already-visible history.
        #[arg(long, default_value_t = 50)]
        warmup: usize,
    },

    /// Validates settings and the portfolio file without running anything.
    CheckConfig {
        #[arg(long, default_value = "config/live.toml")]
        live_config: PathBuf,
    },
}

// --- Main Application Entry Point ---

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = app_config::load_settings().context("Failed to load settings")?;
    init_tracing(&settings);
    tracing::info!(environment = %settings.app.environment, "Starting application");

    match cli.command {
        Commands::Replay {
            data,
            live_config,
            end_time,
            warmup,
        } => handle_replay(settings, &data, &live_config, end_time, warmup).await?,
        Commands::CheckConfig { live_config } => handle_check_config(&settings, &live_config)?,
    }

    tracing::info!("Application has finished successfully.");
    Ok(())
}

fn init_tracing(settings: &Settings) {
    let level = settings
        .app
        .log_level
        .parse::<tracing::Level>()
        .unwrap_or(tracing::Level::INFO);
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_filter(tracing_subscriber::filter::Targets::new().with_default(level));
    tracing_subscriber::registry().with(fmt_layer).init();
}

/// Builds the strategies of every enabled pair.
fn build_strategies(live_config: &LiveConfig) -> Result<Vec<Box<dyn Strategy>>> {
    let mut all = Vec::new();
    for pair_config in &live_config.pair_configs {
        let pair = pair_config.trading_pair();
        if !pair_config.enabled {
            tracing::warn!(pair = %pair, "Skipping disabled trading pair.");
            continue;
        }
        let interval = pair_config.interval()?;
        let strategies = strategies::create_strategies(&pair, interval, &pair_config.strategies)
            .with_context(|| format!("Invalid strategies for {pair}"))?;
        if strategies.is_empty() {
            tracing::warn!(pair = %pair, "No strategies configured for pair.");
        }
        all.extend(strategies);
    }
    Ok(all)
}

// --- "Check Config" Subcommand Logic ---

fn handle_check_config(settings: &Settings, live_config_path: &Path) -> Result<()> {
    settings.validate()?;
    tracing::info!(risk = ?settings.risk, "Risk configuration is valid.");

    let live_config = app_config::load_live_config(live_config_path)?;
    let strategies = build_strategies(&live_config)?;
    for strategy in &strategies {
        println!(
            "{:<14} {:<12} {}",
            strategy.name(),
            strategy.trading_pair().to_string(),
            strategy.interval()
        );
    }
    println!("Configuration OK: {} strategies.", strategies.len());
    Ok(())
}

// --- "Replay" Subcommand Logic ---

async fn handle_replay(
    mut settings: Settings,
    data_dir: &Path,
    live_config_path: &Path,
    end_time: Option<i64>,
    warmup: usize,
) -> Result<()> {
    settings.validate()?;
    if end_time.is_some() {
        settings.engine.end_time = end_time;
    }

    let live_config = app_config::load_live_config(live_config_path)?;
    let strategies = build_strategies(&live_config)?;

    let exchange = SimulatedExchange::new(settings.simulation.clone());
    for pair_config in live_config.enabled_pairs() {
        let pair = pair_config.trading_pair();
        let interval = pair_config.interval()?;
        let path = data_dir.join(format!("{}_{}.json", pair.symbol(), interval));
        let klines = read_klines(&path)?;
        exchange.load_klines(pair, interval, klines, warmup).await;
    }

    let services = ExchangeServices::from_exchange(Arc::new(exchange.clone()));
    let engine = Engine::from_config(services, settings.risk.clone(), settings.engine.clone())?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, stopping decision loops.");
            let _ = shutdown_tx.send(true);
        }
    });

    let reports = engine.run(strategies, shutdown_rx).await?;
    print_summary(&exchange, &reports).await
}

fn read_klines(path: &Path) -> Result<Vec<Kline>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let klines: Vec<Kline> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse klines in {}", path.display()))?;
    Ok(klines)
}

fn format_time(ms: i64) -> String {
    Utc.timestamp_millis_opt(ms)
        .single()
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ms.to_string())
}

async fn print_summary(exchange: &SimulatedExchange, reports: &[LoopReport]) -> Result<()> {
    println!("\n--- Decision Loops ---");
    for report in reports {
        println!("{report} ({})", format_time(report.last_time));
    }

    let account = exchange.get_account_info().await?;
    let history = exchange.get_history_positions(&HistoryFilter::default()).await?;
    let open = exchange.get_active_positions(&[]).await?;

    println!("\n--- Account ---");
    println!("Total balance:     {:.2}", account.total_balance);
    println!("Available balance: {:.2}", account.available_balance);
    println!("Used margin:       {:.2}", account.used_margin);
    println!("Unrealized PnL:    {:.2}", account.unrealized_pnl);

    println!("\n--- Closed Positions ({}) ---", history.len());
    for record in &history {
        println!(
            "{} {:<5} qty={} entry={} exit={} pnl={:.2} closed={}",
            record.pair,
            record.side,
            record.quantity,
            record.entry_price,
            record.exit_price,
            record.realized_pnl,
            format_time(record.closed_at)
        );
    }

    println!("\n--- Open Positions ({}) ---", open.len());
    for position in &open {
        println!(
            "{} {:<5} qty={} entry={} mark={} {}x pnl={:.2}",
            position.pair,
            position.side,
            position.quantity,
            position.entry_price,
            position.mark_price,
            position.leverage,
            position.unrealized_pnl
        );
    }
    Ok(())
}
