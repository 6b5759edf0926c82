use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{Table, presets::UTF8_FULL};
use configuration::{ProviderSource, Settings};
use core_types::{CoinId, SkippedCoin};
use engine::{BetaReport, CorrelationEngine, MatrixReport, RollingReport};
use std::path::PathBuf;

/// The entry point for the correlation analytics service.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; everything has a default.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut settings = configuration::load_config(cli.config.as_deref())
        .context("failed to load configuration")?;
    if !cli.sources.is_empty() {
        settings.provider.sources = cli.sources;
    }
    // Keeps the file writer flushing until exit.
    let _guard = configuration::init_tracing(&settings.logging)?;

    match cli.command {
        Commands::Serve => web_server::run_server(&settings).await,
        Commands::Matrix(args) => handle_matrix(args, &settings).await,
        Commands::Rolling(args) => handle_rolling(args, &settings).await,
        Commands::Beta(args) => handle_beta(args, &settings).await,
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Correlation, rolling correlation and beta for crypto assets.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a TOML config file. Defaults to ./config.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Market data sources in fallback order, overriding the config.
    #[arg(long, global = true, value_enum, value_delimiter = ',')]
    sources: Vec<ProviderSource>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API.
    Serve,
    /// Print the correlation matrix of a set of coins.
    Matrix(MatrixArgs),
    /// Print the rolling correlation of two coins.
    Rolling(RollingArgs),
    /// Print the betas of a set of coins against a benchmark.
    Beta(BetaArgs),
}

#[derive(Parser)]
struct MatrixArgs {
    /// Comma-separated coin ids (e.g., "bitcoin,ethereum,solana").
    #[arg(long)]
    coins: Option<String>,

    /// Lookback in days.
    #[arg(long)]
    days: Option<u32>,
}

#[derive(Parser)]
struct RollingArgs {
    #[arg(long, default_value = "ethereum")]
    coin_a: String,

    #[arg(long, default_value = "bitcoin")]
    coin_b: String,

    #[arg(long)]
    days: Option<u32>,

    /// Window length in return observations.
    #[arg(long)]
    window: Option<usize>,
}

#[derive(Parser)]
struct BetaArgs {
    #[arg(long)]
    coins: Option<String>,

    #[arg(long)]
    days: Option<u32>,

    /// Reference coin. Defaults to the configured benchmark.
    #[arg(long)]
    benchmark: Option<String>,
}

// ==============================================================================
// One-shot commands
// ==============================================================================

fn coin_list(raw: Option<&str>, defaults: &[String]) -> anyhow::Result<Vec<CoinId>> {
    let csv = match raw {
        Some(csv) => csv.to_string(),
        None => defaults.join(","),
    };
    Ok(CoinId::parse_list(&csv)?)
}

async fn handle_matrix(args: MatrixArgs, settings: &Settings) -> anyhow::Result<()> {
    let engine = CorrelationEngine::from_settings(settings)?;
    let coins = coin_list(args.coins.as_deref(), &settings.analytics.default_coins)?;
    let days = args.days.unwrap_or(settings.analytics.default_days);

    let report = engine.correlation_matrix(&coins, days).await?;
    println!("{}", matrix_table(&report));
    print_skipped(&report.skipped);
    Ok(())
}

async fn handle_rolling(args: RollingArgs, settings: &Settings) -> anyhow::Result<()> {
    let engine = CorrelationEngine::from_settings(settings)?;
    let coin_a = CoinId::parse(&args.coin_a)?;
    let coin_b = CoinId::parse(&args.coin_b)?;
    let days = args.days.unwrap_or(settings.analytics.default_days);
    let window = args.window.unwrap_or(settings.analytics.default_window);

    let report = engine
        .rolling_correlation(&coin_a, &coin_b, days, window)
        .await?;
    println!("{}", rolling_table(&report));
    Ok(())
}

async fn handle_beta(args: BetaArgs, settings: &Settings) -> anyhow::Result<()> {
    let engine = CorrelationEngine::from_settings(settings)?;
    let coins = coin_list(args.coins.as_deref(), &settings.analytics.default_beta_coins)?;
    let days = args.days.unwrap_or(settings.analytics.default_days);
    let benchmark = args.benchmark.as_deref().map(CoinId::parse).transpose()?;

    let report = engine.beta(&coins, days, benchmark.as_ref()).await?;
    println!("Benchmark: {} over {} days", report.benchmark, report.days);
    println!("{}", beta_table(&report));
    print_skipped(&report.skipped);
    Ok(())
}

// ==============================================================================
// Rendering
// ==============================================================================

fn cell(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.4}"),
        None => "insufficient data".to_string(),
    }
}

fn matrix_table(report: &MatrixReport) -> Table {
    let coins: Vec<&CoinId> = report.matrix.coins().collect();

    let mut header = vec![format!("{}d", report.days)];
    header.extend(coins.iter().map(|c| c.to_string()));

    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(header);
    for (coin, row) in report.matrix.rows() {
        let mut cells = vec![coin.to_string()];
        cells.extend(row.values().map(|v| cell(*v)));
        table.add_row(cells);
    }
    table
}

fn rolling_table(report: &RollingReport) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "date".to_string(),
        format!("{} / {} (window {})", report.coin_a, report.coin_b, report.window),
    ]);
    for point in &report.series {
        table.add_row(vec![point.date.to_string(), cell(point.correlation)]);
    }
    table
}

fn beta_table(report: &BetaReport) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_header(vec!["coin", "beta", "correlation"]);
    for (coin, estimate) in &report.results {
        table.add_row(vec![
            coin.to_string(),
            cell(estimate.beta),
            cell(estimate.correlation),
        ]);
    }
    table
}

fn print_skipped(skipped: &[SkippedCoin]) {
    if skipped.is_empty() {
        return;
    }
    println!("Skipped:");
    for skip in skipped {
        println!("  {:<20} {}", skip.coin.as_str(), skip.reason.describe());
    }
}
