//! Treasury risk service
//!
//! Scores macro and crypto risk from Polymarket and recommends a
//! base / growth chain allocation.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use treasury_risk::client::GammaClient;
use treasury_risk::risk::RiskCalculator;
use treasury_risk::{api, config::Config, service::RiskService, types::MarketStatus};

#[derive(Parser)]
#[command(name = "treasury-risk")]
#[command(about = "Prediction-market risk score and treasury allocation service")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the risk API
    Serve {
        /// Listen address, overrides [server] host/port
        #[arg(long)]
        addr: Option<String>,
    },
    /// Compute the risk summary once and print it as JSON
    Summary {
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
    /// Show configured markets with their current readings
    Markets,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Serve { addr } => serve(config, addr).await,
        Commands::Summary { pretty } => show_summary(config, pretty).await,
        Commands::Markets => show_markets(config).await,
    }
}

async fn serve(config: Config, addr: Option<String>) -> anyhow::Result<()> {
    let addr = addr.unwrap_or_else(|| config.server.addr());
    let service = Arc::new(RiskService::from_config(&config)?);

    api::start_server(service, &addr).await?;
    Ok(())
}

async fn show_summary(config: Config, pretty: bool) -> anyhow::Result<()> {
    let service = RiskService::from_config(&config)?;
    let summary = service.current_summary().await;

    let json = if pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{}", json);
    Ok(())
}

async fn show_markets(config: Config) -> anyhow::Result<()> {
    let client = GammaClient::new(&config.gamma)?;
    let calculator = RiskCalculator::from_config(Arc::new(client), &config);

    println!("\n📊 Risk markets (weights sum to {})\n", config.weight_sum());
    println!(
        "{:<20} {:>6}  {:>8}  {:>8}  {:<8} {}",
        "KEY", "WEIGHT", "READING", "RISK", "STATUS", "QUESTION"
    );
    println!("{}", "-".repeat(90));

    for market in calculator.markets() {
        let obs = calculator.observe(market).await;
        let status = match obs.status {
            MarketStatus::Active => "active",
            MarketStatus::Closed => "closed",
            MarketStatus::Error => "error",
        };
        println!(
            "{:<20} {:>6.2}  {:>8.3}  {:>8.3}  {:<8} {}",
            obs.key, obs.weight, obs.probability, obs.normalized_risk, status, obs.question
        );
    }

    println!();
    Ok(())
}
