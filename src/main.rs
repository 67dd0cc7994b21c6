use chrono::Utc;
use clap::Parser;
use hustler::cli::commands::{Cli, Commands};
use hustler::config::Config;
use hustler::domain::entities::position::PositionStatus;
use hustler::domain::ports::trade_store::PositionFilter;
use hustler::domain::values::price_series::PriceSeries;
use hustler::Hustler;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut config = match Config::resolve(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading config: {e}");
            std::process::exit(1);
        }
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    let level = match config.tracing_level() {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Warning: could not install logger: {e}");
    }

    if let Err(e) = run_command(config, cli.command).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run_command(config: Config, cmd: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match cmd {
        Commands::CheckConfig => {
            config.validate()?;
            println!("{}", config.to_toml()?);
        }
        Commands::InitConfig => {
            println!("{}", Config::default().to_toml()?);
        }
        Commands::Analyze { json } => {
            let series: PriceSeries = serde_json::from_str(&json)?;
            let hustler = Hustler::new(config)?;
            let analysis = hustler.analyze(&series, Utc::now())?;
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
        Commands::Tick => {
            let hustler = Hustler::new(config)?;
            let report = hustler.tick(Utc::now()).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Positions { open, instrument, since, limit } => {
            let hustler = Hustler::new(config)?;
            let filter = PositionFilter {
                instrument,
                status: open.then_some(PositionStatus::Open),
                since,
                limit: Some(limit),
            };
            let positions = hustler.positions(&filter)?;
            println!("{}", serde_json::to_string_pretty(&positions)?);
        }
        Commands::Signals { instrument, limit } => {
            let hustler = Hustler::new(config)?;
            let signals = hustler.signals(instrument.as_deref(), Some(limit))?;
            println!("{}", serde_json::to_string_pretty(&signals)?);
        }
        Commands::Run => {
            let hustler = Hustler::new(config)?;
            let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("shutdown requested, finishing current tick");
                    let _ = stop_tx.send(true);
                }
            });
            hustler.run(stop_rx).await;
            let metrics = hustler.metrics();
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
    }
    Ok(())
}
