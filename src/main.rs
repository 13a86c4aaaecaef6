use clap::Parser;
use p2p_rates::cli::{Cli, Commands};
use p2p_rates::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        toml::from_str(include_str!("../config.toml.example")).expect("Invalid default config")
    });

    // Initialize telemetry
    p2p_rates::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!("Starting rate watcher");
            args.execute(&config).await?;
        }
        Commands::Fetch(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Upstream: {} ({} / {})",
                config.upstream.base_url, config.upstream.token_id, config.upstream.currency_id
            );
            println!(
                "  Filter: side={}, size={}, amount>={}, payments={:?}",
                config.upstream.side,
                config.upstream.page_size,
                config.upstream.min_amount,
                config.upstream.payment_methods
            );
            println!("  Refresh: every {} s", config.poll.refresh_interval_secs);
            println!("  Log level: {}", config.telemetry.log_level);
        }
    }

    Ok(())
}
