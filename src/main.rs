use clap::Parser;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kumocrawler::app::AppContext;
use kumocrawler::cli::{commands, Cli, Commands};
use kumocrawler::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the event stream
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if cli.headful {
        config.browser.headless = false;
    }
    if let Some(pace) = cli.pace {
        config.scrape = pace.apply(config.scrape);
    }

    let ctx = AppContext::new(config)?;

    let outcome = match cli.command {
        Commands::Channels { login } => commands::list_channels(&ctx, &login).await,
        Commands::Scrape {
            login,
            channels,
            depth,
        } => commands::scrape(&ctx, &login, channels, depth).await,
        Commands::Export { task_id, output } => {
            commands::export(&ctx, &task_id, output.as_deref()).map(|_| ())
        }
        Commands::Results => commands::list_results(&ctx),
        Commands::Delete { task_id } => commands::delete(&ctx, &task_id),
    };

    if let Err(e) = ctx.shutdown().await {
        warn!("Error closing browser: {}", e);
    }

    outcome?;
    Ok(())
}
