use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use itertools::Itertools;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pricewatch::{
    config::Config,
    fetch::HttpFetcher,
    history::History,
    notify::Notifier,
    run::Engine,
    sources::catalog,
    Model, Source,
};

#[derive(Debug, Parser)]
#[command(version, about = "Tracks refurbished iPhone prices and alerts on drops")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch current prices, alert on drops and append them to the history
    Run {
        #[arg(long, default_value = "prices.json")]
        history: PathBuf,
        /// Per request timeout
        #[arg(long, default_value_t = 10)]
        timeout_secs: u64,
        /// Minimum gap between two requests to the same source
        #[arg(long, default_value_t = 2500)]
        delay_ms: u64,
        /// Extra attempts for timeouts and server errors
        #[arg(long, default_value_t = 0)]
        retries: u32,
        #[arg(long, value_enum)]
        source: Option<Source>,
        #[arg(long, value_enum)]
        model: Option<Model>,
        /// Don't notify or write the history
        #[arg(long)]
        dry_run: bool,
    },
    /// Print the latest recorded price for each model and source
    Latest {
        #[arg(long, default_value = "prices.json")]
        history: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "pricewatch=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            history,
            timeout_secs,
            delay_ms,
            retries,
            source,
            model,
            dry_run,
        } => {
            let mut config = Config::from_env();
            config.fetch.timeout = Duration::from_secs(timeout_secs);
            config.fetch.delay = Duration::from_millis(delay_ms);
            config.fetch.retries = retries;

            let targets: Vec<_> = catalog()
                .into_iter()
                .filter(|x| source.map_or(true, |s| x.source == s))
                .filter(|x| model.map_or(true, |m| x.model == m))
                .collect();

            let fetcher = HttpFetcher::new(&config.fetch);
            let notifier = Notifier::from_config(&config);
            info!(
                "Checking {} targets, notifying via [{}]",
                targets.len(),
                notifier.channels().join(", ")
            );

            let mut history = History::load(history)?;
            let engine = Engine {
                config: &config,
                fetcher: &fetcher,
                notifier: &notifier,
                dry_run,
            };
            engine.run(&targets, &mut history, Utc::now())?;
        }
        Command::Latest { history } => {
            let history = History::load(history)?;
            for ((model, source), record) in history.latest() {
                println!(
                    "{:<18} {:<28} ${:>9.2}  {}",
                    model.name(),
                    source.name(),
                    record.price.get(),
                    record.timestamp.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }

    Ok(())
}
