mod console;
mod render;
mod tone;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use nexus_core::{AudioScheduler, Coordinator, Emotion, Submission};
use nexus_link::{ConsoleConfig, Gateway};

use crate::console::WatchOptions;

#[derive(Parser)]
#[command(name = "nexus", about = "Live operator console for the cognitive backend")]
struct Cli {
    /// TOML config file (NEXUS_* environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose debug output
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the live console, reading queries and :commands from stdin
    Watch {
        /// Do not open the live stream channel
        #[arg(long)]
        no_stream: bool,

        /// Silence audio cues
        #[arg(long)]
        no_audio: bool,
    },

    /// Submit one query and print the resulting display state
    Query {
        /// Query text
        text: String,

        /// Emotional context: focused, curious, stressed or calm
        #[arg(long, default_value = "focused")]
        emotion: Emotion,

        /// Goal sent with the query
        #[arg(long, default_value = "")]
        goal: String,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check backend health
    Health {
        #[arg(long)]
        json: bool,
    },

    /// Show backend statistics
    Stats {
        #[arg(long)]
        json: bool,
    },

    /// List the processing-unit catalog
    Units,
}

fn load_config(cli: &Cli) -> Result<ConsoleConfig> {
    ConsoleConfig::load(cli.config.as_deref()).context("failed to load configuration")
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Commands::Watch {
            no_stream,
            no_audio,
        } => {
            let options = WatchOptions {
                stream: !no_stream,
                audio: !no_audio,
            };
            console::run(load_config(&cli)?, options).await
        }
        Commands::Query {
            text,
            emotion,
            goal,
            json,
        } => cmd_query(&cli, text, *emotion, goal, *json).await,
        Commands::Health { json } => cmd_health(&cli, *json).await,
        Commands::Stats { json } => cmd_stats(&cli, *json).await,
        Commands::Units => {
            print!("{}", render::units());
            Ok(())
        }
    }
}

async fn cmd_query(cli: &Cli, text: &str, emotion: Emotion, goal: &str, json: bool) -> Result<()> {
    let config = load_config(cli)?;
    let gateway = Gateway::from_config(&config).context("failed to create gateway")?;
    let mut coordinator = Coordinator::new(config.coordinator(), AudioScheduler::silent());

    let submission = Submission::new(text).with_emotion(emotion).with_goal(goal);
    let Some(pending) = coordinator.begin(Duration::ZERO, &submission) else {
        bail!("query must not be empty");
    };

    let response = gateway
        .submit_query(&pending.request)
        .await
        .context("query failed")?;
    coordinator.complete(Duration::ZERO, pending.ticket, Ok(response));

    let snapshot = coordinator.snapshot();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&snapshot).context("failed to serialize snapshot")?
        );
    } else {
        print!("{}", render::snapshot(&snapshot, None));
    }
    Ok(())
}

async fn cmd_health(cli: &Cli, json: bool) -> Result<()> {
    let config = load_config(cli)?;
    let gateway = Gateway::from_config(&config).context("failed to create gateway")?;
    let health = gateway.health().await.context("health check failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&health)?);
    } else {
        print!("{}", render::health(&health));
    }
    if !health.is_healthy() {
        tracing::warn!(status = %health.status, "backend reports unhealthy");
    }
    Ok(())
}

async fn cmd_stats(cli: &Cli, json: bool) -> Result<()> {
    let config = load_config(cli)?;
    let gateway = Gateway::from_config(&config).context("failed to create gateway")?;
    let stats = gateway.stats().await.context("failed to fetch stats")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        print!("{}", render::stats(&stats));
    }
    Ok(())
}
