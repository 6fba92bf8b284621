//! jobpilot - Telegram job digest and cover letter assistant
//!
//! Runs the Telegram bot with its daily job digest, or a single digest pass
//! from the command line.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobpilot::{
    channels::{ChannelAdapter, RecordingAdapter, TelegramAdapter},
    config::{resolve_credential, JobPilotConfig},
    gateway::{ApiHandler, Gateway, GatewayBuilder},
    generation::AnthropicGenerator,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "jobpilot")]
#[command(version)]
#[command(about = "Telegram job digest and cover letter assistant")]
struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "JOBPILOT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Override the daily digest hour (UTC)
    #[arg(long, env = "DAILY_HOUR")]
    digest_hour: Option<u8>,

    /// Override the daily digest minute
    #[arg(long, env = "DAILY_MINUTE")]
    digest_minute: Option<u8>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the bot and the daily digest until Ctrl+C
    Run,

    /// Run one digest pass now
    Digest {
        /// Print the notices instead of sending them
        #[arg(long)]
        dry_run: bool,
    },

    /// Show configuration
    Config {
        /// Show default configuration
        #[arg(long)]
        default: bool,
    },

    /// Run diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("jobpilot={}", log_level).into());
    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // Load configuration
    let mut config = match &cli.config {
        Some(path) => JobPilotConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => JobPilotConfig::default(),
    };
    if let Some(hour) = cli.digest_hour {
        config.digest.hour = hour;
    }
    if let Some(minute) = cli.digest_minute {
        config.digest.minute = minute;
    }
    config.validate()?;

    match cli.command {
        Commands::Run => run_gateway(config).await?,
        Commands::Digest { dry_run } => run_digest(config, dry_run).await?,
        Commands::Config { default } => {
            show_config(if default { None } else { Some(&config) })?;
        }
        Commands::Doctor => run_doctor(&config)?,
    }

    Ok(())
}

async fn run_gateway(config: JobPilotConfig) -> Result<()> {
    let api = config.api.clone();
    let gateway = Arc::new(GatewayBuilder::new().config(config).build().await?);

    gateway.start().await?;

    let server = if api.enabled {
        let addr = format!("{}:{}", api.host, api.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("binding control API to {}", addr))?;
        tracing::info!("Control API listening on http://{}", addr);
        let router = ApiHandler::router(gateway.clone());
        Some(tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router).await {
                tracing::error!("Control API stopped: {}", e);
            }
        }))
    } else {
        None
    };

    tracing::info!("jobpilot is running. Press Ctrl+C to stop.");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down...");
    if let Some(server) = server {
        server.abort();
    }
    gateway.stop().await?;

    Ok(())
}

async fn run_digest(mut config: JobPilotConfig, dry_run: bool) -> Result<()> {
    // outbound only, updates stay queued for the running bot
    config.telegram.long_polling = false;

    let channel: Arc<dyn ChannelAdapter> = if dry_run {
        Arc::new(RecordingAdapter::new().echo())
    } else {
        let token = resolve_credential(&config.telegram.bot_token_ref)?;
        Arc::new(TelegramAdapter::new(config.telegram.clone()).with_token(token))
    };

    // digest passes never generate letters
    let generator = AnthropicGenerator::new(config.generation.clone()).unwrap_or_else(|_| {
        AnthropicGenerator::with_api_key(config.generation.clone(), String::new())
    });

    let gateway: Gateway = GatewayBuilder::new()
        .config(config)
        .channel(channel)
        .generator(Arc::new(generator))
        .build()
        .await?;

    let report = gateway.run_digest_pass().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

fn run_doctor(config: &JobPilotConfig) -> Result<()> {
    println!("🔍 jobpilot Doctor");
    println!();

    println!("Checking credentials...");
    for (label, var) in [
        ("Telegram bot token", config.telegram.bot_token_ref.as_str()),
        ("Generation API key", config.generation.api_key_ref.as_str()),
    ] {
        match resolve_credential(var) {
            Ok(_) => println!("  ✓ {} found in ${}", label, var),
            Err(_) => println!("  ✗ {} missing (set ${})", label, var),
        }
    }
    if let Some(var) = &config.job_source.api_key_ref {
        match resolve_credential(var) {
            Ok(_) => println!("  ✓ Job source token found in ${}", var),
            Err(_) => println!("  ✗ Job source token missing (set ${})", var),
        }
    }

    println!();
    println!("Checking data directory...");
    let base = &config.storage.base_dir;
    match std::fs::create_dir_all(base) {
        Ok(()) => println!("  ✓ Data directory writable: {}", base.display()),
        Err(e) => println!("  ✗ Data directory {} unusable: {}", base.display(), e),
    }

    println!();
    println!("Endpoints:");
    println!("  Telegram API:  {}", config.telegram.api_base);
    println!("  Job source:    {}", config.job_source.endpoint);
    println!("  Generation:    {} ({})", config.generation.base_url, config.generation.model);
    if config.api.enabled {
        println!("  Control API:   http://{}:{}", config.api.host, config.api.port);
    }

    println!();
    if config.digest.enabled {
        println!(
            "Daily digest at {:02}:{:02} UTC, up to {} postings",
            config.digest.hour, config.digest.minute, config.digest.max_postings
        );
    } else {
        println!("Daily digest disabled");
    }

    println!();
    println!("Doctor check complete!");

    Ok(())
}

fn show_config(config: Option<&JobPilotConfig>) -> Result<()> {
    let config = config.cloned().unwrap_or_default();
    let toml = toml::to_string_pretty(&config)?;
    println!("{}", toml);
    Ok(())
}
