use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use askredis_server::{AskRedis, Config, PermissionByRedis};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

// ── CLI definition ─────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "askredisd",
    about = "askredisd — Redis-backed domain checks for on-demand TLS",
    version
)]
struct Cli {
    /// Log level: error, warn, info, debug, verbose (default: $ASKREDIS_LOG_LEVEL or info)
    #[arg(long, env = "ASKREDIS_LOG_LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Module config file (directive text, or JSON when it ends in .json)
        #[arg(long, env = "ASKREDIS_CONFIG")]
        config: PathBuf,
        /// Port to listen on
        #[arg(long, env = "ASKREDIS_PORT", default_value = "8080")]
        port: u16,
        /// Host to bind
        #[arg(long, env = "ASKREDIS_HOST", default_value = "0.0.0.0")]
        host: String,
    },
    /// Parse and validate a config file without connecting to Redis
    Check {
        #[arg(long, env = "ASKREDIS_CONFIG")]
        config: PathBuf,
    },
    /// Run the configured checks once for a domain and print the outcome
    Lookup {
        #[arg(long, env = "ASKREDIS_CONFIG")]
        config: PathBuf,
        domain: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let raw = cli.log_level.unwrap_or_else(|| "info".into());
    let effective_log_level = if raw.eq_ignore_ascii_case("verbose") {
        "debug".to_owned()
    } else {
        raw
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&effective_log_level))
        .init();

    match cli.command {
        Commands::Serve { config, port, host } => cmd_serve(&config, host, port).await,
        Commands::Check { config } => cmd_check(&config),
        Commands::Lookup { config, domain } => cmd_lookup(&config, &domain).await,
    }
}

// ── Command implementations ───────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<Config> {
    Config::load(path).with_context(|| format!("load config {}", path.display()))
}

async fn cmd_serve(config: &Path, host: String, port: u16) -> Result<()> {
    let cfg = askredis_server::ServerConfig {
        host,
        port,
        config: load_config(config)?,
    };
    askredis_server::run(cfg).await
}

fn cmd_check(config: &Path) -> Result<()> {
    let cfg = load_config(config)?;
    cfg.validate().context("invalid config")?;

    if let Some(s) = &cfg.ask_redis {
        println!(
            "{}: redis {} db {} set {:?}",
            AskRedis::ID,
            s.address(),
            s.db,
            s.key
        );
    }
    if let Some(s) = &cfg.permission {
        println!(
            "{}: redis {} db {} prefix {:?}",
            PermissionByRedis::ID,
            s.address,
            s.db,
            s.prefix
        );
    }
    println!("config ok");
    Ok(())
}

async fn cmd_lookup(config: &Path, domain: &str) -> Result<()> {
    let cfg = load_config(config)?;
    let state = askredis_server::provision(&cfg).await?;

    let mut denied = false;

    if let Some(m) = &state.ask_redis {
        match m.lookup(domain).await {
            Ok(true) => println!("{}: {domain} is a member", AskRedis::ID),
            Ok(false) => {
                denied = true;
                println!("{}: {domain} is not a member", AskRedis::ID);
            }
            Err(e) => {
                denied = true;
                println!("{}: lookup failed: {e}", AskRedis::ID);
            }
        }
    }
    if let Some(m) = &state.permission {
        match m.certificate_allowed(domain).await {
            Ok(()) => println!(
                "{}: certificate allowed ({})",
                PermissionByRedis::ID,
                m.storage_key(domain)
            ),
            Err(e) => {
                denied = true;
                println!("{}: {e}", PermissionByRedis::ID);
            }
        }
    }

    askredis_server::server::cleanup(&state).await;

    if denied {
        anyhow::bail!("{domain} was not allowed by every configured module");
    }
    Ok(())
}
