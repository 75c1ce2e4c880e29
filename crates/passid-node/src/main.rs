//! Passid node entry point.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use passid_node::{IdentityProviderNode, NodeConfig, PgClaimStore};

/// Passid identity provider
#[derive(Parser, Debug)]
#[command(name = "passid-node", version, about = "Passport-backed identity provider")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "passid.toml", global = true)]
    config: PathBuf,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API.
    Run {
        /// Override the API port.
        #[arg(long)]
        api_port: Option<u16>,
    },
    /// Write a default config file and exit.
    Init,
    /// Apply or revert database migrations.
    Migrate {
        #[command(subcommand)]
        direction: MigrateDirection,
    },
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum MigrateDirection {
    Up,
    Down,
}

fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = NodeConfig::load(&args.config)?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    init_tracing(&config.logging.level, &config.logging.format);

    match args.command {
        Command::Init => {
            NodeConfig::default().save(&args.config)?;
            tracing::info!(path = %args.config.display(), "wrote default config");
        }
        Command::Migrate { direction } => {
            anyhow::ensure!(
                !config.database.url.is_empty(),
                "database.url is required for migrations"
            );
            let store = PgClaimStore::connect(
                &config.database.url,
                1,
                std::time::Duration::from_secs(config.database.acquire_timeout_secs),
            )
            .await?;
            match direction {
                MigrateDirection::Up => store.migrate_up().await?,
                MigrateDirection::Down => store.migrate_down().await?,
            }
        }
        Command::Run { api_port } => {
            if let Some(port) = api_port {
                config.api.port = port;
            }
            tracing::info!("Passid node v{}", env!("CARGO_PKG_VERSION"));

            let node = IdentityProviderNode::build(config).await?;
            let shutdown = async {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => tracing::info!("received shutdown signal"),
                    Err(e) => {
                        tracing::error!(error = %e, "failed to listen for ctrl-c");
                        std::future::pending::<()>().await
                    }
                }
            };
            node.run(shutdown).await?;
            tracing::info!("Passid node exited cleanly");
        }
    }
    Ok(())
}
