//! Command-line entry point for the devlink device session server.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use devlink_core::config::AppConfig;

/// devlink - device session server for constrained IoT devices.
#[derive(Parser, Debug)]
#[command(name = "devlink")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Path to the configuration file.
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Start the server.
    Serve {
        /// Address to bind to, overrides the configuration.
        #[arg(long)]
        bind: Option<String>,
        /// Data directory, or ":memory:" for volatile stores.
        #[arg(long)]
        data_dir: Option<String>,
    },
    /// Load and validate the configuration, then exit.
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // JSON logs for container environments
    let json_logging = std::env::var("DEVLINK_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(
            "devlink=info,devlink_core=info,devlink_storage=info,devlink_commands=info,devlink_api=info,tower_http=info",
        )
        .add_directive(tracing::Level::WARN.into())
    });

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .compact()
            .init();
    }

    let mut config = AppConfig::load(Some(args.config.as_path()))?;

    match args.command {
        Command::Serve { bind, data_dir } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(data_dir) = data_dir {
                config.storage.data_dir = data_dir;
            }
            devlink_api::run(config).await
        }
        Command::CheckConfig => {
            println!("Configuration OK");
            println!("  bind:               {}", config.server.bind);
            println!("  data dir:           {}", config.storage.data_dir);
            println!("  max downlink bytes: {}", config.message.max_bytes);
            println!("  change initial psk: {}", config.psk.change_initial_psk);
            println!("  decryption keys:    {}", config.psk.decryption.keys.len());
            Ok(())
        }
    }
}
