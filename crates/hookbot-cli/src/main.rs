mod hooks;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use hookbot_config::BotConfig;
use hookbot_hooks::{HookManager, MemoryRegistry};

#[derive(Parser)]
#[command(name = "hookbot", about = "IRC bot driven by message hooks")]
struct Cli {
    /// Config file (defaults to ~/.hookbot/config.json5)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the IRC server and serve hooks
    Run {
        /// Server host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,

        /// Nickname (overrides config)
        #[arg(short, long)]
        nick: Option<String>,
    },
    /// Validate the configured hooks without connecting
    Check,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<BotConfig> {
    let config = match path {
        Some(path) => hookbot_config::load_config_from(path),
        None => hookbot_config::load_config(),
    };
    config.context("failed to load config")
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref())?;

    let rt = tokio::runtime::Runtime::new()?;
    match cli.command {
        Commands::Run { host, port, nick } => {
            if let Some(host) = host {
                config.irc.host = host;
            }
            if let Some(port) = port {
                config.irc.port = port;
            }
            if let Some(nick) = nick {
                config.irc.nickname = nick;
            }
            rt.block_on(run(config))?;
        }
        Commands::Check => {
            let ids = rt.block_on(async {
                let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
                hooks::register_configured_hooks(&manager, &config.hooks).await
            })?;
            println!("hookbot config is valid");
            println!("  server: {}:{}", config.irc.host, config.irc.port);
            println!("  nickname: {}", config.irc.nickname);
            println!("  hooks: {}", ids.join(", "));
        }
    }

    Ok(())
}

async fn run(config: BotConfig) -> anyhow::Result<()> {
    let manager = HookManager::start(Arc::new(MemoryRegistry::new()));
    let ids = hooks::register_configured_hooks(&manager, &config.hooks).await?;
    info!(hooks = ?ids, "Hooks registered");

    let cancel = CancellationToken::new();
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutting down");
            ctrl_c_cancel.cancel();
        }
    });

    hookbot_irc::run_client(config.irc, manager, cancel).await
}
