//! SOFIA device CLI
//!
//! Single binary for working with DVR/NVR/IP cameras on the local network:
//! - Discover devices from their broadcast announcements
//! - Log in and query a device
//! - Manage the configuration file

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use sofia_cli::commands::{self, QueryKind};

#[derive(Parser)]
#[command(name = "sofia")]
#[command(author, version, about = "Client for SOFIA network video devices")]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Listen for devices announcing themselves on the network
    Discover {
        /// How long to listen
        #[arg(short, long, default_value_t = 5)]
        seconds: u64,
        /// Bind address (overrides config)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Log in to a device and print one query result as JSON
    Query {
        /// Device hostname or IP address
        host: String,
        /// TCP port (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
        /// Username (overrides config)
        #[arg(short, long)]
        user: Option<String>,
        /// Password (overrides config)
        #[arg(long, env = "SOFIA_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Dial attempts before giving up (overrides config)
        #[arg(long)]
        attempts: Option<u32>,
        /// What to query; defaults to system information
        #[command(subcommand)]
        what: Option<QueryKind>,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show the configuration file
    Show,
    /// Print the configuration file path
    Path,
    /// Write a configuration file with every default
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = match (cli.quiet, cli.verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let config_path = cli.config.as_ref();

    match cli.command {
        Commands::Discover { seconds, bind } => {
            let mut config = commands::load_config_file(config_path)?.discovery;
            if let Some(bind) = bind {
                config.bind_address = bind;
            }
            commands::discover_command(config, seconds).await
        }

        Commands::Query {
            host,
            port,
            user,
            password,
            attempts,
            what,
        } => {
            let mut config = commands::load_config_file(config_path)?.device;
            config.host = host;
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(user) = user {
                config.username = user;
            }
            if let Some(password) = password {
                config.password = password;
            }
            if let Some(attempts) = attempts {
                config.connect_attempts = attempts.max(1);
            }
            commands::query_command(config, what.unwrap_or(QueryKind::Sysinfo)).await
        }

        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_show(config_path),
            ConfigAction::Path => commands::config_path(config_path),
            ConfigAction::Init { force } => commands::config_init(config_path, force),
        },
    }
}
