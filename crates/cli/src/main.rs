mod config_commands;
mod echo;
mod run_commands;
mod sender;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    relaybot_config::{Settings, discover_settings, load_settings},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "relaybot", about = "relaybot: message pipeline for chat bots")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Settings file (TOML, YAML or JSON).
    #[arg(long, global = true, env = "RELAYBOT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Read JSON messages from stdin, one per line, and run them through the
    /// bot (default when no subcommand is provided).
    Run,
    /// Configuration inspection.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli, settings: &Settings) {
    let level = cli.log_level.as_deref().unwrap_or(&settings.log.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);

    // stdout carries outgoing messages, so logs go to stderr.
    if cli.json_logs || settings.log.json {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

fn load(cli: &Cli) -> anyhow::Result<Settings> {
    let settings = match &cli.config {
        Some(path) => load_settings(path)?,
        None => discover_settings()?,
    };
    Ok(settings)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let settings = load(&cli)?;

    init_telemetry(&cli, &settings);

    info!(version = env!("CARGO_PKG_VERSION"), "relaybot starting");

    match cli.command {
        None | Some(Commands::Run) => run_commands::handle_run(settings).await,
        Some(Commands::Config { action }) => config_commands::handle_config(action, settings),
    }
}
