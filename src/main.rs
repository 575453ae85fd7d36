use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cronlogger::config::AppConfig;

#[derive(Parser)]
#[command(
    name = "cronlogger",
    about = "Record the outcome of scheduled jobs and browse the history over HTTP",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the SQLite database file (overrides the config file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Log level or filter directive (overrides the config file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the output piped to stdin, e.g. `job 2>&1 | cronlogger log --app job --code $?`
    Log {
        /// Name of the application the output belongs to
        #[arg(long, default_value = "")]
        app: String,

        /// Exit code of the command
        #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
        code: i32,
    },

    /// Start the HTTP server showing the recorded results
    Serve {
        /// Host name or address to bind
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AppConfig::resolve(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.store.db_path = db;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    cronlogger::telemetry::init(&config.logging);

    match cli.command {
        Commands::Log { app, code } => {
            tracing::debug!(%app, code, "Capturing job output");
            if !cronlogger::log_from_stdin(&config, &app, code)? {
                tracing::debug!(%app, "Nothing captured");
            }
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            tracing::info!(bind = %config.server.bind_address(), "Starting cronlogger server");
            cronlogger::serve(config).await?;
        }
    }

    Ok(())
}
