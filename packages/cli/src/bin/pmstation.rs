// ABOUTME: Entry point for the pmstation binary
// ABOUTME: Parses the command line, installs logging and starts the HTTP server

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pmstation_cli::{run_server, Config};

#[derive(Parser)]
#[command(name = "pmstation")]
#[command(about = "PMStation - from idea to PRD, demo and test cases")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server
    Serve {
        /// Port to listen on (overrides PORT)
        #[arg(long)]
        port: Option<u16>,
        /// SQLite database file (overrides PMSTATION_DATABASE_PATH)
        #[arg(long)]
        database: Option<PathBuf>,
        /// Prompt override directory (overrides PMSTATION_PROMPTS_DIR)
        #[arg(long)]
        prompts: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            port,
            database,
            prompts,
        } => {
            let config = Config::from_env()?.with_overrides(port, database, prompts);
            run_server(config).await
        }
    }
}
