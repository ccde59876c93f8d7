use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tower_lsp::{LspService, Server};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hassle::cli::run_check;
use hassle::server::Backend;

#[derive(Parser)]
#[command(name = "hassle")]
#[command(about = "Language server for Home Assistant YAML configuration", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the language server over stdio (the default)
    Serve,
    /// Discover a configuration folder and report every file's validity
    Check {
        /// Folder holding configuration.yaml, or a parent of it
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout carries the LSP traffic, so logs go to stderr
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("hassle={log_level}"))),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            tracing::info!("hassle v{}", env!("CARGO_PKG_VERSION"));
            let stdin = tokio::io::stdin();
            let stdout = tokio::io::stdout();

            let (service, socket) = LspService::new(Backend::new);
            Server::new(stdin, stdout, socket).serve(service).await;
            Ok(())
        }
        Commands::Check { dir, json } => run_check(&dir, json).await,
    }
}
