pub mod commands;
pub mod menu;

use anyhow::Result;
use clap::{Parser, Subcommand};
use qa_serve::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "qa-serve")]
#[command(about = "Pick a code-review model for this GPU and serve it with vLLM", long_about = None)]
struct Cli {
    /// JSON config file (QA_* environment variables override it)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect the GPU and show which models it can serve
    Detect {
        /// Print the launch plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// List every model in the catalog
    Models,
    /// Show model recommendations for given or detected hardware
    Recommend {
        /// GPU memory in MiB (optional, will auto-detect if not provided)
        #[arg(long)]
        memory_mib: Option<u64>,
        /// GPU name used for the architecture check with --memory-mib
        #[arg(long, requires = "memory_mib")]
        name: Option<String>,
    },
    /// Select a model, download it if needed and start the server
    Serve {
        /// Model id from the catalog (skips the interactive menu)
        #[arg(long)]
        model: Option<String>,
        /// Take the recommended model without asking
        #[arg(long, short = 'y')]
        yes: bool,
        /// Print the server command instead of running it
        #[arg(long)]
        dry_run: bool,
        /// Do not download missing weights
        #[arg(long)]
        skip_download: bool,
    },
    /// Check whether the server is up and which model it serves
    Status {
        /// API base URL (defaults to the configured host and port)
        #[arg(long)]
        url: Option<String>,
        /// Keep polling for up to this many seconds
        #[arg(long)]
        wait: Option<u64>,
        /// Ask the model to review a snippet with a known SQL injection
        #[arg(long)]
        smoke: bool,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Detect { json } => commands::detect(json),
        Commands::Models => commands::models(),
        Commands::Recommend { memory_mib, name } => commands::recommend(memory_mib, name),
        Commands::Serve {
            model,
            yes,
            dry_run,
            skip_download,
        } => commands::serve(&config, model, yes, dry_run, skip_download),
        Commands::Status { url, wait, smoke } => commands::status(&config, url, wait, smoke),
    }
}
