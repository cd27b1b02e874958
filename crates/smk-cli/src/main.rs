use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::Action;

#[derive(Parser)]
#[command(name = "smk")]
#[command(about = "Schema migration kit", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (later overrides earlier)
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    /// Database URL. Falls back to the env var named by `database.url_env`.
    #[arg(long = "database-url", global = true)]
    database_url: Option<String>,

    /// Migrations directory. Overrides `migrations.dir`.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every pending migration
    Up {
        /// Print what would run without touching the database
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Revert the most recently applied migrations
    Down {
        /// Number of migrations to revert (negative => all)
        #[arg(long, default_value_t = 1, allow_negative_numbers = true, conflicts_with = "all")]
        steps: i64,

        /// Revert everything applied
        #[arg(long, default_value_t = false)]
        all: bool,

        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// Apply or revert until VERSION is the current version
    To {
        version: String,

        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },

    /// List catalog entries and whether each is applied
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let cli = Cli::parse();

    let path_refs: Vec<&str> = cli.config_paths.iter().map(|s| s.as_str()).collect();
    let config = smk_config::load_layered_yaml(&path_refs)?;

    let action = match cli.cmd {
        Commands::Up { dry_run } => Action::Up { dry_run },
        Commands::Down {
            steps,
            all,
            dry_run,
        } => Action::Down {
            steps: if all { -1 } else { steps },
            dry_run,
        },
        Commands::To { version, dry_run } => Action::To { version, dry_run },
        Commands::Status => Action::Status,
    };

    let url = match cli.database_url {
        Some(url) => url,
        None => smk_db::url_from_env(&config.database.url_env)
            .context("no database url: pass --database-url or set the configured env var")?,
    };
    let dir = cli
        .dir
        .unwrap_or_else(|| config.migrations.dir.clone());

    commands::dispatch(&url, dir, &config, action).await
}

fn init_tracing() {
    // stdout carries result lines only.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
