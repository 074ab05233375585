// crates/indexer/src/main.rs
//! The `dex` binary.
//!
//! `dex run` (the default) boots the orchestrator and drives one session to
//! completion. `dex seed <file>` loads clone URLs into the catalog.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use dex_db::Database;
use dex_indexer::{orchestrator, BootFailure, Config};

#[derive(Parser)]
#[command(name = "dex", version, about = "Repository indexing pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run one full indexing session (the default).
    Run,
    /// Load clone URLs into the catalog, one per line.
    Seed {
        /// File of clone URLs; blank lines and `#` comments are skipped.
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env();

    let result = match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(&config).await,
        Command::Seed { file } => seed(&config, &file).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Some(boot) = err.downcast_ref::<BootFailure>() {
                error!("{boot}");
            } else {
                error!("{err:#}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(config: &Config) -> anyhow::Result<()> {
    banner(config);
    let summary = orchestrator::run_session(config).await?;

    for repo in &summary.reported {
        warn!(repo_id = repo.id, comment = %repo.comment, "on report");
    }
    info!(
        session = summary.session_id,
        total = summary.total,
        feed = summary.feed,
        reported = summary.reported.len(),
        "session complete"
    );
    Ok(())
}

async fn seed(config: &Config, file: &PathBuf) -> anyhow::Result<()> {
    let db = Database::new(&config.catalog_path()).await?;
    let raw = tokio::fs::read_to_string(file).await?;

    let mut inserted = 0;
    for line in raw.lines() {
        let url = line.trim();
        if url.is_empty() || url.starts_with('#') {
            continue;
        }
        db.insert_repository(url, 0.0).await?;
        inserted += 1;
    }

    info!(inserted, catalog = %config.catalog_path().display(), "catalog seeded");
    Ok(())
}

fn banner(config: &Config) {
    println!(
        r#"
        .'   .;.    _
   .-..'  .-.   `.,' '      dex repository indexer
  :   ; .;.-'   ,'`.        data: {}
  `:::'`.`:::'-'    `._.    work: {}
"#,
        config.data_dir.display(),
        config.workdir.display(),
    );
}
