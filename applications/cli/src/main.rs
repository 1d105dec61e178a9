/// Muman - local music library indexer and deduplicator
use clap::{ArgAction, Parser, Subcommand};
use muman_cli::{App, DupesAction, FsRemover, MumanConfig};
use muman_core::ResolutionPolicy;
use std::io::Write;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "muman")]
#[command(about = "Index a local music library and find duplicate tracks", long_about = None)]
struct Cli {
    /// Configuration file path (default: ./muman.toml if present)
    #[arg(short, long, global = true, env = "MUMAN_CONFIG")]
    config: Option<PathBuf>,

    /// Index database URL, overriding the configuration
    #[arg(long, global = true)]
    database: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan directories and bring the index up to date
    Scan {
        /// Directories to scan (default: library.roots)
        roots: Vec<PathBuf>,
        /// Re-read files even when their size and mtime are unchanged
        #[arg(long)]
        force: bool,
    },
    /// List duplicate tracks and optionally remove the extra copies
    Dupes {
        /// keep-newest-path, keep-shortest-path or report-only
        #[arg(short, long)]
        policy: Option<ResolutionPolicy>,
        /// Delete the files proposed for removal
        #[arg(long)]
        apply: bool,
        /// With --apply, replace each copy with a hard link to the kept file
        /// instead of deleting it
        #[arg(long, requires = "apply")]
        hard_link: bool,
    },
    /// Show what the index knows about a file
    Show {
        /// File path
        path: PathBuf,
    },
    /// Show index totals and last scan per root
    Status {
        /// Roots to report on (default: library.roots)
        roots: Vec<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = match cli.verbose {
        0 => "muman=info",
        1 => "muman=debug",
        _ => "muman=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = MumanConfig::load(cli.config.as_deref())?;
    if let Some(database) = cli.database {
        config.storage.database_url = database;
    }
    let app = App::open(config).await?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Scan { roots, force } => {
            let cancel = CancellationToken::new();
            let on_signal = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Interrupted; finishing files in flight");
                    on_signal.cancel();
                }
            });
            app.scan(&roots, force, cancel, &mut out).await?;
        }
        Commands::Dupes {
            policy,
            apply,
            hard_link,
        } => {
            let action = match (apply, hard_link) {
                (false, _) => DupesAction::Report,
                (true, false) => DupesAction::Remove,
                (true, true) => DupesAction::HardLink,
            };
            let remover = FsRemover::new(app.config.library.clone());
            app.dupes(policy, action, &remover, &mut out).await?;
        }
        Commands::Show { path } => {
            if !app.show(&path, &mut out).await? {
                out.flush()?;
                std::process::exit(1);
            }
        }
        Commands::Status { roots } => {
            app.status(&roots, &mut out).await?;
        }
    }

    out.flush()?;
    Ok(())
}
