//! Libros Reader CLI
//!
//! Manages the local book store from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use libros_reader::document::FallbackMetadata;
use libros_reader::position::{self, Location, PositionPair};
use libros_reader::reconcile::{Decision, Reconciler, SystemClock};
use libros_reader::store::BookStore;
use libros_reader::Config;

#[derive(Parser)]
#[command(author, version, about = "Libros Reader book store", long_about = None)]
struct Cli {
    /// Database URL (overrides READER_DATABASE_URL)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import an EPUB or PDF file
    Import { file: PathBuf },
    /// List books, most recently opened first
    List {
        #[arg(long)]
        json: bool,
    },
    /// Show one book
    Show { id: String },
    /// Record a reading position
    Progress {
        id: String,
        /// Progress in percent
        #[arg(long, conflicts_with = "page")]
        percent: Option<f64>,
        /// Page of a fixed document
        #[arg(long)]
        page: Option<u32>,
        /// Total pages, required with --page
        #[arg(long, requires = "page")]
        total: Option<u32>,
        /// Content token of a flow document
        #[arg(long, conflicts_with = "page")]
        token: Option<String>,
    },
    /// Delete a book
    Delete { id: String },
    /// Library counters
    Stats,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "libros_reader=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(url) = cli.database {
        config.database.url = url;
    }

    let store = BookStore::connect(&config.database)
        .await
        .with_context(|| format!("failed to open database {}", config.database.url))?;

    match cli.command {
        Commands::Import { file } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("failed to read {}", file.display()))?;
            let file_name = file
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("untitled");
            let id = store.save(file_name, bytes, &FallbackMetadata).await?;
            println!("{}", id);
        }
        Commands::List { json } => {
            let books = store.list_all().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&books)?);
            } else {
                for book in books {
                    println!(
                        "{}  {:>5.1}%  {:<5}  {} ({})",
                        book.id.get(..12).unwrap_or(&book.id),
                        book.progress,
                        book.format.as_str(),
                        book.title,
                        book.author
                    );
                }
            }
        }
        Commands::Show { id } => {
            let summary = store.get(&id).await?.summary();
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Commands::Progress {
            id,
            percent,
            page,
            total,
            token,
        } => {
            let pair = match (page, total) {
                (Some(page), Some(total)) => position::fixed_pair(page, total),
                (Some(_), None) => bail!("--page needs --total"),
                _ => {
                    let Some(percent) = percent else {
                        bail!("give --percent or --page/--total");
                    };
                    PositionPair::new(percent, token.map(Location::Content))
                }
            };

            let reconciler =
                Reconciler::new(store.clone(), Arc::new(SystemClock), config.reconcile.clone());
            reconciler.open(&id).await?;
            let decision = reconciler.report_direct(pair).await?;
            reconciler.close().await;

            match decision {
                Decision::Accepted { position, finished } => {
                    println!("{:.1}%", position.percentage);
                    if finished {
                        println!("Book marked as completed!");
                    }
                }
                Decision::Coalesced => println!("unchanged"),
                Decision::Suppressed(reason) => println!("ignored: {:?}", reason),
            }
        }
        Commands::Delete { id } => {
            if !store.delete(&id).await? {
                bail!("no book with id {}", id);
            }
        }
        Commands::Stats => {
            let stats = store.stats().await?;
            println!(
                "total: {}  reading: {}  completed: {}",
                stats.total, stats.reading, stats.completed
            );
        }
    }

    Ok(())
}
