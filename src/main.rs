mod assets;
mod document;
mod error;
mod fetch;
mod listing;
mod model;
mod parser;
mod pipeline;
mod settings;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use fetch::HttpFetcher;
use model::{Faction, ListingEntry};
use pipeline::{Pipeline, Stages};
use settings::Settings;

#[derive(Parser)]
#[command(name = "hero_sync", about = "Reconcile hero data into documents and an aggregate file")]
struct Cli {
    /// TOML settings file (default: ./hero_sync.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline; with no stage flags every stage runs
    Run {
        /// Refresh the listing, extract every hero and write the aggregate
        #[arg(long)]
        heroes: bool,
        /// Merge Overview/Skills into per-hero documents
        #[arg(long)]
        docs: bool,
        /// Merge wiki Lore/Skills/Strategy into existing documents
        #[arg(long)]
        wiki: bool,
        /// Rewrite the strategy, faction meta and passive trait pages from the hero guide
        #[arg(long)]
        guides: bool,
        #[arg(long)]
        all: bool,
        /// Minimum delay between requests to one host
        #[arg(long)]
        delay_ms: Option<u64>,
        #[arg(short = 'c', long)]
        concurrency: Option<usize>,
        #[arg(long)]
        docs_dir: Option<PathBuf>,
        #[arg(long)]
        images_dir: Option<PathBuf>,
        /// Aggregate JSON output path
        #[arg(long)]
        aggregate: Option<PathBuf>,
    },
    /// Run extraction and normalization on a saved detail page and print the result
    Extract {
        file: PathBuf,
        #[arg(long)]
        slug: String,
        /// Visible listing text, used for name matching and faction detection
        #[arg(long, default_value = "")]
        link_text: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            heroes,
            docs,
            wiki,
            guides,
            all,
            delay_ms,
            concurrency,
            docs_dir,
            images_dir,
            aggregate,
        } => {
            if let Some(ms) = delay_ms {
                settings.delay_ms = ms;
            }
            if let Some(n) = concurrency {
                settings.concurrency = n;
            }
            if let Some(dir) = docs_dir {
                settings.docs_dir = dir;
            }
            if let Some(dir) = images_dir {
                settings.images_dir = dir;
            }
            if let Some(path) = aggregate {
                settings.aggregate_path = path;
            }

            let stages = Stages::from_flags(heroes, docs, wiki, guides, all);
            println!(
                "Running stages: heroes={} docs={} wiki={} guides={} (concurrency {}, delay {}ms)",
                stages.heroes,
                stages.docs,
                stages.wiki,
                stages.guides,
                settings.concurrency,
                settings.delay_ms
            );
            let fetcher = HttpFetcher::new(&settings)?;
            let summary = Pipeline::new(settings, fetcher).run(stages).await?;
            summary.print();
        }
        Commands::Extract {
            file,
            slug,
            link_text,
        } => {
            let html = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let entry = ListingEntry {
                url: String::new(),
                faction: Faction::detect(&link_text),
                slug,
                link_text,
            };
            let placeholder = assets::placeholder_reference(&settings.image_url_prefix);
            let outcome = parser::process_detail_page(&html, &entry, &placeholder);
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
