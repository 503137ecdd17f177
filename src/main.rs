mod db;
mod dedup;
mod expand;
mod fetch;
mod parser;
mod pipeline;
mod record;
mod settings;
mod store;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::fetch::{Fetcher, FetcherKind};
use crate::settings::Settings;
use crate::store::ConsistencyWait;

#[derive(Parser)]
#[command(name = "serp_ingest", about = "Job SERP scraper feeding a listings sheet")]
struct Cli {
    /// SQLite workbook path (overrides INGEST_DB_PATH / ingest.toml)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the workbook tabs and header rows
    Init,
    /// Add a search URL and the number of result pages to walk
    AddSearch {
        url: String,
        pages: u32,
    },
    /// Scrape every search page and append listings
    Run {
        /// Only scrape the first N pages
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Seconds to wait after each page's writes
        #[arg(long)]
        delay: Option<u64>,
        #[arg(long, value_enum)]
        fetcher: Option<FetcherKind>,
    },
    /// Show workbook statistics
    Stats,
    /// Most recent listings
    Listings {
        /// Filter by status (new, duplicate)
        #[arg(short, long)]
        status: Option<String>,
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
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
    let mut settings = Settings::load()?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let result = match cli.command {
        Commands::Init => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            println!("Workbook ready at {:?}", settings.db_path);
            Ok(())
        }
        Commands::AddSearch { url, pages } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let row = db::insert_search(&conn, &url, pages)?;
            println!("Added search at row {} ({} pages)", row, pages);
            Ok(())
        }
        Commands::Run { limit, delay, fetcher } => {
            if let Some(d) = delay {
                settings.write_delay_secs = d;
            }
            if let Some(kind) = fetcher {
                settings.fetcher = kind;
            }
            run(&settings, limit).await
        }
        Commands::Listings { status, limit } => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let rows = db::fetch_overview(&conn, status.as_deref(), limit)?;
            if rows.is_empty() {
                println!("No listings found.");
                return Ok(());
            }

            println!(
                "{:>5} | {:<28} | {:<20} | {:<16} | {:<9} | {:<18} | {:<10}",
                "Row", "Title", "Company", "Job ID", "Status", "Location", "Scraped"
            );
            println!("{}", "-".repeat(125));

            for r in &rows {
                println!(
                    "{:>5} | {:<28} | {:<20} | {:<16} | {:<9} | {:<18} | {:<10}",
                    r.row_num,
                    truncate(&r.title, 28),
                    truncate(&r.company, 20),
                    truncate(&r.job_id, 16),
                    r.status,
                    truncate(&r.location, 18),
                    r.scraped_date
                );
            }

            println!("\n{} listings | view: https://www.indeed.com/viewjob?jk=<id>", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Searches:   {}", s.searches);
            println!("Listings:   {}", s.listings);
            println!("New:        {}", s.new);
            println!("Duplicate:  {}", s.duplicates);
            println!("Unique IDs: {}", s.unique_ids);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn run(settings: &Settings, limit: Option<usize>) -> anyhow::Result<()> {
    // One date for the whole run, however long it takes.
    let scrape_date = chrono::Local::now().date_naive();
    println!("STARTING PROGRAM...");
    info!("Opening workbook {:?}", settings.db_path);

    let conn = db::connect(&settings.db_path)?;
    db::init_schema(&conn)?;

    let (url_col, pages_col) = db::fetch_search_columns(&conn)?;
    let specs = expand::specs_from_columns(&url_col, &pages_col)?;
    let mut urls = expand::expand(&specs);
    if let Some(n) = limit {
        urls.truncate(n);
    }
    println!("Number of pages to scrape: {}", urls.len());
    if urls.is_empty() {
        println!("No search URLs. Add one with 'add-search' first.");
        return Ok(());
    }

    let fetcher = Fetcher::new(settings.fetcher, &settings.user_agent)?;
    let wait: ConsistencyWait = settings.consistency_wait();
    let mut sheet = db::SqliteStore::open(&conn, wait)?;

    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} pages")?
            .progress_chars("=> "),
    );

    let report = pipeline::run(&fetcher, &mut sheet, &urls, scrape_date, &pb).await?;
    pb.finish_and_clear();

    report.print();
    println!("ALL DONE!");
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
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
