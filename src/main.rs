//! Tickergrid command-line interface
//!
//! Thin wrapper over the library: runs a screener query from a TOML file,
//! pulls detail pages for a single ticker, or prints the site news feed.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tickergrid::config::load_query;
use tickergrid::{ConnectionConfig, FetchMode, QuoteClient, Screener, ScreenerQuery};
use tracing_subscriber::EnvFilter;

/// Tickergrid: a stock screener scraping client
#[derive(Parser, Debug)]
#[command(name = "tickergrid")]
#[command(version = "1.0.0")]
#[command(about = "Scrapes screener, quote, and news data", long_about = None)]
struct Cli {
    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a screener query from a TOML file or inline flags
    Screen {
        /// Path to a TOML query file; omit to build the query from flags
        #[arg(value_name = "QUERY")]
        query: Option<PathBuf>,

        /// Tickers to restrict the search to
        #[arg(short, long, value_delimiter = ',', conflicts_with = "query")]
        tickers: Vec<String>,

        /// Screener filter codes (e.g. idx_sp500)
        #[arg(short, long, value_delimiter = ',', conflicts_with = "query")]
        filters: Vec<String>,

        /// Table view name (overview, valuation, ...)
        #[arg(long, conflicts_with = "query")]
        table: Option<String>,

        /// Sort key; prefix with '-' for descending
        #[arg(long, conflicts_with = "query")]
        order: Option<String>,

        /// Cap on the number of rows fetched
        #[arg(long, conflicts_with = "query")]
        rows: Option<usize>,

        /// Fetch result pages one at a time instead of concurrently
        #[arg(long)]
        sequential: bool,

        /// Merge per-ticker fundamentals into the result before export
        #[arg(long)]
        enrich: bool,

        /// Write the result to a CSV file instead of stdout
        #[arg(long, value_name = "PATH")]
        csv: Option<PathBuf>,

        /// Write the result to a SQLite database
        #[arg(long, value_name = "PATH")]
        sqlite: Option<PathBuf>,

        /// Download a chart image per ticker into this directory
        #[arg(long, value_name = "DIR")]
        charts: Option<PathBuf>,
    },

    /// Show detail-page data for one ticker
    Quote {
        /// Stock symbol
        #[arg(value_name = "TICKER")]
        ticker: String,

        /// Also list recent insider transactions
        #[arg(long)]
        insider: bool,

        /// Also list recent headlines
        #[arg(long)]
        news: bool,

        /// Number of analyst ratings to show
        #[arg(long, value_name = "N", default_value_t = 5)]
        ratings: usize,
    },

    /// Print the site-wide news feed
    News,

    /// Print the crypto performance table, or one pair's row
    Crypto {
        /// Pair symbol (e.g. BTCUSD); omit for the whole table
        #[arg(value_name = "PAIR")]
        pair: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Screen {
            query,
            tickers,
            filters,
            table,
            order,
            rows,
            sequential,
            enrich,
            csv,
            sqlite,
            charts,
        } => {
            let query = build_query(query, tickers, filters, table, order, rows)?;
            handle_screen(query, sequential, enrich, csv, sqlite, charts).await
        }
        Command::Quote {
            ticker,
            insider,
            news,
            ratings,
        } => handle_quote(&ticker, insider, news, ratings).await,
        Command::News => handle_news().await,
        Command::Crypto { pair } => handle_crypto(pair.as_deref()).await,
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tickergrid=info,warn"),
            1 => EnvFilter::new("tickergrid=debug,info"),
            2 => EnvFilter::new("tickergrid=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Resolves the search parameters from a query file or inline flags
fn build_query(
    path: Option<PathBuf>,
    tickers: Vec<String>,
    filters: Vec<String>,
    table: Option<String>,
    order: Option<String>,
    rows: Option<usize>,
) -> anyhow::Result<ScreenerQuery> {
    if let Some(path) = path {
        tracing::info!("Loading query from: {}", path.display());
        return Ok(load_query(&path)?);
    }

    let mut query = ScreenerQuery::new()
        .with_tickers(tickers)
        .with_filters(filters);
    if let Some(name) = table {
        query = query.with_table(name.parse()?);
    }
    if let Some(order) = order {
        query = query.with_order(order);
    }
    if let Some(rows) = rows {
        query = query.with_rows(rows);
    }
    Ok(query)
}

async fn handle_screen(
    query: ScreenerQuery,
    sequential: bool,
    enrich: bool,
    csv: Option<PathBuf>,
    sqlite: Option<PathBuf>,
    charts: Option<PathBuf>,
) -> anyhow::Result<()> {
    let settings = ConnectionConfig::default();
    let mode = if sequential {
        FetchMode::Sequential
    } else {
        FetchMode::Concurrent
    };

    let mut result = Screener::search(query, settings.clone(), mode).await?;
    tracing::info!("Fetched {} rows", result.len());

    if result.degraded_pages() > 0 {
        tracing::warn!(
            "{} page(s) matched no known table layout; result is partial",
            result.degraded_pages()
        );
    }

    if enrich {
        tracing::info!("Enriching {} tickers with detail-page data", result.len());
        let mut quotes = QuoteClient::new(&settings)?;
        result.enrich_from_quotes(&mut quotes).await?;
    }

    if let Some(path) = &sqlite {
        result.to_sqlite(path)?;
        println!("Wrote {} rows to {}", result.len(), path.display());
    }

    if let Some(dir) = &charts {
        let saved = result.download_charts(dir).await?;
        println!("Saved {} chart(s) to {}", saved.len(), dir.display());
    }

    match &csv {
        Some(path) => {
            result.to_csv(Some(path))?;
            println!("Wrote {} rows to {}", result.len(), path.display());
        }
        None if sqlite.is_none() => {
            if let Some(rendered) = result.to_csv(None)? {
                print!("{}", rendered);
            }
        }
        None => {}
    }

    Ok(())
}

async fn handle_quote(
    ticker: &str,
    insider: bool,
    news: bool,
    ratings: usize,
) -> anyhow::Result<()> {
    let settings = ConnectionConfig::default();
    let mut client = QuoteClient::new(&settings)?;

    let details = client.stock_details(ticker).await?;
    println!("=== {} ===", ticker.to_uppercase());
    for (label, value) in details.iter() {
        println!("{}: {}", label, value);
    }

    if ratings > 0 {
        let targets = client.analyst_price_targets(ticker, ratings).await?;
        if !targets.is_empty() {
            println!("\nAnalyst ratings:");
            for rating in &targets {
                let target = match (rating.target, rating.target_from, rating.target_to) {
                    (Some(t), _, _) => format!(" ${}", t),
                    (None, Some(from), Some(to)) => format!(" ${} -> ${}", from, to),
                    _ => String::new(),
                };
                println!(
                    "  {} {} {} {}{}",
                    rating.date, rating.category, rating.analyst, rating.rating, target
                );
            }
        }
    }

    if insider {
        let transactions = client.insider_transactions(ticker).await?;
        println!("\nInsider transactions: {}", transactions.len());
        for row in &transactions {
            let who = row.get("Insider Trading").unwrap_or("?");
            let relationship = row.get("Relationship").unwrap_or("?");
            let date = row.get("Date").unwrap_or("?");
            println!("  {} ({}) {}", who, relationship, date);
        }
    }

    if news {
        let items = client.news(ticker).await?;
        println!("\nHeadlines:");
        for item in &items {
            match &item.source {
                Some(source) => println!("  [{}] {} ({})", item.timestamp, item.headline, source),
                None => println!("  [{}] {}", item.timestamp, item.headline),
            }
        }
    }

    Ok(())
}

async fn handle_crypto(pair: Option<&str>) -> anyhow::Result<()> {
    let settings = ConnectionConfig::default();
    let client = QuoteClient::new(&settings)?;

    match pair {
        Some(pair) => match client.crypto(pair).await? {
            Some(row) => {
                for (label, value) in row.iter() {
                    println!("{}: {}", label, value);
                }
            }
            None => println!("No row for pair {}", pair),
        },
        None => {
            for row in client.crypto_performance().await? {
                let cells: Vec<&str> = row.iter().map(|(_, value)| value).collect();
                println!("{}", cells.join("  "));
            }
        }
    }

    Ok(())
}

async fn handle_news() -> anyhow::Result<()> {
    let settings = ConnectionConfig::default();
    let client = QuoteClient::new(&settings)?;

    let items = client.all_news().await?;
    for item in &items {
        println!("[{}] {}", item.timestamp, item.headline);
    }

    Ok(())
}
