//! Command-line front end for the catalog engine.
//!
//! Usage:
//!     catalog browse --category electronics --max-price 100 --sort price-asc
//!     catalog show 7
//!     catalog resolve "studio-monitor"
//!     catalog recent
//!     catalog health

mod config;

use anyhow::{Context, Result};
use catalogflow_backend_http::HttpBackend;
use catalogflow_history::{JsonFileStore, RecentlyViewed};
use catalogflow_model::{CanonicalRecord, QueryRequest, SortKey};
use catalogflow_resolve::{display_id, resolve};
use catalogflow_source::{CatalogService, LiveSource, OfflineSource, StaticDataset};
use clap::{Parser, Subcommand};
use config::{FileConfig, Overrides, Settings};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "Browse and look up products with live-to-static fallback")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// TOML config file
    #[arg(long, env = "CATALOG_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Live catalog API base URL (omit to run offline)
    #[arg(long, env = "CATALOG_API_URL", global = true)]
    api_url: Option<String>,

    /// Bound on each live call, in milliseconds
    #[arg(long, env = "CATALOG_LIVE_TIMEOUT_MS", global = true)]
    timeout_ms: Option<u64>,

    /// Static catalog JSON (defaults to the bundled sample)
    #[arg(long, env = "CATALOG_DATASET", global = true)]
    dataset: Option<PathBuf>,

    /// File that keeps recently viewed items between runs
    #[arg(long, env = "CATALOG_HISTORY", global = true)]
    history: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List products matching filters
    Browse {
        /// Exact category
        #[arg(short, long)]
        category: Option<String>,

        #[arg(long)]
        min_price: Option<f64>,

        #[arg(long)]
        max_price: Option<f64>,

        /// Minimum average rating (0-5)
        #[arg(long)]
        min_rating: Option<f64>,

        /// Only products in stock
        #[arg(long)]
        in_stock: bool,

        /// Only discounted products
        #[arg(long)]
        on_sale: bool,

        /// Free-text search over name, description and tags
        #[arg(short, long)]
        search: Option<String>,

        /// relevance, price-asc, price-desc, rating, newest
        #[arg(long, default_value = "relevance")]
        sort: SortKey,

        #[arg(long, default_value = "0")]
        offset: usize,

        /// Maximum results
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Look up a single product by any identifier
    Show {
        id: String,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print the canonical key for an identifier without fetching anything
    Resolve { id: String },

    /// List recently viewed products
    Recent,

    /// Check live backend health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("catalogflow=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let settings = Settings::resolve(
        file,
        Overrides {
            api_url: cli.api_url,
            timeout_ms: cli.timeout_ms,
            dataset: cli.dataset,
            history: cli.history,
        },
    );

    if let Commands::Resolve { id } = &cli.command {
        return run_resolve(id);
    }

    let dataset = match &settings.dataset {
        Some(path) => StaticDataset::from_path(path)
            .with_context(|| format!("loading dataset {}", path.display()))?,
        None => StaticDataset::bundled().context("loading bundled dataset")?,
    };
    let dataset = Arc::new(dataset);

    let history = Arc::new(RecentlyViewed::new(settings.history_capacity));
    let store = settings.history.as_ref().map(JsonFileStore::new);
    if let Some(store) = &store {
        if let Err(e) = history.restore(store) {
            tracing::warn!(error = %e, path = %store.path().display(), "Ignoring unreadable history");
        }
    }

    match settings.backend_config() {
        Some(backend_config) => {
            let backend = HttpBackend::new(backend_config)?;
            let service = CatalogService::new(backend, dataset)
                .with_history(history)
                .with_config(settings.source_config());
            run(&service, cli.command, store.as_ref()).await
        }
        None => {
            let service = CatalogService::new(OfflineSource, dataset)
                .with_history(history)
                .with_config(settings.source_config());
            run(&service, cli.command, store.as_ref()).await
        }
    }
}

async fn run<L: LiveSource>(
    service: &CatalogService<L>,
    command: Commands,
    store: Option<&JsonFileStore>,
) -> Result<()> {
    match command {
        Commands::Browse {
            category,
            min_price,
            max_price,
            min_rating,
            in_stock,
            on_sale,
            search,
            sort,
            offset,
            limit,
            format,
        } => {
            let mut query = QueryRequest::new()
                .with_price_range(min_price, max_price)
                .with_sort(sort)
                .with_offset(offset)
                .with_limit(limit);
            if let Some(category) = category {
                query = query.with_category(category);
            }
            if let Some(rating) = min_rating {
                query = query.with_min_rating(rating);
            }
            if let Some(text) = search {
                query = query.with_search(text);
            }
            if in_stock {
                query = query.in_stock_only();
            }
            if on_sale {
                query = query.on_sale_only();
            }
            run_browse(service, &query, &format).await
        }
        Commands::Show { id, format } => {
            run_show(service, &id, &format).await?;
            if let Some(store) = store {
                service
                    .history()
                    .persist(store)
                    .with_context(|| format!("saving history to {}", store.path().display()))?;
            }
            Ok(())
        }
        Commands::Resolve { id } => run_resolve(&id),
        Commands::Recent => {
            print_records(&service.recently_viewed());
            Ok(())
        }
        Commands::Health => run_health(service).await,
    }
}

async fn run_browse<L: LiveSource>(
    service: &CatalogService<L>,
    query: &QueryRequest,
    format: &str,
) -> Result<()> {
    let page = service.fetch_catalog(query).await;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&page)?);
        return Ok(());
    }

    println!("Source: {}", page.source);
    println!("---");
    print_records(&page.records);
    println!("\n---");
    println!(
        "Showing {} of {} results",
        page.records.len(),
        page.total
    );

    Ok(())
}

async fn run_show<L: LiveSource>(
    service: &CatalogService<L>,
    id: &str,
    format: &str,
) -> Result<()> {
    let lookup = service.fetch_one(id).await;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&lookup)?);
        return Ok(());
    }

    let record = &lookup.record;
    println!("{} ({})", record.name, display_id(&record.id));
    println!("   Key: {} [{}]", record.id, lookup.resolution.source_kind.label());
    match lookup.source {
        Some(source) => println!("   Source: {}", source),
        None => println!("   Source: none (placeholder)"),
    }
    println!("   {}", record.description);
    println!("   Price: {}", format_price(record));
    println!("   Rating: {:.1} ({} reviews)", record.rating, record.review_count);
    println!("   Stock: {}", stock_label(record));
    if !record.tags.is_empty() {
        println!("   Tags: {}", record.tags.join(", "));
    }
    for (key, value) in record.specifications.iter() {
        println!("   {}: {}", key, value);
    }

    Ok(())
}

fn run_resolve(id: &str) -> Result<()> {
    let resolution = resolve(id);
    println!("{}", resolution.canonical_id);
    println!("   Kind: {}", resolution.source_kind.label());
    println!("   Display: {}", display_id(&resolution.canonical_id));
    Ok(())
}

async fn run_health<L: LiveSource>(service: &CatalogService<L>) -> Result<()> {
    print!("Checking {} backend... ", service.live_name());

    match service.health().await {
        Ok(()) => {
            println!("OK");
            Ok(())
        }
        Err(e) => {
            println!("FAILED: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_records(records: &[CanonicalRecord]) {
    if records.is_empty() {
        println!("(no products)");
        return;
    }
    for (i, record) in records.iter().enumerate() {
        println!("\n{}. {} ({})", i + 1, record.name, display_id(&record.id));
        println!(
            "   {} | {:.1} stars | {}",
            format_price(record),
            record.rating,
            stock_label(record)
        );
        if !record.category.is_empty() {
            println!("   Category: {}", record.category);
        }
    }
}

fn format_price(record: &CanonicalRecord) -> String {
    match record.original_price {
        Some(original) if record.is_on_sale() => {
            format!("${:.2} (was ${:.2})", record.price, original)
        }
        _ => format!("${:.2}", record.price),
    }
}

fn stock_label(record: &CanonicalRecord) -> String {
    match (record.in_stock, record.stock_count) {
        (true, Some(count)) => format!("{} in stock", count),
        (true, None) => "in stock".to_string(),
        (false, _) => "out of stock".to_string(),
    }
}
