use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use fable::{initialize, AppConfig, AppContext};
use fable_core::VectorStore;
use fable_rag::{indexer, load_embedder, FableIndexer, QdrantVectorStore};

const VERIFY_QUERY: &str = "a story about honesty and lying";

#[derive(Parser)]
#[command(name = "fable")]
#[command(about = "Question answering over Aesop's fables", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the HTTP API
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Process the raw corpus and load it into the vector store
    Ingest {
        /// Raw corpus file (defaults to RAW_DATA_PATH)
        #[arg(long)]
        raw: Option<PathBuf>,
        /// Where to write the processed corpus (defaults to DATA_PATH)
        #[arg(long)]
        processed: Option<PathBuf>,
        /// Skip the verification search
        #[arg(long)]
        no_verify: bool,
    },
    /// Run one search and print the results
    Search {
        query: String,
        #[arg(short, long, default_value_t = 5)]
        limit: usize,
        #[arg(short, long)]
        threshold: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.api_host = host;
            }
            if let Some(port) = port {
                config.api_port = port;
            }
            serve(config).await
        }
        Commands::Ingest {
            raw,
            processed,
            no_verify,
        } => {
            if let Some(raw) = raw {
                config.raw_data_path = raw;
            }
            if let Some(processed) = processed {
                config.data_path = processed;
            }
            ingest(&config, !no_verify).await
        }
        Commands::Search {
            query,
            limit,
            threshold,
        } => search(&config, &query, limit, threshold).await,
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let engine = initialize(&config)
        .await
        .context("failed to initialize dependencies")?;

    let addr = config.bind_addr();
    let ctx = Arc::new(AppContext::with_engine(config, engine));
    fable::serve(ctx, &addr).await
}

async fn ingest(config: &AppConfig, verify: bool) -> Result<()> {
    println!("{} Loading raw fables from {}", "📖".cyan(), config.raw_data_path.display());
    let raw = indexer::load_raw(&config.raw_data_path)
        .with_context(|| format!("failed to read {}", config.raw_data_path.display()))?;

    let fables = indexer::process(&raw);
    indexer::save_processed(&config.data_path, &fables)?;
    let stats = indexer::stats(&fables);
    println!(
        "{} Processed {} fables ({} words, {:.2} per fable) into {}",
        "✅".green(),
        stats.total_fables,
        stats.total_words,
        stats.average_words_per_fable,
        config.data_path.display()
    );

    let embedder = load_embedder(&config.embedding_model).await?;
    let store: Arc<dyn VectorStore> = Arc::new(QdrantVectorStore::connect(&config.qdrant)?);
    let fable_indexer = FableIndexer::new(embedder, Arc::clone(&store), config.collection.clone());

    println!("{} Indexing into collection '{}'...", "🤖".blue(), config.collection);
    let written = fable_indexer.index(&fables).await?;
    println!("{} Upserted {} fables", "✅".green(), written);

    match store.get_info(&config.collection).await {
        Some(info) => println!(
            "  {} {} points, status {}",
            "•".yellow(),
            info.points_count,
            info.status
        ),
        None => println!("{} Collection info unavailable", "⚠️".yellow()),
    }

    if verify {
        println!("{} Verifying with \"{}\"", "🔍".cyan(), VERIFY_QUERY);
        let results = fable_indexer.verify(VERIFY_QUERY, 3).await?;
        print_results(&results);
    }

    Ok(())
}

async fn search(config: &AppConfig, query: &str, limit: usize, threshold: Option<f32>) -> Result<()> {
    let engine = initialize(config).await?;
    let results = engine.search(query, limit, threshold).await?;

    if results.is_empty() {
        println!("{} No fables matched", "⚠️".yellow());
        return Ok(());
    }
    print_results(&results);
    Ok(())
}

fn print_results(results: &[fable_core::SearchResult]) {
    for (i, result) in results.iter().enumerate() {
        println!(
            "{} {} {}",
            format!("{}.", i + 1).bold(),
            result.passage.title.green(),
            format!("({:.3})", result.score).dimmed()
        );
        println!("   {} {}", "Moral:".bold(), result.passage.moral);
    }
}
