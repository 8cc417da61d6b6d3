use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Map;
use tracing_subscriber::EnvFilter;
use vectordb::{
    ChunkCreate, DocumentCreate, IndexKind, LibraryCreate, SearchQuery, StoreConfig, VectorStore,
};

#[derive(Parser)]
#[command(name = "vectordb-cli")]
#[command(about = "Exercises an in-memory vector store: create a library, seed it, index it, search it")]
struct Cli {
    /// Path to a TOML config file; falls back to defaults for anything it omits.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a previous snapshot (if any), seed from a file, then start periodic saving.
    Serve {
        /// JSON embeddings file to seed `default_library` from on first run.
        #[arg(short, long)]
        seed: Option<PathBuf>,
    },
    /// Create a library.
    CreateLibrary { library_id: String },
    /// Build (or rebuild) a library's index.
    Index { library_id: String },
    /// Search a library with a literal embedding vector.
    Search {
        library_id: String,
        /// Comma-separated floats, e.g. "1.0,0.0,0.0"
        embedding: String,
        #[arg(short, default_value_t = 5)]
        k: usize,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<StoreConfig> {
    match path {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading config file {}", path.display()))?;
            Ok(StoreConfig::from_toml_str(&contents)?)
        }
        None => Ok(StoreConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Serve { seed } => serve(config, seed),
        Commands::CreateLibrary { library_id } => {
            let store = open_store(&config)?;
            store.create_library(LibraryCreate {
                library_id: library_id.clone(),
                metadata: Map::new(),
            });
            println!("created library {library_id}");
            Ok(())
        }
        Commands::Index { library_id } => {
            let store = open_store(&config)?;
            let ok = store.index_library(&library_id);
            println!("index_library({library_id}) -> {ok}");
            Ok(())
        }
        Commands::Search { library_id, embedding, k } => {
            let store = open_store(&config)?;
            let embedding: Vec<f32> = embedding
                .split(',')
                .map(|s| s.trim().parse::<f32>())
                .collect::<Result<_, _>>()
                .context("parsing embedding as comma-separated floats")?;
            let results = store.search(SearchQuery {
                library_id,
                embedding,
                k,
                metadata_filter: None,
            })?;
            for (distance, chunk) in results {
                println!("{distance:.4}\t{}\t{}", chunk.id, chunk.text);
            }
            Ok(())
        }
    }
}

fn open_store(config: &StoreConfig) -> Result<VectorStore> {
    let store = VectorStore::new(config);
    if let Some(data) = vectordb::snapshot::load_from_disk(&config.data_dir)? {
        store.restore(data);
    }
    Ok(store)
}

/// Loads any existing snapshot, optionally seeds an empty store, then blocks running
/// the periodic-save loop on the calling thread (spec §4.5/§9).
fn serve(config: StoreConfig, seed: Option<PathBuf>) -> Result<()> {
    let store = Arc::new(open_store(&config)?);

    let seed_path = seed.or_else(|| config.seed_file.clone());
    if let Some(path) = seed_path {
        if store.get_library("default_library").is_none() {
            let n = vectordb::seed::seed_from_file(&store, &path)?;
            println!("seeded {n} chunks from {}", path.display());
        }
    }

    vectordb::snapshot::spawn_periodic_save(
        Arc::clone(&store),
        config.data_dir.clone(),
        std::time::Duration::from_secs(config.save_interval_seconds),
        std::time::Duration::from_secs(config.check_interval_seconds),
    );

    println!(
        "store running: dimension={} index={}",
        store.embedding_dimension(),
        match config.index_class {
            IndexKind::Exact => "exact",
            IndexKind::Lsh => "lsh",
        }
    );
    println!("press Ctrl+C to stop");
    loop {
        std::thread::sleep(std::time::Duration::from_secs(3600));
    }
}
