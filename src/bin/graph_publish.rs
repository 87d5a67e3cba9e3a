//! graph-publish - publish vertex and edge record files into a graph store.
//!
//! Settings come from `GRAPH_*` environment variables (optionally loaded from
//! a `.env` file); command-line flags override them.

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use metagraph::{GatewayStore, Publisher, PublisherConfig};

/// Publish metadata graph record files into a graph store.
#[derive(Parser, Debug)]
#[command(name = "graph-publish")]
#[command(about = "Reconcile schemas and upsert record files into a graph store", long_about = None)]
struct Args {
    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,

    /// Directory of vertex record files (overrides GRAPH_PUBLISH_VERTEX_DIR).
    #[arg(long)]
    vertex_dir: Option<String>,

    /// Directory of edge record files (overrides GRAPH_PUBLISH_EDGE_DIR).
    #[arg(long)]
    edge_dir: Option<String>,

    /// Tag stamped on every element written (overrides GRAPH_PUBLISH_TAG).
    #[arg(long)]
    tag: Option<String>,

    /// Rows per insert statement (overrides GRAPH_PUBLISH_BATCH_SIZE).
    #[arg(long)]
    batch_size: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load .env file if it exists
    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
        eprintln!("Loaded environment from {}", args.dotenv);
    }

    if let Some(tag) = &args.tag {
        std::env::set_var("GRAPH_PUBLISH_TAG", tag);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = PublisherConfig::from_env()?;
    if let Some(dir) = args.vertex_dir {
        config.vertex_dir = dir.into();
    }
    if let Some(dir) = args.edge_dir {
        config.edge_dir = dir.into();
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }

    let store = GatewayStore::connect(&config).await?;
    let mut publisher = Publisher::new(store, config)?;

    let outcome = publisher.publish().await;
    publisher.close().await?;
    let report = outcome?;

    tracing::info!(
        vertices = report.vertices_written,
        edges = report.edges_written,
        labels_created = report.labels_created,
        labels_altered = report.labels_altered,
        "graph publish complete"
    );

    Ok(())
}
