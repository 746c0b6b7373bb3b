//! Origins - command line entry point
//!
//! Synchronizes origins into the entity graph and lists what is recorded.

use anyhow::Result;
use clap::{Parser, Subcommand};
use origins::backends::{DirectoryOrigin, Origin};
use origins::graph::{resources, MatchOptions, Node, NodeType};
use origins::neo4j::{GraphStore, MockGraphStore, Neo4jClient, Transaction};
use origins::sync::{self, SyncResult};
use origins::Config;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "origins")]
#[command(about = "Map metadata sources onto a property graph")]
struct Cli {
    /// Path to the YAML config file (default: ./config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use a throwaway in-memory graph instead of Neo4j
    #[arg(long, global = true)]
    memory: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Synchronize an origin into the graph
    Sync {
        #[command(subcommand)]
        origin: SyncOrigin,
    },

    /// List resources
    Resources {
        #[command(flatten)]
        page: PageArgs,
    },

    /// List the components of a resource
    Components {
        /// Resource id
        resource: String,

        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
enum SyncOrigin {
    /// A directory tree
    Directory {
        /// Root of the tree
        path: PathBuf,
    },

    /// A PostgreSQL database
    #[cfg(feature = "postgres")]
    Postgres {
        /// Database name
        #[arg(short, long)]
        database: String,

        /// Resolve foreign keys after the sync (overrides config.yaml)
        #[arg(long)]
        resolve_references: bool,
    },
}

#[derive(clap::Args)]
struct PageArgs {
    /// Only nodes of this type (e.g. Table, File)
    #[arg(long = "type")]
    node_type: Option<NodeType>,

    #[arg(long)]
    limit: Option<u64>,

    #[arg(long)]
    skip: Option<u64>,
}

impl PageArgs {
    fn options(&self) -> MatchOptions {
        MatchOptions {
            node_type: self.node_type,
            predicate: None,
            limit: self.limit,
            skip: self.skip,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,origins=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_yaml_and_env(cli.config.as_deref())?;

    let store: Box<dyn GraphStore> = if cli.memory {
        tracing::info!("Using in-memory graph; nothing will be persisted");
        Box::new(MockGraphStore::new())
    } else {
        Box::new(
            Neo4jClient::new(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
                .await?,
        )
    };
    tracing::info!(backend = store.backend(), "Graph store ready");

    match cli.command {
        Commands::Sync { origin } => match origin {
            SyncOrigin::Directory { path } => {
                let origin = DirectoryOrigin::new(&path)?;
                run_sync(store.as_ref(), &origin, false).await
            }
            #[cfg(feature = "postgres")]
            SyncOrigin::Postgres {
                database,
                resolve_references,
            } => {
                let origin =
                    origins::backends::PostgresOrigin::connect(&config.postgres, &database).await?;
                let resolve = resolve_references || config.resolve_references;
                run_sync(store.as_ref(), &origin, resolve).await
            }
        },
        Commands::Resources { page } => {
            let mut tx = Transaction::begin(store.as_ref()).await?;
            let result = resources::match_resources(&mut tx, page.options()).await;
            print_nodes(&tx.finish(result).await?)
        }
        Commands::Components { resource, page } => {
            let mut tx = Transaction::begin(store.as_ref()).await?;
            let result = list_components(&mut tx, &resource, page.options()).await;
            print_nodes(&tx.finish(result).await?)
        }
    }
}

async fn list_components(
    tx: &mut Transaction,
    resource_id: &str,
    options: MatchOptions,
) -> origins::Result<Vec<Node>> {
    let resource = resources::get_by_id(tx, resource_id).await?;
    resources::components(tx, resource.uuid, options).await
}

async fn sync_and_resolve(
    tx: &mut Transaction,
    origin: &dyn Origin,
    resolve: bool,
) -> origins::Result<(Node, SyncResult, usize)> {
    let (resource, result) = sync::sync_origin(tx, origin).await?;
    let foreign_keys = if resolve {
        sync::relations::resolve_references(tx, origin, &resource).await?
    } else {
        0
    };
    Ok((resource, result, foreign_keys))
}

async fn run_sync(store: &dyn GraphStore, origin: &dyn Origin, resolve: bool) -> Result<()> {
    tracing::info!(id = %origin.resource_id(), "Syncing origin");

    let mut tx = Transaction::begin(store).await?;
    let outcome = sync_and_resolve(&mut tx, origin, resolve).await;
    let operations = tx.operations();
    let (resource, result, foreign_keys) = tx.finish(outcome).await?;

    tracing::info!(
        "Sync complete: {} created, {} updated, {} unchanged, {} edges, {} foreign keys ({} store operations)",
        result.nodes_created,
        result.nodes_updated,
        result.nodes_unchanged,
        result.edges_created,
        foreign_keys,
        operations
    );
    println!("{}", serde_json::to_string_pretty(&resource)?);
    Ok(())
}

fn print_nodes(nodes: &[Node]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(nodes)?);
    Ok(())
}
