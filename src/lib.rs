//! Origins
//!
//! Maps heterogeneous metadata sources onto one typed property graph and
//! keeps it synchronized:
//! - Entity graph (nodes, edges, resources, components) over a GraphStore
//! - Neo4j store with explicit transactions, plus an in-memory store
//! - Source adapters for directory trees and PostgreSQL catalogs
//! - Incremental synchronization and foreign-key resolution

pub mod backends;
pub mod error;
pub mod graph;
pub mod neo4j;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use error::{OriginsError, Result};

use serde::Deserialize;
use std::path::Path;

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub neo4j: Neo4jYamlConfig,
    pub postgres: PostgresYamlConfig,
    pub sync: SyncYamlConfig,
}

/// Neo4j configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Neo4jYamlConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
}

impl Default for Neo4jYamlConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".into(),
            user: "neo4j".into(),
            password: "neo4j".into(),
        }
    }
}

/// PostgreSQL connection section; the database is chosen per sync
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PostgresYamlConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Default for PostgresYamlConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5432,
            user: None,
            password: None,
        }
    }
}

/// Synchronization behaviour
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SyncYamlConfig {
    /// Resolve foreign keys after each database sync
    pub resolve_references: bool,
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub neo4j_uri: String,
    pub neo4j_user: String,
    pub neo4j_password: String,
    pub postgres: PostgresYamlConfig,
    pub resolve_references: bool,
}

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> anyhow::Result<Self> {
        let yaml = Self::load_yaml(yaml_path);

        let postgres = PostgresYamlConfig {
            host: std::env::var("PGHOST").unwrap_or(yaml.postgres.host),
            port: std::env::var("PGPORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(yaml.postgres.port),
            user: std::env::var("PGUSER").ok().or(yaml.postgres.user),
            password: std::env::var("PGPASSWORD").ok().or(yaml.postgres.password),
        };

        Ok(Self {
            neo4j_uri: std::env::var("NEO4J_URI").unwrap_or(yaml.neo4j.uri),
            neo4j_user: std::env::var("NEO4J_USER").unwrap_or(yaml.neo4j.user),
            neo4j_password: std::env::var("NEO4J_PASSWORD").unwrap_or(yaml.neo4j.password),
            postgres,
            resolve_references: yaml.sync.resolve_references,
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
