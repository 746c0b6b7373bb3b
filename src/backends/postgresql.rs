//! PostgreSQL origin: one database, with Schema -> Table -> Column below it
//! and foreign keys read from `pg_constraint`.

use super::{Lineage, Origin, RawRecord, Reference};
use crate::graph::models::NodeType;
use crate::PostgresYamlConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Row;

const SCHEMAS: &str = r#"
SELECT nspname::text AS name
FROM pg_catalog.pg_namespace
WHERE nspname <> 'information_schema'
    AND nspname NOT LIKE 'pg\_%'
ORDER BY nspname
"#;

const TABLES: &str = r#"
SELECT table_name::text AS name
FROM information_schema.tables
WHERE table_type = 'BASE TABLE'
    AND table_schema = $1
ORDER BY table_name
"#;

const COLUMNS: &str = r#"
SELECT column_name::text AS name,
    (ordinal_position - 1)::int4 AS index,
    (is_nullable = 'YES') AS nullable,
    data_type::text AS type
FROM information_schema.columns
WHERE table_schema = $1
    AND table_name = $2
ORDER BY ordinal_position
"#;

const FOREIGN_KEYS: &str = r#"
SELECT con.conname::text AS name,
    ns.nspname::text AS schema,
    cl.relname::text AS "table",
    a1.attname::text AS "column"
FROM (
    SELECT con1.conname,
        unnest(con1.conkey) AS origin,
        unnest(con1.confkey) AS target,
        con1.confrelid,
        con1.conrelid
    FROM pg_class cl
        JOIN pg_namespace ns ON cl.relnamespace = ns.oid
        JOIN pg_constraint con1 ON con1.conrelid = cl.oid
    WHERE con1.contype = 'f'
        AND ns.nspname = $1
        AND cl.relname = $2
) con
JOIN pg_class cl ON cl.oid = con.confrelid
JOIN pg_namespace ns ON cl.relnamespace = ns.oid
JOIN pg_attribute a1 ON a1.attrelid = con.confrelid AND a1.attnum = con.target
JOIN pg_attribute a2 ON a2.attrelid = con.conrelid AND a2.attnum = con.origin
WHERE a2.attname = $3
ORDER BY con.conname
"#;

pub struct PostgresOrigin {
    pool: PgPool,
    database: String,
    host: String,
    port: u16,
}

impl PostgresOrigin {
    pub async fn connect(config: &PostgresYamlConfig, database: &str) -> Result<Self> {
        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(database);
        if let Some(user) = config.user.as_deref() {
            options = options.username(user);
        }
        if let Some(password) = config.password.as_deref() {
            options = options.password(password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await
            .with_context(|| {
                format!(
                    "Failed to connect to PostgreSQL database {} at {}:{}",
                    database, config.host, config.port
                )
            })?;

        Ok(Self {
            pool,
            database: database.to_string(),
            host: config.host.clone(),
            port: config.port,
        })
    }

    async fn version(&self) -> Result<String> {
        let row = sqlx::query("SHOW server_version")
            .fetch_one(&self.pool)
            .await
            .context("Failed to read server version")?;
        Ok(row.try_get::<String, _>(0)?)
    }

    async fn schemas(&self) -> Result<Vec<RawRecord>> {
        let rows = sqlx::query(SCHEMAS)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list schemas")?;

        rows.iter()
            .map(|row| -> Result<RawRecord> {
                let name: String = row.try_get("name")?;
                Ok(RawRecord::new().label(name.clone()).property("name", name))
            })
            .collect()
    }

    async fn tables(&self, schema: &str) -> Result<Vec<RawRecord>> {
        let rows = sqlx::query(TABLES)
            .bind(schema)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list tables of {}", schema))?;

        rows.iter()
            .map(|row| -> Result<RawRecord> {
                let name: String = row.try_get("name")?;
                Ok(RawRecord::new().label(name.clone()).property("name", name))
            })
            .collect()
    }

    async fn columns(&self, schema: &str, table: &str) -> Result<Vec<RawRecord>> {
        let rows = sqlx::query(COLUMNS)
            .bind(schema)
            .bind(table)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to list columns of {}.{}", schema, table))?;

        rows.iter()
            .map(|row| -> Result<RawRecord> {
                let name: String = row.try_get("name")?;
                let index: i32 = row.try_get("index")?;
                let nullable: bool = row.try_get("nullable")?;
                let data_type: String = row.try_get("type")?;
                Ok(RawRecord::new()
                    .label(name.clone())
                    .property("name", name)
                    .property("index", index)
                    .property("nullable", nullable)
                    .property("type", data_type))
            })
            .collect()
    }

    async fn foreign_keys(&self, schema: &str, table: &str, column: &str) -> Result<Vec<Reference>> {
        let rows = sqlx::query(FOREIGN_KEYS)
            .bind(schema)
            .bind(table)
            .bind(column)
            .fetch_all(&self.pool)
            .await
            .with_context(|| {
                format!("Failed to read foreign keys of {}.{}.{}", schema, table, column)
            })?;

        rows.iter()
            .map(|row| -> Result<Reference> {
                Ok(Reference {
                    name: row.try_get("name")?,
                    schema: row.try_get("schema")?,
                    table: row.try_get("table")?,
                    column: row.try_get("column")?,
                })
            })
            .collect()
    }
}

#[async_trait]
impl Origin for PostgresOrigin {
    fn resource_type(&self) -> NodeType {
        NodeType::Database
    }

    fn resource_id(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }

    async fn describe(&self) -> Result<RawRecord> {
        Ok(RawRecord::new()
            .label(self.database.clone())
            .property("name", self.database.clone())
            .property("host", self.host.clone())
            .property("port", self.port)
            .property("version", self.version().await?))
    }

    fn child_type(&self, parent: NodeType) -> Option<NodeType> {
        match parent {
            NodeType::Database => Some(NodeType::Schema),
            NodeType::Schema => Some(NodeType::Table),
            NodeType::Table => Some(NodeType::Column),
            _ => None,
        }
    }

    async fn children(&self, lineage: &Lineage) -> Result<Vec<RawRecord>> {
        match (lineage.depth(), lineage.key(0), lineage.key(1)) {
            (0, _, _) => self.schemas().await,
            (1, Some(schema), _) => self.tables(schema).await,
            (2, Some(schema), Some(table)) => self.columns(schema, table).await,
            _ => Ok(Vec::new()),
        }
    }

    async fn references(&self, lineage: &Lineage) -> Result<Vec<Reference>> {
        match (lineage.key(0), lineage.key(1), lineage.key(2)) {
            (Some(schema), Some(table), Some(column)) if lineage.depth() == 3 => {
                self.foreign_keys(schema, table, column).await
            }
            _ => Ok(Vec::new()),
        }
    }
}
