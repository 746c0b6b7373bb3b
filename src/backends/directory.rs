//! Directory origin: one filesystem root, every regular file below it as a
//! `File` component keyed by its relative path.

use super::{Lineage, Origin, RawRecord};
use crate::graph::models::NodeType;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use walkdir::WalkDir;

const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

pub struct DirectoryOrigin {
    root: PathBuf,
}

impl DirectoryOrigin {
    /// Fails if the path does not exist or is not a directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let root = std::fs::canonicalize(path.as_ref())
            .with_context(|| format!("Cannot resolve {}", path.as_ref().display()))?;
        if !root.is_dir() {
            anyhow::bail!("{} is not a directory", root.display());
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn format_time(time: std::io::Result<SystemTime>) -> Option<String> {
    time.ok()
        .map(|t| DateTime::<Local>::from(t).format(TIME_FORMAT).to_string())
}

/// Birth time, or the inode change time on unix filesystems that do not
/// record one.
fn creation_time(
    birth: std::io::Result<SystemTime>,
    metadata: &Metadata,
) -> std::io::Result<SystemTime> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        if birth.is_err() {
            if let Some(changed) =
                DateTime::from_timestamp(metadata.ctime(), metadata.ctime_nsec() as u32)
            {
                return Ok(SystemTime::from(changed));
            }
        }
    }
    #[cfg(not(unix))]
    let _ = metadata;
    birth
}

fn file_record(relative: &Path, metadata: &Metadata) -> RawRecord {
    let path = relative.to_string_lossy().into_owned();
    let mut record = RawRecord::new()
        .label(path.clone())
        .property("path", path)
        .property("size", metadata.len());

    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        record = record
            .property("mode", metadata.mode())
            .property("uid", metadata.uid())
            .property("gid", metadata.gid());
    }

    for (key, time) in [
        ("accessed", metadata.accessed()),
        ("modified", metadata.modified()),
        ("created", creation_time(metadata.created(), metadata)),
    ] {
        if let Some(formatted) = format_time(time) {
            record = record.property(key, formatted);
        }
    }
    record
}

fn walk(root: &Path) -> Vec<RawRecord> {
    let mut records = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Skipping {}: {}", entry.path().display(), e);
                continue;
            }
        };
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        records.push(file_record(relative, &metadata));
    }

    records
}

#[async_trait]
impl Origin for DirectoryOrigin {
    fn resource_type(&self) -> NodeType {
        NodeType::Directory
    }

    fn resource_id(&self) -> String {
        self.root.to_string_lossy().into_owned()
    }

    async fn describe(&self) -> Result<RawRecord> {
        let path = self.resource_id();
        let name = self
            .root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.clone());
        Ok(RawRecord::new()
            .label(name.clone())
            .property("name", name)
            .property("path", path))
    }

    fn child_type(&self, parent: NodeType) -> Option<NodeType> {
        match parent {
            NodeType::Directory => Some(NodeType::File),
            _ => None,
        }
    }

    async fn children(&self, lineage: &Lineage) -> Result<Vec<RawRecord>> {
        if !lineage.is_root() {
            return Ok(Vec::new());
        }

        let root = self.root.clone();
        let records = tokio::task::spawn_blocking(move || walk(&root))
            .await
            .context("Directory walk panicked")?;

        tracing::debug!(root = %self.root.display(), files = records.len(), "Directory scanned");
        Ok(records)
    }
}
