//! Error types for the origins graph core

use crate::graph::query::TemplateError;
use thiserror::Error;

/// Errors surfaced by graph operations and synchronization.
#[derive(Error, Debug)]
pub enum OriginsError {
    /// A lookup matched nothing
    #[error("does not exist: {0}")]
    DoesNotExist(String),

    /// A uniqueness or precondition check failed on a mutating call
    #[error("validation error: {0}")]
    Validation(String),

    /// The source adapter failed while enumerating or describing records
    #[error("source error: {0:#}")]
    Source(anyhow::Error),

    /// A query template could not be rendered
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// The property-graph store failed
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl OriginsError {
    pub fn does_not_exist(what: impl Into<String>) -> Self {
        Self::DoesNotExist(what.into())
    }

    pub fn validation(what: impl Into<String>) -> Self {
        Self::Validation(what.into())
    }

    pub fn is_does_not_exist(&self) -> bool {
        matches!(self, Self::DoesNotExist(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type Result<T, E = OriginsError> = std::result::Result<T, E>;
