//! Metadata lookup capability.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use super::types::Metadata;
use crate::validator::MediaKind;

/// Errors returned by a metadata integration.
#[derive(Debug, Error)]
pub enum LookupError {
    /// The integration has nothing for this file.
    #[error("No metadata found for {0}")]
    NotFound(String),

    /// The integration could not be reached.
    #[error("{integration} unavailable: {reason}")]
    Unavailable { integration: String, reason: String },

    /// The integration answered with something unusable.
    #[error("Invalid response from {integration}: {reason}")]
    InvalidResponse { integration: String, reason: String },
}

/// A third-party source of metadata.
#[async_trait]
pub trait MetadataLookup: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Whether this integration knows about files of `kind`.
    fn handles(&self, kind: MediaKind) -> bool;

    /// Looks up metadata for one file.
    async fn lookup(&self, path: &Path, kind: MediaKind) -> Result<Metadata, LookupError>;

    /// Checks that the integration is reachable.
    async fn health_check(&self) -> Result<(), LookupError>;
}
