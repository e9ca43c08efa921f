//! Mock metadata integration for testing.

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::metadata::{LookupError, Metadata, MetadataLookup};
use crate::validator::MediaKind;

/// Integration that answers every lookup for one media kind.
///
/// Without [`returning`](Self::returning) every lookup reports
/// [`LookupError::NotFound`].
#[derive(Debug)]
pub struct MockLookup {
    name: String,
    kind: MediaKind,
    response: Option<Metadata>,
    failing: bool,
    lookups: AtomicUsize,
}

impl MockLookup {
    pub fn new(name: &str, kind: MediaKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            response: None,
            failing: false,
            lookups: AtomicUsize::new(0),
        }
    }

    /// Answers every lookup with `metadata`.
    pub fn returning(mut self, metadata: Metadata) -> Self {
        self.response = Some(metadata);
        self
    }

    /// Reports the integration as unreachable.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of lookups received.
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn unavailable(&self) -> LookupError {
        LookupError::Unavailable {
            integration: self.name.clone(),
            reason: "mock outage".to_string(),
        }
    }
}

#[async_trait]
impl MetadataLookup for MockLookup {
    fn name(&self) -> &str {
        &self.name
    }

    fn handles(&self, kind: MediaKind) -> bool {
        kind == self.kind
    }

    async fn lookup(&self, path: &Path, _kind: MediaKind) -> Result<Metadata, LookupError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(self.unavailable());
        }
        self.response
            .clone()
            .ok_or_else(|| LookupError::NotFound(path.display().to_string()))
    }

    async fn health_check(&self) -> Result<(), LookupError> {
        if self.failing {
            return Err(self.unavailable());
        }
        Ok(())
    }
}
