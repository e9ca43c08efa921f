//! Registered metadata integrations.

use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;

use super::lookup::{LookupError, MetadataLookup};
use super::types::Metadata;
use crate::validator::MediaKind;

/// The metadata integrations available to a run, in priority order.
#[derive(Default, Clone)]
pub struct IntegrationSet {
    lookups: Vec<Arc<dyn MetadataLookup>>,
}

impl IntegrationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an integration after the ones already registered.
    pub fn register(&mut self, lookup: Arc<dyn MetadataLookup>) {
        tracing::info!(integration = lookup.name(), "Metadata integration registered");
        self.lookups.push(lookup);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, lookup: Arc<dyn MetadataLookup>) -> Self {
        self.register(lookup);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    /// Runs every health check concurrently.
    ///
    /// Failures are logged and returned by integration name; they never stop
    /// a run.
    pub async fn health_check_all(&self) -> Vec<(String, LookupError)> {
        let checks = self.lookups.iter().map(|lookup| async move {
            (lookup.name().to_string(), lookup.health_check().await)
        });

        let mut failures = Vec::new();
        for (name, result) in join_all(checks).await {
            match result {
                Ok(()) => tracing::info!(integration = %name, "Health check passed"),
                Err(e) => {
                    tracing::warn!(integration = %name, error = %e, "Health check failed");
                    failures.push((name, e));
                }
            }
        }
        failures
    }

    /// Enriches `local` with what the integrations for `kind` know.
    ///
    /// Integrations are asked in registration order; each answer is merged
    /// over the previous result. Failures only cost enrichment.
    pub async fn lookup(&self, path: &Path, kind: MediaKind, local: Metadata) -> Metadata {
        let mut merged = local;

        for lookup in self.lookups.iter().filter(|l| l.handles(kind)) {
            match lookup.lookup(path, kind).await {
                Ok(found) => merged.merge(&found),
                Err(LookupError::NotFound(_)) => {
                    tracing::debug!(
                        integration = lookup.name(),
                        path = %path.display(),
                        "No metadata found"
                    );
                }
                Err(e) => {
                    tracing::warn!(
                        integration = lookup.name(),
                        path = %path.display(),
                        error = %e,
                        "Metadata lookup failed, continuing without it"
                    );
                }
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLookup;

    fn meta(title: &str) -> Metadata {
        Metadata {
            title: Some(title.to_string()),
            ..Metadata::default()
        }
    }

    #[tokio::test]
    async fn test_lookup_merges_in_order() {
        let set = IntegrationSet::new()
            .with(Arc::new(MockLookup::new("first", MediaKind::Audio).returning(Metadata {
                album: Some("A".to_string()),
                ..meta("First")
            })))
            .with(Arc::new(
                MockLookup::new("second", MediaKind::Audio).returning(meta("Second")),
            ));

        let result = set
            .lookup(Path::new("x.mp3"), MediaKind::Audio, meta("local"))
            .await;
        assert_eq!(result.title.as_deref(), Some("Second"));
        assert_eq!(result.album.as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_lookup_failure_keeps_local() {
        let set = IntegrationSet::new().with(Arc::new(
            MockLookup::new("broken", MediaKind::Audio).failing(),
        ));

        let result = set
            .lookup(Path::new("x.mp3"), MediaKind::Audio, meta("local"))
            .await;
        assert_eq!(result.title.as_deref(), Some("local"));
    }

    #[tokio::test]
    async fn test_lookup_skips_other_kinds() {
        let lookup = Arc::new(MockLookup::new("movies", MediaKind::Video).returning(meta("Film")));
        let set = IntegrationSet::new().with(lookup.clone());

        let result = set
            .lookup(Path::new("x.mp3"), MediaKind::Audio, Metadata::default())
            .await;
        assert_eq!(result.title, None);
        assert_eq!(lookup.lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_health_check_reports_failures() {
        let set = IntegrationSet::new()
            .with(Arc::new(MockLookup::new("ok", MediaKind::Audio)))
            .with(Arc::new(MockLookup::new("down", MediaKind::Video).failing()));

        let failures = set.health_check_all().await;
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "down");
    }
}
