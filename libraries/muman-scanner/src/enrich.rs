//! Optional enrichment from an external lookup service
use muman_core::{ContentId, MetadataLookup, TrackMetadata};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on one lookup
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(10);

/// Fills unknown fields from a [`MetadataLookup`]. Lookup failures and
/// timeouts are logged and never block indexing.
#[derive(Clone)]
pub struct Enricher {
    lookup: Arc<dyn MetadataLookup>,
    timeout: Duration,
}

impl Enricher {
    pub fn new(lookup: Arc<dyn MetadataLookup>) -> Self {
        Self {
            lookup,
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    /// Give up on a lookup after `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Fill unknown fields of `metadata`; returns how many were filled
    pub async fn enrich(&self, identity: &ContentId, metadata: &mut TrackMetadata) -> usize {
        if !metadata.has_unknown_fields() {
            return 0;
        }
        let lookup = self.lookup.lookup(identity, metadata);
        let Ok(result) = tokio::time::timeout(self.timeout, lookup).await else {
            warn!(
                identity = %identity.short(),
                timeout = ?self.timeout,
                "Metadata lookup timed out"
            );
            return 0;
        };
        match result {
            Ok(Some(remote)) => {
                let filled = metadata.fill_unknown_from(&remote);
                debug!(identity = %identity.short(), filled, "Enriched metadata");
                filled
            }
            Ok(None) => {
                debug!(identity = %identity.short(), "No lookup match");
                0
            }
            Err(e) => {
                warn!(identity = %identity.short(), "Metadata lookup failed: {}", e);
                0
            }
        }
    }
}

impl std::fmt::Debug for Enricher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enricher")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use muman_core::{AudioFormat, Field, MumanError, Result};

    struct Fixed(Option<TrackMetadata>);

    #[async_trait]
    impl MetadataLookup for Fixed {
        async fn lookup(&self, _: &ContentId, _: &TrackMetadata) -> Result<Option<TrackMetadata>> {
            Ok(self.0.clone())
        }
    }

    struct Failing;

    #[async_trait]
    impl MetadataLookup for Failing {
        async fn lookup(&self, _: &ContentId, _: &TrackMetadata) -> Result<Option<TrackMetadata>> {
            Err(MumanError::Lookup("service unavailable".to_string()))
        }
    }

    struct Stalled;

    #[async_trait]
    impl MetadataLookup for Stalled {
        async fn lookup(&self, _: &ContentId, _: &TrackMetadata) -> Result<Option<TrackMetadata>> {
            std::future::pending().await
        }
    }

    fn local() -> TrackMetadata {
        let mut metadata = TrackMetadata::unknown(AudioFormat::Flac);
        metadata.title = Field::Known("Local title".to_string());
        metadata
    }

    #[tokio::test]
    async fn fills_only_unknown_fields() {
        let mut remote = TrackMetadata::unknown(AudioFormat::Flac);
        remote.title = Field::Known("Remote title".to_string());
        remote.artist = Field::Known("Remote artist".to_string());

        let enricher = Enricher::new(Arc::new(Fixed(Some(remote))));
        let mut metadata = local();
        let filled = enricher
            .enrich(&ContentId::from_bytes([1; 32]), &mut metadata)
            .await;

        assert_eq!(filled, 1);
        assert_eq!(metadata.title, Field::Known("Local title".to_string()));
        assert_eq!(metadata.artist, Field::Known("Remote artist".to_string()));
    }

    #[tokio::test]
    async fn failures_leave_metadata_untouched() {
        let enricher = Enricher::new(Arc::new(Failing));
        let mut metadata = local();
        let filled = enricher
            .enrich(&ContentId::from_bytes([1; 32]), &mut metadata)
            .await;

        assert_eq!(filled, 0);
        assert_eq!(metadata, local());
    }

    #[tokio::test]
    async fn stalled_lookup_times_out() {
        let enricher = Enricher::new(Arc::new(Stalled)).with_timeout(Duration::from_millis(20));
        let mut metadata = local();
        let filled = enricher
            .enrich(&ContentId::from_bytes([1; 32]), &mut metadata)
            .await;

        assert_eq!(filled, 0);
        assert_eq!(metadata, local());
    }
}
