//! Derivative artifacts on demand
//!
//! Puts the generation cache in front of an external generator (thumbnail extractor,
//! waveform renderer). Callers ask for parameters; the service normalizes them into a
//! cache key and generates at most once per key.

use crate::error::GenerationError;
use crate::models::{ArtifactDescriptor, GenerationParams};
use crate::services::byte_source::bare_file_name;
use crate::services::cache_key::{normalize, CacheKey};
use crate::services::generation_cache::{CacheSettings, GenerationCache};
use async_trait::async_trait;
use mdc_common::config::CacheConfig;
use mdc_common::events::EventBus;
use std::sync::Arc;
use tracing::{debug, info};

/// External generation capability
#[async_trait]
pub trait DerivativeGenerator: Send + Sync {
    /// Produce the artifact described by `params`
    async fn generate(&self, params: &GenerationParams) -> Result<ArtifactDescriptor, GenerationError>;
}

/// Cached access to derivative artifacts
#[derive(Clone)]
pub struct DerivativeService {
    cache: GenerationCache<ArtifactDescriptor>,
    generator: Arc<dyn DerivativeGenerator>,
}

impl DerivativeService {
    pub fn new(settings: CacheSettings, generator: Arc<dyn DerivativeGenerator>) -> Self {
        Self {
            cache: GenerationCache::new(settings),
            generator,
        }
    }

    /// Service sized by the `[cache]` config section
    pub fn from_config(
        config: &CacheConfig,
        generator: Arc<dyn DerivativeGenerator>,
    ) -> crate::error::Result<Self> {
        let settings = CacheSettings::from_config(config)?;
        Ok(Self::new(settings, generator))
    }

    /// Publish cache events on `events`
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.cache = self.cache.with_events(events);
        self
    }

    pub fn cache(&self) -> &GenerationCache<ArtifactDescriptor> {
        &self.cache
    }

    /// Cache key `params` map to
    pub fn key_for(&self, params: &GenerationParams) -> CacheKey {
        normalize(params)
    }

    /// Cached artifact for `params`, never generating
    pub fn lookup(&self, params: &GenerationParams) -> Option<ArtifactDescriptor> {
        self.cache.lookup(&normalize(params))
    }

    /// Artifact for `params`, generated at most once across concurrent callers
    ///
    /// An artifact of a different kind than requested is rejected as invalid output and
    /// is not cached.
    pub async fn get_or_generate(
        &self,
        params: &GenerationParams,
    ) -> Result<ArtifactDescriptor, GenerationError> {
        let key = normalize(params);
        debug!(key = %key, "Derivative requested");

        let generator = Arc::clone(&self.generator);
        let params = params.clone();
        self.cache
            .request(key, move || async move {
                let artifact = generator.generate(&params).await?;
                if artifact.kind != params.kind {
                    return Err(GenerationError::InvalidOutput(format!(
                        "requested {} but generator produced {}",
                        params.kind, artifact.kind
                    )));
                }
                Ok(artifact)
            })
            .await
    }

    /// Drop every cached artifact derived from `file_name`
    ///
    /// `file_name` may be a full path; only its bare name is compared. Returns how many
    /// entries were removed.
    pub fn invalidate_source(&self, file_name: &str) -> usize {
        let target = bare_file_name(file_name).replace(':', "_");
        let removed = self
            .cache
            .remove_entries_matching(|key, _| key.file_name() == Some(target.as_str()));
        if removed > 0 {
            info!(file = %target, removed, "Invalidated cached derivatives");
        }
        removed
    }
}
