use std::collections::HashMap;
use std::sync::Arc;

use crate::models::integration::Provider;
use crate::vault::SecretVault;

use super::error::PipelineError;
use super::fetchers::{
    intercom::IntercomFetcher, posthog::PosthogFetcher, sentry::SentryFetcher,
    stripe::StripeFetcher, vercel::VercelFetcher,
};
use super::normalizer::DefaultNormalizer;
use super::types::{MetricFetcher, MetricNormalizer};

/// Closed provider table, built once at startup and never mutated after.
pub struct PipelineRegistry {
    fetchers: HashMap<Provider, Arc<dyn MetricFetcher>>,
    normalizers: HashMap<Provider, Arc<dyn MetricNormalizer>>,
}

impl PipelineRegistry {
    pub fn empty() -> Self {
        Self {
            fetchers: HashMap::new(),
            normalizers: HashMap::new(),
        }
    }

    pub fn register(
        mut self,
        provider: Provider,
        fetcher: Arc<dyn MetricFetcher>,
        normalizer: Arc<dyn MetricNormalizer>,
    ) -> Self {
        self.fetchers.insert(provider, fetcher);
        self.normalizers.insert(provider, normalizer);
        self
    }

    /// The production table: all five providers, sharing one HTTP client
    /// and one vault handle.
    pub fn standard(vault: Arc<dyn SecretVault>, http: reqwest::Client) -> Self {
        let normalizer: Arc<dyn MetricNormalizer> = Arc::new(DefaultNormalizer);
        Self::empty()
            .register(
                Provider::Sentry,
                Arc::new(SentryFetcher::new(vault.clone(), http.clone())),
                normalizer.clone(),
            )
            .register(
                Provider::Vercel,
                Arc::new(VercelFetcher::new(vault.clone(), http.clone())),
                normalizer.clone(),
            )
            .register(
                Provider::Posthog,
                Arc::new(PosthogFetcher::new(vault.clone(), http.clone())),
                normalizer.clone(),
            )
            .register(
                Provider::Stripe,
                Arc::new(StripeFetcher::new(vault.clone(), http.clone())),
                normalizer.clone(),
            )
            .register(
                Provider::Intercom,
                Arc::new(IntercomFetcher::new(vault, http)),
                normalizer,
            )
    }

    pub fn fetcher(&self, provider: Provider) -> Result<Arc<dyn MetricFetcher>, PipelineError> {
        self.fetchers
            .get(&provider)
            .cloned()
            .ok_or(PipelineError::Configuration {
                provider,
                kind: "fetcher",
            })
    }

    pub fn normalizer(
        &self,
        provider: Provider,
    ) -> Result<Arc<dyn MetricNormalizer>, PipelineError> {
        self.normalizers
            .get(&provider)
            .cloned()
            .ok_or(PipelineError::Configuration {
                provider,
                kind: "normalizer",
            })
    }
}
