//! Configuration generator
//!
//! Orchestrates one generation run: fetch every upstream through the
//! retrieval cache, parse and deduplicate them in declaration order, build
//! the group hierarchy and merge the result into the base template.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use log::{info, warn};
use serde_yaml::Value;
use thiserror::Error;

use crate::models::{Config, ConfigError, UpstreamContent};
use crate::parser::{UpstreamError, UpstreamParser};
use crate::utils::cache::RetrievalCache;

pub mod dedup;
pub mod group;
pub mod region;
pub mod template;

pub use dedup::NameRegistry;
pub use group::{GroupSynthesizer, DEFAULT_CHAINS, GLOBAL_AGGREGATE, PROXY_CHAIN};
pub use region::{is_domestic, RegionClassifier};
pub use template::TemplateMerger;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("Invalid request: {0}")]
    Config(#[from] ConfigError),

    #[error("Base template must be a mapping")]
    TemplateNotMapping,

    #[error("Failed to serialize proxy groups: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

/// An upstream whose contribution was dropped from the output
#[derive(Debug)]
pub struct UpstreamFailure {
    pub key: String,
    pub url: String,
    pub error: UpstreamError,
}

/// Output of one generation run
#[derive(Debug)]
pub struct Generation {
    /// The merged configuration document
    pub document: Value,
    /// Upstreams that failed and were left out, in declaration order
    pub failures: Vec<UpstreamFailure>,
}

impl Generation {
    pub fn failed_keys(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.key.as_str()).collect()
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.document)
    }
}

/// Long-lived generator state shared by every request
///
/// Holds the immutable base template; each run works on its own deep copy.
#[derive(Debug, Clone)]
pub struct Generator {
    template: Arc<Value>,
    cache: RetrievalCache,
    cache_ttl: Duration,
    parser: UpstreamParser,
    classifier: RegionClassifier,
}

impl Generator {
    pub fn new(
        template: Value,
        cache: RetrievalCache,
        cache_ttl: Duration,
    ) -> Result<Self, GenerateError> {
        if !template.is_mapping() {
            return Err(GenerateError::TemplateNotMapping);
        }
        Ok(Self {
            template: Arc::new(template),
            cache,
            cache_ttl,
            parser: UpstreamParser::default(),
            classifier: RegionClassifier::default(),
        })
    }

    pub fn with_parser(mut self, parser: UpstreamParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_classifier(mut self, classifier: RegionClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn template(&self) -> &Value {
        &self.template
    }

    pub fn cache(&self) -> &RetrievalCache {
        &self.cache
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    async fn load_upstream(&self, url: &str) -> Result<UpstreamContent, UpstreamError> {
        let raw = self.cache.retrieve(url, self.cache_ttl).await?;
        self.parser.parse(&raw)
    }

    /// Run the whole pipeline for `config`
    ///
    /// Only request errors are fatal. A failing upstream is logged, reported
    /// in [`Generation::failures`] and otherwise left out.
    pub async fn generate(&self, config: &Config) -> Result<Generation, GenerateError> {
        config.validate()?;
        info!(
            "Generating {} mode config from {} upstream(s)",
            config.mode,
            config.upstreams.len()
        );

        // Fetch concurrently; everything after this point is sequential and
        // in declaration order so the output stays stable.
        let loaded = join_all(
            config
                .upstreams
                .iter()
                .map(|(_, url)| self.load_upstream(url)),
        )
        .await;

        let mut registry = NameRegistry::new();
        let mut upstreams: Vec<(String, UpstreamContent)> = Vec::new();
        let mut failures = Vec::new();
        for ((key, url), result) in config.upstreams.iter().zip(loaded) {
            match result {
                Ok(mut content) => {
                    registry.claim(&mut content);
                    info!(
                        "Upstream '{}': {} proxies, {} chains",
                        key,
                        content.proxies.len(),
                        content.chains.len()
                    );
                    upstreams.push((key.clone(), content));
                }
                Err(error) => {
                    warn!("Skipping upstream '{}' ({}): {}", key, url, error);
                    failures.push(UpstreamFailure {
                        key: key.clone(),
                        url: url.clone(),
                        error,
                    });
                }
            }
        }

        let groups = GroupSynthesizer::new(config, &self.classifier).synthesize(&upstreams);
        let proxies: Vec<_> = upstreams
            .into_iter()
            .flat_map(|(_, content)| content.proxies)
            .collect();
        info!(
            "Generated {} proxies and {} groups, {} upstream(s) failed",
            proxies.len(),
            groups.len(),
            failures.len()
        );

        let document = TemplateMerger::new(config).merge(&self.template, proxies, &groups)?;
        Ok(Generation { document, failures })
    }
}
