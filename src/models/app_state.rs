use thiserror::Error;

use crate::generator::{GenerateError, Generator, RegionClassifier};
use crate::parser::UpstreamParser;
use crate::settings::{Settings, SettingsError};
use crate::utils::cache::RetrievalCache;
use crate::utils::http::FetchError;

#[derive(Error, Debug)]
pub enum StartupError {
    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error(transparent)]
    Http(#[from] FetchError),

    #[error(transparent)]
    Generator(#[from] GenerateError),
}

/// Application state shared by every request
#[derive(Debug)]
pub struct AppState {
    /// Server settings
    pub settings: Settings,

    /// Generator holding the immutable base template and the retrieval cache
    pub generator: Generator,
}

impl AppState {
    /// Build the state from settings, loading the base template once
    pub fn new(settings: Settings) -> Result<Self, StartupError> {
        let template = settings.load_template()?;
        Self::with_template(settings, template)
    }

    /// Build the state around an already decoded template
    pub fn with_template(
        settings: Settings,
        template: serde_yaml::Value,
    ) -> Result<Self, StartupError> {
        let classifier = RegionClassifier::new(settings.domestic_markers.iter().map(String::as_str))
            .map_err(SettingsError::from)?;
        let parser = UpstreamParser::new(settings.placeholder_markers.iter().cloned());
        let cache = RetrievalCache::new(&settings.cache_dir)?;

        let generator = Generator::new(template, cache, settings.cache_ttl())?
            .with_parser(parser)
            .with_classifier(classifier);

        Ok(Self {
            settings,
            generator,
        })
    }
}
