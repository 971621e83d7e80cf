pub mod generator;
pub mod models;
pub mod parser;
pub mod settings;
pub mod utils;
#[cfg(feature = "web-api")]
pub mod web_handlers;

// Re-export the pipeline entry points for easier access
pub use generator::{GenerateError, Generation, Generator, UpstreamFailure};
pub use models::{AppState, Config, ConfigBuilder, ConfigError, Mode};
pub use settings::Settings;
pub use utils::cache::RetrievalCache;
