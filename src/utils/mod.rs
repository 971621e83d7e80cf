pub mod cache;
pub mod http;
pub mod string;
pub mod url;
pub mod yaml;

// Re-export common utilities
pub use cache::RetrievalCache;
pub use http::FetchError;
pub use yaml::YamlNode;
