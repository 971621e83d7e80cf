//! Parsers for upstream subscription documents

pub mod upstream;

pub use upstream::{UpstreamError, UpstreamParser, DEFAULT_PLACEHOLDER_MARKERS};
