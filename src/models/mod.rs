//! Core data models for the application
//!
//! This module contains the primary data structures used throughout the application,
//! separated from the logic that operates on them.

pub mod app_state;
pub mod config;
pub mod proxy_group_config;
pub mod upstream;

pub use app_state::{AppState, StartupError};
pub use config::{Config, ConfigBuilder, ConfigError, CustomGroup, Mode};
pub use proxy_group_config::{ProxyGroupConfig, ProxyGroupConfigs, ProxyGroupType};
pub use upstream::{is_reserved_name, ChainEntry, ProxyEntry, UpstreamContent, RESERVED_NAMES};
