//! Upstream feed parser
//!
//! Decodes a Clash subscription document into its proxies and proxy groups,
//! dropping placeholder entries that providers use to advertise traffic
//! quotas or expiry dates.

use std::collections::HashSet;

use log::debug;
use serde_yaml::{Mapping, Value};
use thiserror::Error;

use crate::models::{is_reserved_name, ChainEntry, ProxyEntry, UpstreamContent};
use crate::utils::http::FetchError;

/// Name fragments that mark an entry as an informational placeholder
pub const DEFAULT_PLACEHOLDER_MARKERS: [&str; 8] = [
    "剩余流量",
    "套餐到期",
    "过期时间",
    "距离下次重置",
    "官网",
    "traffic left",
    "expire",
    "reset in",
];

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Failed to decode upstream document: {0}")]
    Decode(#[from] serde_yaml::Error),

    #[error("Upstream document is not a mapping")]
    NotAMapping,

    #[error("Upstream document has no '{0}' key")]
    MissingKey(&'static str),

    #[error("Upstream field '{0}' is not a sequence")]
    NotASequence(&'static str),
}

/// Parses upstream documents with a fixed set of placeholder markers
#[derive(Debug, Clone)]
pub struct UpstreamParser {
    placeholder_markers: Vec<String>,
}

impl Default for UpstreamParser {
    fn default() -> Self {
        Self::new(DEFAULT_PLACEHOLDER_MARKERS.iter().map(|m| m.to_string()))
    }
}

impl UpstreamParser {
    pub fn new<I: IntoIterator<Item = String>>(markers: I) -> Self {
        Self {
            placeholder_markers: markers
                .into_iter()
                .map(|m| m.to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }

    /// Whether `name` carries one of the placeholder markers (case-insensitive)
    pub fn is_placeholder(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.placeholder_markers
            .iter()
            .any(|marker| name.contains(marker.as_str()))
    }

    /// Decode `raw` into proxies and chains
    ///
    /// Placeholder proxies are dropped. Chain members are kept only when they
    /// name a proxy kept from this same document, which removes placeholders,
    /// reserved names and nested group references. Chains left empty are
    /// dropped.
    pub fn parse(&self, raw: &[u8]) -> Result<UpstreamContent, UpstreamError> {
        let document: Value = serde_yaml::from_slice(raw)?;
        let document = document.as_mapping().ok_or(UpstreamError::NotAMapping)?;

        let raw_proxies = sequence_field(document, "proxies")?;
        let raw_groups = sequence_field(document, "proxy-groups")?;

        let mut proxies = Vec::with_capacity(raw_proxies.len());
        for item in raw_proxies {
            let Some(proxy) = item.as_mapping().cloned().and_then(ProxyEntry::from_mapping)
            else {
                debug!("Skipping proxy entry without a name");
                continue;
            };
            if self.is_placeholder(proxy.name()) {
                debug!("Skipping placeholder proxy '{}'", proxy.name());
                continue;
            }
            proxies.push(proxy);
        }

        let known: HashSet<&str> = proxies.iter().map(|p| p.name()).collect();
        let mut chains = Vec::new();
        for item in raw_groups {
            let Some(group) = item.as_mapping() else {
                continue;
            };
            let Some(name) = group.get("name").and_then(Value::as_str) else {
                continue;
            };
            let group_type = group
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("select")
                .to_string();
            let members: Vec<String> = group
                .get("proxies")
                .and_then(Value::as_sequence)
                .map(|seq| seq.iter().filter_map(Value::as_str).collect::<Vec<_>>())
                .unwrap_or_default()
                .into_iter()
                .filter(|member| {
                    let keep = !is_reserved_name(member)
                        && !self.is_placeholder(member)
                        && known.contains(member);
                    if !keep {
                        debug!("Dropping member '{}' from chain '{}'", member, name);
                    }
                    keep
                })
                .map(str::to_string)
                .collect();

            if members.is_empty() {
                debug!("Dropping chain '{}' with no usable members", name);
                continue;
            }
            chains.push(ChainEntry {
                name: name.to_string(),
                group_type,
                proxies: members,
            });
        }

        Ok(UpstreamContent { proxies, chains })
    }
}

/// An empty section (`proxy-groups:` with no items) decodes to null and
/// counts as an empty sequence
fn sequence_field<'a>(
    document: &'a Mapping,
    key: &'static str,
) -> Result<&'a [Value], UpstreamError> {
    match document.get(key) {
        None => Err(UpstreamError::MissingKey(key)),
        Some(Value::Null) => Ok(&[]),
        Some(value) => value
            .as_sequence()
            .map(Vec::as_slice)
            .ok_or(UpstreamError::NotASequence(key)),
    }
}
