//! Cross-upstream proxy name deduplication

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::models::UpstreamContent;

/// Separator between a clashing name and its disambiguating counter
pub const DEDUP_SEPARATOR: char = '#';

/// Set of proxy names already claimed during one generation run
///
/// Threaded through every upstream in declaration order; each call to
/// [`claim`](Self::claim) makes the upstream's names unique against all
/// previous ones.
#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    names: HashSet<String>,
}

impl NameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// First free name among `base`, `base#1`, `base#2`, ...
    pub fn next_free(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        (1u64..)
            .map(|n| format!("{}{}{}", base, DEDUP_SEPARATOR, n))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Rename `content`'s proxies so none collides with a claimed name, rewrite
    /// chain members accordingly and claim the final names.
    ///
    /// When a name occurs more than once in the same upstream, chain
    /// references keep pointing at its first occurrence.
    pub fn claim(&mut self, content: &mut UpstreamContent) {
        let mut renames: HashMap<String, String> = HashMap::new();
        let mut seen: HashSet<String> = HashSet::new();

        for proxy in &mut content.proxies {
            let original = proxy.name().to_string();
            let unique = self.next_free(&original);
            let first_occurrence = seen.insert(original.clone());

            if unique != original {
                debug!("Renaming proxy '{}' to '{}'", original, unique);
                if first_occurrence {
                    renames.insert(original, unique.clone());
                }
                proxy.set_name(unique.clone());
            }
            self.names.insert(unique);
        }

        if renames.is_empty() {
            return;
        }
        for chain in &mut content.chains {
            for member in &mut chain.proxies {
                if let Some(renamed) = renames.get(member.as_str()) {
                    *member = renamed.clone();
                }
            }
        }
    }
}
