//! Group generation
//!
//! Builds the proxy group hierarchy for one run:
//!
//! 1. `all`: url-test over every proxy.
//! 2. `all-<region>` for each regional token in `custom_groups`.
//! 3. `<key>` and `<key>-<region>` per upstream.
//! 4. `<key>-<chain>` for kept upstream url-test chains.
//! 5. Selector chains offering every aggregate above.
//!
//! Selectors are emitted first, then aggregates. Aggregates with no members
//! are never emitted.

use std::collections::HashSet;

use log::{debug, warn};

use crate::generator::region::{RegionClassifier, DOMESTIC_REGION, OVERSEA_REGION};
use crate::models::{
    is_reserved_name, Config, CustomGroup, ProxyGroupConfig, ProxyGroupConfigs, UpstreamContent,
};

/// Name of the global url-test aggregate
pub const GLOBAL_AGGREGATE: &str = "all";
/// Pass-through selector offered by every other selector
pub const PROXY_CHAIN: &str = "PROXY";
/// Built-in selector chains, referenced by the base template's rules
pub const DEFAULT_CHAINS: [&str; 5] = [PROXY_CHAIN, "MEDIA", "AI", "TELEGRAM", "FINAL"];

/// Builds proxy groups from deduplicated upstream content
pub struct GroupSynthesizer<'a> {
    config: &'a Config,
    classifier: &'a RegionClassifier,
}

impl<'a> GroupSynthesizer<'a> {
    pub fn new(config: &'a Config, classifier: &'a RegionClassifier) -> Self {
        Self { config, classifier }
    }

    /// Region tokens requested by the config, in request order
    fn regions(&self) -> Vec<&'static str> {
        self.config
            .custom_groups
            .iter()
            .filter_map(|group| match group {
                CustomGroup::Cn => Some(DOMESTIC_REGION),
                CustomGroup::Oversea => Some(OVERSEA_REGION),
                CustomGroup::Direct => None,
            })
            .collect()
    }

    fn regional_members(&self, names: &[String], region: &str) -> Vec<String> {
        names
            .iter()
            .filter(|name| self.classifier.region_of(name) == region)
            .cloned()
            .collect()
    }

    /// Build every group for `upstreams`, which must already be deduplicated
    /// and in upstream declaration order.
    pub fn synthesize(&self, upstreams: &[(String, UpstreamContent)]) -> ProxyGroupConfigs {
        let mut names = NameClaims::default();
        for (_, content) in upstreams {
            for proxy in &content.proxies {
                names.reserve_proxy(proxy.name());
            }
        }
        for chain in DEFAULT_CHAINS
            .iter()
            .copied()
            .chain(self.config.custom_chains.iter().map(String::as_str))
        {
            names.reserve(chain);
        }

        let regions = self.regions();
        let mut aggregates: ProxyGroupConfigs = Vec::new();

        let all_names: Vec<String> = upstreams
            .iter()
            .flat_map(|(_, content)| content.proxy_names())
            .collect();
        self.push_aggregate(&mut aggregates, &mut names, GLOBAL_AGGREGATE, &all_names, &regions);

        for (key, content) in upstreams {
            let own = content.proxy_names();
            self.push_aggregate(&mut aggregates, &mut names, key, &own, &regions);
        }

        if self.config.keep_upstream_chains {
            for (key, content) in upstreams {
                let own: HashSet<String> = content.proxy_names().into_iter().collect();
                for chain in content.chains.iter().filter(|c| c.is_url_test()) {
                    let members: HashSet<String> = chain.proxies.iter().cloned().collect();
                    if members == own {
                        debug!(
                            "Chain '{}' of upstream '{}' duplicates its aggregate, skipping",
                            chain.name, key
                        );
                        continue;
                    }
                    let name = format!("{}-{}", key, chain.name);
                    if names.claim(&name) {
                        aggregates.push(ProxyGroupConfig::url_test(name, chain.proxies.clone()));
                    } else {
                        warn!("Group name '{}' already in use, skipping chain", name);
                    }
                }
            }
        }

        let mut groups = self.selectors(upstreams, &aggregates, &mut names);
        groups.extend(aggregates);
        groups
    }

    /// Push `<base>` and its regional variants `<base>-<region>`
    fn push_aggregate(
        &self,
        aggregates: &mut ProxyGroupConfigs,
        names: &mut NameClaims,
        base: &str,
        members: &[String],
        regions: &[&str],
    ) {
        if members.is_empty() {
            return;
        }
        if names.claim(base) {
            aggregates.push(ProxyGroupConfig::url_test(base, members.to_vec()));
        } else {
            warn!("Group name '{}' already in use, skipping aggregate", base);
        }

        for region in regions {
            let regional = self.regional_members(members, region);
            if regional.is_empty() {
                continue;
            }
            let name = format!("{}-{}", base, region);
            if names.claim(&name) {
                aggregates.push(ProxyGroupConfig::url_test(name, regional));
            } else {
                warn!("Group name '{}' already in use, skipping aggregate", name);
            }
        }
    }

    /// Selector chain names: built-ins, then upstream chain names, then custom chains
    fn selector_names(
        &self,
        upstreams: &[(String, UpstreamContent)],
        names: &mut NameClaims,
    ) -> Vec<String> {
        let mut selectors: Vec<String> = DEFAULT_CHAINS.iter().map(|s| s.to_string()).collect();

        for (_, content) in upstreams {
            for chain in &content.chains {
                let name = chain.name.as_str();
                if selectors.iter().any(|s| s == name) {
                    continue;
                }
                if is_reserved_name(name) || name == DOMESTIC_REGION || name == OVERSEA_REGION {
                    continue;
                }
                if names.claim(name) {
                    selectors.push(name.to_string());
                }
            }
        }

        for chain in &self.config.custom_chains {
            if selectors.contains(chain) || is_reserved_name(chain) {
                continue;
            }
            if names.is_proxy(chain) {
                warn!("Custom chain '{}' is already a proxy name, skipping", chain);
                continue;
            }
            selectors.push(chain.clone());
        }
        selectors
    }

    fn selectors(
        &self,
        upstreams: &[(String, UpstreamContent)],
        aggregates: &[ProxyGroupConfig],
        names: &mut NameClaims,
    ) -> ProxyGroupConfigs {
        let offer_direct = self.config.has_group(CustomGroup::Direct);
        let choices: Vec<String> = aggregates.iter().map(|g| g.name.clone()).collect();

        self.selector_names(upstreams, names)
            .into_iter()
            .map(|name| {
                let mut members = Vec::with_capacity(choices.len() + 2);
                if name != PROXY_CHAIN {
                    members.push(PROXY_CHAIN.to_string());
                }
                members.extend(choices.iter().cloned());
                if offer_direct || members.is_empty() {
                    members.push("DIRECT".to_string());
                }
                ProxyGroupConfig::select(name, members)
            })
            .collect()
    }
}

/// Names already used by a proxy or group in the output
#[derive(Debug, Default)]
struct NameClaims {
    used: HashSet<String>,
    reserved: HashSet<String>,
    proxies: HashSet<String>,
}

impl NameClaims {
    fn reserve_proxy(&mut self, name: &str) {
        self.proxies.insert(name.to_string());
        self.reserve(name);
    }

    fn is_proxy(&self, name: &str) -> bool {
        self.proxies.contains(name)
    }

    /// Hold `name` back from [`claim`](Self::claim) without using it
    fn reserve(&mut self, name: &str) {
        self.reserved.insert(name.to_string());
    }

    /// Claim `name` for a new group; `false` if it is reserved or taken
    fn claim(&mut self, name: &str) -> bool {
        if is_reserved_name(name) || self.reserved.contains(name) {
            return false;
        }
        self.used.insert(name.to_string())
    }
}
