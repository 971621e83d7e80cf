use serde_yaml::{Mapping, Value};

/// Group names reserved by the Clash core; never valid chain members from a feed
pub const RESERVED_NAMES: [&str; 3] = ["DIRECT", "REJECT", "GLOBAL"];

pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// A proxy record taken verbatim from an upstream feed
///
/// Only the `name` field is ever touched; every protocol specific field is
/// carried through untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ProxyEntry {
    name: String,
    fields: Mapping,
}

impl ProxyEntry {
    /// Wrap a YAML mapping, returning `None` if it has no string `name`
    pub fn from_mapping(fields: Mapping) -> Option<Self> {
        let name = fields.get("name")?.as_str()?.to_string();
        Some(Self { name, fields })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: String) {
        self.fields
            .insert(Value::from("name"), Value::from(name.as_str()));
        self.name = name;
    }

    pub fn fields(&self) -> &Mapping {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Mapping(self.fields)
    }
}

/// A group ("chain") declared by an upstream feed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEntry {
    pub name: String,
    pub group_type: String,
    pub proxies: Vec<String>,
}

impl ChainEntry {
    pub fn is_url_test(&self) -> bool {
        self.group_type == "url-test"
    }
}

/// Everything one upstream contributes to a generation run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpstreamContent {
    pub proxies: Vec<ProxyEntry>,
    pub chains: Vec<ChainEntry>,
}

impl UpstreamContent {
    pub fn proxy_names(&self) -> Vec<String> {
        self.proxies.iter().map(|p| p.name().to_string()).collect()
    }
}
