//! Generation request model
//!
//! A [`Config`] describes one generation call: which upstreams to merge and how
//! the resulting Clash configuration should listen, trust and resolve. It is only
//! ever produced by [`ConfigBuilder::build`], which applies every normalization
//! rule once:
//!
//! * `port` is an alias of `http_port`; an explicit `http_port` wins.
//! * `custom_groups` and `custom_chains` accept comma separated strings. Items are
//!   trimmed, empty items dropped and duplicates removed (first occurrence kept).
//! * Upstream keys and URLs are trimmed and kept in declaration order.
//! * Non-proxy modes force `dns` and `trusted` on.

use std::fmt;
use std::str::FromStr;

use log::warn;
use thiserror::Error;

/// Default plain HTTP proxy port
pub const DEFAULT_HTTP_PORT: u16 = 7890;
/// Default transparent redirect port
pub const DEFAULT_REDIR_PORT: u16 = 7892;
/// Default tproxy port
pub const DEFAULT_TPROXY_PORT: u16 = 7893;
/// Default external controller port
pub const DEFAULT_CONTROLLER_PORT: u16 = 9090;

/// Prefix of request keys declaring an upstream, e.g. `upstream.home=https://...`
pub const UPSTREAM_KEY_PREFIX: &str = "upstream.";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one upstream is required")]
    MissingUpstreams,

    #[error("mode '{0}' requires a network interface (eth)")]
    MissingInterface(Mode),

    #[error("unknown mode '{0}', expected one of proxy, tun, redir")]
    UnknownMode(String),

    #[error("invalid value '{value}' for '{field}'")]
    InvalidValue { field: String, value: String },

    #[error("upstream declaration '{0}' has an empty key or url")]
    InvalidUpstream(String),
}

/// Operating mode of the generated configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Local HTTP/SOCKS/mixed proxy
    #[default]
    Proxy,
    /// Transparent TUN interface
    Tun,
    /// Transparent redirect (iptables REDIRECT / TPROXY)
    Redir,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Proxy => "proxy",
            Mode::Tun => "tun",
            Mode::Redir => "redir",
        }
    }

    /// Whether the mode intercepts traffic transparently
    pub fn is_transparent(&self) -> bool {
        !matches!(self, Mode::Proxy)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "proxy" => Ok(Mode::Proxy),
            "tun" => Ok(Mode::Tun),
            "redir" => Ok(Mode::Redir),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

/// Recognized `custom_groups` tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomGroup {
    /// Regional aggregates over domestic proxies
    Cn,
    /// Regional aggregates over every other proxy
    Oversea,
    /// Offer `DIRECT` in every selector chain
    Direct,
}

impl CustomGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomGroup::Cn => "cn",
            CustomGroup::Oversea => "oversea",
            CustomGroup::Direct => "direct",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "cn" => Some(CustomGroup::Cn),
            "oversea" => Some(CustomGroup::Oversea),
            "direct" => Some(CustomGroup::Direct),
            _ => None,
        }
    }
}

/// A validated generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub mode: Mode,
    pub trusted: bool,
    pub http_port: u16,
    pub mixed_port: Option<u16>,
    pub socks_port: Option<u16>,
    pub redir_port: u16,
    pub tproxy_port: u16,
    pub controller_port: u16,
    pub secret: Option<String>,
    pub fake_ip: bool,
    pub dns: bool,
    pub eth: Option<String>,
    pub keep_upstream_chains: bool,
    pub custom_groups: Vec<CustomGroup>,
    /// Upstream key and feed URL, in declaration order
    pub upstreams: Vec<(String, String)>,
    pub custom_chains: Vec<String>,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn has_group(&self, group: CustomGroup) -> bool {
        self.custom_groups.contains(&group)
    }

    /// Check the request invariants that make generation impossible.
    ///
    /// Runs before any upstream is fetched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.upstreams.is_empty() {
            return Err(ConfigError::MissingUpstreams);
        }
        if self.mode.is_transparent() && self.eth.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingInterface(self.mode));
        }
        Ok(())
    }
}

/// Raw, unvalidated request values
///
/// Every setter takes the value as received; parsing happens in [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct ConfigBuilder {
    mode: Option<String>,
    trusted: Option<String>,
    http_port: Option<String>,
    port_alias: Option<String>,
    mixed_port: Option<String>,
    socks_port: Option<String>,
    redir_port: Option<String>,
    tproxy_port: Option<String>,
    controller_port: Option<String>,
    secret: Option<String>,
    fake_ip: Option<String>,
    dns: Option<String>,
    eth: Option<String>,
    keep_upstream_chains: Option<String>,
    custom_groups: Vec<String>,
    upstreams: Vec<(String, String)>,
    custom_chains: Vec<String>,
}

impl ConfigBuilder {
    /// Build a builder from a URL query string such as
    /// `mode=redir&eth=eth0&upstream.home=https%3A%2F%2Fexample.com%2Fsub`
    pub fn from_query(query: &str) -> Self {
        let pairs = url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes());
        Self::from_pairs(pairs.map(|(k, v)| (k.into_owned(), v.into_owned())))
    }

    /// Build a builder from ordered key/value pairs.
    ///
    /// Unknown keys are ignored with a warning. Repeated list keys accumulate.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut builder = Self::default();
        for (key, value) in pairs {
            builder.set(key.as_ref(), value.into());
        }
        builder
    }

    fn set(&mut self, key: &str, value: String) {
        if let Some(upstream_key) = key.strip_prefix(UPSTREAM_KEY_PREFIX) {
            self.upstreams.push((upstream_key.to_string(), value));
            return;
        }
        match key {
            "mode" => self.mode = Some(value),
            "trusted" => self.trusted = Some(value),
            "http_port" => self.http_port = Some(value),
            "port" => self.port_alias = Some(value),
            "mixed_port" => self.mixed_port = Some(value),
            "socks_port" => self.socks_port = Some(value),
            "redir_port" => self.redir_port = Some(value),
            "tproxy_port" => self.tproxy_port = Some(value),
            "controller_port" => self.controller_port = Some(value),
            "secret" => self.secret = Some(value),
            "fake_ip" => self.fake_ip = Some(value),
            "dns" => self.dns = Some(value),
            "eth" => self.eth = Some(value),
            "keep_upstream_chains" => self.keep_upstream_chains = Some(value),
            "custom_groups" => self.custom_groups.push(value),
            "custom_chains" => self.custom_chains.push(value),
            _ => warn!("Ignoring unknown request key '{}'", key),
        }
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = Some(mode.into());
        self
    }

    pub fn trusted(mut self, trusted: bool) -> Self {
        self.trusted = Some(trusted.to_string());
        self
    }

    pub fn http_port(mut self, port: u16) -> Self {
        self.http_port = Some(port.to_string());
        self
    }

    pub fn mixed_port(mut self, port: u16) -> Self {
        self.mixed_port = Some(port.to_string());
        self
    }

    pub fn socks_port(mut self, port: u16) -> Self {
        self.socks_port = Some(port.to_string());
        self
    }

    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    pub fn fake_ip(mut self, fake_ip: bool) -> Self {
        self.fake_ip = Some(fake_ip.to_string());
        self
    }

    pub fn dns(mut self, dns: bool) -> Self {
        self.dns = Some(dns.to_string());
        self
    }

    pub fn eth(mut self, eth: impl Into<String>) -> Self {
        self.eth = Some(eth.into());
        self
    }

    pub fn keep_upstream_chains(mut self, keep: bool) -> Self {
        self.keep_upstream_chains = Some(keep.to_string());
        self
    }

    pub fn custom_groups(mut self, groups: impl Into<String>) -> Self {
        self.custom_groups.push(groups.into());
        self
    }

    pub fn custom_chains(mut self, chains: impl Into<String>) -> Self {
        self.custom_chains.push(chains.into());
        self
    }

    pub fn upstream(mut self, key: impl Into<String>, url: impl Into<String>) -> Self {
        self.upstreams.push((key.into(), url.into()));
        self
    }

    /// Normalize and validate into a [`Config`]
    pub fn build(self) -> Result<Config, ConfigError> {
        let mode = match &self.mode {
            Some(mode) => mode.parse::<Mode>()?,
            None => Mode::default(),
        };

        let mut trusted = parse_flag("trusted", self.trusted.as_deref())?.unwrap_or(false);
        let mut dns = parse_flag("dns", self.dns.as_deref())?.unwrap_or(false);
        if mode.is_transparent() {
            trusted = true;
            dns = true;
        }

        let http_port = match parse_port("http_port", self.http_port.as_deref())? {
            Some(port) => port,
            None => parse_port("port", self.port_alias.as_deref())?.unwrap_or(DEFAULT_HTTP_PORT),
        };

        let mut upstreams: Vec<(String, String)> = Vec::with_capacity(self.upstreams.len());
        for (key, url) in &self.upstreams {
            let (key, url) = (key.trim(), url.trim());
            if key.is_empty() || url.is_empty() {
                return Err(ConfigError::InvalidUpstream(format!("{}={}", key, url)));
            }
            match upstreams.iter_mut().find(|(existing, _)| existing == key) {
                Some(entry) => {
                    warn!("Upstream '{}' declared twice, keeping the last url", key);
                    entry.1 = url.to_string();
                }
                None => upstreams.push((key.to_string(), url.to_string())),
            }
        }

        let mut custom_groups = Vec::new();
        for token in split_list(&self.custom_groups) {
            match CustomGroup::parse(&token) {
                Some(group) => custom_groups.push(group),
                None => warn!("Ignoring unknown custom group token '{}'", token),
            }
        }

        let config = Config {
            mode,
            trusted,
            http_port,
            mixed_port: parse_port("mixed_port", self.mixed_port.as_deref())?,
            socks_port: parse_port("socks_port", self.socks_port.as_deref())?,
            redir_port: parse_port("redir_port", self.redir_port.as_deref())?
                .unwrap_or(DEFAULT_REDIR_PORT),
            tproxy_port: parse_port("tproxy_port", self.tproxy_port.as_deref())?
                .unwrap_or(DEFAULT_TPROXY_PORT),
            controller_port: parse_port("controller_port", self.controller_port.as_deref())?
                .unwrap_or(DEFAULT_CONTROLLER_PORT),
            secret: non_empty(self.secret),
            fake_ip: parse_flag("fake_ip", self.fake_ip.as_deref())?.unwrap_or(false),
            dns,
            eth: non_empty(self.eth),
            keep_upstream_chains: parse_flag(
                "keep_upstream_chains",
                self.keep_upstream_chains.as_deref(),
            )?
            .unwrap_or(false),
            custom_groups: dedup_keep_first(custom_groups),
            upstreams,
            custom_chains: dedup_keep_first(split_list(&self.custom_chains)),
        };
        config.validate()?;
        Ok(config)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(field: &str, value: Option<&str>) -> Result<Option<bool>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "" => Ok(None),
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_port(field: &str, value: Option<&str>) -> Result<Option<u16>, ConfigError> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    match value.parse::<u16>() {
        Ok(port) if port != 0 => Ok(Some(port)),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}

fn split_list(values: &[String]) -> Vec<String> {
    values
        .iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn dedup_keep_first<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
