use serde::Serialize;

/// Health check URL used by every synthesized url-test group
pub const HEALTH_CHECK_URL: &str = "http://www.gstatic.com/generate_204";
/// Seconds between health checks
pub const HEALTH_CHECK_INTERVAL: u32 = 300;
/// Latency tolerance in milliseconds
pub const HEALTH_CHECK_TOLERANCE: u32 = 100;

/// Type of proxy group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProxyGroupType {
    #[serde(rename = "select")]
    Select,
    #[serde(rename = "url-test")]
    URLTest,
}

impl ProxyGroupType {
    /// Get string representation of the proxy group type
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyGroupType::Select => "select",
            ProxyGroupType::URLTest => "url-test",
        }
    }
}

/// A proxy group produced by the generator
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyGroupConfig {
    /// Name of the proxy group
    pub name: String,
    /// Type of the proxy group
    #[serde(rename = "type")]
    pub group_type: ProxyGroupType,
    /// Member proxy or group names, in order
    pub proxies: Vec<String>,
    /// URL for testing
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Interval in seconds between tests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    /// Tolerance value for tests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<u32>,
}

impl ProxyGroupConfig {
    /// Create a health-probed url-test group with the fixed probe settings
    pub fn url_test(name: impl Into<String>, proxies: Vec<String>) -> Self {
        Self {
            name: name.into(),
            group_type: ProxyGroupType::URLTest,
            proxies,
            url: Some(HEALTH_CHECK_URL.to_string()),
            interval: Some(HEALTH_CHECK_INTERVAL),
            tolerance: Some(HEALTH_CHECK_TOLERANCE),
        }
    }

    /// Create a manual selection group
    pub fn select(name: impl Into<String>, proxies: Vec<String>) -> Self {
        Self {
            name: name.into(),
            group_type: ProxyGroupType::Select,
            proxies,
            url: None,
            interval: None,
            tolerance: None,
        }
    }

    /// Get string representation of the group type
    pub fn type_str(&self) -> &'static str {
        self.group_type.as_str()
    }

    pub fn to_value(&self) -> Result<serde_yaml::Value, serde_yaml::Error> {
        serde_yaml::to_value(self)
    }
}

/// A collection of proxy group configurations
pub type ProxyGroupConfigs = Vec<ProxyGroupConfig>;
