//! Domestic region classification of proxy names

use lazy_static::lazy_static;
use regex::{Regex, RegexBuilder};

/// Markers identifying the domestic region (mainland China, Hong Kong,
/// Macau and Taiwan) in a proxy name
pub const DEFAULT_DOMESTIC_MARKERS: [&str; 13] = [
    "CN", "HK", "MO", "TW", "China", "Hong Kong", "HongKong", "Macau", "Taiwan", "中国", "香港",
    "澳门", "台湾",
];

/// Region token for proxies matching the classifier
pub const DOMESTIC_REGION: &str = "cn";
/// Region token for every other proxy
pub const OVERSEA_REGION: &str = "oversea";

lazy_static! {
    static ref DEFAULT_CLASSIFIER: RegionClassifier =
        RegionClassifier::new(DEFAULT_DOMESTIC_MARKERS.iter().copied())
            .expect("default region markers form a valid pattern");
}

/// Case-insensitive marker match against proxy names
///
/// ASCII markers must not touch another ASCII letter, so `HK-1`, `HK01` and
/// `HK_Premium` are domestic but `CHKN` is not. Markers in other scripts
/// match as plain substrings.
#[derive(Debug, Clone)]
pub struct RegionClassifier {
    pattern: Option<Regex>,
}

impl Default for RegionClassifier {
    fn default() -> Self {
        DEFAULT_CLASSIFIER.clone()
    }
}

impl RegionClassifier {
    /// Build a classifier from a marker list; an empty list matches nothing
    pub fn new<'a, I: IntoIterator<Item = &'a str>>(markers: I) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = markers
            .into_iter()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(|marker| {
                let escaped = regex::escape(marker);
                if marker.is_ascii() {
                    format!("(?:^|[^A-Za-z]){}(?:[^A-Za-z]|$)", escaped)
                } else {
                    escaped
                }
            })
            .collect();

        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }
        let pattern = RegexBuilder::new(&alternatives.join("|"))
            .case_insensitive(true)
            .build()?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }

    pub fn is_domestic(&self, name: &str) -> bool {
        self.pattern.as_ref().map_or(false, |p| p.is_match(name))
    }

    /// Region token for `name`
    pub fn region_of(&self, name: &str) -> &'static str {
        if self.is_domestic(name) {
            DOMESTIC_REGION
        } else {
            OVERSEA_REGION
        }
    }
}

/// Classify with the default marker set
pub fn is_domestic(name: &str) -> bool {
    DEFAULT_CLASSIFIER.is_domestic(name)
}
