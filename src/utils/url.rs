//! URL encoding and link rewriting utilities

use serde_yaml::Value;

/// Encodes a string using URL encoding
///
/// # Arguments
/// * `input` - The string to encode
///
/// # Returns
/// * String containing the URL-encoded input
///
/// # Examples
/// ```
/// use submerge::utils::url::url_encode;
///
/// let encoded = url_encode("Hello World!");
/// assert_eq!(encoded, "Hello%20World%21");
/// ```
pub fn url_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

/// Link that downloads `target` through this server's cache endpoint
pub fn cache_link(public_url: &str, target: &str) -> String {
    format!(
        "{}/cache?url={}",
        public_url.trim_end_matches('/'),
        url_encode(target)
    )
}

/// Point every `rule-providers.*.url` of `document` at the cache endpoint
///
/// # Returns
/// * Number of providers rewritten
pub fn rewrite_provider_urls(document: &mut Value, public_url: &str) -> usize {
    let Some(providers) = document
        .get_mut("rule-providers")
        .and_then(Value::as_mapping_mut)
    else {
        return 0;
    };

    let mut rewritten = 0;
    for (_, provider) in providers.iter_mut() {
        let Some(provider) = provider.as_mapping_mut() else {
            continue;
        };
        let Some(target) = provider.get("url").and_then(Value::as_str) else {
            continue;
        };
        let link = cache_link(public_url, target);
        provider.insert(Value::from("url"), Value::from(link));
        rewritten += 1;
    }
    rewritten
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_link() {
        assert_eq!(
            cache_link("https://sub.example.com/", "https://r.example.com/a.yaml?x=1"),
            "https://sub.example.com/cache?url=https%3A%2F%2Fr.example.com%2Fa.yaml%3Fx%3D1"
        );
    }

    #[test]
    fn test_rewrite_provider_urls() {
        let mut doc: Value = serde_yaml::from_str(
            r#"
rule-providers:
  reject:
    type: http
    behavior: domain
    url: https://r.example.com/reject.txt
    path: ./ruleset/reject.yaml
  local:
    type: file
    path: ./local.yaml
"#,
        )
        .unwrap();

        assert_eq!(rewrite_provider_urls(&mut doc, "http://10.0.0.1:25500"), 1);
        assert_eq!(
            doc["rule-providers"]["reject"]["url"].as_str(),
            Some("http://10.0.0.1:25500/cache?url=https%3A%2F%2Fr.example.com%2Freject.txt")
        );
        assert!(doc["rule-providers"]["local"].get("url").is_none());
    }

    #[test]
    fn test_rewrite_without_providers() {
        let mut doc: Value = serde_yaml::from_str("rules: []").unwrap();
        assert_eq!(rewrite_provider_urls(&mut doc, "http://x"), 0);
    }
}
