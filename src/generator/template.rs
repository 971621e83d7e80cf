//! Applies a request onto a copy of the base template

use log::debug;
use serde_yaml::Value;

use crate::models::{Config, Mode, ProxyEntry, ProxyGroupConfig};
use crate::utils::string::random_token;
use crate::utils::YamlNode;

/// Length of generated controller secrets
pub const SECRET_LENGTH: usize = 32;
/// Port the embedded DNS server listens on
pub const DNS_LISTEN_PORT: u16 = 53;

/// Mutates a deep copy of the base template according to a [`Config`]
pub struct TemplateMerger<'a> {
    config: &'a Config,
}

impl<'a> TemplateMerger<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Produce the output document from `template`, which is left untouched
    pub fn merge(
        &self,
        template: &Value,
        proxies: Vec<ProxyEntry>,
        groups: &[ProxyGroupConfig],
    ) -> Result<Value, serde_yaml::Error> {
        let mut doc = YamlNode::from(template.clone());

        self.apply_mode(&mut doc);
        self.apply_trust(&mut doc);
        self.apply_dns(&mut doc);

        let proxies: Vec<Value> = proxies.into_iter().map(ProxyEntry::into_value).collect();
        let groups = groups
            .iter()
            .map(ProxyGroupConfig::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Injecting {} proxies and {} groups into template",
            proxies.len(),
            groups.len()
        );
        doc.set_value("proxies", Value::Sequence(proxies));
        doc.set_value("proxy-groups", Value::Sequence(groups));

        Ok(doc.into_value())
    }

    fn apply_mode(&self, doc: &mut YamlNode) {
        let config = self.config;
        match config.mode {
            Mode::Proxy => {
                match config.mixed_port {
                    Some(mixed) => {
                        doc.set_value("mixed-port", port(mixed));
                        doc.remove_value("port");
                    }
                    None => {
                        doc.set_value("port", port(config.http_port));
                        doc.remove_value("mixed-port");
                    }
                }
                if let Some(socks) = config.socks_port {
                    doc.set_value("socks-port", port(socks));
                }
            }
            Mode::Redir => {
                doc.set_value("redir-port", port(config.redir_port));
                doc.set_value("tproxy-port", port(config.tproxy_port));
            }
            Mode::Tun => {
                doc.set_value("tun.enable", Value::Bool(true));
                if let Some(eth) = &config.eth {
                    doc.set_value("interface-name", Value::from(eth.as_str()));
                }
            }
        }

        if config.mode != Mode::Tun {
            doc.remove_value("tun");
        }
    }

    fn apply_trust(&self, doc: &mut YamlNode) {
        let config = self.config;
        let controller_host = if config.trusted {
            doc.set_value("allow-lan", Value::Bool(true));
            doc.set_value("bind-address", Value::from("*"));
            doc.set_value("secret", Value::from(""));
            "0.0.0.0"
        } else {
            let secret = config
                .secret
                .clone()
                .unwrap_or_else(|| random_token(SECRET_LENGTH));
            doc.set_value("allow-lan", Value::Bool(false));
            doc.set_value("bind-address", Value::from("127.0.0.1"));
            doc.set_value("secret", Value::from(secret));
            "127.0.0.1"
        };
        doc.set_value(
            "external-controller",
            Value::from(format!("{}:{}", controller_host, config.controller_port)),
        );
    }

    fn apply_dns(&self, doc: &mut YamlNode) {
        let config = self.config;
        if !config.dns {
            doc.remove_value("dns");
            return;
        }

        let listen_host = if config.mode == Mode::Redir {
            "0.0.0.0"
        } else {
            "127.0.0.1"
        };
        let enhanced_mode = if config.fake_ip { "fake-ip" } else { "redir-host" };
        doc.set_value("dns.enable", Value::Bool(true));
        doc.set_value(
            "dns.listen",
            Value::from(format!("{}:{}", listen_host, DNS_LISTEN_PORT)),
        );
        doc.set_value("dns.enhanced-mode", Value::from(enhanced_mode));

        if config.mode.is_transparent() {
            if let Some(eth) = &config.eth {
                doc.push_value("dns.nameserver", Value::from(format!("dhcp://{}", eth)));
            }
        }
    }
}

fn port(value: u16) -> Value {
    Value::from(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConfigBuilder;

    const TEMPLATE: &str = r#"
port: 1
mixed-port: 2
mode: rule
dns:
  enable: false
  nameserver:
    - 223.5.5.5
tun:
  enable: false
  stack: system
proxies: []
proxy-groups: []
rules:
  - MATCH,PROXY
"#;

    fn template() -> Value {
        serde_yaml::from_str(TEMPLATE).unwrap()
    }

    fn merge(query: &str) -> YamlNode {
        let config = ConfigBuilder::from_query(query).build().unwrap();
        let value = TemplateMerger::new(&config)
            .merge(&template(), Vec::new(), &[])
            .unwrap();
        YamlNode::from(value)
    }

    fn get<'a>(doc: &'a YamlNode, path: &str) -> Option<&'a Value> {
        doc.get_value(path)
    }

    #[test]
    fn test_template_is_not_mutated() {
        let base = template();
        let config = ConfigBuilder::from_query("mode=tun&eth=eth0&upstream.a=http://a")
            .build()
            .unwrap();
        TemplateMerger::new(&config)
            .merge(&base, Vec::new(), &[])
            .unwrap();
        assert_eq!(base, template());
    }

    #[test]
    fn test_proxy_mode_plain_port() {
        let doc = merge("http_port=8000&socks_port=8001&upstream.a=http://a");
        assert_eq!(get(&doc, "port").and_then(Value::as_u64), Some(8000));
        assert!(get(&doc, "mixed-port").is_none());
        assert_eq!(get(&doc, "socks-port").and_then(Value::as_u64), Some(8001));
        assert!(get(&doc, "tun").is_none());
        assert!(get(&doc, "redir-port").is_none());
    }

    #[test]
    fn test_proxy_mode_mixed_port_wins() {
        let doc = merge("http_port=8000&mixed_port=8002&upstream.a=http://a");
        assert_eq!(get(&doc, "mixed-port").and_then(Value::as_u64), Some(8002));
        assert!(get(&doc, "port").is_none());
    }

    #[test]
    fn test_redir_mode() {
        let doc = merge("mode=redir&eth=eth0&upstream.a=http://a");
        assert_eq!(get(&doc, "redir-port").and_then(Value::as_u64), Some(7892));
        assert_eq!(get(&doc, "tproxy-port").and_then(Value::as_u64), Some(7893));
        assert_eq!(get(&doc, "allow-lan"), Some(&Value::Bool(true)));
        assert_eq!(get(&doc, "dns.listen").and_then(Value::as_str), Some("0.0.0.0:53"));
        let nameservers = get(&doc, "dns.nameserver").unwrap().as_sequence().unwrap();
        assert_eq!(nameservers.last().and_then(Value::as_str), Some("dhcp://eth0"));
        assert!(get(&doc, "tun").is_none());
    }

    #[test]
    fn test_tun_mode() {
        let doc = merge("mode=tun&eth=en0&upstream.a=http://a");
        assert_eq!(get(&doc, "tun.enable"), Some(&Value::Bool(true)));
        assert_eq!(get(&doc, "tun.stack").and_then(Value::as_str), Some("system"));
        assert_eq!(get(&doc, "interface-name").and_then(Value::as_str), Some("en0"));
        assert_eq!(get(&doc, "dns.listen").and_then(Value::as_str), Some("127.0.0.1:53"));
        assert_eq!(get(&doc, "dns.enable"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_trusted_posture() {
        let doc = merge("trusted=1&controller_port=9999&upstream.a=http://a");
        assert_eq!(get(&doc, "allow-lan"), Some(&Value::Bool(true)));
        assert_eq!(get(&doc, "bind-address").and_then(Value::as_str), Some("*"));
        assert_eq!(get(&doc, "secret").and_then(Value::as_str), Some(""));
        assert_eq!(
            get(&doc, "external-controller").and_then(Value::as_str),
            Some("0.0.0.0:9999")
        );
    }

    #[test]
    fn test_untrusted_with_secret() {
        let doc = merge("secret=hunter2&upstream.a=http://a");
        assert_eq!(get(&doc, "allow-lan"), Some(&Value::Bool(false)));
        assert_eq!(get(&doc, "bind-address").and_then(Value::as_str), Some("127.0.0.1"));
        assert_eq!(get(&doc, "secret").and_then(Value::as_str), Some("hunter2"));
        assert_eq!(
            get(&doc, "external-controller").and_then(Value::as_str),
            Some("127.0.0.1:9090")
        );
    }

    #[test]
    fn test_untrusted_generates_secret() {
        let doc = merge("upstream.a=http://a");
        let secret = get(&doc, "secret").and_then(Value::as_str).unwrap();
        assert_eq!(secret.len(), SECRET_LENGTH);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_dns_disabled_removes_stanza() {
        let doc = merge("upstream.a=http://a");
        assert!(get(&doc, "dns").is_none());
    }

    #[test]
    fn test_dns_proxy_mode() {
        let doc = merge("dns=1&fake_ip=1&upstream.a=http://a");
        assert_eq!(get(&doc, "dns.enhanced-mode").and_then(Value::as_str), Some("fake-ip"));
        assert_eq!(get(&doc, "dns.listen").and_then(Value::as_str), Some("127.0.0.1:53"));
        let nameservers = get(&doc, "dns.nameserver").unwrap().as_sequence().unwrap();
        assert_eq!(nameservers.len(), 1);

        let doc = merge("dns=1&upstream.a=http://a");
        assert_eq!(
            get(&doc, "dns.enhanced-mode").and_then(Value::as_str),
            Some("redir-host")
        );
    }

    #[test]
    fn test_proxies_and_groups_injected() {
        let config = ConfigBuilder::from_query("upstream.a=http://a").build().unwrap();
        let proxy: serde_yaml::Mapping =
            serde_yaml::from_str("name: a1\ntype: ss\nserver: s\nport: 1").unwrap();
        let proxies = vec![ProxyEntry::from_mapping(proxy).unwrap()];
        let groups = vec![ProxyGroupConfig::url_test("all", vec!["a1".to_string()])];
        let doc = YamlNode::from(
            TemplateMerger::new(&config)
                .merge(&template(), proxies, &groups)
                .unwrap(),
        );

        assert_eq!(get(&doc, "proxies").unwrap().as_sequence().unwrap().len(), 1);
        let group = &get(&doc, "proxy-groups").unwrap().as_sequence().unwrap()[0];
        assert_eq!(group.get("type").and_then(Value::as_str), Some("url-test"));
        assert_eq!(get(&doc, "rules").unwrap().as_sequence().unwrap().len(), 1);
    }
}
