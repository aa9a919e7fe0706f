//! Broker URI parsing.
//!
//! URIs look like `scheme://host[:port][,host[:port]...]`. The scheme picks
//! the backend; the host list is handed to it as-is.

use crate::error::{BrokerError, Result};
use std::fmt;
use std::str::FromStr;

/// A parsed broker URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerUri {
    raw: String,
    scheme: String,
    hosts: Vec<String>,
}

impl BrokerUri {
    /// Parse a broker URI.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = |reason: &str| BrokerError::InvalidUri {
            uri: raw.to_string(),
            reason: reason.to_string(),
        };

        let (scheme, rest) = raw
            .split_once("://")
            .ok_or_else(|| invalid("expected scheme://host[:port]"))?;

        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(invalid("malformed scheme"));
        }

        let authority = rest.trim_end_matches('/');
        if authority.is_empty() {
            return Err(invalid("no host given"));
        }
        if authority.contains('/') {
            return Err(invalid("paths are not supported"));
        }

        let mut hosts = Vec::new();
        for host in authority.split(',') {
            let host = host.trim();
            if host.is_empty() {
                return Err(invalid("empty host in list"));
            }
            if let Some((name, port)) = host.rsplit_once(':') {
                if name.is_empty() {
                    return Err(invalid("empty host name"));
                }
                port.parse::<u16>()
                    .map_err(|_| invalid(&format!("invalid port '{port}'")))?;
            }
            hosts.push(host.to_string());
        }

        Ok(Self {
            raw: raw.to_string(),
            scheme: scheme.to_ascii_lowercase(),
            hosts,
        })
    }

    /// Lower-cased scheme.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Hosts in the order given.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl FromStr for BrokerUri {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BrokerUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_host() {
        let uri = BrokerUri::parse("kafka://localhost:9092").unwrap();
        assert_eq!(uri.scheme(), "kafka");
        assert_eq!(uri.hosts(), &["localhost:9092".to_string()]);
        assert_eq!(uri.to_string(), "kafka://localhost:9092");
    }

    #[test]
    fn test_parse_host_list() {
        let uri: BrokerUri = "KAFKA://a:9092, b:9093/".parse().unwrap();
        assert_eq!(uri.scheme(), "kafka");
        assert_eq!(uri.hosts(), &["a:9092".to_string(), "b:9093".to_string()]);
    }

    #[test]
    fn test_parse_without_port() {
        let uri = BrokerUri::parse("memory://local").unwrap();
        assert_eq!(uri.scheme(), "memory");
        assert_eq!(uri.hosts(), &["local".to_string()]);
    }

    #[test]
    fn test_unknown_scheme_still_parses() {
        let uri = BrokerUri::parse("broker://bad-host:1").unwrap();
        assert_eq!(uri.scheme(), "broker");
    }

    #[test]
    fn test_rejects_malformed() {
        for raw in [
            "localhost:9092",
            "://host:1",
            "kafka://",
            "kafka://host:notaport",
            "kafka://host:70000",
            "kafka://a:1,,b:2",
            "kafka://:9092",
            "kafka://host:1/topic",
            "ka fka://host:1",
        ] {
            assert!(
                matches!(BrokerUri::parse(raw), Err(BrokerError::InvalidUri { .. })),
                "{raw} should be rejected"
            );
        }
    }
}
