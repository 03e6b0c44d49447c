//! Fixture configuration.

use std::fmt;
use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid alt name: {0}")]
    InvalidAltName(String),
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Upper bound on `validity_days`, roughly a century.
pub const MAX_VALIDITY_DAYS: u32 = 36_500;

/// A subject alternative name in `IP:<addr>` or `DNS:<name>` notation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AltName {
    Ip(IpAddr),
    Dns(String),
}

impl FromStr for AltName {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidAltName(s.to_string());
        let (kind, value) = s.split_once(':').ok_or_else(invalid)?;
        match kind {
            "IP" => value.parse().map(AltName::Ip).map_err(|_| invalid()),
            "DNS" => {
                if value.is_empty() || value.chars().any(|c| c.is_whitespace()) {
                    return Err(invalid());
                }
                Ok(AltName::Dns(value.to_string()))
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for AltName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AltName::Ip(addr) => write!(f, "IP:{}", addr),
            AltName::Dns(name) => write!(f, "DNS:{}", name),
        }
    }
}

/// Configuration for certificate generation and the handshake check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureConfig {
    /// Directory the store is (re)created in.
    #[serde(default = "default_ssl_dir")]
    pub ssl_dir: PathBuf,

    /// Host the responder listens on and the probe connects to.
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Identities every leaf certificate is valid for.
    #[serde(default = "default_alt_names")]
    pub alt_names: Vec<String>,

    /// Validity of authorities and leaves, in days.
    #[serde(default = "default_validity_days")]
    pub validity_days: u32,
}

/// Relative, so it resolves against the working directory at run time.
fn default_ssl_dir() -> PathBuf {
    Path::new("tests").join("ssl")
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    12345
}

fn default_alt_names() -> Vec<String> {
    vec![
        "IP:127.0.0.1".to_string(),
        "IP:0:0:0:0:0:0:0:1".to_string(),
        "DNS:localhost".to_string(),
    ]
}

fn default_validity_days() -> u32 {
    365
}

impl FixtureConfig {
    /// Loads config from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses config from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Returns the configured alt names in parsed form.
    pub fn parsed_alt_names(&self) -> Result<Vec<AltName>, ConfigError> {
        self.alt_names.iter().map(|s| s.parse()).collect()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "host",
                reason: "must not be empty".to_string(),
            });
        }
        if self.validity_days == 0 || self.validity_days > MAX_VALIDITY_DAYS {
            return Err(ConfigError::InvalidValue {
                field: "validity_days",
                reason: format!("must be between 1 and {}", MAX_VALIDITY_DAYS),
            });
        }
        if self.alt_names.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "alt_names",
                reason: "at least one identity is required".to_string(),
            });
        }
        self.parsed_alt_names()?;
        Ok(())
    }
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            ssl_dir: default_ssl_dir(),
            host: default_host(),
            port: default_port(),
            alt_names: default_alt_names(),
            validity_days: default_validity_days(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    const EXAMPLE_CONFIG: &str = r#"
ssl_dir: /tmp/fixtures/ssl
port: 23456
alt_names:
  - "IP:127.0.0.1"
  - "DNS:backend.internal"
validity_days: 30
"#;

    /// Tests parsing a YAML file that overrides some fields.
    /// Fields that are left out fall back to their defaults.
    #[test]
    fn parse_example_config() {
        let config = FixtureConfig::parse(EXAMPLE_CONFIG).unwrap();
        assert_eq!(config.ssl_dir, PathBuf::from("/tmp/fixtures/ssl"));
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 23456);
        assert_eq!(config.validity_days, 30);
        assert_eq!(
            config.parsed_alt_names().unwrap(),
            vec![
                AltName::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                AltName::Dns("backend.internal".to_string()),
            ]
        );
    }

    /// An empty document yields the loopback defaults.
    #[test]
    fn defaults() {
        let config = FixtureConfig::parse("{}").unwrap();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 12345);
        assert_eq!(config.ssl_dir, Path::new("tests").join("ssl"));
        assert!(config.ssl_dir.is_relative());
        assert_eq!(
            config.parsed_alt_names().unwrap(),
            vec![
                AltName::Ip(IpAddr::V4(Ipv4Addr::LOCALHOST)),
                AltName::Ip(IpAddr::V6(Ipv6Addr::LOCALHOST)),
                AltName::Dns("localhost".to_string()),
            ]
        );
    }

    #[test]
    fn alt_name_notation() {
        assert_eq!(
            "IP:::1".parse::<AltName>().unwrap(),
            AltName::Ip(IpAddr::V6(Ipv6Addr::LOCALHOST))
        );
        assert_eq!(
            AltName::Dns("localhost".to_string()).to_string(),
            "DNS:localhost"
        );
        assert!("localhost".parse::<AltName>().is_err());
        assert!("IP:localhost".parse::<AltName>().is_err());
        assert!("URI:https://localhost".parse::<AltName>().is_err());
        assert!("DNS:".parse::<AltName>().is_err());
    }

    /// Tests that bad values are rejected during validation
    /// instead of failing later during issuance.
    #[test]
    fn invalid_values_rejected() {
        assert!(FixtureConfig::parse("validity_days: 0").is_err());
        assert!(FixtureConfig::parse("validity_days: 4000000").is_err());
        assert!(FixtureConfig::parse("validity_days: 36501").is_err());
        assert!(FixtureConfig::parse("validity_days: 36500").is_ok());
        assert!(FixtureConfig::parse("host: \"\"").is_err());
        assert!(FixtureConfig::parse("alt_names: []").is_err());
        assert!(FixtureConfig::parse("alt_names: [\"EMAIL:a@b\"]").is_err());
    }
}
