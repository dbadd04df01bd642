use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::dnssec::{AlgorithmPolicy, ChainVerifier, TrustAnchor, ValidityCheck};
use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// JSON file holding the trusted tree roots
    pub roots_path: PathBuf,

    /// Base URLs queried when a certificate lacks a proof extension
    pub external_services: Vec<String>,

    /// Per-request timeout for external services
    #[serde(with = "duration_secs")]
    pub fetch_timeout: Duration,

    /// Whether RRSIG inception/expiration are enforced against the clock
    pub check_signature_validity: bool,

    /// DNSSEC algorithm numbers accepted in RRSIGs
    pub allowed_algorithms: Vec<u8>,

    /// Root DNSKEY in presentation format, replaces the Handshake root key
    pub trust_anchor: Option<String>,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            roots_path: PathBuf::from("roots.json"),
            external_services: Vec::new(),
            fetch_timeout: Duration::from_secs(10),
            check_signature_validity: false,
            allowed_algorithms: AlgorithmPolicy::default().allowed().collect(),
            trust_anchor: None,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

impl VerifierConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("SANE_ROOTS_PATH") {
            config.roots_path = PathBuf::from(path);
        }

        if let Ok(services) = std::env::var("SANE_EXTERNAL_SERVICES") {
            config.external_services = split_list(&services);
        }

        if let Ok(timeout_str) = std::env::var("SANE_FETCH_TIMEOUT") {
            let timeout_secs = timeout_str
                .parse::<u64>()
                .map_err(|_| ConfigError::InvalidTimeout(timeout_str.clone()))?;
            config.fetch_timeout = Duration::from_secs(timeout_secs);
        }

        if let Ok(check) = std::env::var("SANE_CHECK_SIGNATURE_VALIDITY") {
            config.check_signature_validity = parse_bool(&check, false);
        }

        if let Ok(algorithms) = std::env::var("SANE_ALLOWED_ALGORITHMS") {
            config.allowed_algorithms = split_list(&algorithms)
                .iter()
                .map(|a| {
                    a.parse::<u8>()
                        .map_err(|_| ConfigError::InvalidAlgorithms(algorithms.clone()))
                })
                .collect::<Result<_, _>>()?;
        }

        if let Ok(anchor) = std::env::var("SANE_TRUST_ANCHOR") {
            config.trust_anchor = Some(anchor);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "Timeout must be greater than 0".to_string(),
            ));
        }
        if self.fetch_timeout.as_secs() > 300 {
            return Err(ConfigError::InvalidTimeout(
                "Timeout too large (max 300 seconds)".to_string(),
            ));
        }

        for service in &self.external_services {
            if !(service.starts_with("https://") || service.starts_with("http://")) {
                return Err(ConfigError::InvalidExternalService(service.clone()));
            }
        }

        self.policy()?;
        self.anchor()?;
        Ok(())
    }

    pub fn policy(&self) -> Result<AlgorithmPolicy, ConfigError> {
        if self.allowed_algorithms.is_empty() {
            return Err(ConfigError::InvalidAlgorithms(
                "At least one algorithm must be allowed".to_string(),
            ));
        }
        AlgorithmPolicy::from_numbers(self.allowed_algorithms.iter().copied()).map_err(|alg| {
            ConfigError::InvalidAlgorithms(format!("Algorithm {} is not supported", alg))
        })
    }

    pub fn anchor(&self) -> Result<TrustAnchor, ConfigError> {
        match &self.trust_anchor {
            Some(text) => TrustAnchor::from_presentation(text)
                .map_err(|e| ConfigError::InvalidTrustAnchor(e.to_string())),
            None => Ok(TrustAnchor::handshake_root()),
        }
    }

    pub fn validity(&self) -> ValidityCheck {
        if self.check_signature_validity {
            ValidityCheck::SystemClock
        } else {
            ValidityCheck::Disabled
        }
    }

    pub fn chain_verifier(&self) -> Result<ChainVerifier, ConfigError> {
        Ok(ChainVerifier::new(self.anchor()?, self.policy()?).with_validity(self.validity()))
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(s: &str, default: bool) -> bool {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = VerifierConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.allowed_algorithms, vec![8, 10, 13, 14, 15]);
        assert_eq!(config.anchor().unwrap(), TrustAnchor::handshake_root());
    }

    #[test]
    fn test_invalid_timeout() {
        let config = VerifierConfig {
            fetch_timeout: Duration::from_secs(0),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unsupported_algorithm() {
        let config = VerifierConfig {
            allowed_algorithms: vec![13, 5],
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAlgorithms(_))
        ));
    }

    #[test]
    fn test_from_toml() {
        let config = VerifierConfig::from_toml_str(
            r#"
            roots_path = "/var/lib/sane/roots.json"
            external_services = ["https://sane.example"]
            fetch_timeout = 3
            check_signature_validity = true
            "#,
        )
        .unwrap();
        assert_eq!(config.roots_path, PathBuf::from("/var/lib/sane/roots.json"));
        assert_eq!(config.fetch_timeout, Duration::from_secs(3));
        assert_eq!(config.validity(), ValidityCheck::SystemClock);
        assert_eq!(config.allowed_algorithms, vec![8, 10, 13, 14, 15]);

        assert!(VerifierConfig::from_toml_str("external_services = [\"ftp://x\"]").is_err());
    }

    #[test]
    fn test_split_list() {
        assert_eq!(split_list(" a, b ,,c "), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE", false));
        assert!(parse_bool("on", false));
        assert!(!parse_bool("0", true));
        assert!(parse_bool("invalid", true));
    }
}
