use std::fmt;

use thiserror::Error;

use crate::dns::ParseError;
use crate::dnssec::ChainError;
use crate::roots::RootStoreError;
use crate::urkel::UrkelError;
use crate::verifier::{FetchError, ProofKind};

/// Coarse class every verification failure falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed input: bad wire data, wrong shape, missing pieces
    Structural,
    /// A signature or proof does not check out
    Cryptographic,
    /// Well-formed and valid, but not anchored in anything trusted
    Trust,
    /// Fetching or loading inputs failed
    Transport,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Structural => "structural",
            Self::Cryptographic => "cryptographic",
            Self::Trust => "trust",
            Self::Transport => "transport",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid external service URL: {0}")]
    InvalidExternalService(String),

    #[error("Invalid timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid algorithm list: {0}")]
    InvalidAlgorithms(String),

    #[error("Invalid trust anchor: {0}")]
    InvalidTrustAnchor(String),

    #[error("Cannot read config file {path}: {message}")]
    Io { path: String, message: String },

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

/// Every way verifying a certificate can fail
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("{0}")]
    Parse(#[from] ParseError),

    #[error("{0}")]
    Chain(#[from] ChainError),

    #[error("{0}")]
    Urkel(#[from] UrkelError),

    #[error("{0}")]
    RootStore(#[from] RootStoreError),

    #[error("{0}")]
    Fetch(#[from] FetchError),

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("Certificate has no DNS names")]
    NoDnsNames,

    #[error("No TLSA record for {name}")]
    MissingTlsa { name: String },

    #[error("TLSA owner {0} needs at least 3 labels")]
    MalformedTlsaOwner(String),

    #[error("TLSA owner {owner} does not belong to {name}")]
    TlsaOwnerMismatch { owner: String, name: String },

    #[error("No {kind} proof in the certificate and none from an external service")]
    MissingExtension { kind: ProofKind },

    #[error("Verified chain ends in a different TLSA record than expected for {name}")]
    TlsaMismatch { name: String },

    #[error("Cannot parse certificate: {0}")]
    Certificate(String),

    #[error("Certificate does not match the TLSA record: {0}")]
    DaneMismatch(String),

    #[error("Verification cancelled")]
    Cancelled,
}

impl VerifyError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Parse(_) => ErrorCategory::Structural,
            Self::Chain(e) => e.category(),
            Self::Urkel(e) => e.category(),
            Self::RootStore(e) => e.category(),
            Self::Fetch(_) | Self::Cancelled => ErrorCategory::Transport,
            Self::Config(_)
            | Self::NoDnsNames
            | Self::MissingTlsa { .. }
            | Self::MalformedTlsaOwner(_)
            | Self::TlsaOwnerMismatch { .. }
            | Self::MissingExtension { .. }
            | Self::Certificate(_) => ErrorCategory::Structural,
            Self::TlsaMismatch { .. } | Self::DaneMismatch(_) => ErrorCategory::Trust,
        }
    }
}

pub type Result<T> = std::result::Result<T, VerifyError>;
