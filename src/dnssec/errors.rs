use thiserror::Error;

use crate::dns::{DNSResourceType, DomainName, ParseError};
use crate::error::ErrorCategory;

/// Why a single RRSIG could not be accepted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureFailure {
    #[error("algorithm {0} is not allowed by policy")]
    AlgorithmNotAllowed(u8),

    #[error("algorithm {0} is not supported")]
    UnsupportedAlgorithm(u8),

    #[error("no DNSKEY matches key tag {key_tag} and algorithm {algorithm}")]
    NoMatchingKey { key_tag: u16, algorithm: u8 },

    #[error("signer {signer} does not own the verifying keys ({expected})")]
    SignerMismatch {
        signer: DomainName,
        expected: DomainName,
    },

    #[error("signature covers {found}, expected {expected}")]
    CoveredTypeMismatch {
        found: DNSResourceType,
        expected: DNSResourceType,
    },

    #[error("labels field {labels} exceeds owner label count {owner_labels}")]
    LabelCount { labels: u8, owner_labels: usize },

    #[error("invalid public key encoding")]
    InvalidPublicKey,

    #[error("signature does not verify")]
    BadSignature,

    #[error("signature expired at {expiration} (now {now})")]
    Expired { expiration: u32, now: u32 },

    #[error("signature not valid before {inception} (now {now})")]
    NotYetValid { inception: u32, now: u32 },
}

impl SignatureFailure {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::CoveredTypeMismatch { .. } | Self::LabelCount { .. } => {
                ErrorCategory::Structural
            }
            Self::InvalidPublicKey | Self::BadSignature => ErrorCategory::Cryptographic,
            Self::AlgorithmNotAllowed(_)
            | Self::UnsupportedAlgorithm(_)
            | Self::NoMatchingKey { .. }
            | Self::SignerMismatch { .. }
            | Self::Expired { .. }
            | Self::NotYetValid { .. } => ErrorCategory::Trust,
        }
    }
}

/// Reasons a set of records is not a valid RRset
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RrsetFault {
    #[error("empty")]
    Empty,
    #[error("owner names differ")]
    MixedOwner,
    #[error("types differ")]
    MixedType,
    #[error("classes differ")]
    MixedClass,
    #[error("duplicate rdata")]
    DuplicateRdata,
}

/// DNSSEC chain verification errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("cannot parse chain records: {0}")]
    Parse(#[from] ParseError),

    #[error("invalid trust anchor: {0}")]
    InvalidTrustAnchor(String),

    #[error("record owner {name} is not {target} or one of its ancestors")]
    UnrelatedRecord {
        name: DomainName,
        target: DomainName,
    },

    #[error("found {0} level(s) of records, need at least 2")]
    InsufficientLevels(usize),

    #[error("deepest level {deepest} is not the target {target}")]
    MissingTargetLevel {
        deepest: DomainName,
        target: DomainName,
    },

    #[error("root zone DNSKEY set does not contain the trust anchor")]
    RootKeyNotFound,

    #[error("no RRSIG covers the root DNSKEY set")]
    MissingRootSignature,

    #[error("root RRSIG rejected: {0}")]
    RootSignature(SignatureFailure),

    #[error("{name} has a record of unknown type {rtype}, aborting")]
    UnknownRecordType {
        name: DomainName,
        rtype: DNSResourceType,
    },

    #[error("{rtype} record not allowed at {name}")]
    UnexpectedRecord {
        name: DomainName,
        rtype: DNSResourceType,
    },

    #[error("{rtype} records at {name} do not form a valid RRset: {fault}")]
    InvalidRrset {
        name: DomainName,
        rtype: DNSResourceType,
        fault: RrsetFault,
    },

    #[error("could not verify RRSIG for {covered} at {name}: {reason}")]
    RrsigVerification {
        name: DomainName,
        covered: DNSResourceType,
        reason: SignatureFailure,
    },

    #[error("no DS record at {name} matches DNSKEY with key tag {key_tag}")]
    MissingDsForDnskey { name: DomainName, key_tag: u16 },

    #[error("{rtype} RRset at {name} carries no RRSIG")]
    UnsignedRrset {
        name: DomainName,
        rtype: DNSResourceType,
    },

    #[error("RRSIG at {name} covers {covered}, which is absent from the level")]
    UnresolvedSignature {
        name: DomainName,
        covered: DNSResourceType,
    },

    #[error("level {name} delegates without publishing DNSKEY records")]
    MissingDnskeys { name: DomainName },

    #[error("chain does not terminate in a TLSA level at {name}")]
    UnterminatedChain { name: DomainName },

    #[error("expected exactly one TLSA record at {name}, found {count}")]
    TlsaCount { name: DomainName, count: usize },
}

impl ChainError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RootSignature(reason) | Self::RrsigVerification { reason, .. } => {
                match reason.category() {
                    // A failed signature is never merely malformed input
                    ErrorCategory::Structural => ErrorCategory::Cryptographic,
                    other => other,
                }
            }
            Self::MissingDsForDnskey { .. } => ErrorCategory::Cryptographic,
            Self::RootKeyNotFound | Self::MissingRootSignature | Self::UnsignedRrset { .. } => {
                ErrorCategory::Trust
            }
            Self::Parse(_)
            | Self::InvalidTrustAnchor(_)
            | Self::UnrelatedRecord { .. }
            | Self::InsufficientLevels(_)
            | Self::MissingTargetLevel { .. }
            | Self::UnknownRecordType { .. }
            | Self::UnexpectedRecord { .. }
            | Self::InvalidRrset { .. }
            | Self::UnresolvedSignature { .. }
            | Self::MissingDnskeys { .. }
            | Self::UnterminatedChain { .. }
            | Self::TlsaCount { .. } => ErrorCategory::Structural,
        }
    }
}

pub type Result<T> = std::result::Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_categories() {
        let bad = ChainError::RrsigVerification {
            name: DomainName::root(),
            covered: DNSResourceType::DS,
            reason: SignatureFailure::BadSignature,
        };
        assert_eq!(bad.category(), ErrorCategory::Cryptographic);

        let downgrade = ChainError::RootSignature(SignatureFailure::AlgorithmNotAllowed(5));
        assert_eq!(downgrade.category(), ErrorCategory::Trust);

        let labels = ChainError::RootSignature(SignatureFailure::LabelCount {
            labels: 4,
            owner_labels: 0,
        });
        assert_eq!(labels.category(), ErrorCategory::Cryptographic);
        assert_eq!(
            ChainError::Parse(ParseError::NameTooLong).category(),
            ErrorCategory::Structural
        );
    }
}
