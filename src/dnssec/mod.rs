pub mod algorithm;
pub mod digest;
pub mod errors;
pub mod key_tag;
pub mod levels;
pub mod rrset;
pub mod signature;
pub mod trust_anchor;
pub mod validator;

pub use algorithm::{AlgorithmPolicy, DnsSecAlgorithm};
pub use digest::DigestType;
pub use errors::{ChainError, RrsetFault, SignatureFailure};
pub use key_tag::calculate_key_tag;
pub use levels::{Level, partition};
pub use rrset::RRset;
pub use signature::{VerifiedKeySet, signed_data, verify_rrsig};
pub use trust_anchor::{HANDSHAKE_ROOT_KEY, TrustAnchor};
pub use validator::{ChainVerifier, ValidityCheck, VerifiedChain};

/// DNSSEC constants
pub mod constants {
    /// Protocol field value every DNSKEY must carry (RFC 4034 2.1.2)
    pub const DNSKEY_PROTOCOL: u8 = 3;

    /// Well-known key tag of the Handshake root KSK
    pub const HANDSHAKE_ROOT_KEY_TAG: u16 = 35215;
}
