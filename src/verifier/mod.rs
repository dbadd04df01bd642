//! Per-certificate verification: locating proofs and combining both checks.

pub mod extensions;
pub mod fallback;
pub mod orchestrator;
pub mod outcome;

pub use extensions::{CertificateInfo, DNSSEC_OID, URKEL_OID};
pub use fallback::{FallbackServices, FetchError, HttpProofService, ProofKind, ProofSource};
pub use orchestrator::Orchestrator;
pub use outcome::VerificationOutcome;

use std::collections::HashMap;

use crate::dns::ResourceRecord;

/// Supplies the expected TLSA record for a name, e.g. from a resolver
pub trait TlsaSource: Send + Sync {
    fn expected_tlsa(&self, name: &str) -> Option<ResourceRecord>;
}

/// One fixed record, whatever the name
impl TlsaSource for ResourceRecord {
    fn expected_tlsa(&self, _name: &str) -> Option<ResourceRecord> {
        Some(self.clone())
    }
}

/// Records keyed by lower-case name without the trailing dot
impl TlsaSource for HashMap<String, ResourceRecord> {
    fn expected_tlsa(&self, name: &str) -> Option<ResourceRecord> {
        let key = name.trim_end_matches('.').to_ascii_lowercase();
        self.get(&key).cloned()
    }
}
