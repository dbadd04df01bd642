pub mod bits;
pub mod hash;
pub mod proof;
pub mod verifier;

use thiserror::Error;

pub use bits::Bits;
pub use hash::{Hash, key_for};
pub use proof::{ProofBody, ProofNode, ProofType, UrkelProof};
pub use verifier::{ProofVerifier, SoftwareVerifier, UrkelVerifier};

use crate::error::ErrorCategory;

/// Why a proof does not reduce to its claimed root
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofFailure {
    #[error("recomputed root does not match")]
    HashMismatch,
    #[error("short proof prefix matches the key")]
    SamePath,
    #[error("collision proof is for the key itself")]
    SameKey,
    #[error("node prefix exceeds remaining depth")]
    NegativeDepth,
    #[error("node prefix does not match the key")]
    PathMismatch,
    #[error("proof depth is not fully consumed")]
    TooDeep,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UrkelError {
    #[error("urkel extension is empty")]
    EmptyProof,

    #[error("cannot parse urkel proof: {0}")]
    ProofParse(String),

    #[error("urkel proof for root {root} failed: {reason}")]
    VerificationFailed { root: String, reason: ProofFailure },

    #[error("urkel proof for root {root} shows {name:?} is not in the tree")]
    NameNotInTree { name: String, root: String },

    #[error("none of {tried} tree root(s) is among the stored ones")]
    RootNotTrusted { tried: usize },
}

impl UrkelError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::EmptyProof | Self::ProofParse(_) => ErrorCategory::Structural,
            Self::VerificationFailed { .. } => ErrorCategory::Cryptographic,
            Self::NameNotInTree { .. } | Self::RootNotTrusted { .. } => ErrorCategory::Trust,
        }
    }
}
