use tracing::{debug, info};

use super::{
    ProofFailure, UrkelError,
    hash::{Hash, key_for},
    proof::UrkelProof,
};
use crate::roots::{RootEntry, TrustedRootWindow};

const ROOT_LEN: usize = 32;

/// Inclusion-proof check, replaceable by other backends
pub trait ProofVerifier: Send + Sync {
    fn verify(&self, proof: &UrkelProof, root: &Hash, key: &Hash) -> Result<(), ProofFailure>;
}

/// Pure Rust BLAKE2b radix tree verification
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareVerifier;

impl ProofVerifier for SoftwareVerifier {
    fn verify(&self, proof: &UrkelProof, root: &Hash, key: &Hash) -> Result<(), ProofFailure> {
        proof.verify(root, key)
    }
}

/// Checks an Urkel extension against the trusted-root window
#[derive(Debug, Clone, Default)]
pub struct UrkelVerifier<V = SoftwareVerifier> {
    backend: V,
}

impl UrkelVerifier<SoftwareVerifier> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: ProofVerifier> UrkelVerifier<V> {
    pub fn with_backend(backend: V) -> Self {
        Self { backend }
    }

    /// Verify the proofs packed in `extension` for `name`.
    ///
    /// Layout: one count byte, then `count` times a 32-byte root followed
    /// by a proof. The first valid proof whose root is in `window` wins;
    /// an invalid proof fails the whole extension.
    pub fn verify_extension(
        &self,
        extension: &[u8],
        name: &str,
        window: &TrustedRootWindow,
    ) -> Result<RootEntry, UrkelError> {
        let (&count, mut rest) = extension.split_first().ok_or(UrkelError::EmptyProof)?;
        if count == 0 {
            return Err(UrkelError::EmptyProof);
        }

        let key = key_for(name);
        for i in 0..count {
            if rest.len() < ROOT_LEN {
                return Err(UrkelError::ProofParse(format!(
                    "proof {} of {}: need {} root bytes, have {}",
                    i + 1,
                    count,
                    ROOT_LEN,
                    rest.len()
                )));
            }
            let (root_bytes, proof_bytes) = rest.split_at(ROOT_LEN);
            let mut root = [0u8; ROOT_LEN];
            root.copy_from_slice(root_bytes);
            let root_hex = hex::encode(root);

            let proof = UrkelProof::decode(proof_bytes)?;
            self.backend
                .verify(&proof, &root, &key)
                .map_err(|reason| UrkelError::VerificationFailed {
                    root: root_hex.clone(),
                    reason,
                })?;

            if proof.value().is_none() {
                return Err(UrkelError::NameNotInTree {
                    name: name.to_string(),
                    root: root_hex,
                });
            }

            if let Some(entry) = window.find(&root_hex) {
                info!(
                    "Found tree root {} from the certificate in the stored roots (height {})",
                    root_hex, entry.height
                );
                return Ok(entry.clone());
            }

            debug!(
                "Could not find tree root {} from the certificate in the stored roots",
                root_hex
            );
            let used = proof.encoded_len().min(proof_bytes.len());
            rest = &proof_bytes[used..];
        }

        Err(UrkelError::RootNotTrusted {
            tried: count as usize,
        })
    }
}
