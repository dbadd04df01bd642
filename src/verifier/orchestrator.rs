use std::borrow::Cow;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{CertificateInfo, FallbackServices, ProofKind, TlsaSource, VerificationOutcome};
use crate::config::VerifierConfig;
use crate::dns::{DomainName, ResourceRecord, parse_records};
use crate::dnssec::ChainVerifier;
use crate::error::{ConfigError, VerifyError};
use crate::roots::{RootEntry, TrustedRootWindow};
use crate::urkel::{ProofVerifier, SoftwareVerifier, UrkelVerifier};

/// Labels in front of the host name in a TLSA owner: `_port._proto`
const TLSA_PREFIX_LABELS: usize = 2;

/// Combines the DNSSEC and Urkel checks for every name of a certificate
#[derive(Debug, Clone)]
pub struct Orchestrator<V = SoftwareVerifier> {
    chain: ChainVerifier,
    urkel: UrkelVerifier<V>,
    fallbacks: FallbackServices,
}

impl Orchestrator<SoftwareVerifier> {
    pub fn new(chain: ChainVerifier) -> Self {
        Self {
            chain,
            urkel: UrkelVerifier::new(),
            fallbacks: FallbackServices::new(),
        }
    }

    pub fn from_config(config: &VerifierConfig) -> Result<Self, ConfigError> {
        let fallbacks =
            FallbackServices::http(config.external_services.iter().cloned(), config.fetch_timeout);
        Ok(Self::new(config.chain_verifier()?).with_fallbacks(fallbacks))
    }
}

impl<V: ProofVerifier> Orchestrator<V> {
    pub fn with_urkel_backend<W: ProofVerifier>(self, backend: W) -> Orchestrator<W> {
        Orchestrator {
            chain: self.chain,
            urkel: UrkelVerifier::with_backend(backend),
            fallbacks: self.fallbacks,
        }
    }

    pub fn with_fallbacks(mut self, fallbacks: FallbackServices) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    pub fn chain_verifier(&self) -> &ChainVerifier {
        &self.chain
    }

    /// Accept the certificate if any of its names verifies.
    ///
    /// Names are checked concurrently; the first to pass wins and the
    /// others are dropped. Rejection reasons keep the certificate's order.
    pub async fn verify(
        &self,
        cert: &CertificateInfo,
        tlsa: &dyn TlsaSource,
        window: &TrustedRootWindow,
    ) -> VerificationOutcome {
        if cert.dns_names.is_empty() {
            return VerificationOutcome::Rejected {
                reasons: vec![(String::new(), VerifyError::NoDnsNames)],
            };
        }

        let mut pending: FuturesUnordered<_> = cert
            .dns_names
            .iter()
            .enumerate()
            .map(|(i, name)| async move {
                let result = match tlsa.expected_tlsa(name) {
                    Some(expected) => self.verify_name(name, cert, &expected, window).await,
                    None => Err(VerifyError::MissingTlsa { name: name.clone() }),
                };
                (i, result)
            })
            .collect();

        let mut failures = Vec::with_capacity(cert.dns_names.len());
        while let Some((i, result)) = pending.next().await {
            let name = &cert.dns_names[i];
            match result {
                Ok(root) => {
                    info!(
                        "Verified {} against tree root {} (height {})",
                        name, root.tree_root, root.height
                    );
                    return VerificationOutcome::Accepted {
                        name: name.clone(),
                        root,
                    };
                }
                Err(e) => {
                    warn!("Rejected {}: {} ({})", name, e, e.category());
                    failures.push((i, e));
                }
            }
        }

        failures.sort_by_key(|(i, _)| *i);
        VerificationOutcome::Rejected {
            reasons: failures
                .into_iter()
                .map(|(i, e)| (cert.dns_names[i].clone(), e))
                .collect(),
        }
    }

    /// Like [`verify`](Self::verify), abandoning all work once `token` fires.
    pub async fn verify_cancellable(
        &self,
        cert: &CertificateInfo,
        tlsa: &dyn TlsaSource,
        window: &TrustedRootWindow,
        token: &CancellationToken,
    ) -> Result<VerificationOutcome, VerifyError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!("Verification cancelled");
                Err(VerifyError::Cancelled)
            }
            outcome = self.verify(cert, tlsa, window) => Ok(outcome),
        }
    }

    /// Run both proofs for a single certificate name.
    pub async fn verify_name(
        &self,
        name: &str,
        cert: &CertificateInfo,
        expected: &ResourceRecord,
        window: &TrustedRootWindow,
    ) -> Result<RootEntry, VerifyError> {
        let domain: DomainName = name.parse()?;
        let owner = &expected.name;

        if owner.label_count() < TLSA_PREFIX_LABELS + 1 {
            return Err(VerifyError::MalformedTlsaOwner(owner.to_string()));
        }
        if owner.strip_left(TLSA_PREFIX_LABELS).as_ref() != Some(&domain) {
            return Err(VerifyError::TlsaOwnerMismatch {
                owner: owner.to_string(),
                name: domain.to_string(),
            });
        }
        let tld = domain
            .tld()
            .ok_or_else(|| VerifyError::MalformedTlsaOwner(owner.to_string()))?;

        let (urkel_payload, records) = futures::try_join!(
            self.urkel_payload(cert, tld),
            self.dnssec_records(cert, owner, name),
        )?;

        let root = self.urkel.verify_extension(&urkel_payload, tld, window)?;
        debug!("Urkel proof for {} matched height {}", tld, root.height);

        let chain = self.chain.verify_records(records, owner)?;
        if !chain.tlsa.is_duplicate_of(expected) {
            return Err(VerifyError::TlsaMismatch {
                name: domain.to_string(),
            });
        }
        debug!("DNSSEC chain for {} verified over {} zones", owner, chain.zones.len());

        Ok(root)
    }

    async fn urkel_payload<'c>(
        &self,
        cert: &'c CertificateInfo,
        tld: &str,
    ) -> Result<Cow<'c, [u8]>, VerifyError> {
        match cert.proof(ProofKind::Urkel) {
            Some(value) => Ok(Cow::Borrowed(value)),
            None => self.fetch(ProofKind::Urkel, tld).await.map(Cow::Owned),
        }
    }

    /// Records of the DNSSEC extension that covers `owner`.
    ///
    /// Extensions carrying chains for other names are skipped; if none
    /// covers `owner` the payload counts as absent for this name.
    async fn dnssec_records(
        &self,
        cert: &CertificateInfo,
        owner: &DomainName,
        name: &str,
    ) -> Result<Vec<ResourceRecord>, VerifyError> {
        let mut malformed = None;
        for payload in cert.proofs(ProofKind::Dnssec) {
            match parse_records(payload) {
                Ok(records) if records.iter().any(|r| &r.name == owner) => return Ok(records),
                Ok(_) => trace!("DNSSEC extension does not cover {}", owner),
                Err(e) => {
                    malformed.get_or_insert(e);
                }
            }
        }
        if let Some(e) = malformed {
            return Err(e.into());
        }

        let payload = self.fetch(ProofKind::Dnssec, name).await?;
        Ok(parse_records(&payload)?)
    }

    async fn fetch(&self, kind: ProofKind, name: &str) -> Result<Vec<u8>, VerifyError> {
        if self.fallbacks.is_empty() {
            return Err(VerifyError::MissingExtension { kind });
        }
        debug!(
            "No {} extension, asking {} external service(s) for {}",
            kind,
            self.fallbacks.len(),
            name
        );
        self.fallbacks.fetch(kind, name).await.map_err(|e| {
            debug!("No external service supplied the {} proof for {}: {}", kind, name, e);
            VerifyError::MissingExtension { kind }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{RData, Tlsa};

    fn expected(owner: &str) -> ResourceRecord {
        ResourceRecord::new(
            owner.parse().unwrap(),
            3600,
            RData::Tlsa(Tlsa {
                usage: 3,
                selector: 1,
                matching_type: 1,
                data: vec![0xAA; 32],
            }),
        )
    }

    fn cert(names: &[&str]) -> CertificateInfo {
        CertificateInfo {
            dns_names: names.iter().map(|n| n.to_string()).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_no_names() {
        let orchestrator = Orchestrator::new(ChainVerifier::default());
        let outcome = orchestrator
            .verify(&cert(&[]), &expected("_443._tcp.a.tld"), &TrustedRootWindow::default())
            .await;
        assert_eq!(outcome.reasons()[0].1, VerifyError::NoDnsNames);
    }

    #[tokio::test]
    async fn test_owner_checks() {
        let orchestrator = Orchestrator::new(ChainVerifier::default());
        let window = TrustedRootWindow::default();

        let err = orchestrator
            .verify_name("a.tld", &cert(&["a.tld"]), &expected("_443.tld"), &window)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::MalformedTlsaOwner(_)));

        let err = orchestrator
            .verify_name("b.tld", &cert(&["b.tld"]), &expected("_443._tcp.a.tld"), &window)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifyError::TlsaOwnerMismatch { .. }));
    }

    #[tokio::test]
    async fn test_missing_extension_without_fallbacks() {
        let orchestrator = Orchestrator::new(ChainVerifier::default());
        let outcome = orchestrator
            .verify(
                &cert(&["A.tld"]),
                &expected("_443._tcp.a.tld"),
                &TrustedRootWindow::default(),
            )
            .await;
        assert!(matches!(
            outcome.reasons()[0].1,
            VerifyError::MissingExtension { .. }
        ));
    }

    #[tokio::test]
    async fn test_cancelled() {
        let orchestrator = Orchestrator::new(ChainVerifier::default());
        let token = CancellationToken::new();
        token.cancel();
        let result = orchestrator
            .verify_cancellable(
                &cert(&["a.tld"]),
                &expected("_443._tcp.a.tld"),
                &TrustedRootWindow::default(),
                &token,
            )
            .await;
        assert_eq!(result, Err(VerifyError::Cancelled));
    }
}
