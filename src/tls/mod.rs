//! rustls integration: accepting server certificates through DANE proofs
//! instead of a CA chain.

pub mod dane;

use std::fmt;
use std::fs;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::crypto::{CryptoProvider, verify_tls12_signature, verify_tls13_signature};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{CertificateError, ClientConfig, DigitallySignedStruct, OtherError, SignatureScheme};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{debug, info, warn};

use crate::error::VerifyError;
use crate::roots::RootStore;
use crate::urkel::{ProofVerifier, SoftwareVerifier};
use crate::verifier::{CertificateInfo, Orchestrator, TlsaSource, VerificationOutcome};

pub use dane::{check_binding, tlsa_for};

/// Server certificate verifier backed by the DNSSEC and Urkel proofs
pub struct SaneCertVerifier<V = SoftwareVerifier> {
    orchestrator: Arc<Orchestrator<V>>,
    roots: Arc<dyn RootStore>,
    tlsa: Arc<dyn TlsaSource>,
    provider: Arc<CryptoProvider>,
}

impl<V> fmt::Debug for SaneCertVerifier<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaneCertVerifier")
            .field("schemes", &self.supported_schemes())
            .finish_non_exhaustive()
    }
}

impl<V> SaneCertVerifier<V> {
    fn supported_schemes(&self) -> Vec<SignatureScheme> {
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

impl<V: ProofVerifier + 'static> SaneCertVerifier<V> {
    pub fn new(
        orchestrator: Arc<Orchestrator<V>>,
        roots: Arc<dyn RootStore>,
        tlsa: Arc<dyn TlsaSource>,
    ) -> Self {
        Self {
            orchestrator,
            roots,
            tlsa,
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }

    /// Client config trusting exactly the certificates this verifier accepts
    pub fn into_client_config(self) -> Result<ClientConfig, rustls::Error> {
        let provider = self.provider.clone();
        Ok(ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()?
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(self))
            .with_no_client_auth())
    }

    /// Check an end-entity certificate for `server_name`.
    pub async fn verify_certificate(
        &self,
        end_entity: &[u8],
        server_name: &str,
    ) -> Result<VerificationOutcome, VerifyError> {
        let mut cert = CertificateInfo::from_der(end_entity)?;
        let server_name = server_name.trim_end_matches('.').to_ascii_lowercase();

        // Only the name being connected to is relevant
        if !cert.dns_names.iter().any(|san| san_matches(san, &server_name)) {
            return Err(VerifyError::Certificate(format!(
                "certificate is not valid for {}",
                server_name
            )));
        }
        cert.dns_names = vec![server_name.clone()];

        let expected = self
            .tlsa
            .expected_tlsa(&server_name)
            .ok_or_else(|| VerifyError::MissingTlsa {
                name: server_name.clone(),
            })?;
        let tlsa = expected
            .as_tlsa()
            .ok_or_else(|| VerifyError::DaneMismatch("expected record is not TLSA".to_string()))?;
        check_binding(tlsa, &cert)?;
        debug!("Certificate for {} matches its TLSA record", server_name);

        let window = self.roots.current()?;
        Ok(self.orchestrator.verify(&cert, &expected, &window).await)
    }
}

/// Exact match, or a `*.` SAN standing for exactly one leftmost label
fn san_matches(san: &str, server_name: &str) -> bool {
    let san = san.trim_end_matches('.');
    match san.strip_prefix("*.") {
        Some(parent) => server_name
            .split_once('.')
            .is_some_and(|(label, rest)| !label.is_empty() && rest.eq_ignore_ascii_case(parent)),
        None => san.eq_ignore_ascii_case(server_name),
    }
}

fn rejected(e: VerifyError) -> rustls::Error {
    rustls::Error::InvalidCertificate(CertificateError::Other(OtherError(Arc::new(e))))
}

/// Drive a future to completion from synchronous rustls callbacks.
fn block_on<F, Fut>(make: F) -> Result<Fut::Output, rustls::Error>
where
    F: FnOnce() -> Fut + Send,
    Fut: Future,
    Fut::Output: Send,
{
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(make())))
        }
        _ => std::thread::scope(|s| {
            s.spawn(|| {
                tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .map(|rt| rt.block_on(make()))
                    .map_err(|e| rustls::Error::General(e.to_string()))
            })
            .join()
            .map_err(|_| rustls::Error::General("verification thread panicked".to_string()))?
        }),
    }
}

impl<V: ProofVerifier + 'static> ServerCertVerifier for SaneCertVerifier<V> {
    fn verify_server_cert(
        &self,
        end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        let ServerName::DnsName(dns_name) = server_name else {
            return Err(rustls::Error::InvalidCertificate(
                CertificateError::NotValidForName,
            ));
        };
        let name = dns_name.as_ref().to_string();
        let der = end_entity.as_ref();

        let outcome = block_on(|| self.verify_certificate(der, &name))?.map_err(|e| {
            warn!("Certificate for {} rejected: {}", name, e);
            rejected(e)
        })?;

        match outcome.into_result() {
            Ok((name, root)) => {
                info!("Accepted certificate for {} at height {}", name, root.height);
                Ok(ServerCertVerified::assertion())
            }
            Err(e) => {
                warn!("Certificate for {} rejected: {}", name, e);
                Err(rejected(e))
            }
        }
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls12_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        verify_tls13_signature(
            message,
            cert,
            dss,
            &self.provider.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.supported_schemes()
    }
}

/// Load certificates from a PEM file
pub fn load_certificates(path: &Path) -> Result<Vec<CertificateDer<'static>>, VerifyError> {
    debug!("Loading certificate from: {}", path.display());

    let data = fs::read(path)
        .map_err(|e| VerifyError::Certificate(format!("{}: {}", path.display(), e)))?;
    let mut cursor = std::io::Cursor::new(data);

    let certs: Result<Vec<CertificateDer<'static>>, _> =
        rustls_pemfile::certs(&mut cursor).collect();
    let certs = certs.map_err(|e| VerifyError::Certificate(e.to_string()))?;

    if certs.is_empty() {
        return Err(VerifyError::Certificate(format!(
            "no certificate found in {}",
            path.display()
        )));
    }
    Ok(certs)
}
