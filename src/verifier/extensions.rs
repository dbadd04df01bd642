//! The certificate fields verification looks at.

use x509_parser::extensions::GeneralName;
use x509_parser::prelude::parse_x509_certificate;

use super::ProofKind;
use crate::error::VerifyError;

/// Private extension carrying packed Urkel proofs
pub const URKEL_OID: &str = "1.3.6.1.4.1.54392.5.1620";

/// Private extension carrying the DNSSEC chain in wire format
pub const DNSSEC_OID: &str = "1.3.6.1.4.1.54392.5.1621";

impl ProofKind {
    pub fn oid(&self) -> &'static str {
        match self {
            Self::Dnssec => DNSSEC_OID,
            Self::Urkel => URKEL_OID,
        }
    }
}

/// An end-entity certificate reduced to what DANE verification needs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateInfo {
    pub dns_names: Vec<String>,
    /// `(dotted OID, extnValue contents)` in certificate order
    pub extensions: Vec<(String, Vec<u8>)>,
    /// DER SubjectPublicKeyInfo
    pub spki: Vec<u8>,
    /// The whole certificate
    pub der: Vec<u8>,
}

impl CertificateInfo {
    pub fn from_der(der: &[u8]) -> Result<Self, VerifyError> {
        let (_, cert) =
            parse_x509_certificate(der).map_err(|e| VerifyError::Certificate(e.to_string()))?;

        let mut dns_names = Vec::new();
        if let Ok(Some(san)) = cert.subject_alternative_name() {
            for gn in &san.value.general_names {
                if let GeneralName::DNSName(name) = gn {
                    dns_names.push(name.to_ascii_lowercase());
                }
            }
        }

        let extensions = cert
            .extensions()
            .iter()
            .map(|ext| (ext.oid.to_id_string(), ext.value.to_vec()))
            .collect();

        Ok(Self {
            dns_names,
            extensions,
            spki: cert.public_key().raw.to_vec(),
            der: der.to_vec(),
        })
    }

    /// Value of the first extension with this OID
    pub fn extension(&self, oid: &str) -> Option<&[u8]> {
        self.extensions
            .iter()
            .find(|(id, _)| id == oid)
            .map(|(_, value)| value.as_slice())
    }

    pub fn proof(&self, kind: ProofKind) -> Option<&[u8]> {
        self.extension(kind.oid())
    }

    /// Every extension value carrying this kind of proof
    pub fn proofs(&self, kind: ProofKind) -> impl Iterator<Item = &[u8]> {
        let oid = kind.oid();
        self.extensions
            .iter()
            .filter(move |(id, _)| id == oid)
            .map(|(_, value)| value.as_slice())
    }
}
