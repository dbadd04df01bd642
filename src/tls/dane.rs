//! Matching a certificate against a TLSA record (RFC 6698 section 2.1).

use ring::digest::{SHA256, SHA512, digest};

use crate::dns::Tlsa;
use crate::error::VerifyError;
use crate::verifier::CertificateInfo;

/// Certificate usage 3: the record pins the end-entity certificate itself
pub const USAGE_DANE_EE: u8 = 3;

pub const SELECTOR_FULL_CERT: u8 = 0;
pub const SELECTOR_SPKI: u8 = 1;

pub const MATCHING_EXACT: u8 = 0;
pub const MATCHING_SHA256: u8 = 1;
pub const MATCHING_SHA512: u8 = 2;

/// The association data `cert` would need for this selector and matching type
pub fn association_data(
    cert: &CertificateInfo,
    selector: u8,
    matching_type: u8,
) -> Result<Vec<u8>, VerifyError> {
    let selected: &[u8] = match selector {
        SELECTOR_FULL_CERT => &cert.der,
        SELECTOR_SPKI => &cert.spki,
        other => {
            return Err(VerifyError::DaneMismatch(format!(
                "unsupported selector {}",
                other
            )));
        }
    };

    match matching_type {
        MATCHING_EXACT => Ok(selected.to_vec()),
        MATCHING_SHA256 => Ok(digest(&SHA256, selected).as_ref().to_vec()),
        MATCHING_SHA512 => Ok(digest(&SHA512, selected).as_ref().to_vec()),
        other => Err(VerifyError::DaneMismatch(format!(
            "unsupported matching type {}",
            other
        ))),
    }
}

/// A DANE-EE record for `cert`
pub fn tlsa_for(cert: &CertificateInfo, selector: u8, matching_type: u8) -> Result<Tlsa, VerifyError> {
    Ok(Tlsa {
        usage: USAGE_DANE_EE,
        selector,
        matching_type,
        data: association_data(cert, selector, matching_type)?,
    })
}

/// Check that `tlsa` is a DANE-EE record binding `cert`.
pub fn check_binding(tlsa: &Tlsa, cert: &CertificateInfo) -> Result<(), VerifyError> {
    if tlsa.usage != USAGE_DANE_EE {
        return Err(VerifyError::DaneMismatch(format!(
            "certificate usage {} is not DANE-EE",
            tlsa.usage
        )));
    }
    let expected = association_data(cert, tlsa.selector, tlsa.matching_type)?;
    if expected != tlsa.data {
        return Err(VerifyError::DaneMismatch(format!(
            "association data differs (selector {}, matching type {})",
            tlsa.selector, tlsa.matching_type
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cert() -> CertificateInfo {
        CertificateInfo {
            spki: b"spki".to_vec(),
            der: b"whole certificate".to_vec(),
            ..Default::default()
        }
    }

    #[test]
    fn test_binding() {
        let cert = cert();
        for (selector, matching) in [(0, 0), (0, 1), (1, 1), (1, 2)] {
            let tlsa = tlsa_for(&cert, selector, matching).unwrap();
            assert!(check_binding(&tlsa, &cert).is_ok());
        }
        assert_eq!(tlsa_for(&cert, 1, 1).unwrap().data.len(), 32);
        assert_eq!(tlsa_for(&cert, 1, 2).unwrap().data.len(), 64);
    }

    #[test]
    fn test_mismatch() {
        let cert = cert();
        let mut tlsa = tlsa_for(&cert, 1, 1).unwrap();
        tlsa.data[0] ^= 1;
        assert!(matches!(
            check_binding(&tlsa, &cert),
            Err(VerifyError::DaneMismatch(_))
        ));

        let mut tlsa = tlsa_for(&cert, 1, 1).unwrap();
        tlsa.usage = 1;
        assert!(check_binding(&tlsa, &cert).is_err());
        assert!(tlsa_for(&cert, 2, 0).is_err());
        assert!(tlsa_for(&cert, 0, 3).is_err());
    }
}
