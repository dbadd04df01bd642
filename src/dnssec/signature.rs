use tracing::trace;

use super::{AlgorithmPolicy, constants::DNSKEY_PROTOCOL, errors::SignatureFailure, rrset::RRset};
use crate::dns::{DomainName, Dnskey, Rrsig};

/// DNSKEYs a level proved authoritative for its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedKeySet {
    owner: DomainName,
    keys: Vec<Dnskey>,
}

impl VerifiedKeySet {
    pub fn new(owner: DomainName, keys: Vec<Dnskey>) -> Self {
        Self { owner, keys }
    }

    pub fn owner(&self) -> &DomainName {
        &self.owner
    }

    pub fn keys(&self) -> &[Dnskey] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys an RRSIG may have been made with (RFC 4035 5.3.1)
    fn candidates<'a>(&'a self, rrsig: &'a Rrsig) -> impl Iterator<Item = &'a Dnskey> + 'a {
        self.keys.iter().filter(move |key| {
            key.protocol == DNSKEY_PROTOCOL
                && key.is_zone_key()
                && key.algorithm == rrsig.algorithm
                && key.key_tag() == rrsig.key_tag
        })
    }
}

/// Build the data an RRSIG signs (RFC 4034 3.1.8.1 and 6.2)
pub fn signed_data(rrsig: &Rrsig, rrset: &RRset) -> Result<Vec<u8>, SignatureFailure> {
    if rrsig.type_covered != rrset.rtype() {
        return Err(SignatureFailure::CoveredTypeMismatch {
            found: rrsig.type_covered,
            expected: rrset.rtype(),
        });
    }

    let owner = rrset.name();
    let labels = rrsig.labels as usize;
    if labels > owner.label_count() {
        return Err(SignatureFailure::LabelCount {
            labels: rrsig.labels,
            owner_labels: owner.label_count(),
        });
    }

    let mut owner_wire = Vec::with_capacity(owner.wire_len() + 2);
    if labels < owner.label_count() {
        // Wildcard expansion: sign as "*.<rightmost labels>"
        owner_wire.extend_from_slice(&[1, b'*']);
        owner
            .suffix(labels)
            .unwrap_or_default()
            .write_wire(&mut owner_wire);
    } else {
        owner.write_wire(&mut owner_wire);
    }

    let rdata = rrset.canonical_rdata();
    let mut data = Vec::with_capacity(
        64 + rdata.iter().map(|r| owner_wire.len() + 10 + r.len()).sum::<usize>(),
    );
    rrsig.write_unsigned_rdata(&mut data);
    for rr in rdata {
        data.extend_from_slice(&owner_wire);
        data.extend_from_slice(&u16::from(rrset.rtype()).to_be_bytes());
        data.extend_from_slice(&u16::from(rrset.rclass()).to_be_bytes());
        data.extend_from_slice(&rrsig.original_ttl.to_be_bytes());
        data.extend_from_slice(&(rr.len() as u16).to_be_bytes());
        data.extend_from_slice(&rr);
    }
    Ok(data)
}

/// `a < b` in 32-bit serial number arithmetic (RFC 1982)
pub(crate) fn serial_lt(a: u32, b: u32) -> bool {
    a != b && b.wrapping_sub(a) < 1 << 31
}

/// Verify one RRSIG over `rrset` with any matching key from `keys`.
///
/// `now` enables the inception/expiration check.
pub fn verify_rrsig(
    rrsig: &Rrsig,
    rrset: &RRset,
    keys: &VerifiedKeySet,
    policy: &AlgorithmPolicy,
    now: Option<u32>,
) -> Result<(), SignatureFailure> {
    let algorithm = policy.check(rrsig.algorithm)?;

    if &rrsig.signer_name != keys.owner() {
        return Err(SignatureFailure::SignerMismatch {
            signer: rrsig.signer_name.clone(),
            expected: keys.owner().clone(),
        });
    }

    // RFC 4034 3.1.5: compared as RFC 1982 serial numbers
    if let Some(now) = now {
        if serial_lt(rrsig.expiration, now) {
            return Err(SignatureFailure::Expired {
                expiration: rrsig.expiration,
                now,
            });
        }
        if serial_lt(now, rrsig.inception) {
            return Err(SignatureFailure::NotYetValid {
                inception: rrsig.inception,
                now,
            });
        }
    }

    let data = signed_data(rrsig, rrset)?;

    let mut failure = SignatureFailure::NoMatchingKey {
        key_tag: rrsig.key_tag,
        algorithm: rrsig.algorithm,
    };
    for key in keys.candidates(rrsig) {
        match algorithm.verify(&key.public_key, &data, &rrsig.signature) {
            Ok(()) => {
                trace!(
                    "RRSIG {} for {} verified with key tag {}",
                    rrsig.type_covered,
                    rrset.name(),
                    rrsig.key_tag
                );
                return Ok(());
            }
            Err(e) => failure = e,
        }
    }
    Err(failure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{DNSResourceType, RData, ResourceRecord, Tlsa};

    fn tlsa_set(owner: &str) -> RRset {
        let name: DomainName = owner.parse().unwrap();
        let records = vec![ResourceRecord::new(
            name.clone(),
            60,
            RData::Tlsa(Tlsa {
                usage: 3,
                selector: 1,
                matching_type: 1,
                data: vec![5; 32],
            }),
        )];
        RRset::new(&name, DNSResourceType::TLSA, records).unwrap()
    }

    fn rrsig(labels: u8) -> Rrsig {
        Rrsig {
            type_covered: DNSResourceType::TLSA,
            algorithm: 13,
            labels,
            original_ttl: 300,
            expiration: 200,
            inception: 100,
            key_tag: 1,
            signer_name: "tld.".parse().unwrap(),
            signature: vec![0; 64],
        }
    }

    #[test]
    fn test_signed_data_uses_original_ttl() {
        let set = tlsa_set("_443._tcp.tld.");
        let data = signed_data(&rrsig(3), &set).unwrap();
        // unsigned rdata, owner, type, class, then original TTL 300
        let ttl_at = 18 + 5 + set.name().wire_len() + 4;
        assert_eq!(&data[ttl_at..ttl_at + 4], &300u32.to_be_bytes());
    }

    #[test]
    fn test_wildcard_owner() {
        let data = signed_data(&rrsig(1), &tlsa_set("_443._tcp.tld.")).unwrap();
        let owner = &data[18 + 5..18 + 5 + 7];
        assert_eq!(owner, &[1, b'*', 3, b't', b'l', b'd', 0]);

        assert!(matches!(
            signed_data(&rrsig(4), &tlsa_set("_443._tcp.tld.")),
            Err(SignatureFailure::LabelCount { .. })
        ));
    }

    #[test]
    fn test_serial_order() {
        assert!(serial_lt(1, 2));
        assert!(!serial_lt(2, 1));
        assert!(!serial_lt(7, 7));
        assert!(serial_lt(u32::MAX - 10, 5));
        assert!(!serial_lt(5, u32::MAX - 10));
    }

    #[test]
    fn test_validity_across_wraparound() {
        let set = tlsa_set("_443._tcp.tld.");
        let keys = VerifiedKeySet::new("tld.".parse().unwrap(), vec![]);
        let policy = AlgorithmPolicy::default();

        let mut sig = rrsig(3);
        sig.inception = u32::MAX - 100;
        sig.expiration = 100;
        // Inside the window: only the missing key is left to fail
        assert!(matches!(
            verify_rrsig(&sig, &set, &keys, &policy, Some(10)),
            Err(SignatureFailure::NoMatchingKey { .. })
        ));
        assert!(matches!(
            verify_rrsig(&sig, &set, &keys, &policy, Some(u32::MAX - 50)),
            Err(SignatureFailure::NoMatchingKey { .. })
        ));
        assert!(matches!(
            verify_rrsig(&sig, &set, &keys, &policy, Some(101)),
            Err(SignatureFailure::Expired { .. })
        ));
        assert!(matches!(
            verify_rrsig(&sig, &set, &keys, &policy, Some(u32::MAX - 101)),
            Err(SignatureFailure::NotYetValid { .. })
        ));
    }

    #[test]
    fn test_policy_and_validity_checked_first() {
        let set = tlsa_set("_443._tcp.tld.");
        let keys = VerifiedKeySet::new("tld.".parse().unwrap(), vec![]);
        let policy = AlgorithmPolicy::default();

        let mut weak = rrsig(3);
        weak.algorithm = 5;
        assert_eq!(
            verify_rrsig(&weak, &set, &keys, &policy, None),
            Err(SignatureFailure::AlgorithmNotAllowed(5))
        );
        assert!(matches!(
            verify_rrsig(&rrsig(3), &set, &keys, &policy, Some(201)),
            Err(SignatureFailure::Expired { .. })
        ));
        assert!(matches!(
            verify_rrsig(&rrsig(3), &set, &keys, &policy, Some(99)),
            Err(SignatureFailure::NotYetValid { .. })
        ));
        assert!(matches!(
            verify_rrsig(&rrsig(3), &set, &keys, &policy, None),
            Err(SignatureFailure::NoMatchingKey { .. })
        ));
    }
}
