use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, trace, warn};

use super::{
    AlgorithmPolicy, DigestType, TrustAnchor,
    errors::{ChainError, Result},
    levels::{Level, partition},
    rrset::RRset,
    signature::{VerifiedKeySet, verify_rrsig},
};
use crate::dns::{
    DNSResourceType, Dnskey, DomainName, Ds, RData, ResourceRecord, Rrsig, parse_records,
};

/// Whether RRSIG inception/expiration times are enforced
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidityCheck {
    /// Chains are captured at issuance and may outlive their signatures
    #[default]
    Disabled,
    SystemClock,
    /// Fixed unix time, for tests
    At(u32),
}

impl ValidityCheck {
    fn now(&self) -> Option<u32> {
        match self {
            Self::Disabled => None,
            Self::At(now) => Some(*now),
            Self::SystemClock => Some(serial_time(SystemTime::now())),
        }
    }
}

/// Unix time as an RRSIG serial number, i.e. modulo 2^32
fn serial_time(at: SystemTime) -> u32 {
    let secs = at
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    u32::try_from(secs & u64::from(u32::MAX)).unwrap_or_default()
}

/// Result of a successful chain walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedChain {
    /// The signed TLSA record at the end of the chain
    pub tlsa: ResourceRecord,
    /// Zone owners whose keys were proven, root first
    pub zones: Vec<DomainName>,
}

/// Walks a DNSSEC chain from the trust anchor down to a TLSA record
#[derive(Debug, Clone)]
pub struct ChainVerifier {
    anchor: TrustAnchor,
    policy: AlgorithmPolicy,
    validity: ValidityCheck,
}

/// Records of one level split by type
#[derive(Default)]
struct Buckets<'a> {
    tlsa: Vec<ResourceRecord>,
    ds: Vec<ResourceRecord>,
    dnskey: Vec<ResourceRecord>,
    rrsig: Vec<&'a Rrsig>,
}

enum Step {
    Delegated(VerifiedKeySet),
    Terminal(ResourceRecord),
}

impl<'a> Buckets<'a> {
    fn split(level: &'a Level) -> Result<Self> {
        let mut buckets = Self::default();
        for record in &level.records {
            match &record.rdata {
                RData::Tlsa(_) => buckets.tlsa.push(record.clone()),
                RData::Ds(_) => buckets.ds.push(record.clone()),
                RData::Dnskey(_) => buckets.dnskey.push(record.clone()),
                RData::Rrsig(sig) => buckets.rrsig.push(sig),
                RData::Unknown { .. } => {
                    return Err(ChainError::UnknownRecordType {
                        name: level.owner.clone(),
                        rtype: record.rtype(),
                    });
                }
            }
        }
        Ok(buckets)
    }

    fn covering(&self, rtype: DNSResourceType) -> Vec<&'a Rrsig> {
        self.rrsig
            .iter()
            .copied()
            .filter(|sig| sig.type_covered == rtype)
            .collect()
    }

    fn has(&self, rtype: DNSResourceType) -> bool {
        match rtype {
            DNSResourceType::TLSA => !self.tlsa.is_empty(),
            DNSResourceType::DS => !self.ds.is_empty(),
            DNSResourceType::DNSKEY => !self.dnskey.is_empty(),
            _ => false,
        }
    }

    fn keys(&self) -> Vec<Dnskey> {
        self.dnskey
            .iter()
            .filter_map(ResourceRecord::as_dnskey)
            .cloned()
            .collect()
    }
}

impl ChainVerifier {
    pub fn new(anchor: TrustAnchor, policy: AlgorithmPolicy) -> Self {
        Self {
            anchor,
            policy,
            validity: ValidityCheck::default(),
        }
    }

    pub fn with_validity(mut self, validity: ValidityCheck) -> Self {
        self.validity = validity;
        self
    }

    pub fn anchor(&self) -> &TrustAnchor {
        &self.anchor
    }

    /// Parse a DNSSEC extension payload and verify it ends in `target`.
    pub fn verify_payload(&self, payload: &[u8], target: &DomainName) -> Result<VerifiedChain> {
        let records = parse_records(payload)?;
        self.verify_records(records, target)
    }

    pub fn verify_records(
        &self,
        records: Vec<ResourceRecord>,
        target: &DomainName,
    ) -> Result<VerifiedChain> {
        let levels = partition(records, target)?;
        self.verify_levels(&levels)
    }

    /// Verify levels ordered root first.
    pub fn verify_levels(&self, levels: &[Level]) -> Result<VerifiedChain> {
        let (root, rest) = levels
            .split_first()
            .ok_or(ChainError::InsufficientLevels(0))?;
        if rest.is_empty() {
            return Err(ChainError::InsufficientLevels(1));
        }
        debug!("Verifying DNSSEC chain with {} levels", levels.len());

        let now = self.validity.now();
        let mut parent = self.verify_root(root, now)?;
        let mut zones = vec![parent.owner().clone()];

        for (i, level) in rest.iter().enumerate() {
            let is_last = i + 1 == rest.len();
            match self.verify_level(level, &parent, is_last, now)? {
                Step::Delegated(keys) => {
                    trace!("Level {} delegated {} keys", level.owner, keys.keys().len());
                    zones.push(keys.owner().clone());
                    parent = keys;
                }
                Step::Terminal(tlsa) => {
                    debug!("DNSSEC chain verified down to {}", level.owner);
                    return Ok(VerifiedChain { tlsa, zones });
                }
            }
        }

        // verify_level only returns Delegated for non-final levels
        let last = rest.last().map(|l| l.owner.clone()).unwrap_or_default();
        Err(ChainError::UnterminatedChain { name: last })
    }

    fn verify_root(&self, level: &Level, now: Option<u32>) -> Result<VerifiedKeySet> {
        let buckets = Buckets::split(level)?;
        if let Some(record) = buckets.tlsa.iter().chain(&buckets.ds).next() {
            return Err(ChainError::UnexpectedRecord {
                name: level.owner.clone(),
                rtype: record.rtype(),
            });
        }

        let keys = buckets.keys();
        if !keys
            .iter()
            .any(|key| self.anchor.matches(&level.owner, key))
        {
            warn!("Root level {} lacks the trust anchor", level.owner);
            return Err(ChainError::RootKeyNotFound);
        }

        if buckets.rrsig.is_empty() {
            return Err(ChainError::MissingRootSignature);
        }

        let rrset = RRset::new(&level.owner, DNSResourceType::DNSKEY, buckets.dnskey.clone())?;
        let anchor_keys =
            VerifiedKeySet::new(self.anchor.owner.clone(), vec![self.anchor.key.clone()]);
        for sig in &buckets.rrsig {
            verify_rrsig(sig, &rrset, &anchor_keys, &self.policy, now)
                .map_err(ChainError::RootSignature)?;
        }

        debug!(
            "Root DNSKEY set verified against anchor key tag {}",
            self.anchor.key_tag()
        );
        Ok(VerifiedKeySet::new(level.owner.clone(), keys))
    }

    fn verify_level(
        &self,
        level: &Level,
        parent: &VerifiedKeySet,
        is_last: bool,
        now: Option<u32>,
    ) -> Result<Step> {
        let buckets = Buckets::split(level)?;
        let name = &level.owner;

        if let Some(sig) = buckets.rrsig.iter().find(|s| !buckets.has(s.type_covered)) {
            return Err(ChainError::UnresolvedSignature {
                name: name.clone(),
                covered: sig.type_covered,
            });
        }

        if !buckets.tlsa.is_empty() {
            if let Some(record) = buckets.ds.iter().chain(&buckets.dnskey).next() {
                return Err(ChainError::UnexpectedRecord {
                    name: name.clone(),
                    rtype: record.rtype(),
                });
            }
            if !is_last {
                return Err(ChainError::UnterminatedChain { name: name.clone() });
            }
            if buckets.tlsa.len() != 1 {
                return Err(ChainError::TlsaCount {
                    name: name.clone(),
                    count: buckets.tlsa.len(),
                });
            }
            self.verify_signed(&buckets, DNSResourceType::TLSA, &buckets.tlsa, parent, name, now)?;
            let tlsa = buckets.tlsa[0].clone();
            return Ok(Step::Terminal(tlsa));
        }

        if is_last {
            return Err(ChainError::UnterminatedChain { name: name.clone() });
        }

        if !buckets.ds.is_empty() {
            self.verify_signed(&buckets, DNSResourceType::DS, &buckets.ds, parent, name, now)?;
        }

        let keys = buckets.keys();
        if keys.is_empty() {
            return Err(ChainError::MissingDnskeys { name: name.clone() });
        }

        let published: Vec<&Ds> = buckets.ds.iter().filter_map(ResourceRecord::as_ds).collect();
        for key in &keys {
            let expected = key.to_ds(name, DigestType::Sha256);
            if !published.iter().any(|ds| **ds == expected) {
                return Err(ChainError::MissingDsForDnskey {
                    name: name.clone(),
                    key_tag: expected.key_tag,
                });
            }
        }

        let own_keys = VerifiedKeySet::new(name.clone(), keys);
        self.verify_signed(
            &buckets,
            DNSResourceType::DNSKEY,
            &buckets.dnskey,
            &own_keys,
            name,
            now,
        )?;
        Ok(Step::Delegated(own_keys))
    }

    /// Every RRSIG covering `rtype` must verify; at least one must exist.
    fn verify_signed(
        &self,
        buckets: &Buckets<'_>,
        rtype: DNSResourceType,
        records: &[ResourceRecord],
        keys: &VerifiedKeySet,
        name: &DomainName,
        now: Option<u32>,
    ) -> Result<()> {
        let rrset = RRset::new(name, rtype, records.to_vec())?;
        let sigs = buckets.covering(rtype);
        if sigs.is_empty() {
            return Err(ChainError::UnsignedRrset {
                name: name.clone(),
                rtype,
            });
        }
        for sig in sigs {
            verify_rrsig(sig, &rrset, keys, &self.policy, now).map_err(|reason| {
                ChainError::RrsigVerification {
                    name: name.clone(),
                    covered: rtype,
                    reason,
                }
            })?;
        }
        Ok(())
    }
}

impl Default for ChainVerifier {
    fn default() -> Self {
        Self::new(TrustAnchor::handshake_root(), AlgorithmPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_serial_time_wraps() {
        let at = |secs| UNIX_EPOCH + Duration::from_secs(secs);
        assert_eq!(serial_time(at(1_700_000_000)), 1_700_000_000);
        assert_eq!(serial_time(at((1 << 32) + 5)), 5);
        assert_eq!(serial_time(UNIX_EPOCH - Duration::from_secs(1)), 0);
    }
}
