use std::collections::HashSet;

use super::errors::{ChainError, Result, RrsetFault};
use crate::dns::{DNSResourceClass, DNSResourceType, DomainName, ResourceRecord};

/// A non-empty set of records sharing owner, type and class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RRset {
    name: DomainName,
    rtype: DNSResourceType,
    rclass: DNSResourceClass,
    records: Vec<ResourceRecord>,
}

impl RRset {
    /// `name` and `rtype` are only used to label the error for an empty set.
    pub fn new(
        name: &DomainName,
        rtype: DNSResourceType,
        records: Vec<ResourceRecord>,
    ) -> Result<Self> {
        let fail = |fault| ChainError::InvalidRrset {
            name: name.clone(),
            rtype,
            fault,
        };

        let first = records.first().ok_or_else(|| fail(RrsetFault::Empty))?;
        let (owner, kind, class) = (first.name.clone(), first.rtype(), first.rclass);

        let mut seen = HashSet::with_capacity(records.len());
        for record in &records {
            if record.name != owner {
                return Err(fail(RrsetFault::MixedOwner));
            }
            if record.rtype() != kind {
                return Err(fail(RrsetFault::MixedType));
            }
            if record.rclass != class {
                return Err(fail(RrsetFault::MixedClass));
            }
            if !seen.insert(&record.rdata) {
                return Err(fail(RrsetFault::DuplicateRdata));
            }
        }

        Ok(Self {
            name: owner,
            rtype: kind,
            rclass: class,
            records,
        })
    }

    pub fn name(&self) -> &DomainName {
        &self.name
    }

    pub fn rtype(&self) -> DNSResourceType {
        self.rtype
    }

    pub fn rclass(&self) -> DNSResourceClass {
        self.rclass
    }

    pub fn records(&self) -> &[ResourceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Canonical rdata of every record, sorted (RFC 4034 6.3)
    pub fn canonical_rdata(&self) -> Vec<Vec<u8>> {
        let mut out: Vec<Vec<u8>> = self.records.iter().map(|r| r.rdata.to_bytes()).collect();
        out.sort_unstable();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::{Ds, RData, Tlsa};

    fn ds(owner: &str, tag: u16) -> ResourceRecord {
        ResourceRecord::new(
            owner.parse().unwrap(),
            60,
            RData::Ds(Ds {
                key_tag: tag,
                algorithm: 13,
                digest_type: 2,
                digest: vec![tag as u8; 32],
            }),
        )
    }

    #[test]
    fn test_valid_rrset_sorted_rdata() {
        let set = RRset::new(
            &"tld.".parse().unwrap(),
            DNSResourceType::DS,
            vec![ds("tld.", 9), ds("tld.", 2)],
        )
        .unwrap();
        assert_eq!(set.len(), 2);
        let rdata = set.canonical_rdata();
        assert!(rdata[0] < rdata[1]);
    }

    #[test]
    fn test_invalid_rrsets() {
        let name: DomainName = "tld.".parse().unwrap();
        let err = |records| {
            match RRset::new(&name, DNSResourceType::DS, records) {
                Err(ChainError::InvalidRrset { fault, .. }) => fault,
                other => panic!("unexpected {:?}", other),
            }
        };

        assert_eq!(err(vec![]), RrsetFault::Empty);
        assert_eq!(err(vec![ds("tld.", 1), ds("a.tld.", 2)]), RrsetFault::MixedOwner);
        assert_eq!(err(vec![ds("tld.", 1), ds("tld.", 1)]), RrsetFault::DuplicateRdata);

        let tlsa = ResourceRecord::new(
            name.clone(),
            60,
            RData::Tlsa(Tlsa {
                usage: 3,
                selector: 1,
                matching_type: 1,
                data: vec![1],
            }),
        );
        assert_eq!(err(vec![ds("tld.", 1), tlsa]), RrsetFault::MixedType);

        let mut chaos = ds("tld.", 2);
        chaos.rclass = DNSResourceClass::CH;
        assert_eq!(err(vec![ds("tld.", 1), chaos]), RrsetFault::MixedClass);
    }
}
