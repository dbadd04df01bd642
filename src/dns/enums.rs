use std::fmt;

/// Record types the verifier understands. Anything else is carried as
/// `Other` so the chain verifier can reject it explicitly.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DNSResourceType {
    DS,
    RRSIG,
    DNSKEY,
    TLSA,
    Other(u16),
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DNSResourceClass {
    #[default]
    IN,
    CH,
    HS,
    Other(u16),
}

impl From<u16> for DNSResourceType {
    fn from(value: u16) -> Self {
        match value {
            43 => DNSResourceType::DS,
            46 => DNSResourceType::RRSIG,
            48 => DNSResourceType::DNSKEY,
            52 => DNSResourceType::TLSA,
            other => DNSResourceType::Other(other),
        }
    }
}

impl From<DNSResourceType> for u16 {
    fn from(value: DNSResourceType) -> Self {
        match value {
            DNSResourceType::DS => 43,
            DNSResourceType::RRSIG => 46,
            DNSResourceType::DNSKEY => 48,
            DNSResourceType::TLSA => 52,
            DNSResourceType::Other(other) => other,
        }
    }
}

impl From<u16> for DNSResourceClass {
    fn from(value: u16) -> Self {
        match value {
            1 => DNSResourceClass::IN,
            3 => DNSResourceClass::CH,
            4 => DNSResourceClass::HS,
            other => DNSResourceClass::Other(other),
        }
    }
}

impl From<DNSResourceClass> for u16 {
    fn from(value: DNSResourceClass) -> Self {
        match value {
            DNSResourceClass::IN => 1,
            DNSResourceClass::CH => 3,
            DNSResourceClass::HS => 4,
            DNSResourceClass::Other(other) => other,
        }
    }
}

impl fmt::Display for DNSResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DS => write!(f, "DS"),
            Self::RRSIG => write!(f, "RRSIG"),
            Self::DNSKEY => write!(f, "DNSKEY"),
            Self::TLSA => write!(f, "TLSA"),
            Self::Other(code) => write!(f, "TYPE{}", code),
        }
    }
}

impl fmt::Display for DNSResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IN => write!(f, "IN"),
            Self::CH => write!(f, "CH"),
            Self::HS => write!(f, "HS"),
            Self::Other(code) => write!(f, "CLASS{}", code),
        }
    }
}
