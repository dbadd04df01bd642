use super::{
    ParseError,
    enums::{DNSResourceClass, DNSResourceType},
    name::DomainName,
    wire::read_uncompressed_name,
};
use crate::dnssec::{DigestType, calculate_key_tag};

/// A parsed resource record. Records are immutable once decoded.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ResourceRecord {
    pub name: DomainName,
    pub rclass: DNSResourceClass,
    pub ttl: u32,
    pub rdata: RData,
}

/// Typed record payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RData {
    Tlsa(Tlsa),
    Ds(Ds),
    Rrsig(Rrsig),
    Dnskey(Dnskey),
    /// Any other type code, kept raw
    Unknown { rtype: u16, data: Vec<u8> },
}

/// TLSA certificate association (RFC 6698)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Tlsa {
    pub usage: u8,
    pub selector: u8,
    pub matching_type: u8,
    pub data: Vec<u8>,
}

/// Delegation signer (RFC 4034 5)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Ds {
    pub key_tag: u16,
    pub algorithm: u8,
    pub digest_type: u8,
    pub digest: Vec<u8>,
}

/// Zone public key (RFC 4034 2)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dnskey {
    pub flags: u16,
    pub protocol: u8,
    pub algorithm: u8,
    pub public_key: Vec<u8>,
}

/// Signature over an RRset (RFC 4034 3)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rrsig {
    pub type_covered: DNSResourceType,
    pub algorithm: u8,
    pub labels: u8,
    pub original_ttl: u32,
    pub expiration: u32,
    pub inception: u32,
    pub key_tag: u16,
    pub signer_name: DomainName,
    pub signature: Vec<u8>,
}

const DNSKEY_ZONE_FLAG: u16 = 0x0100;
const DNSKEY_SEP_FLAG: u16 = 0x0001;

impl Dnskey {
    pub fn key_tag(&self) -> u16 {
        calculate_key_tag(self.flags, self.protocol, self.algorithm, &self.public_key)
    }

    pub fn is_zone_key(&self) -> bool {
        self.flags & DNSKEY_ZONE_FLAG != 0
    }

    /// Secure entry point, i.e. a key signing key
    pub fn is_sep(&self) -> bool {
        self.flags & DNSKEY_SEP_FLAG != 0
    }

    /// The DS record a parent zone would publish for this key.
    pub fn to_ds(&self, owner: &DomainName, digest_type: DigestType) -> Ds {
        let mut data = Vec::with_capacity(owner.wire_len() + 4 + self.public_key.len());
        owner.write_wire(&mut data);
        self.write_rdata(&mut data);
        Ds {
            key_tag: self.key_tag(),
            algorithm: self.algorithm,
            digest_type: digest_type.to_u8(),
            digest: digest_type.digest(&data),
        }
    }

    fn write_rdata(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.push(self.protocol);
        out.push(self.algorithm);
        out.extend_from_slice(&self.public_key);
    }
}

impl Rrsig {
    /// RRSIG rdata up to, but excluding, the signature field.
    pub fn write_unsigned_rdata(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&u16::from(self.type_covered).to_be_bytes());
        out.push(self.algorithm);
        out.push(self.labels);
        out.extend_from_slice(&self.original_ttl.to_be_bytes());
        out.extend_from_slice(&self.expiration.to_be_bytes());
        out.extend_from_slice(&self.inception.to_be_bytes());
        out.extend_from_slice(&self.key_tag.to_be_bytes());
        self.signer_name.write_wire(out);
    }
}

impl RData {
    pub fn rtype(&self) -> DNSResourceType {
        match self {
            RData::Tlsa(_) => DNSResourceType::TLSA,
            RData::Ds(_) => DNSResourceType::DS,
            RData::Rrsig(_) => DNSResourceType::RRSIG,
            RData::Dnskey(_) => DNSResourceType::DNSKEY,
            RData::Unknown { rtype, .. } => DNSResourceType::from(*rtype),
        }
    }

    /// Decode rdata of type `rtype`. `offset` is only used for error reports.
    pub fn decode(rtype: u16, data: &[u8], offset: usize) -> Result<Self, ParseError> {
        let kind = DNSResourceType::from(rtype);
        let malformed = || ParseError::MalformedRdata {
            rtype: kind,
            offset,
        };

        let rdata = match kind {
            DNSResourceType::TLSA => {
                if data.len() < 3 {
                    return Err(malformed());
                }
                RData::Tlsa(Tlsa {
                    usage: data[0],
                    selector: data[1],
                    matching_type: data[2],
                    data: data[3..].to_vec(),
                })
            }
            DNSResourceType::DS => {
                if data.len() < 5 {
                    return Err(malformed());
                }
                RData::Ds(Ds {
                    key_tag: u16::from_be_bytes([data[0], data[1]]),
                    algorithm: data[2],
                    digest_type: data[3],
                    digest: data[4..].to_vec(),
                })
            }
            DNSResourceType::DNSKEY => {
                if data.len() < 5 {
                    return Err(malformed());
                }
                RData::Dnskey(Dnskey {
                    flags: u16::from_be_bytes([data[0], data[1]]),
                    protocol: data[2],
                    algorithm: data[3],
                    public_key: data[4..].to_vec(),
                })
            }
            DNSResourceType::RRSIG => {
                if data.len() < 19 {
                    return Err(malformed());
                }
                // Signer names must not be compressed (RFC 4034 3.1.7)
                let (signer_name, used) =
                    read_uncompressed_name(&data[18..]).map_err(|_| malformed())?;
                let signature = data[18 + used..].to_vec();
                if signature.is_empty() {
                    return Err(malformed());
                }
                RData::Rrsig(Rrsig {
                    type_covered: u16::from_be_bytes([data[0], data[1]]).into(),
                    algorithm: data[2],
                    labels: data[3],
                    original_ttl: u32::from_be_bytes([data[4], data[5], data[6], data[7]]),
                    expiration: u32::from_be_bytes([data[8], data[9], data[10], data[11]]),
                    inception: u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
                    key_tag: u16::from_be_bytes([data[16], data[17]]),
                    signer_name,
                    signature,
                })
            }
            DNSResourceType::Other(_) => RData::Unknown {
                rtype,
                data: data.to_vec(),
            },
        };
        Ok(rdata)
    }

    /// Append canonical rdata (names uncompressed and lower-cased).
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            RData::Tlsa(tlsa) => {
                out.push(tlsa.usage);
                out.push(tlsa.selector);
                out.push(tlsa.matching_type);
                out.extend_from_slice(&tlsa.data);
            }
            RData::Ds(ds) => {
                out.extend_from_slice(&ds.key_tag.to_be_bytes());
                out.push(ds.algorithm);
                out.push(ds.digest_type);
                out.extend_from_slice(&ds.digest);
            }
            RData::Dnskey(key) => key.write_rdata(out),
            RData::Rrsig(sig) => {
                sig.write_unsigned_rdata(out);
                out.extend_from_slice(&sig.signature);
            }
            RData::Unknown { data, .. } => out.extend_from_slice(data),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }
}

impl ResourceRecord {
    pub fn new(name: DomainName, ttl: u32, rdata: RData) -> Self {
        Self {
            name,
            rclass: DNSResourceClass::IN,
            ttl,
            rdata,
        }
    }

    pub fn rtype(&self) -> DNSResourceType {
        self.rdata.rtype()
    }

    pub fn as_tlsa(&self) -> Option<&Tlsa> {
        match &self.rdata {
            RData::Tlsa(tlsa) => Some(tlsa),
            _ => None,
        }
    }

    pub fn as_dnskey(&self) -> Option<&Dnskey> {
        match &self.rdata {
            RData::Dnskey(key) => Some(key),
            _ => None,
        }
    }

    pub fn as_ds(&self) -> Option<&Ds> {
        match &self.rdata {
            RData::Ds(ds) => Some(ds),
            _ => None,
        }
    }

    pub fn as_rrsig(&self) -> Option<&Rrsig> {
        match &self.rdata {
            RData::Rrsig(sig) => Some(sig),
            _ => None,
        }
    }

    /// Same owner, class and rdata; TTL is ignored.
    pub fn is_duplicate_of(&self, other: &ResourceRecord) -> bool {
        self.name == other.name && self.rclass == other.rclass && self.rdata == other.rdata
    }

    /// Append the uncompressed wire form of the whole record.
    pub fn encode(&self, out: &mut Vec<u8>) {
        self.name.write_wire(out);
        out.extend_from_slice(&u16::from(self.rtype()).to_be_bytes());
        out.extend_from_slice(&u16::from(self.rclass).to_be_bytes());
        out.extend_from_slice(&self.ttl.to_be_bytes());
        let rdata = self.rdata.to_bytes();
        out.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        out.extend_from_slice(&rdata);
    }
}
