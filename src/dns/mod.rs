pub mod enums;
pub mod name;
pub mod resource;
pub mod wire;

use thiserror::Error;

pub use enums::{DNSResourceClass, DNSResourceType};
pub use name::DomainName;
pub use resource::{Dnskey, Ds, RData, ResourceRecord, Rrsig, Tlsa};
pub use wire::{encode_records, parse_records};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Payload shorter than the {0}-byte header")]
    HeaderTooShort(usize),

    #[error("Truncated data at offset {offset}: need {need} bytes, have {have}")]
    Truncated {
        offset: usize,
        need: usize,
        have: usize,
    },

    #[error("Invalid DNS label: {0:?}")]
    InvalidLabel(String),

    #[error("DNS name too long")]
    NameTooLong,

    #[error("Invalid label or compression pointer at offset {0}")]
    InvalidPointer(usize),

    #[error("Malformed {rtype} rdata at offset {offset}")]
    MalformedRdata {
        rtype: DNSResourceType,
        offset: usize,
    },

    #[error("Extension data contains {0} duplicate record(s)")]
    DuplicateRecords(usize),
}
