//! Decoding of the record list carried in the DNSSEC certificate extension.
//!
//! The payload is a 4-byte header followed by back-to-back resource records
//! in DNS wire format. Names may use compression pointers; offsets are
//! relative to the start of the payload, header included.

use std::collections::HashSet;

use tracing::{debug, trace};

use super::{
    ParseError,
    enums::DNSResourceClass,
    name::{DomainName, MAX_LABEL_LEN, MAX_NAME_LEN},
    resource::{RData, ResourceRecord},
};

/// Bytes preceding the first record. The first two carry the service port.
pub const HEADER_LEN: usize = 4;

/// Maximum pointer jumps followed while decoding a single name
const MAX_POINTER_JUMPS: usize = 16;

/// Parse a DNSSEC extension payload into records.
///
/// Any duplicated record fails the whole payload.
pub fn parse_records(buf: &[u8]) -> Result<Vec<ResourceRecord>, ParseError> {
    if buf.len() < HEADER_LEN {
        return Err(ParseError::HeaderTooShort(HEADER_LEN));
    }
    trace!(
        "Chain payload header: port {}",
        u16::from_be_bytes([buf[0], buf[1]])
    );

    let mut reader = WireReader::new(buf, HEADER_LEN);
    let mut records = Vec::new();
    while !reader.is_empty() {
        records.push(reader.read_record()?);
    }

    let duplicates = count_duplicates(&records);
    if duplicates > 0 {
        return Err(ParseError::DuplicateRecords(duplicates));
    }

    debug!("Parsed {} records from chain payload", records.len());
    Ok(records)
}

/// Build a payload from records: header followed by uncompressed records.
pub fn encode_records(port: u16, records: &[ResourceRecord]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + records.len() * 128);
    out.extend_from_slice(&port.to_be_bytes());
    out.extend_from_slice(&[0, 0]);
    for record in records {
        record.encode(&mut out);
    }
    out
}

fn count_duplicates(records: &[ResourceRecord]) -> usize {
    let mut seen = HashSet::with_capacity(records.len());
    records
        .iter()
        .filter(|r| !seen.insert((&r.name, r.rclass, &r.rdata)))
        .count()
}

/// Decode a name that must not contain compression pointers.
/// Returns the name and the number of bytes it occupied.
pub fn read_uncompressed_name(data: &[u8]) -> Result<(DomainName, usize), ParseError> {
    let mut labels = Vec::new();
    let mut pos = 0;
    loop {
        let len = *data.get(pos).ok_or(ParseError::Truncated {
            offset: pos,
            need: 1,
            have: 0,
        })? as usize;
        pos += 1;
        if len == 0 {
            break;
        }
        if len > MAX_LABEL_LEN {
            return Err(ParseError::InvalidPointer(pos - 1));
        }
        let label = data.get(pos..pos + len).ok_or(ParseError::Truncated {
            offset: pos,
            need: len,
            have: data.len().saturating_sub(pos),
        })?;
        labels.push(label_to_string(label)?);
        pos += len;
    }
    Ok((DomainName::from_labels(labels)?, pos))
}

fn label_to_string(label: &[u8]) -> Result<String, ParseError> {
    String::from_utf8(label.to_vec())
        .map_err(|_| ParseError::InvalidLabel(String::from_utf8_lossy(label).into_owned()))
}

/// Cursor over a payload buffer
struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    fn new(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, need: usize) -> Result<&'a [u8], ParseError> {
        let have = self.buf.len().saturating_sub(self.pos);
        if need > have {
            return Err(ParseError::Truncated {
                offset: self.pos,
                need,
                have,
            });
        }
        let slice = &self.buf[self.pos..self.pos + need];
        self.pos += need;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16, ParseError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn read_u32(&mut self) -> Result<u32, ParseError> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_record(&mut self) -> Result<ResourceRecord, ParseError> {
        let name = self.read_name()?;
        let rtype = self.read_u16()?;
        let rclass = DNSResourceClass::from(self.read_u16()?);
        let ttl = self.read_u32()?;
        let rdlength = self.read_u16()? as usize;
        let offset = self.pos;
        let rdata = RData::decode(rtype, self.take(rdlength)?, offset)?;
        trace!("Decoded {} record for {} at offset {}", rdata.rtype(), name, offset);

        Ok(ResourceRecord {
            name,
            rclass,
            ttl,
            rdata,
        })
    }

    /// Read a possibly compressed name, leaving the cursor after the first
    /// pointer (or after the terminating zero label).
    fn read_name(&mut self) -> Result<DomainName, ParseError> {
        let mut labels = Vec::new();
        let mut offset = self.pos;
        let mut resume = None;
        let mut jumps = 0;
        let mut wire_len = 1;

        loop {
            let len = *self.buf.get(offset).ok_or(ParseError::Truncated {
                offset,
                need: 1,
                have: 0,
            })?;

            if len & 0xC0 == 0xC0 {
                let low = *self
                    .buf
                    .get(offset + 1)
                    .ok_or(ParseError::InvalidPointer(offset))?;
                if resume.is_none() {
                    resume = Some(offset + 2);
                }
                jumps += 1;
                let target = u16::from_be_bytes([len & 0x3F, low]) as usize;
                // Pointers must reference earlier data so loops cannot form
                if jumps > MAX_POINTER_JUMPS || target >= offset {
                    return Err(ParseError::InvalidPointer(offset));
                }
                offset = target;
                continue;
            }

            if len & 0xC0 != 0 {
                return Err(ParseError::InvalidPointer(offset));
            }

            if len == 0 {
                offset += 1;
                break;
            }

            let len = len as usize;
            let label = self
                .buf
                .get(offset + 1..offset + 1 + len)
                .ok_or(ParseError::Truncated {
                    offset: offset + 1,
                    need: len,
                    have: self.buf.len().saturating_sub(offset + 1),
                })?;
            wire_len += len + 1;
            if wire_len > MAX_NAME_LEN {
                return Err(ParseError::NameTooLong);
            }
            labels.push(label_to_string(label)?);
            offset += 1 + len;
        }

        self.pos = resume.unwrap_or(offset);
        DomainName::from_labels(labels)
    }
}
