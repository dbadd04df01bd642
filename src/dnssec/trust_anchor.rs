use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::errors::{ChainError, Result};
use crate::dns::{Dnskey, DomainName};

/// Handshake root zone key signing key
pub const HANDSHAKE_ROOT_KEY: &str = ". 10 IN DNSKEY 257 3 13 T9cURJ2M/Mz9q6UsZNY+Ospyvj+Uv+tgrrWkLtPQwgU/Xu5Yk0l02Sn5ua2xAQfEYIzRO6v5iA+BejMeEwNP4Q==";

/// Public key of [`HANDSHAKE_ROOT_KEY`], decoded
const HANDSHAKE_ROOT_PUBLIC_KEY: [u8; 64] = [
    0x4f, 0xd7, 0x14, 0x44, 0x9d, 0x8c, 0xfc, 0xcc, 0xfd, 0xab, 0xa5, 0x2c, 0x64, 0xd6, 0x3e, 0x3a,
    0xca, 0x72, 0xbe, 0x3f, 0x94, 0xbf, 0xeb, 0x60, 0xae, 0xb5, 0xa4, 0x2e, 0xd3, 0xd0, 0xc2, 0x05,
    0x3f, 0x5e, 0xee, 0x58, 0x93, 0x49, 0x74, 0xd9, 0x29, 0xf9, 0xb9, 0xad, 0xb1, 0x01, 0x07, 0xc4,
    0x60, 0x8c, 0xd1, 0x3b, 0xab, 0xf9, 0x88, 0x0f, 0x81, 0x7a, 0x33, 0x1e, 0x13, 0x03, 0x4f, 0xe1,
];

/// A DNSSEC trust anchor: the one key the root level must contain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustAnchor {
    pub owner: DomainName,
    pub key: Dnskey,
}

impl TrustAnchor {
    pub fn new(owner: DomainName, key: Dnskey) -> Self {
        Self { owner, key }
    }

    /// The anchor compiled into the verifier
    pub fn handshake_root() -> Self {
        Self::new(
            DomainName::root(),
            Dnskey {
                flags: 257,
                protocol: 3,
                algorithm: 13,
                public_key: HANDSHAKE_ROOT_PUBLIC_KEY.to_vec(),
            },
        )
    }

    /// Parse a DNSKEY in presentation form, e.g.
    /// `. 10 IN DNSKEY 257 3 13 <base64>`. TTL and class are optional.
    pub fn from_presentation(text: &str) -> Result<Self> {
        let invalid = |msg: &str| ChainError::InvalidTrustAnchor(format!("{msg}: {text:?}"));

        let fields: Vec<&str> = text.split_whitespace().collect();
        let type_pos = fields
            .iter()
            .position(|f| f.eq_ignore_ascii_case("DNSKEY"))
            .ok_or_else(|| invalid("missing DNSKEY type"))?;
        if type_pos == 0 || fields.len() < type_pos + 5 {
            return Err(invalid("truncated record"));
        }

        let owner: DomainName = fields[0].parse().map_err(|_| invalid("bad owner name"))?;
        let flags = fields[type_pos + 1]
            .parse()
            .map_err(|_| invalid("bad flags"))?;
        let protocol = fields[type_pos + 2]
            .parse()
            .map_err(|_| invalid("bad protocol"))?;
        let algorithm = fields[type_pos + 3]
            .parse()
            .map_err(|_| invalid("bad algorithm"))?;
        // Key material may be split over several fields
        let public_key = STANDARD
            .decode(fields[type_pos + 4..].concat())
            .map_err(|_| invalid("bad base64 key"))?;

        Ok(Self::new(
            owner,
            Dnskey {
                flags,
                protocol,
                algorithm,
                public_key,
            },
        ))
    }

    pub fn key_tag(&self) -> u16 {
        self.key.key_tag()
    }

    /// True when `key` is byte-for-byte this anchor's key
    pub fn matches(&self, owner: &DomainName, key: &Dnskey) -> bool {
        &self.owner == owner && &self.key == key
    }
}

impl Default for TrustAnchor {
    fn default() -> Self {
        Self::handshake_root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handshake_root_parses() {
        let anchor = TrustAnchor::from_presentation(HANDSHAKE_ROOT_KEY).unwrap();
        assert!(anchor.owner.is_root());
        assert_eq!(anchor.key.flags, 257);
        assert_eq!(anchor.key.protocol, 3);
        assert_eq!(anchor.key.algorithm, 13);
        assert_eq!(anchor.key.public_key.len(), 64);
        assert!(anchor.key.is_sep());
        assert_eq!(anchor, TrustAnchor::handshake_root());
        assert_eq!(anchor.key_tag(), crate::dnssec::constants::HANDSHAKE_ROOT_KEY_TAG);
    }

    #[test]
    fn test_presentation_without_ttl_and_class() {
        let anchor = TrustAnchor::from_presentation("tld. DNSKEY 256 3 15 AAEC AwQ=").unwrap();
        assert_eq!(anchor.owner.to_string(), "tld.");
        assert_eq!(anchor.key.public_key, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_invalid_anchor() {
        assert!(TrustAnchor::from_presentation(". 10 IN A 1.2.3.4").is_err());
        assert!(TrustAnchor::from_presentation(". DNSKEY 257 3").is_err());
        assert!(TrustAnchor::from_presentation(". DNSKEY 257 3 13 !!!").is_err());
    }
}
