use std::collections::BTreeSet;
use std::fmt;

use ring::signature;

use super::errors::SignatureFailure;

/// DNSSEC Algorithm numbers (RFC 4034, 5702, 6605, 8080, 8624)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DnsSecAlgorithm {
    /// RSA/MD5 (deprecated)
    RsaMd5 = 1,
    /// DSA/SHA1 (RFC 2536)
    DSA = 3,
    /// RSA/SHA-1 (RFC 3110)
    RsaSha1 = 5,
    /// RSASHA1-NSEC3-SHA1 (RFC 5155)
    RsaSha1Nsec3Sha1 = 7,
    /// RSA/SHA-256 (RFC 5702)
    RsaSha256 = 8,
    /// RSA/SHA-512 (RFC 5702)
    RsaSha512 = 10,
    /// GOST R 34.10-2001 (RFC 5933)
    EccGost = 12,
    /// ECDSA Curve P-256 with SHA-256 (RFC 6605)
    EcdsaP256Sha256 = 13,
    /// ECDSA Curve P-384 with SHA-384 (RFC 6605)
    EcdsaP384Sha384 = 14,
    /// Ed25519 (RFC 8080)
    Ed25519 = 15,
    /// Ed448 (RFC 8080)
    Ed448 = 16,
}

impl DnsSecAlgorithm {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::RsaMd5),
            3 => Some(Self::DSA),
            5 => Some(Self::RsaSha1),
            7 => Some(Self::RsaSha1Nsec3Sha1),
            8 => Some(Self::RsaSha256),
            10 => Some(Self::RsaSha512),
            12 => Some(Self::EccGost),
            13 => Some(Self::EcdsaP256Sha256),
            14 => Some(Self::EcdsaP384Sha384),
            15 => Some(Self::Ed25519),
            16 => Some(Self::Ed448),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Algorithms we can verify with ring
    pub fn is_supported(&self) -> bool {
        matches!(
            self,
            Self::RsaSha256
                | Self::RsaSha512
                | Self::EcdsaP256Sha256
                | Self::EcdsaP384Sha384
                | Self::Ed25519
        )
    }

    /// Verify `sig` over `message` with a DNSKEY public key in its DNS encoding.
    pub fn verify(
        &self,
        public_key: &[u8],
        message: &[u8],
        sig: &[u8],
    ) -> Result<(), SignatureFailure> {
        match self {
            Self::RsaSha256 | Self::RsaSha512 => {
                let alg = if *self == Self::RsaSha256 {
                    &signature::RSA_PKCS1_1024_8192_SHA256_FOR_LEGACY_USE_ONLY
                } else {
                    &signature::RSA_PKCS1_1024_8192_SHA512_FOR_LEGACY_USE_ONLY
                };
                rsa_components(public_key)?
                    .verify(alg, message, sig)
                    .map_err(|_| SignatureFailure::BadSignature)
            }
            Self::EcdsaP256Sha256 | Self::EcdsaP384Sha384 => {
                let (alg, key_len) = if *self == Self::EcdsaP256Sha256 {
                    (&signature::ECDSA_P256_SHA256_FIXED, 64)
                } else {
                    (&signature::ECDSA_P384_SHA384_FIXED, 96)
                };
                if public_key.len() != key_len {
                    return Err(SignatureFailure::InvalidPublicKey);
                }
                // ring expects an uncompressed SEC1 point
                let mut key = Vec::with_capacity(key_len + 1);
                key.push(0x04);
                key.extend_from_slice(public_key);
                signature::UnparsedPublicKey::new(alg, &key)
                    .verify(message, sig)
                    .map_err(|_| SignatureFailure::BadSignature)
            }
            Self::Ed25519 => {
                if public_key.len() != 32 {
                    return Err(SignatureFailure::InvalidPublicKey);
                }
                signature::UnparsedPublicKey::new(&signature::ED25519, public_key)
                    .verify(message, sig)
                    .map_err(|_| SignatureFailure::BadSignature)
            }
            _ => Err(SignatureFailure::UnsupportedAlgorithm(self.to_u8())),
        }
    }
}

/// Split an RFC 3110 RSA public key into modulus and exponent
fn rsa_components(
    public_key: &[u8],
) -> Result<signature::RsaPublicKeyComponents<&[u8]>, SignatureFailure> {
    if public_key.len() <= 3 {
        return Err(SignatureFailure::InvalidPublicKey);
    }
    let (exp_len, pos) = if public_key[0] == 0 {
        (u16::from_be_bytes([public_key[1], public_key[2]]) as usize, 3)
    } else {
        (public_key[0] as usize, 1)
    };
    if public_key.len() <= pos + exp_len {
        return Err(SignatureFailure::InvalidPublicKey);
    }
    Ok(signature::RsaPublicKeyComponents {
        n: &public_key[pos + exp_len..],
        e: &public_key[pos..pos + exp_len],
    })
}

impl fmt::Display for DnsSecAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RsaMd5 => write!(f, "RSAMD5"),
            Self::DSA => write!(f, "DSA"),
            Self::RsaSha1 => write!(f, "RSASHA1"),
            Self::RsaSha1Nsec3Sha1 => write!(f, "RSASHA1-NSEC3-SHA1"),
            Self::RsaSha256 => write!(f, "RSASHA256"),
            Self::RsaSha512 => write!(f, "RSASHA512"),
            Self::EccGost => write!(f, "ECC-GOST"),
            Self::EcdsaP256Sha256 => write!(f, "ECDSAP256SHA256"),
            Self::EcdsaP384Sha384 => write!(f, "ECDSAP384SHA384"),
            Self::Ed25519 => write!(f, "ED25519"),
            Self::Ed448 => write!(f, "ED448"),
        }
    }
}

/// Which signature algorithms a chain may use.
///
/// Every RRSIG and every key it is checked against must use an allowed
/// algorithm, so a chain cannot be downgraded to something weaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlgorithmPolicy {
    allowed: BTreeSet<u8>,
}

impl AlgorithmPolicy {
    pub const DEFAULT_ALLOWED: [u8; 5] = [8, 10, 13, 14, 15];

    /// Build a policy from algorithm numbers. Numbers ring cannot verify are
    /// rejected.
    pub fn from_numbers<I: IntoIterator<Item = u8>>(numbers: I) -> Result<Self, u8> {
        let mut allowed = BTreeSet::new();
        for n in numbers {
            match DnsSecAlgorithm::from_u8(n) {
                Some(alg) if alg.is_supported() => {
                    allowed.insert(n);
                }
                _ => return Err(n),
            }
        }
        Ok(Self { allowed })
    }

    pub fn permits(&self, algorithm: u8) -> bool {
        self.allowed.contains(&algorithm)
    }

    pub fn allowed(&self) -> impl Iterator<Item = u8> + '_ {
        self.allowed.iter().copied()
    }

    /// Resolve an algorithm number after the policy check.
    pub fn check(&self, algorithm: u8) -> Result<DnsSecAlgorithm, SignatureFailure> {
        if !self.permits(algorithm) {
            return Err(SignatureFailure::AlgorithmNotAllowed(algorithm));
        }
        DnsSecAlgorithm::from_u8(algorithm).ok_or(SignatureFailure::UnsupportedAlgorithm(algorithm))
    }
}

impl Default for AlgorithmPolicy {
    fn default() -> Self {
        Self {
            allowed: Self::DEFAULT_ALLOWED.into_iter().collect(),
        }
    }
}
