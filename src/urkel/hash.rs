use blake2::{Blake2b, Digest, digest::consts::U32};
use sha3::Sha3_256;

use super::bits::Bits;

pub type Hash = [u8; 32];

type Blake2b256 = Blake2b<U32>;

pub const ZERO_HASH: Hash = [0u8; 32];

const LEAF_PREFIX: u8 = 0x00;
const INTERNAL_PREFIX: u8 = 0x01;
const SKIP_PREFIX: u8 = 0x02;

/// Tree key for a name: SHA3-256 of its UTF-8 bytes
pub fn key_for(name: &str) -> Hash {
    Sha3_256::digest(name.as_bytes()).into()
}

pub fn hash_value(value: &[u8]) -> Hash {
    Blake2b256::digest(value).into()
}

pub fn hash_leaf(key: &Hash, value_hash: &Hash) -> Hash {
    let mut h = Blake2b256::new();
    h.update([LEAF_PREFIX]);
    h.update(key);
    h.update(value_hash);
    h.finalize().into()
}

/// Internal node hash; a non-empty prefix is committed along with the children
pub fn hash_internal(prefix: &Bits, left: &Hash, right: &Hash) -> Hash {
    let mut h = Blake2b256::new();
    if prefix.is_empty() {
        h.update([INTERNAL_PREFIX]);
    } else {
        h.update([SKIP_PREFIX]);
        h.update(prefix.size().to_le_bytes());
        h.update(prefix.data());
    }
    h.update(left);
    h.update(right);
    h.finalize().into()
}
