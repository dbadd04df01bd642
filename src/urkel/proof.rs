//! Urkel radix tree proofs.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! u16  field        type in the top 2 bits, depth in the low 14
//! u16  count        number of sibling nodes
//! [u8] bitmap       ceil(count / 8) bytes, bit i set when node i has a prefix
//! per node          [prefix] hash32
//! body              short:     prefix left32 right32
//!                   collision: key32 hash32
//!                   exists:    u16 size, value
//! ```

use std::io;

use bitstream_io::{BitRead, BitReader, BitWrite, BitWriter, LittleEndian};

use super::{
    ProofFailure, UrkelError,
    bits::{Bits, KEY_BITS, get_bit},
    hash::{Hash, ZERO_HASH, hash_internal, hash_leaf, hash_value},
};

/// Largest value an exists proof may carry
pub const MAX_VALUE_SIZE: u16 = 1023;

const TYPE_DEADEND: u16 = 0;
const TYPE_SHORT: u16 = 1;
const TYPE_COLLISION: u16 = 2;
const TYPE_EXISTS: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProofType {
    DeadEnd,
    Short,
    Collision,
    Exists,
}

/// What the proof ends in
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProofBody {
    /// The key's path ends in an empty subtree
    DeadEnd,
    /// The path ends in an internal node whose prefix diverges from the key
    Short {
        prefix: Bits,
        left: Hash,
        right: Hash,
    },
    /// The path ends in a leaf for a different key
    Collision { key: Hash, hash: Hash },
    /// The key is present with this value
    Exists { value: Vec<u8> },
}

/// A sibling on the path from the root, with the bits skipped above it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofNode {
    pub prefix: Bits,
    pub hash: Hash,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrkelProof {
    pub depth: u16,
    pub nodes: Vec<ProofNode>,
    pub body: ProofBody,
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn read_hash<R: BitRead>(reader: &mut R) -> io::Result<Hash> {
    let mut hash = ZERO_HASH;
    reader.read_bytes(&mut hash)?;
    Ok(hash)
}

impl UrkelProof {
    pub fn proof_type(&self) -> ProofType {
        match self.body {
            ProofBody::DeadEnd => ProofType::DeadEnd,
            ProofBody::Short { .. } => ProofType::Short,
            ProofBody::Collision { .. } => ProofType::Collision,
            ProofBody::Exists { .. } => ProofType::Exists,
        }
    }

    /// The value proven for the key, if this is an existence proof
    pub fn value(&self) -> Option<&[u8]> {
        match &self.body {
            ProofBody::Exists { value } => Some(value),
            _ => None,
        }
    }

    /// Decode one proof from the front of `data`; trailing bytes are ignored.
    pub fn decode(data: &[u8]) -> Result<Self, UrkelError> {
        let mut reader = BitReader::<_, LittleEndian>::new(data);
        Self::read(&mut reader).map_err(|e| UrkelError::ProofParse(e.to_string()))
    }

    fn read<R: BitRead>(reader: &mut R) -> io::Result<Self> {
        let field = reader.read_var::<u16>(16)?;
        let kind = field >> 14;
        let depth = field & 0x3fff;
        if depth > KEY_BITS {
            return Err(invalid(format!("depth {depth} exceeds key length")));
        }

        let count = reader.read_var::<u16>(16)?;
        if count > KEY_BITS {
            return Err(invalid(format!("{count} nodes exceeds key length")));
        }
        let mut bitmap = vec![0u8; (count as usize).div_ceil(8)];
        reader.read_bytes(&mut bitmap)?;

        let mut nodes = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            let prefix = if get_bit(&bitmap, i) {
                Bits::read(reader)?
            } else {
                Bits::empty()
            };
            nodes.push(ProofNode {
                prefix,
                hash: read_hash(reader)?,
            });
        }

        let body = match kind {
            TYPE_DEADEND => ProofBody::DeadEnd,
            TYPE_SHORT => ProofBody::Short {
                prefix: Bits::read(reader)?,
                left: read_hash(reader)?,
                right: read_hash(reader)?,
            },
            TYPE_COLLISION => ProofBody::Collision {
                key: read_hash(reader)?,
                hash: read_hash(reader)?,
            },
            _ => {
                let size = reader.read_var::<u16>(16)?;
                if size > MAX_VALUE_SIZE {
                    return Err(invalid(format!("value of {size} bytes is too large")));
                }
                let mut value = vec![0u8; size as usize];
                reader.read_bytes(&mut value)?;
                ProofBody::Exists { value }
            }
        };

        Ok(Self { depth, nodes, body })
    }

    /// Serialized form; decoding it yields an equal proof.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());
        {
            let mut writer: BitWriter<&mut Vec<u8>, LittleEndian> = BitWriter::new(&mut buf);
            // Writes into a Vec cannot fail
            let _ = self.write(&mut writer);
        }
        buf
    }

    fn write<W: BitWrite>(&self, writer: &mut W) -> io::Result<()> {
        let kind = match self.body {
            ProofBody::DeadEnd => TYPE_DEADEND,
            ProofBody::Short { .. } => TYPE_SHORT,
            ProofBody::Collision { .. } => TYPE_COLLISION,
            ProofBody::Exists { .. } => TYPE_EXISTS,
        };
        writer.write_var::<u16>(16, kind << 14 | (self.depth & 0x3fff))?;
        writer.write_var::<u16>(16, self.nodes.len() as u16)?;

        let mut bitmap = vec![0u8; self.nodes.len().div_ceil(8)];
        for (i, node) in self.nodes.iter().enumerate() {
            if !node.prefix.is_empty() {
                bitmap[i >> 3] |= 1 << (7 - (i & 7));
            }
        }
        writer.write_bytes(&bitmap)?;

        for node in &self.nodes {
            if !node.prefix.is_empty() {
                node.prefix.write(writer)?;
            }
            writer.write_bytes(&node.hash)?;
        }

        match &self.body {
            ProofBody::DeadEnd => {}
            ProofBody::Short {
                prefix,
                left,
                right,
            } => {
                prefix.write(writer)?;
                writer.write_bytes(left)?;
                writer.write_bytes(right)?;
            }
            ProofBody::Collision { key, hash } => {
                writer.write_bytes(key)?;
                writer.write_bytes(hash)?;
            }
            ProofBody::Exists { value } => {
                writer.write_var::<u16>(16, value.len() as u16)?;
                writer.write_bytes(value)?;
            }
        }
        Ok(())
    }

    /// Bytes this proof occupies when serialized
    pub fn encoded_len(&self) -> usize {
        let nodes: usize = self
            .nodes
            .iter()
            .map(|n| {
                let prefix = if n.prefix.is_empty() {
                    0
                } else {
                    n.prefix.encoded_len()
                };
                prefix + 32
            })
            .sum();
        let body = match &self.body {
            ProofBody::DeadEnd => 0,
            ProofBody::Short { prefix, .. } => prefix.encoded_len() + 64,
            ProofBody::Collision { .. } => 64,
            ProofBody::Exists { value } => 2 + value.len(),
        };
        4 + self.nodes.len().div_ceil(8) + nodes + body
    }

    /// Recompute the root this proof commits to for `key`.
    pub fn compute_root(&self, key: &Hash) -> Result<Hash, ProofFailure> {
        if self.depth > KEY_BITS {
            return Err(ProofFailure::TooDeep);
        }

        let mut next = match &self.body {
            ProofBody::DeadEnd => ZERO_HASH,
            ProofBody::Short {
                prefix,
                left,
                right,
            } => {
                if prefix.has(key, self.depth as usize) {
                    return Err(ProofFailure::SamePath);
                }
                hash_internal(prefix, left, right)
            }
            ProofBody::Collision { key: other, hash } => {
                if other == key {
                    return Err(ProofFailure::SameKey);
                }
                hash_leaf(other, hash)
            }
            ProofBody::Exists { value } => hash_leaf(key, &hash_value(value)),
        };

        let mut depth = self.depth as usize;
        for node in self.nodes.iter().rev() {
            let skip = node.prefix.size() as usize;
            if depth < skip + 1 {
                return Err(ProofFailure::NegativeDepth);
            }
            depth -= 1;
            next = if get_bit(key, depth) {
                hash_internal(&node.prefix, &node.hash, &next)
            } else {
                hash_internal(&node.prefix, &next, &node.hash)
            };
            depth -= skip;
            if !node.prefix.has(key, depth) {
                return Err(ProofFailure::PathMismatch);
            }
        }

        if depth != 0 {
            return Err(ProofFailure::TooDeep);
        }
        Ok(next)
    }

    /// Check the proof reduces to `root` for `key`.
    pub fn verify(&self, root: &Hash, key: &Hash) -> Result<(), ProofFailure> {
        if &self.compute_root(key)? != root {
            return Err(ProofFailure::HashMismatch);
        }
        Ok(())
    }
}
