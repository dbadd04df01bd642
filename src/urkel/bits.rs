use std::io;

use bitstream_io::{BitRead, BitWrite};

use super::hash::Hash;

/// Bits in a tree key
pub const KEY_BITS: u16 = 256;

/// Read bit `index` of `data`, most significant bit first
#[inline]
pub fn get_bit(data: &[u8], index: usize) -> bool {
    (data[index >> 3] >> (7 - (index & 7))) & 1 == 1
}

/// A run of key bits skipped by a tree node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bits {
    size: u16,
    data: Vec<u8>,
}

impl Bits {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `data` must hold exactly `size` bits, rounded up to whole bytes.
    pub fn new(size: u16, data: Vec<u8>) -> Option<Self> {
        if size > KEY_BITS || data.len() != (size as usize).div_ceil(8) {
            return None;
        }
        Some(Self { size, data })
    }

    /// Copy `len` bits of `key` starting at bit `start`
    pub fn from_key_range(key: &Hash, start: usize, len: usize) -> Self {
        let mut data = vec![0u8; len.div_ceil(8)];
        for i in 0..len {
            if get_bit(key, start + i) {
                data[i >> 3] |= 1 << (7 - (i & 7));
            }
        }
        Self {
            size: len as u16,
            data,
        }
    }

    pub fn size(&self) -> u16 {
        self.size
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn get(&self, index: usize) -> bool {
        get_bit(&self.data, index)
    }

    /// True when these bits equal `key`'s bits from `depth` onwards
    pub fn has(&self, key: &Hash, depth: usize) -> bool {
        let size = self.size as usize;
        if depth + size > KEY_BITS as usize {
            return false;
        }
        (0..size).all(|i| self.get(i) == get_bit(key, depth + i))
    }

    /// Length prefix takes two bytes once the size needs more than 7 bits
    pub fn encoded_len(&self) -> usize {
        let header = if self.size >= 0x80 { 2 } else { 1 };
        header + self.data.len()
    }

    pub fn read<R: BitRead>(reader: &mut R) -> io::Result<Self> {
        let first = reader.read_var::<u8>(8)?;
        let size = if first & 0x80 != 0 {
            let low = reader.read_var::<u8>(8)?;
            u16::from(first & 0x7f) << 8 | u16::from(low)
        } else {
            u16::from(first)
        };
        if size > KEY_BITS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("prefix of {size} bits exceeds key length"),
            ));
        }
        let mut data = vec![0u8; (size as usize).div_ceil(8)];
        reader.read_bytes(&mut data)?;
        Ok(Self { size, data })
    }

    pub fn write<W: BitWrite>(&self, writer: &mut W) -> io::Result<()> {
        if self.size >= 0x80 {
            writer.write_var::<u8>(8, 0x80 | (self.size >> 8) as u8)?;
        }
        writer.write_var::<u8>(8, (self.size & 0xff) as u8)?;
        writer.write_bytes(&self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitstream_io::{BitReader, BitWriter, LittleEndian};

    fn roundtrip(bits: &Bits) -> (Vec<u8>, Bits) {
        let mut buf = Vec::new();
        {
            let mut writer: BitWriter<&mut Vec<u8>, LittleEndian> = BitWriter::new(&mut buf);
            bits.write(&mut writer).unwrap();
        }
        let mut reader = BitReader::<_, LittleEndian>::new(buf.as_slice());
        let decoded = Bits::read(&mut reader).unwrap();
        (buf, decoded)
    }

    #[test]
    fn test_prefix_matches_key() {
        let mut key = [0u8; 32];
        key[0] = 0b1011_0000;
        let bits = Bits::from_key_range(&key, 0, 4);
        assert_eq!(bits.data(), &[0b1011_0000]);
        assert!(bits.has(&key, 0));
        assert!(!bits.has(&key, 1));

        let tail = Bits::from_key_range(&key, 2, 2);
        assert!(tail.has(&key, 2));
        assert!(!tail.has(&key, 0));
    }

    #[test]
    fn test_size_encoding() {
        let key = [0xA5u8; 32];
        let short = Bits::from_key_range(&key, 0, 9);
        let (buf, decoded) = roundtrip(&short);
        assert_eq!(buf.len(), 1 + 2);
        assert_eq!(buf.len(), short.encoded_len());
        assert_eq!(decoded, short);

        let long = Bits::from_key_range(&key, 0, 200);
        let (buf, decoded) = roundtrip(&long);
        assert_eq!(&buf[..2], &[0x80, 200]);
        assert_eq!(buf.len(), long.encoded_len());
        assert_eq!(decoded, long);
    }

    #[test]
    fn test_oversized_prefix_rejected() {
        let data = [0x81u8, 0x01];
        let mut reader = BitReader::<_, LittleEndian>::new(&data[..]);
        assert!(Bits::read(&mut reader).is_err());
        assert!(Bits::new(8, vec![]).is_none());
    }
}
