// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! On-disk layout. All integers are little-endian.

use byteorder::{LittleEndian, ReadBytesExt};

use crate::Error;

/// File type and version marker.
pub const MAGIC: [u8; 8] = *b"AMBERIDX";
pub const VERSION: u16 = 1;

/// magic + version + key width + value width + residue width + reserved +
/// bucket count + entry count.
pub const HEADER_LEN: u64 = 8 + 2 + 1 + 1 + 1 + 1 + 4 + 8;

/// salt + count + entries offset.
pub const BUCKET_DESCRIPTOR_LEN: u64 = 8 + 4 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexHeader {
    /// Fixed key width in bytes; 0 means variable-width keys (hashed only).
    pub key_width: u8,
    pub value_width: u8,
    /// Width of the stored hash residue per record.
    pub residue_width: u8,
    pub bucket_count: u32,
    pub entry_count: u64,
}

impl IndexHeader {
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_LEN as usize {
            return Err(Error::CorruptIndex("short header".into()));
        }
        if bytes[..8] != MAGIC {
            return Err(Error::CorruptIndex("bad magic".into()));
        }
        let mut cursor = &bytes[8..];
        let version = cursor
            .read_u16::<LittleEndian>()
            .map_err(|e| Error::CorruptIndex(e.to_string()))?;
        if version != VERSION {
            return Err(Error::SchemaVersion(format!(
                "index version {version}, reader supports {VERSION}"
            )));
        }
        let key_width = cursor
            .read_u8()
            .map_err(|e| Error::CorruptIndex(e.to_string()))?;
        let value_width = cursor
            .read_u8()
            .map_err(|e| Error::CorruptIndex(e.to_string()))?;
        let residue_width = cursor
            .read_u8()
            .map_err(|e| Error::CorruptIndex(e.to_string()))?;
        let _reserved = cursor
            .read_u8()
            .map_err(|e| Error::CorruptIndex(e.to_string()))?;
        let bucket_count = cursor
            .read_u32::<LittleEndian>()
            .map_err(|e| Error::CorruptIndex(e.to_string()))?;
        let entry_count = cursor
            .read_u64::<LittleEndian>()
            .map_err(|e| Error::CorruptIndex(e.to_string()))?;

        if value_width == 0 || residue_width == 0 || bucket_count == 0 {
            return Err(Error::CorruptIndex(
                "zero value width, residue width or bucket count".into(),
            ));
        }
        Ok(Self {
            key_width,
            value_width,
            residue_width,
            bucket_count,
            entry_count,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN as usize);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.push(self.key_width);
        out.push(self.value_width);
        out.push(self.residue_width);
        out.push(0);
        out.extend_from_slice(&self.bucket_count.to_le_bytes());
        out.extend_from_slice(&self.entry_count.to_le_bytes());
        out
    }

    /// Bytes per bucket-payload record.
    pub fn record_width(&self) -> u64 {
        u64::from(self.residue_width) + u64::from(self.value_width)
    }

    /// Absolute offset of a bucket's directory descriptor.
    pub fn descriptor_offset(&self, bucket: u32) -> u64 {
        HEADER_LEN + u64::from(bucket) * BUCKET_DESCRIPTOR_LEN
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketDescriptor {
    pub salt: u64,
    pub count: u32,
    /// Absolute offset of the bucket's first record.
    pub entries_offset: u64,
}

impl BucketDescriptor {
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < BUCKET_DESCRIPTOR_LEN as usize {
            return Err(Error::CorruptIndex("short bucket descriptor".into()));
        }
        let mut cursor = bytes;
        Ok(Self {
            salt: cursor
                .read_u64::<LittleEndian>()
                .map_err(|e| Error::CorruptIndex(e.to_string()))?,
            count: cursor
                .read_u32::<LittleEndian>()
                .map_err(|e| Error::CorruptIndex(e.to_string()))?,
            entries_offset: cursor
                .read_u64::<LittleEndian>()
                .map_err(|e| Error::CorruptIndex(e.to_string()))?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(BUCKET_DESCRIPTOR_LEN as usize);
        out.extend_from_slice(&self.salt.to_le_bytes());
        out.extend_from_slice(&self.count.to_le_bytes());
        out.extend_from_slice(&self.entries_offset.to_le_bytes());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = IndexHeader {
            key_width: 8,
            value_width: 36,
            residue_width: 3,
            bucket_count: 17,
            entry_count: 12345,
        };
        assert_eq!(IndexHeader::parse(&header.encode()).unwrap(), header);
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let mut bytes = IndexHeader {
            key_width: 8,
            value_width: 36,
            residue_width: 3,
            bucket_count: 1,
            entry_count: 0,
        }
        .encode();
        bytes[0] = b'x';
        assert!(matches!(
            IndexHeader::parse(&bytes),
            Err(Error::CorruptIndex(_))
        ));
    }

    #[test]
    fn future_version_is_schema_mismatch() {
        let mut bytes = IndexHeader {
            key_width: 8,
            value_width: 36,
            residue_width: 3,
            bucket_count: 1,
            entry_count: 0,
        }
        .encode();
        bytes[8] = 9;
        assert!(matches!(
            IndexHeader::parse(&bytes),
            Err(Error::SchemaVersion(_))
        ));
    }
}
