// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Sealed-image builder for test fixtures. Real indexes come out of the
//! offline archive pipeline; this exists so the lookup laws can be exercised
//! hermetically.

use bytes::Bytes;
use cid::Cid;

use crate::format::{BucketDescriptor, IndexHeader, BUCKET_DESCRIPTOR_LEN, HEADER_LEN};
use crate::hash::{bucket_for, residue};
use crate::Error;

pub const DEFAULT_RESIDUE_WIDTH: u8 = 3;

/// Target mean bucket occupancy.
const BUCKET_FAN: usize = 8;
const MAX_SALT_ATTEMPTS: u64 = 10_000;

pub struct IndexBuilder {
    key_width: u8,
    value_width: u8,
    residue_width: u8,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

impl IndexBuilder {
    /// `key_width` 0 means variable-width keys (hashed only, never stored).
    pub fn new(key_width: u8, value_width: u8) -> Self {
        Self {
            key_width,
            value_width,
            residue_width: DEFAULT_RESIDUE_WIDTH,
            entries: Vec::new(),
        }
    }

    pub fn with_residue_width(mut self, width: u8) -> Self {
        self.residue_width = width;
        self
    }

    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.entries.push((key, value));
    }

    pub fn finish(self) -> Result<Bytes, Error> {
        for (key, value) in &self.entries {
            if self.key_width != 0 && key.len() != usize::from(self.key_width) {
                return Err(Error::SchemaVersion(format!(
                    "key is {} bytes, builder expects {}",
                    key.len(),
                    self.key_width
                )));
            }
            if value.len() != usize::from(self.value_width) {
                return Err(Error::SchemaVersion(format!(
                    "value is {} bytes, builder expects {}",
                    value.len(),
                    self.value_width
                )));
            }
        }

        let bucket_count = (self.entries.len() / BUCKET_FAN).max(1) as u32;
        let mut buckets: Vec<Vec<usize>> = vec![Vec::new(); bucket_count as usize];
        for (i, (key, _)) in self.entries.iter().enumerate() {
            buckets[bucket_for(key, bucket_count) as usize].push(i);
        }

        let directory_end = HEADER_LEN + u64::from(bucket_count) * BUCKET_DESCRIPTOR_LEN;
        let mut descriptors = Vec::with_capacity(buckets.len());
        let mut payloads: Vec<u8> = Vec::new();

        for members in &buckets {
            let keys: Vec<&[u8]> = members.iter().map(|&i| self.entries[i].0.as_slice()).collect();
            let salt = find_salt(&keys, self.residue_width)?;

            let mut records: Vec<(Vec<u8>, &[u8])> = members
                .iter()
                .map(|&i| {
                    (
                        residue(salt, &self.entries[i].0, self.residue_width),
                        self.entries[i].1.as_slice(),
                    )
                })
                .collect();
            records.sort_by(|a, b| a.0.cmp(&b.0));

            descriptors.push(BucketDescriptor {
                salt,
                count: members.len() as u32,
                entries_offset: directory_end + payloads.len() as u64,
            });
            for (residue, value) in records {
                payloads.extend_from_slice(&residue);
                payloads.extend_from_slice(value);
            }
        }

        let header = IndexHeader {
            key_width: self.key_width,
            value_width: self.value_width,
            residue_width: self.residue_width,
            bucket_count,
            entry_count: self.entries.len() as u64,
        };
        let mut image = header.encode();
        for descriptor in descriptors {
            image.extend_from_slice(&descriptor.encode());
        }
        image.extend_from_slice(&payloads);
        Ok(Bytes::from(image))
    }
}

/// Pick a salt under which every key in the bucket has a distinct residue.
fn find_salt(keys: &[&[u8]], width: u8) -> Result<u64, Error> {
    for salt in 0..MAX_SALT_ATTEMPTS {
        let mut residues: Vec<Vec<u8>> = keys.iter().map(|k| residue(salt, k, width)).collect();
        residues.sort();
        if residues.windows(2).all(|pair| pair[0] != pair[1]) {
            return Ok(salt);
        }
    }
    Err(Error::CorruptIndex(
        "no collision-free salt found; bucket contains duplicate keys?".into(),
    ))
}

pub fn cid_to_offset_and_size_image(entries: &[(Cid, u64, u64)]) -> Bytes {
    let mut builder = IndexBuilder::new(0, 16);
    for (cid, offset, size) in entries {
        let mut value = Vec::with_capacity(16);
        value.extend_from_slice(&offset.to_le_bytes());
        value.extend_from_slice(&size.to_le_bytes());
        builder.insert(cid.to_bytes(), value);
    }
    builder.finish().expect("fixture image")
}

pub fn slot_to_cid_image(entries: &[(u64, Cid)]) -> Bytes {
    let mut builder = IndexBuilder::new(8, 36);
    for (slot, cid) in entries {
        builder.insert(slot.to_le_bytes().to_vec(), cid.to_bytes());
    }
    builder.finish().expect("fixture image")
}

pub fn sig_to_cid_image(entries: &[([u8; 64], Cid)]) -> Bytes {
    let mut builder = IndexBuilder::new(64, 36);
    for (sig, cid) in entries {
        builder.insert(sig.to_vec(), cid.to_bytes());
    }
    builder.finish().expect("fixture image")
}
