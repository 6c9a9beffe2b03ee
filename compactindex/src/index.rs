// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::cmp::Ordering;

use amber_archive::RangeSource;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::format::{IndexHeader, BUCKET_DESCRIPTOR_LEN, HEADER_LEN};
use crate::hash::{bucket_for, residue};
use crate::{BucketDescriptor, Error};

/// Read-only handle over one sealed index file.
///
/// A lookup costs two range reads (the bucket's directory descriptor, then
/// its payload) and a binary search over `{residue, value}` records. The
/// handle is freely shareable across threads.
pub struct CompactIndex<S> {
    source: S,
    header: IndexHeader,
}

impl<S: RangeSource> CompactIndex<S> {
    pub async fn open(source: S, token: &CancellationToken) -> Result<Self, Error> {
        let header_bytes = read(&source, 0, HEADER_LEN, token).await?;
        let header = IndexHeader::parse(&header_bytes)?;

        let directory_end =
            HEADER_LEN + u64::from(header.bucket_count) * BUCKET_DESCRIPTOR_LEN;
        if directory_end > source.size() {
            return Err(Error::CorruptIndex(format!(
                "directory of {} buckets does not fit in {} bytes",
                header.bucket_count,
                source.size()
            )));
        }
        trace!(
            buckets = header.bucket_count,
            entries = header.entry_count,
            "opened compact index"
        );
        Ok(Self { source, header })
    }

    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    pub fn num_buckets(&self) -> u32 {
        self.header.bucket_count
    }

    pub fn entry_count(&self) -> u64 {
        self.header.entry_count
    }

    /// Look up `key`, returning the fixed-width value bytes.
    pub async fn lookup(&self, key: &[u8], token: &CancellationToken) -> Result<Bytes, Error> {
        if self.header.key_width != 0 && key.len() != usize::from(self.header.key_width) {
            return Err(Error::SchemaVersion(format!(
                "key is {} bytes, index expects {}",
                key.len(),
                self.header.key_width
            )));
        }

        let bucket = bucket_for(key, self.header.bucket_count);
        let raw = read(
            &self.source,
            self.header.descriptor_offset(bucket),
            BUCKET_DESCRIPTOR_LEN,
            token,
        )
        .await?;
        let descriptor = BucketDescriptor::parse(&raw)?;
        if descriptor.count == 0 {
            return Err(Error::NotFound);
        }

        let record_width = self.header.record_width();
        let payload = read(
            &self.source,
            descriptor.entries_offset,
            u64::from(descriptor.count) * record_width,
            token,
        )
        .await?;

        let target = residue(descriptor.salt, key, self.header.residue_width);
        let record_width = record_width as usize;
        let residue_width = usize::from(self.header.residue_width);

        let mut lo = 0usize;
        let mut hi = descriptor.count as usize;
        while lo < hi {
            let mid = (lo + hi) / 2;
            let start = mid * record_width;
            match payload[start..start + residue_width].cmp(&target) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => {
                    return Ok(payload.slice(start + residue_width..start + record_width));
                }
            }
        }
        Err(Error::NotFound)
    }
}

/// Index reads: a read past the end of the file means the file is truncated,
/// not that the caller asked for something out of range.
async fn read<S: RangeSource>(
    source: &S,
    offset: u64,
    len: u64,
    token: &CancellationToken,
) -> Result<Bytes, Error> {
    match source.read_at(offset, len, token).await {
        Ok(bytes) => Ok(bytes),
        Err(amber_archive::Error::OutOfBounds { offset, len, size }) => Err(Error::CorruptIndex(
            format!("truncated index: read of {len} bytes at {offset} in a {size} byte file"),
        )),
        Err(other) => Err(Error::Source(other)),
    }
}

#[cfg(test)]
mod tests {
    use amber_archive::MemorySource;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::build::IndexBuilder;

    async fn open(image: Bytes) -> CompactIndex<MemorySource> {
        CompactIndex::open(MemorySource::new(image), &CancellationToken::new())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn every_inserted_key_is_found_and_absent_keys_are_not() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut builder = IndexBuilder::new(8, 4);
        let mut pairs = vec![];
        for _ in 0..500 {
            let key: [u8; 8] = rng.gen();
            let value: [u8; 4] = rng.gen();
            if pairs.iter().any(|(k, _)| *k == key) {
                continue;
            }
            builder.insert(key.to_vec(), value.to_vec());
            pairs.push((key, value));
        }
        let index = open(builder.finish().unwrap()).await;
        let token = CancellationToken::new();

        assert_eq!(index.entry_count(), pairs.len() as u64);
        for (key, value) in &pairs {
            let got = index.lookup(key, &token).await.unwrap();
            assert_eq!(&got[..], value);
        }

        for _ in 0..100 {
            let absent: [u8; 8] = rng.gen();
            if pairs.iter().any(|(k, _)| *k == absent) {
                continue;
            }
            assert!(matches!(
                index.lookup(&absent, &token).await,
                Err(Error::NotFound)
            ));
        }
    }

    #[tokio::test]
    async fn wrong_key_width_is_schema_mismatch() {
        let mut builder = IndexBuilder::new(8, 4);
        builder.insert(vec![1; 8], vec![2; 4]);
        let index = open(builder.finish().unwrap()).await;

        let err = index
            .lookup(b"short", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SchemaVersion(_)));
    }

    #[tokio::test]
    async fn truncated_image_is_corrupt() {
        let mut builder = IndexBuilder::new(8, 4);
        for i in 0u64..64 {
            builder.insert(i.to_le_bytes().to_vec(), vec![0; 4]);
        }
        let image = builder.finish().unwrap();

        // Cut into the bucket payloads.
        let cut = image.slice(..image.len() - 16);
        let index = open(cut).await;
        let token = CancellationToken::new();

        let mut saw_corrupt = false;
        for i in 0u64..64 {
            match index.lookup(&i.to_le_bytes(), &token).await {
                Err(Error::CorruptIndex(_)) => saw_corrupt = true,
                Ok(_) | Err(Error::NotFound) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }
        assert!(saw_corrupt);

        // Cutting into the directory fails at open.
        let cut = image.slice(..HEADER_LEN as usize + 4);
        let err = CompactIndex::open(MemorySource::new(cut), &token)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CorruptIndex(_)));
    }

    #[tokio::test]
    async fn cancellation_propagates() {
        let mut builder = IndexBuilder::new(8, 4);
        builder.insert(vec![1; 8], vec![2; 4]);
        let index = open(builder.finish().unwrap()).await;

        let token = CancellationToken::new();
        token.cancel();
        let err = index.lookup(&[1; 8], &token).await.unwrap_err();
        assert!(err.is_cancelled());
    }
}
