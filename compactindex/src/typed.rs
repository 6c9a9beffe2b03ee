// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! The three concrete index instantiations an epoch ships with. Each wrapper
//! validates the header widths at open time, so a file of the wrong schema
//! fails fast instead of returning garbage values.

use amber_archive::RangeSource;
use byteorder::{ByteOrder, LittleEndian};
use cid::Cid;
use tokio_util::sync::CancellationToken;

use crate::{CompactIndex, Error};

/// CID bytes for the CIDv1/SHA2-256 scheme the archives use.
const CID_WIDTH: u8 = 36;

fn expect_widths<S: RangeSource>(
    index: &CompactIndex<S>,
    key_width: u8,
    value_width: u8,
    what: &str,
) -> Result<(), Error> {
    let header = index.header();
    if header.key_width != key_width || header.value_width != value_width {
        return Err(Error::SchemaVersion(format!(
            "{what} expects key/value widths {key_width}/{value_width}, file has {}/{}",
            header.key_width, header.value_width
        )));
    }
    Ok(())
}

fn cid_from_value(value: &[u8]) -> Result<Cid, Error> {
    Cid::try_from(value).map_err(|e| Error::CorruptIndex(format!("invalid cid value: {e}")))
}

/// CID → `(archive offset, section size)`.
pub struct CidToOffsetAndSize<S> {
    inner: CompactIndex<S>,
}

impl<S: RangeSource> CidToOffsetAndSize<S> {
    pub async fn open(source: S, token: &CancellationToken) -> Result<Self, Error> {
        let inner = CompactIndex::open(source, token).await?;
        expect_widths(&inner, 0, 16, "cid-to-offset index")?;
        Ok(Self { inner })
    }

    pub async fn lookup(
        &self,
        cid: &Cid,
        token: &CancellationToken,
    ) -> Result<(u64, u64), Error> {
        let value = self.inner.lookup(&cid.to_bytes(), token).await?;
        Ok((
            LittleEndian::read_u64(&value[..8]),
            LittleEndian::read_u64(&value[8..16]),
        ))
    }

    pub fn num_buckets(&self) -> u32 {
        self.inner.num_buckets()
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

/// Slot → block CID.
pub struct SlotToCid<S> {
    inner: CompactIndex<S>,
}

impl<S: RangeSource> SlotToCid<S> {
    pub async fn open(source: S, token: &CancellationToken) -> Result<Self, Error> {
        let inner = CompactIndex::open(source, token).await?;
        expect_widths(&inner, 8, CID_WIDTH, "slot-to-cid index")?;
        Ok(Self { inner })
    }

    pub async fn lookup(&self, slot: u64, token: &CancellationToken) -> Result<Cid, Error> {
        let value = self.inner.lookup(&slot.to_le_bytes(), token).await?;
        cid_from_value(&value)
    }

    pub fn num_buckets(&self) -> u32 {
        self.inner.num_buckets()
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

/// Transaction signature → transaction CID.
pub struct SigToCid<S> {
    inner: CompactIndex<S>,
}

impl<S: RangeSource> SigToCid<S> {
    pub async fn open(source: S, token: &CancellationToken) -> Result<Self, Error> {
        let inner = CompactIndex::open(source, token).await?;
        expect_widths(&inner, 64, CID_WIDTH, "sig-to-cid index")?;
        Ok(Self { inner })
    }

    pub async fn lookup(
        &self,
        signature: &[u8; 64],
        token: &CancellationToken,
    ) -> Result<Cid, Error> {
        let value = self.inner.lookup(signature, token).await?;
        cid_from_value(&value)
    }

    pub fn num_buckets(&self) -> u32 {
        self.inner.num_buckets()
    }

    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use amber_archive::MemorySource;
    use multihash::{Code, MultihashDigest};

    use super::*;
    use crate::build::{cid_to_offset_and_size_image, sig_to_cid_image, slot_to_cid_image};

    fn cid_of(data: &[u8]) -> Cid {
        Cid::new_v1(0x71, Code::Sha2_256.digest(data))
    }

    #[tokio::test]
    async fn slot_lookup_returns_recorded_cid() {
        let cid = cid_of(b"block at slot 123456789");
        let other = cid_of(b"another block");
        let image = slot_to_cid_image(&[(123_456_789, cid), (123_456_790, other)]);
        let index = SlotToCid::open(MemorySource::new(image), &CancellationToken::new())
            .await
            .unwrap();
        let token = CancellationToken::new();

        assert_eq!(index.lookup(123_456_789, &token).await.unwrap(), cid);
        assert_eq!(index.lookup(123_456_790, &token).await.unwrap(), other);
        assert!(matches!(
            index.lookup(999_999_999_999, &token).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn signature_lookup_returns_recorded_cid() {
        let cid = cid_of(b"some transaction");
        let mut sig = [0u8; 64];
        sig[..5].copy_from_slice(b"sig01");
        let image = sig_to_cid_image(&[(sig, cid)]);
        let index = SigToCid::open(MemorySource::new(image), &CancellationToken::new())
            .await
            .unwrap();
        let token = CancellationToken::new();

        assert_eq!(index.lookup(&sig, &token).await.unwrap(), cid);
        assert!(matches!(
            index.lookup(&[0xFF; 64], &token).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn cid_lookup_returns_offset_and_size() {
        let cid = cid_of(b"a section");
        let image = cid_to_offset_and_size_image(&[(cid, 8675309, 42)]);
        let index =
            CidToOffsetAndSize::open(MemorySource::new(image), &CancellationToken::new())
                .await
                .unwrap();
        let token = CancellationToken::new();

        assert_eq!(index.lookup(&cid, &token).await.unwrap(), (8675309, 42));
        assert!(matches!(
            index.lookup(&cid_of(b"absent"), &token).await,
            Err(Error::NotFound)
        ));
    }

    #[tokio::test]
    async fn opening_the_wrong_schema_fails() {
        let image = cid_to_offset_and_size_image(&[(cid_of(b"x"), 0, 1)]);
        let err = SlotToCid::open(MemorySource::new(image), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SchemaVersion(_)));
    }
}
