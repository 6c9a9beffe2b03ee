// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Section framing over a [`RangeSource`]: header parsing, offset-targeted
//! single-section reads and sequential iteration.

use bytes::Bytes;
use cid::Cid;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::source::{check_cancelled, RangeSource};
use crate::Error;

/// Safety cap on a single section's declared length. Protects against
/// accidental OOM on corrupted input; the largest legitimate section is a
/// single payload chunk, far below this.
pub const MAX_SECTION_SIZE: u64 = 32 * 1024 * 1024;

/// Longest uvarint encoding of a `u64`.
const VARINT_PROBE: u64 = 10;

const SHA2_256: u64 = 0x12;

/// The archive's first section: DAG-CBOR `{ roots, version }`, no CID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveHeader {
    pub roots: Vec<Cid>,
    pub version: u64,
}

/// One parsed section from a sequential scan. `offset` is the position of
/// the length prefix, i.e. the value the CID→offset index records; `length`
/// is the full span including the prefix.
#[derive(Debug, Clone)]
pub struct Section {
    pub cid: Cid,
    pub payload: Bytes,
    pub offset: u64,
    pub length: u64,
}

/// Read and validate the archive header, returning it along with the offset
/// of the first content section. Only version 1 archives are accepted.
pub async fn read_header<S: RangeSource + ?Sized>(
    source: &S,
    token: &CancellationToken,
) -> Result<(ArchiveHeader, u64), Error> {
    let (header_len, varint_len) = read_length_prefix(source, 0, MAX_SECTION_SIZE, token).await?;
    let body = source.read_at(varint_len, header_len, token).await?;
    let header: ArchiveHeader = serde_ipld_dagcbor::from_slice(&body).map_err(|e| {
        Error::MalformedSection {
            offset: 0,
            reason: format!("invalid archive header: {e}"),
        }
    })?;
    if header.version != 1 {
        return Err(Error::UnsupportedVersion(header.version));
    }
    if header.roots.is_empty() {
        return Err(Error::MalformedSection {
            offset: 0,
            reason: "archive header has no roots".into(),
        });
    }
    Ok((header, varint_len + header_len))
}

/// Read the single section at `offset` and return its payload.
///
/// The parsed CID must equal `expected`, and for SHA2-256 CIDs the payload
/// must hash back to the CID's digest; either failure is
/// [`Error::CidMismatch`].
pub async fn read_section_at<S: RangeSource + ?Sized>(
    source: &S,
    offset: u64,
    expected: &Cid,
    max_section_size: u64,
    token: &CancellationToken,
) -> Result<Bytes, Error> {
    let (cid, payload, _length) = parse_section(source, offset, max_section_size, token).await?;
    if cid != *expected {
        return Err(Error::CidMismatch {
            offset,
            expected: *expected,
            actual: cid,
        });
    }
    Ok(payload)
}

/// Sequential iteration over an archive's sections, header first. Used by
/// callers that enumerate nodes without consulting the indexes.
pub struct SectionReader<S> {
    source: S,
    header: ArchiveHeader,
    position: u64,
    max_section_size: u64,
}

impl<S: RangeSource> SectionReader<S> {
    /// Open the archive and position the reader past the header.
    pub async fn open(source: S, token: &CancellationToken) -> Result<Self, Error> {
        let (header, first_section) = read_header(&source, token).await?;
        Ok(Self {
            source,
            header,
            position: first_section,
            max_section_size: MAX_SECTION_SIZE,
        })
    }

    pub fn with_max_section_size(mut self, cap: u64) -> Self {
        self.max_section_size = cap;
        self
    }

    pub fn header(&self) -> &ArchiveHeader {
        &self.header
    }

    /// The next section, or `None` at end of archive.
    pub async fn next_section(
        &mut self,
        token: &CancellationToken,
    ) -> Result<Option<Section>, Error> {
        if self.position >= self.source.size() {
            return Ok(None);
        }
        let offset = self.position;
        let (cid, payload, length) =
            parse_section(&self.source, offset, self.max_section_size, token).await?;
        self.position = offset + length;
        trace!(%cid, offset, length, "scanned section");
        Ok(Some(Section {
            cid,
            payload,
            offset,
            length,
        }))
    }
}

/// Decode `{uvarint length}{cid}{payload}` at `offset`. Returns the parsed
/// CID, the payload and the full section span, verifying that the payload
/// hashes back to the CID.
async fn parse_section<S: RangeSource + ?Sized>(
    source: &S,
    offset: u64,
    max_section_size: u64,
    token: &CancellationToken,
) -> Result<(Cid, Bytes, u64), Error> {
    let (section_len, varint_len) =
        read_length_prefix(source, offset, max_section_size, token).await?;
    if section_len == 0 {
        return Err(Error::MalformedSection {
            offset,
            reason: "empty section".into(),
        });
    }
    let body = source.read_at(offset + varint_len, section_len, token).await?;

    let cid = Cid::read_bytes(body.as_ref()).map_err(|e| Error::MalformedSection {
        offset,
        reason: format!("invalid cid: {e}"),
    })?;
    let cid_len = cid.to_bytes().len() as u64;
    if cid_len >= section_len {
        return Err(Error::MalformedSection {
            offset,
            reason: "section length does not cover a payload".into(),
        });
    }
    let payload = body.slice(cid_len as usize..);

    if cid.hash().code() == SHA2_256 {
        let digest = Sha256::digest(&payload);
        if cid.hash().digest() != digest.as_slice() {
            let recomputed = cid::multihash::Multihash::wrap(SHA2_256, &digest).map_err(|e| {
                Error::MalformedSection {
                    offset,
                    reason: format!("digest wrap: {e}"),
                }
            })?;
            return Err(Error::CidMismatch {
                offset,
                expected: cid,
                actual: Cid::new_v1(cid.codec(), recomputed),
            });
        }
    }

    Ok((cid, payload, varint_len + section_len))
}

/// Read the uvarint length prefix at `offset`, returning `(length, prefix
/// width)` and enforcing the section-size cap.
async fn read_length_prefix<S: RangeSource + ?Sized>(
    source: &S,
    offset: u64,
    max_section_size: u64,
    token: &CancellationToken,
) -> Result<(u64, u64), Error> {
    check_cancelled(token)?;
    let size = source.size();
    if offset >= size {
        return Err(Error::OutOfBounds {
            offset,
            len: 1,
            size,
        });
    }
    let probe_len = VARINT_PROBE.min(size - offset);
    let probe = source.read_at(offset, probe_len, token).await?;
    let (value, rest) =
        unsigned_varint::decode::u64(&probe).map_err(|e| Error::MalformedSection {
            offset,
            reason: format!("invalid length varint: {e}"),
        })?;
    if value > max_section_size {
        return Err(Error::MalformedSection {
            offset,
            reason: format!("declared length {value} exceeds the {max_section_size} byte cap"),
        });
    }
    Ok((value, (probe.len() - rest.len()) as u64))
}
