// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! In-memory archive fixtures for tests. Production archives are produced by
//! an offline pipeline; this builder only exists so the framing and traversal
//! properties can be exercised hermetically.

use bytes::Bytes;
use cid::Cid;
use multihash::{Code, MultihashDigest};

use crate::reader::ArchiveHeader;

const DAG_CBOR: u64 = 0x71;

/// CIDv1 (DAG-CBOR, SHA2-256) for a payload, the scheme every archive
/// section uses.
pub fn payload_cid(payload: &[u8]) -> Cid {
    Cid::new_v1(DAG_CBOR, Code::Sha2_256.digest(payload))
}

#[derive(Debug, Clone)]
pub struct BuiltSection {
    pub cid: Cid,
    /// Absolute offset of the length prefix, the index key contract.
    pub offset: u64,
    /// Full span: prefix + CID + payload.
    pub length: u64,
}

#[derive(Debug, Clone)]
pub struct BuiltArchive {
    pub bytes: Bytes,
    pub roots: Vec<Cid>,
    pub sections: Vec<BuiltSection>,
}

/// Builds `{header}{sections…}` images. Roots default to the first pushed
/// section when not set explicitly.
#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    roots: Vec<Cid>,
    sections: Vec<(Cid, Vec<u8>)>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_roots(&mut self, roots: Vec<Cid>) {
        self.roots = roots;
    }

    /// Append a section addressed by the payload's own CID.
    pub fn push(&mut self, payload: impl Into<Vec<u8>>) -> Cid {
        let payload = payload.into();
        let cid = payload_cid(&payload);
        self.sections.push((cid, payload));
        cid
    }

    /// Append a section under a caller-supplied CID, for corrupt fixtures.
    pub fn push_with_cid(&mut self, cid: Cid, payload: impl Into<Vec<u8>>) {
        self.sections.push((cid, payload.into()));
    }

    pub fn finish(self) -> BuiltArchive {
        self.finish_with_version(1)
    }

    pub fn finish_with_version(self, version: u64) -> BuiltArchive {
        let roots = if self.roots.is_empty() {
            self.sections.first().map(|(cid, _)| *cid).into_iter().collect()
        } else {
            self.roots.clone()
        };
        let header = ArchiveHeader {
            roots: roots.clone(),
            version,
        };
        let header_body =
            serde_ipld_dagcbor::to_vec(&header).expect("header serialization is infallible");

        let mut bytes = Vec::new();
        append_varint(&mut bytes, header_body.len() as u64);
        bytes.extend_from_slice(&header_body);

        let mut sections = Vec::with_capacity(self.sections.len());
        for (cid, payload) in self.sections {
            let offset = bytes.len() as u64;
            let cid_bytes = cid.to_bytes();
            let section_len = (cid_bytes.len() + payload.len()) as u64;
            append_varint(&mut bytes, section_len);
            bytes.extend_from_slice(&cid_bytes);
            bytes.extend_from_slice(&payload);
            sections.push(BuiltSection {
                cid,
                offset,
                length: bytes.len() as u64 - offset,
            });
        }

        BuiltArchive {
            bytes: Bytes::from(bytes),
            roots,
            sections,
        }
    }
}

fn append_varint(out: &mut Vec<u8>, value: u64) {
    let mut buf = unsigned_varint::encode::u64_buffer();
    out.extend_from_slice(unsigned_varint::encode::u64(value, &mut buf));
}
