// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! # Compact indexes
//!
//! An epoch archive is served together with three sealed side indexes, each
//! an immutable bucketed perfect-hash map from a fixed-width key to a
//! fixed-width value:
//!
//! - CID → archive offset and section size ([`CidToOffsetAndSize`])
//! - slot → block CID ([`SlotToCid`])
//! - signature → transaction CID ([`SigToCid`])
//!
//! The file layout is a header, a bucket directory of `{salt, count,
//! entries_offset}` descriptors, and per-bucket payloads of `{hash residue,
//! value}` records sorted by residue. The builder picks each bucket's salt so
//! residues are collision-free, so a lookup needs two range reads and a
//! binary search over small byte strings; no key material is stored.
//!
//! Access goes through [`RangeSource`](amber_archive::RangeSource): a local
//! memory map gives near-free random reads, a remote HTTP source the same
//! small-footprint request pattern. The structure is sealed: mutation
//! belongs to the offline pipeline that produced the archive.

#[cfg(any(test, feature = "testing"))]
pub mod build;
mod error;
pub mod format;
mod hash;
mod index;
mod typed;

pub use error::Error;
pub use format::{BucketDescriptor, IndexHeader};
pub use index::CompactIndex;
pub use typed::{CidToOffsetAndSize, SigToCid, SlotToCid};
