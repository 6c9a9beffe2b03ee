// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! # Varint sections
//!
//! An epoch archive is a concatenation of _varint sections_. Each section is
//! the _section length_ as an
//! [varint](https://docs.rs/unsigned-varint/latest/unsigned_varint/), followed
//! by a self-delimiting [`Cid`](cid::Cid) and the _payload_ addressed by that
//! CID; the length counts the CID plus the payload.
//!
//! ```text
//! section ►│
//! offset   │  =section length
//!          │◄────────────►│
//!  ┌───────┼───┬──────────┤
//!  │length │cid│payload   │
//!  └───────┴───┼──────────┤
//!              │◄────────►│
//!      payload│  =payload length
//!      offset►│
//! ```
//!
//! The first section is a _header section_ whose payload is an
//! [`ArchiveHeader`] encoded with [`ipld_dagcbor`](serde_ipld_dagcbor) and no
//! CID. The side indexes record each section's absolute offset, i.e. the
//! position of its length prefix.
//!
//! Access is through [`RangeSource`], which abstracts over local files,
//! memory maps, in-memory buffers and remote byte-range servers. Offsets come
//! from the compact indexes; sequential iteration with [`SectionReader`]
//! ignores the indexes entirely.

mod error;
pub mod reader;
pub mod source;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::Error;
pub use reader::{
    read_header, read_section_at, ArchiveHeader, Section, SectionReader, MAX_SECTION_SIZE,
};
pub use source::{
    FileSource, HttpConfig, HttpSource, MemorySource, MmapSource, RangeSource,
};
