// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("read of {len} bytes at offset {offset} is out of bounds for a source of {size} bytes")]
    OutOfBounds { offset: u64, len: u64, size: u64 },

    /// Transport failure that survived the retry loop.
    #[error("transient i/o failure: {0}")]
    TransientIo(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed section at offset {offset}: {reason}")]
    MalformedSection { offset: u64, reason: String },

    #[error("section at offset {offset} is addressed by {actual}, expected {expected}")]
    CidMismatch {
        offset: u64,
        expected: Cid,
        actual: Cid,
    },

    #[error("unsupported archive version {0}")]
    UnsupportedVersion(u64),

    #[error("operation cancelled")]
    Cancelled,
}
