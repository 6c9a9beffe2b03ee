// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use cid::Cid;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown node kind {0}")]
    UnknownKind(u64),

    #[error("malformed {variant} node: {reason}")]
    Decode {
        variant: &'static str,
        reason: String,
    },

    #[error("failed to encode node: {0}")]
    Encode(String),

    #[error("reassembled payload does not hash to the declared value")]
    HashMismatch,

    #[error("data-frame tree exceeds the traversal depth bound")]
    DepthExceeded,

    #[error("node {0} is not present in the archive")]
    NotFound(Cid),

    #[error(transparent)]
    Archive(#[from] amber_archive::Error),

    #[error(transparent)]
    Index(#[from] amber_compactindex::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Archive(amber_archive::Error::Cancelled) => true,
            Error::Index(e) => e.is_cancelled(),
            _ => false,
        }
    }
}
