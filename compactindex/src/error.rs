// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("key not present in index")]
    NotFound,

    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    #[error("index schema mismatch: {0}")]
    SchemaVersion(String),

    #[error(transparent)]
    Source(#[from] amber_archive::Error),
}

impl Error {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Source(amber_archive::Error::Cancelled))
    }
}
