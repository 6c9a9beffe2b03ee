// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to open epoch: {0}")]
    Open(String),

    #[error(transparent)]
    Archive(#[from] amber_archive::Error),

    #[error(transparent)]
    Index(#[from] amber_compactindex::Error),

    #[error(transparent)]
    Dag(#[from] amber_dag::Error),

    #[error(transparent)]
    Meta(#[from] amber_codec::Error),

    #[error("operation cancelled")]
    Cancelled,
}

impl Error {
    /// Lookup misses and dangling references; external surfaces map these to
    /// 404.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Index(amber_compactindex::Error::NotFound) => true,
            Error::Dag(amber_dag::Error::NotFound(_)) => true,
            Error::Dag(amber_dag::Error::Index(amber_compactindex::Error::NotFound)) => true,
            _ => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        match self {
            Error::Cancelled => true,
            Error::Archive(amber_archive::Error::Cancelled) => true,
            Error::Index(e) => e.is_cancelled(),
            Error::Dag(e) => e.is_cancelled(),
            _ => false,
        }
    }
}

/// Collapse the nested cancellation shapes into the canonical kind.
pub(crate) fn normalized<T>(result: Result<T, Error>) -> Result<T, Error> {
    match result {
        Err(e) if e.is_cancelled() => Err(Error::Cancelled),
        other => other,
    }
}
