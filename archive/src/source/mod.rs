// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

//! Backends for random reads over an immutable archive or index file.

mod http;
mod local;

use std::ops::Range;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use crate::Error;

pub use http::{HttpConfig, HttpSource};
pub use local::{FileSource, MmapSource};

/// Length-exact random read over an immutable byte sequence.
///
/// A short read is an error, never a partial success. Implementations must be
/// shareable across threads without locking on the caller's side; all handles
/// here are read-only.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Read exactly `len` bytes starting at `offset`.
    ///
    /// Cancellation is observed before any I/O is issued; a cancelled token
    /// yields [`Error::Cancelled`] with no side effects.
    async fn read_at(&self, offset: u64, len: u64, token: &CancellationToken)
        -> Result<Bytes, Error>;

    /// Total size of the underlying byte sequence.
    fn size(&self) -> u64;
}

#[async_trait]
impl<S: RangeSource + ?Sized> RangeSource for Arc<S> {
    async fn read_at(
        &self,
        offset: u64,
        len: u64,
        token: &CancellationToken,
    ) -> Result<Bytes, Error> {
        (**self).read_at(offset, len, token).await
    }

    fn size(&self) -> u64 {
        (**self).size()
    }
}

/// In-memory source backed by [`Bytes`]. The reference backend for tests and
/// for archives already resident in memory.
#[derive(Debug, Clone)]
pub struct MemorySource {
    bytes: Bytes,
}

impl MemorySource {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl RangeSource for MemorySource {
    async fn read_at(
        &self,
        offset: u64,
        len: u64,
        token: &CancellationToken,
    ) -> Result<Bytes, Error> {
        check_cancelled(token)?;
        let range = checked_range(offset, len, self.size())?;
        Ok(self.bytes.slice(range))
    }

    fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

pub(crate) fn check_cancelled(token: &CancellationToken) -> Result<(), Error> {
    if token.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

pub(crate) fn checked_range(offset: u64, len: u64, size: u64) -> Result<Range<usize>, Error> {
    match offset.checked_add(len) {
        Some(end) if end <= size => Ok(offset as usize..end as usize),
        _ => Err(Error::OutOfBounds { offset, len, size }),
    }
}
