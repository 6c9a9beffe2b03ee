// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use std::fs::File;
use std::io;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use memmap2::Mmap;
use positioned_io::{RandomAccessFile, ReadAt};
use tokio_util::sync::CancellationToken;

use crate::source::{check_cancelled, checked_range, RangeSource};
use crate::Error;

/// Pread-style source over a descriptor. Reads are positioned, so a single
/// handle serves concurrent callers without seeking.
///
/// **Note that reads on this source are blocking.**
pub struct FileSource {
    file: RandomAccessFile,
    size: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file: RandomAccessFile::try_new(file)?,
            size,
        })
    }
}

#[async_trait]
impl RangeSource for FileSource {
    async fn read_at(
        &self,
        offset: u64,
        len: u64,
        token: &CancellationToken,
    ) -> Result<Bytes, Error> {
        check_cancelled(token)?;
        checked_range(offset, len, self.size)?;
        let mut buf = vec![0; len as usize];
        self.file.read_exact_at(offset, &mut buf)?;
        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// Memory-mapped source. Random reads are near-free once the pages are
/// resident.
///
/// To be correct, the underlying file must be immutable for the lifetime of
/// the map, e.g. [`flock`](https://linux.die.net/man/2/flock)ed; mutation
/// behind the map is undefined behavior.
pub struct MmapSource {
    map: Mmap,
}

impl MmapSource {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        // Safety: callers uphold the immutability requirement above.
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self { map })
    }
}

#[async_trait]
impl RangeSource for MmapSource {
    async fn read_at(
        &self,
        offset: u64,
        len: u64,
        token: &CancellationToken,
    ) -> Result<Bytes, Error> {
        check_cancelled(token)?;
        let range = checked_range(offset, len, self.size())?;
        Ok(Bytes::copy_from_slice(&self.map[range]))
    }

    fn size(&self) -> u64 {
        self.map.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn file_and_mmap_sources_agree() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"the quick brown fox").unwrap();
        file.flush().unwrap();

        let token = CancellationToken::new();
        let from_file = FileSource::open(file.path()).unwrap();
        let from_map = MmapSource::open(file.path()).unwrap();

        assert_eq!(from_file.size(), from_map.size());
        let a = from_file.read_at(4, 5, &token).await.unwrap();
        let b = from_map.read_at(4, 5, &token).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(&a[..], b"quick");

        assert!(matches!(
            from_file.read_at(16, 8, &token).await,
            Err(Error::OutOfBounds { .. })
        ));
        assert!(matches!(
            from_map.read_at(16, 8, &token).await,
            Err(Error::OutOfBounds { .. })
        ));
    }
}
