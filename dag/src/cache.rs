// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use bytes::Bytes;
use cid::Cid;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::trace;

/// Thread-safe LRU over raw node payloads, bounded by total byte count
/// rather than entry count.
///
/// Purely a latency optimization in front of the index + archive-reader
/// path: payloads are immutable, `get`/`put` are best-effort, and a lost
/// race merely re-fetches.
#[derive(Debug)]
pub struct NodeCache {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    map: LruCache<Cid, Bytes>,
    bytes: usize,
    budget: usize,
}

impl NodeCache {
    pub fn new(budget: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: LruCache::unbounded(),
                bytes: 0,
                budget,
            }),
        }
    }

    /// Returns the cached payload and refreshes its recency.
    pub fn get(&self, cid: &Cid) -> Option<Bytes> {
        self.inner.lock().map.get(cid).cloned()
    }

    /// Inserts a payload, evicting least-recently-used entries until the
    /// byte budget holds. Payloads over the whole budget are not cached.
    pub fn put(&self, cid: Cid, payload: Bytes) {
        let inner = &mut *self.inner.lock();
        if payload.len() > inner.budget {
            return;
        }
        if let Some(previous) = inner.map.put(cid, payload.clone()) {
            inner.bytes -= previous.len();
        }
        inner.bytes += payload.len();
        while inner.bytes > inner.budget {
            match inner.map.pop_lru() {
                Some((evicted, bytes)) => {
                    inner.bytes -= bytes.len();
                    trace!(%evicted, "evicted node from cache");
                }
                None => break,
            }
        }
    }

    pub fn bytes_used(&self) -> usize {
        self.inner.lock().bytes
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
